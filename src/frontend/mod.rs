//! Render thread: owns the graphics context, the user mark geometry of the
//! visible tiles and the GUI shapes, and draws frames.

use crate::backend::BackendMessage;
use crate::geometry::{Point, Rect};
use crate::gui::{ShapeRenderer, Widget};
use crate::message::{
    BlockerSignal, Mailbox, Message, MessageAcceptor, MessagePriority, ThreadsCommutator,
};
use crate::render::{
    make_projection, GraphicsContext, ProgramManager, RenderBucket, RenderState, UniformValues,
};
use crate::screen::Screen;
use crate::tile::{TileBox, TileKey};
use crate::user_marks::UserMarkRenderData;
use crate::util::warn_on_error;
use futures::channel::oneshot;
use log::{debug, error, info, trace};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// User interaction changing the view.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ScreenEvent {
    /// The window was resized, in pixels.
    Resize {
        /// New width.
        width: u32,
        /// New height.
        height: u32,
    },
    /// The map was dragged by the given number of pixels.
    Drag {
        /// Horizontal motion.
        dx: f64,
        /// Vertical motion.
        dy: f64,
    },
    /// The mouse wheel zoomed in (positive) or out (negative).
    Scroll(f64),
    /// The map was centered on a world point.
    SetCenter(Point<f64>),
}

/// Messages accepted by the render thread.
pub enum FrontendMessage {
    /// Geometry generated for a tile, replacing the previous one.
    FlushUserMarks {
        /// Tile the geometry was requested for.
        tile_key: TileKey,
        /// Buckets of the tile, possibly none.
        data: Vec<UserMarkRenderData>,
    },
    /// The user marks changed, all the visible tiles must be requested again.
    InvalidateUserMarks,
    /// New GUI shapes.
    GuiLayerRecached {
        /// Widgets laid out against the window.
        widgets: ShapeRenderer,
        /// Current position marker.
        my_position: ShapeRenderer,
    },
    /// The view changed.
    UpdateScreen(ScreenEvent),
    /// The user tapped the given rectangle, in pixels.
    Tap {
        /// Touch rectangle.
        touch: Rect,
        /// Receives the tapped widget, if any.
        reply: oneshot::Sender<Option<Widget>>,
    },
    /// The current position moved, or became unknown.
    SetMyPosition(Option<Point<f64>>),
    /// The graphics context was destroyed.
    ContextDestroyed,
    /// The graphics context is available again.
    RecoverContextDependentResources,
    /// A new frame must be drawn. Always posted at
    /// [`MessagePriority::UberHighSingleton`].
    Invalidate,
    /// Releases its waiter once the messages posted before it are processed.
    Sync(BlockerSignal),
}

impl Message for FrontendMessage {
    fn name(&self) -> &'static str {
        match self {
            FrontendMessage::FlushUserMarks { .. } => "FlushUserMarks",
            FrontendMessage::InvalidateUserMarks => "InvalidateUserMarks",
            FrontendMessage::GuiLayerRecached { .. } => "GuiLayerRecached",
            FrontendMessage::UpdateScreen(_) => "UpdateScreen",
            FrontendMessage::Tap { .. } => "Tap",
            FrontendMessage::SetMyPosition(_) => "SetMyPosition",
            FrontendMessage::ContextDestroyed => "ContextDestroyed",
            FrontendMessage::RecoverContextDependentResources => {
                "RecoverContextDependentResources"
            }
            FrontendMessage::Invalidate => "Invalidate",
            FrontendMessage::Sync(_) => "Sync",
        }
    }

    fn is_graphics_context_dependent(&self) -> bool {
        matches!(
            self,
            FrontendMessage::FlushUserMarks { .. } | FrontendMessage::GuiLayerRecached { .. }
        )
    }
}

/// Parameters of the render thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrontendParams {
    /// Initial window width, in pixels.
    pub width: u32,
    /// Initial window height, in pixels.
    pub height: u32,
    /// Maximum number of pixels per tile before switching to the next zoom
    /// level.
    pub max_pixels_per_tile: usize,
    /// Maximum zoom level of the requested tiles.
    pub max_tile_level: u32,
}

impl Default for FrontendParams {
    fn default() -> Self {
        Self {
            width: 800,
            height: 600,
            max_pixels_per_tile: 256,
            max_tile_level: 18,
        }
    }
}

/// Rendering statistics of the render thread.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    /// Number of frames drawn.
    pub frames: usize,
    /// Number of user mark buckets drawn, over all frames.
    pub user_mark_draws: usize,
    /// Number of tiles of geometry received.
    pub flushed_tiles: usize,
    /// Number of tiles of geometry received after leaving the coverage.
    pub dropped_tiles: usize,
    /// Number of taps that hit a widget.
    pub taps: usize,
}

/// Worker of the render thread.
pub struct FrontendRenderer<C: GraphicsContext> {
    mailbox: Mailbox<FrontendMessage>,
    commutator: ThreadsCommutator,
    context: C,
    programs: ProgramManager,
    screen: Screen,
    max_pixels_per_tile: usize,
    max_tile_level: u32,
    /// Visible tiles, or [`None`] while the graphics context is lost.
    coverage: Option<TileBox>,
    /// Geometry of the received tiles. A tile without bucket was received
    /// empty.
    user_mark_groups: BTreeMap<TileKey, Vec<(RenderState, RenderBucket)>>,
    /// Invalidated tiles still showing their old geometry.
    pending_tiles: BTreeSet<TileKey>,
    gui: ShapeRenderer,
    my_position: ShapeRenderer,
    /// Current position, in world coordinates.
    my_position_point: Option<Point<f64>>,
    rendering_enabled: bool,
    needs_redraw: bool,
    stats: FrameStats,
}

impl<C: GraphicsContext> FrontendRenderer<C> {
    /// Maximum number of messages processed between two frames.
    const MAX_MESSAGES_PER_FRAME: usize = 32;
    /// Time between two frames while animating.
    const FRAME_DURATION: Duration = Duration::from_millis(16);

    /// Creates a worker accepting messages from the render mailbox of the
    /// given commutator, and drawing into the given context.
    pub fn new(commutator: ThreadsCommutator, context: C, params: FrontendParams) -> Self {
        let programs = ProgramManager::new(context.api());
        Self {
            mailbox: commutator.render().clone(),
            commutator,
            context,
            programs,
            screen: Screen::new(params.width, params.height),
            max_pixels_per_tile: params.max_pixels_per_tile,
            max_tile_level: params.max_tile_level.min(TileKey::MAX_ZOOM_LEVEL),
            coverage: None,
            user_mark_groups: BTreeMap::new(),
            pending_tiles: BTreeSet::new(),
            gui: ShapeRenderer::new(),
            my_position: ShapeRenderer::new(),
            my_position_point: None,
            rendering_enabled: true,
            needs_redraw: true,
            stats: FrameStats::default(),
        }
    }

    /// Graphics context drawn into.
    pub fn context(&self) -> &C {
        &self.context
    }

    /// Current view.
    pub fn screen(&self) -> &Screen {
        &self.screen
    }

    /// Visible tiles.
    pub fn coverage(&self) -> Option<TileBox> {
        self.coverage
    }

    /// Tiles whose geometry was received.
    pub fn user_mark_tiles(&self) -> impl Iterator<Item = &TileKey> {
        self.user_mark_groups.keys()
    }

    /// Statistics so far.
    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    /// Requests the initial tiles and GUI.
    pub fn start(&mut self) {
        self.request_gui();
        self.update_coverage(true);
    }

    /// Processes messages and draws frames until `running` is cleared, then
    /// returns the rendering statistics. [`Self::start()`] must have been
    /// called before.
    pub fn run(mut self, running: &AtomicBool) -> FrameStats {
        info!("Start of render thread");
        while running.load(Ordering::Acquire) {
            let animating = self.is_animating();
            if self.needs_redraw || animating {
                let mut processed = 0;
                while processed < Self::MAX_MESSAGES_PER_FRAME && self.process_single_message(false)
                {
                    processed += 1;
                }
                self.render_frame();
                if animating {
                    self.process_single_message_timeout(Self::FRAME_DURATION);
                }
            } else {
                self.process_single_message(true);
            }
        }
        info!("End of render thread: {:?}", self.stats);
        self.stats
    }

    /// Whether frames must be drawn continuously.
    fn is_animating(&self) -> bool {
        self.rendering_enabled && self.my_position_point.is_some() && !self.my_position.is_empty()
    }

    fn request_gui(&self) {
        self.commutator.post_to_resource_upload(
            BackendMessage::GuiRecache {
                screen: self.screen.clone(),
            },
            MessagePriority::Normal,
        );
    }

    /// Recomputes the visible tiles, drops the geometry of the tiles that left
    /// them, and requests the tiles without up-to-date geometry. If `force` is
    /// set, all the visible tiles are out of date.
    fn update_coverage(&mut self, force: bool) {
        if !self.rendering_enabled {
            return;
        }
        let tile_box = self
            .screen
            .tile_box(self.max_pixels_per_tile, self.max_tile_level);
        if !force && self.coverage == Some(tile_box) {
            return;
        }
        self.coverage = Some(tile_box);

        let coverage: BTreeSet<TileKey> = tile_box.tile_keys().into_iter().collect();
        let before = self.user_mark_groups.len();
        self.user_mark_groups
            .retain(|tile_key, _| coverage.contains(tile_key));
        if force {
            self.pending_tiles = coverage.clone();
        } else {
            self.pending_tiles
                .retain(|tile_key| coverage.contains(tile_key));
        }
        let tiles: BTreeSet<TileKey> = coverage
            .iter()
            .filter(|tile_key| {
                !self.user_mark_groups.contains_key(*tile_key)
                    || self.pending_tiles.contains(*tile_key)
            })
            .copied()
            .collect();
        debug!(
            "[{frame}] Coverage of {} tiles at level {}, dropped {} tiles, requesting {}",
            coverage.len(),
            tile_box.zoom_level(),
            before - self.user_mark_groups.len(),
            tiles.len(),
            frame = self.stats.frames,
        );

        // Older requests are superseded by this one.
        self.commutator
            .resource_upload()
            .instant_filter(|m| !matches!(m, BackendMessage::UpdateReadManager { .. }));
        self.commutator.post_to_resource_upload(
            BackendMessage::UpdateReadManager { coverage, tiles },
            MessagePriority::Normal,
        );
        self.needs_redraw = true;
    }

    fn flush_user_marks(&mut self, tile_key: TileKey, data: Vec<UserMarkRenderData>) {
        if !self
            .coverage
            .as_ref()
            .is_some_and(|coverage| coverage.contains(&tile_key))
        {
            trace!("Dropping user marks of {tile_key:?}, out of coverage");
            self.stats.dropped_tiles += 1;
            return;
        }

        let mut buckets = Vec::with_capacity(data.len());
        for UserMarkRenderData {
            state, mut bucket, ..
        } in data
        {
            match self.programs.program(state.program) {
                Some(program) => bucket.buffer_mut().build(program),
                None => {
                    error!("Missing program {:?} for user marks", state.program);
                    continue;
                }
            }
            buckets.push((state, bucket));
        }
        self.stats.flushed_tiles += 1;
        self.pending_tiles.remove(&tile_key);
        self.user_mark_groups.insert(tile_key, buckets);
        self.needs_redraw = true;
    }

    fn update_screen(&mut self, event: ScreenEvent) {
        match event {
            ScreenEvent::Resize { width, height } => {
                self.screen.resize(width, height);
                self.request_gui();
            }
            ScreenEvent::Drag { dx, dy } => self.screen.drag_relative(dx, dy),
            ScreenEvent::Scroll(scroll) => self.screen.scroll(scroll),
            ScreenEvent::SetCenter(center) => self.screen.set_center(center),
        }
        self.update_my_position();
        self.update_coverage(false);
        self.needs_redraw = true;
    }

    fn update_my_position(&mut self) {
        match self.my_position_point {
            Some(point) => {
                let pivot = self.screen.g_to_p(point).to_f32();
                self.my_position.set_pivot(pivot);
                self.my_position.set_visible(true);
            }
            None => self.my_position.set_visible(false),
        }
    }

    /// Releases everything bound to the graphics context, and ignores the
    /// context dependent messages until it's recovered.
    pub fn on_context_destroyed(&mut self) {
        info!("Graphics context destroyed");
        self.rendering_enabled = false;
        self.gui.invalidate();
        self.my_position.invalidate();
        self.user_mark_groups.clear();
        self.pending_tiles.clear();
        self.coverage = None;
        self.programs.destroy();

        let keep = |m: &FrontendMessage| !m.is_graphics_context_dependent();
        self.mailbox.enable_message_filtering(keep);
        self.mailbox.instant_filter(keep);
    }

    /// Recompiles the programs and requests all the geometry again.
    pub fn recover_context_dependent_resources(&mut self) {
        info!("Recovering graphics context resources");
        self.mailbox.disable_message_filtering();
        self.programs = ProgramManager::new(self.context.api());
        self.rendering_enabled = true;
        self.request_gui();
        self.update_coverage(true);
    }

    /// Draws the user marks of the visible tiles, then the GUI.
    pub fn render_frame(&mut self) {
        self.needs_redraw = false;
        if !self.rendering_enabled {
            trace!("Rendering disabled, skipping frame");
            return;
        }
        self.stats.frames += 1;
        let frame = self.stats.frames;
        self.context.begin_frame();

        let projection = make_projection(
            self.context.api(),
            0.0,
            self.screen.width() as f32,
            self.screen.height() as f32,
            0.0,
        );

        let mut buckets: Vec<(&TileKey, &RenderState, &RenderBucket)> = self
            .user_mark_groups
            .iter()
            .flat_map(|(tile_key, group)| group.iter().map(move |(s, b)| (tile_key, s, b)))
            .collect();
        buckets.sort_by_key(|(_, state, _)| state.depth_layer);

        let mut draws = 0;
        for (tile_key, state, bucket) in buckets {
            let Some(program) = self.programs.program(state.program) else {
                continue;
            };
            let uniforms = UniformValues {
                projection,
                model_view: self.tile_model_view(tile_key),
                opacity: 1.0,
            };
            self.context.apply_state(state);
            self.context.apply_uniforms(program, &uniforms);
            if bucket.buffer().render(&mut self.context, program) {
                draws += 1;
            }
        }
        self.stats.user_mark_draws += draws;
        debug!(
            "[{frame}] Drew {draws} user mark buckets in {} tiles",
            self.user_mark_groups.len()
        );

        self.gui
            .render(&mut self.context, &self.screen, &self.programs);
        self.my_position
            .render(&mut self.context, &self.screen, &self.programs);
    }

    /// Model-view matrix mapping tile-local coordinates to pixels.
    fn tile_model_view(&self, tile_key: &TileKey) -> [f32; 16] {
        let scale = (tile_key.size() * self.screen.zoom()) as f32;
        let Point { x, y } = self.screen.g_to_p(tile_key.center()).to_f32();
        let mut m = UniformValues::translation(x, y);
        m[0] = scale;
        m[5] = scale;
        m
    }
}

impl<C: GraphicsContext> MessageAcceptor for FrontendRenderer<C> {
    type Message = FrontendMessage;

    fn mailbox(&self) -> &Mailbox<FrontendMessage> {
        &self.mailbox
    }

    fn accept_message(&mut self, message: FrontendMessage) {
        match message {
            FrontendMessage::FlushUserMarks { tile_key, data } => {
                self.flush_user_marks(tile_key, data)
            }
            FrontendMessage::InvalidateUserMarks => self.update_coverage(true),
            FrontendMessage::GuiLayerRecached {
                mut widgets,
                mut my_position,
            } => {
                widgets.build(&self.programs);
                my_position.build(&self.programs);
                self.gui = widgets;
                self.my_position = my_position;
                self.update_my_position();
                self.needs_redraw = true;
            }
            FrontendMessage::UpdateScreen(event) => self.update_screen(event),
            FrontendMessage::Tap { touch, reply } => {
                let widget = if self.rendering_enabled {
                    self.gui.process_tap_event(&touch)
                } else {
                    None
                };
                if widget.is_some() {
                    self.stats.taps += 1;
                }
                warn_on_error(reply.send(widget), "tap reply");
            }
            FrontendMessage::SetMyPosition(point) => {
                self.my_position_point = point;
                self.update_my_position();
                self.needs_redraw = true;
            }
            FrontendMessage::ContextDestroyed => self.on_context_destroyed(),
            FrontendMessage::RecoverContextDependentResources => {
                self.recover_context_dependent_resources()
            }
            FrontendMessage::Invalidate => self.needs_redraw = true,
            FrontendMessage::Sync(signal) => drop(signal),
        }
    }
}
