//! Public entry point: spawns the render and resource upload threads, and
//! posts user requests to them.

use crate::backend::{BackendMessage, BackendRenderer, BackendStats};
use crate::frontend::{FrameStats, FrontendMessage, FrontendParams, FrontendRenderer, ScreenEvent};
use crate::geometry::{Point, Rect};
use crate::gui::{GuiLayout, Widget};
use crate::message::{blocker, Mailbox, MessagePriority, ThreadName, ThreadsCommutator};
use crate::render::{GraphicsContext, StaticTextureManager};
use crate::user_marks::{
    IdCollections, MarkGroupId, MarkId, UserLinesRenderCollection, UserMarkGenerator,
    UserMarksRenderCollection,
};
use anyhow::{anyhow, Context};
use futures::channel::oneshot;
use futures::executor::block_on;
use log::{debug, error, info};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Parameters of the engine.
#[derive(Clone, Debug, PartialEq)]
pub struct EngineParams {
    /// Render thread parameters.
    pub frontend: FrontendParams,
    /// Highest zoom level of the user marks index.
    pub max_user_mark_zoom: u32,
    /// Symbol sizes of the texture atlas, in pixels.
    pub symbols: BTreeMap<String, [f32; 2]>,
    /// Layout of the GUI widgets.
    pub gui: GuiLayout,
}

impl Default for EngineParams {
    fn default() -> Self {
        Self {
            frontend: FrontendParams::default(),
            max_user_mark_zoom: UserMarkGenerator::DEFAULT_MAX_ZOOM,
            symbols: BTreeMap::new(),
            gui: GuiLayout::default(),
        }
    }
}

/// Statistics of both threads, collected when the engine stops.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Render thread statistics.
    pub frames: FrameStats,
    /// Resource upload thread statistics.
    pub backend: BackendStats,
}

/// Handle to the running engine threads.
pub struct DrapeEngine {
    commutator: ThreadsCommutator,
    running: Arc<AtomicBool>,
    render_thread: Option<JoinHandle<FrameStats>>,
    upload_thread: Option<JoinHandle<BackendStats>>,
}

impl DrapeEngine {
    /// Side of the touch rectangle of a tap, in pixels.
    const TOUCH_SIZE: f64 = 8.0;

    /// Spawns the engine threads, rendering into the given context.
    pub fn new<C>(params: EngineParams, context: C) -> anyhow::Result<Self>
    where
        C: GraphicsContext + Send + 'static,
    {
        let commutator = ThreadsCommutator::new(
            Mailbox::new("render"),
            Mailbox::new("resource upload"),
        );
        let running = Arc::new(AtomicBool::new(true));

        let backend = BackendRenderer::new(
            commutator.clone(),
            UserMarkGenerator::new(params.max_user_mark_zoom),
            Box::new(StaticTextureManager::new(&params.symbols)),
            params.gui,
        );
        let upload_thread = {
            let running = running.clone();
            thread::Builder::new()
                .name("resource upload".to_owned())
                .spawn(move || backend.run(&running))
                .context("Failed to spawn the resource upload thread")?
        };

        let mut frontend = FrontendRenderer::new(commutator.clone(), context, params.frontend);
        // Queued before any request of the caller.
        frontend.start();
        let render_thread = {
            let running = running.clone();
            thread::Builder::new()
                .name("render".to_owned())
                .spawn(move || frontend.run(&running))
        };
        let render_thread = match render_thread {
            Ok(handle) => handle,
            Err(e) => {
                running.store(false, Ordering::Release);
                commutator.close(ThreadName::ResourceUploadThread);
                return Err(e).context("Failed to spawn the render thread");
            }
        };

        info!("Drape engine started");
        Ok(Self {
            commutator,
            running,
            render_thread: Some(render_thread),
            upload_thread: Some(upload_thread),
        })
    }

    fn post_to_backend(&self, message: BackendMessage) {
        self.commutator
            .post_to_resource_upload(message, MessagePriority::Normal);
    }

    fn post_to_frontend(&self, message: FrontendMessage) {
        self.commutator.post_to_render(message, MessagePriority::Normal);
    }

    /// Updates the render parameters of marks and lines. The geometry is
    /// regenerated on the next [`Self::invalidate_user_marks()`].
    pub fn update_user_marks(
        &self,
        removed: IdCollections,
        created: Vec<MarkId>,
        marks: UserMarksRenderCollection,
        lines: UserLinesRenderCollection,
    ) {
        self.post_to_backend(BackendMessage::UpdateUserMarks {
            removed,
            created,
            marks,
            lines,
        });
    }

    /// Replaces the content of a group.
    pub fn update_user_mark_group(&self, group_id: MarkGroupId, ids: IdCollections) {
        self.post_to_backend(BackendMessage::UpdateUserMarkGroup { group_id, ids });
    }

    /// Deletes a group.
    pub fn clear_user_mark_group(&self, group_id: MarkGroupId) {
        self.post_to_backend(BackendMessage::ClearUserMarkGroup { group_id });
    }

    /// Shows or hides a group.
    pub fn change_user_mark_group_visibility(&self, group_id: MarkGroupId, visible: bool) {
        self.post_to_backend(BackendMessage::ChangeUserMarkGroupVisibility { group_id, visible });
    }

    /// Regenerates the user marks of all the visible tiles.
    pub fn invalidate_user_marks(&self) {
        self.post_to_backend(BackendMessage::InvalidateUserMarks);
    }

    /// Regenerates the visible tiles intersecting the given world rectangle,
    /// or all of them. If `blocking`, returns once the resource upload thread
    /// posted the new geometry.
    pub fn invalidate_rect(&self, rect: Option<Rect>, blocking: bool) {
        if !blocking {
            self.post_to_backend(BackendMessage::InvalidateReadManagerRect { rect, signal: None });
            return;
        }
        let (waiter, signal) = blocker();
        self.post_to_backend(BackendMessage::InvalidateReadManagerRect {
            rect,
            signal: Some(signal),
        });
        waiter.wait();
    }

    /// Returns once the render thread, then the resource upload thread,
    /// processed all the messages posted so far. Tiles requested by the render
    /// thread in the meantime are generated on return.
    pub fn sync(&self) {
        let (waiter, signal) = blocker();
        self.post_to_frontend(FrontendMessage::Sync(signal));
        waiter.wait();
        self.invalidate_rect(Some(Rect::empty()), true);
    }

    fn update_screen(&self, event: ScreenEvent) {
        self.post_to_frontend(FrontendMessage::UpdateScreen(event));
    }

    /// Adjusts the view to a new window size, in pixels.
    pub fn resize(&self, width: u32, height: u32) {
        self.update_screen(ScreenEvent::Resize { width, height });
    }

    /// Moves the view by a drag, in pixels.
    pub fn drag(&self, dx: f64, dy: f64) {
        self.update_screen(ScreenEvent::Drag { dx, dy });
    }

    /// Zooms in (positive) or out (negative).
    pub fn scroll(&self, scroll: f64) {
        self.update_screen(ScreenEvent::Scroll(scroll));
    }

    /// Centers the view on a world point.
    pub fn set_center(&self, center: Point<f64>) {
        self.update_screen(ScreenEvent::SetCenter(center));
    }

    /// Moves the current position marker, or hides it.
    pub fn set_my_position(&self, position: Option<Point<f64>>) {
        self.post_to_frontend(FrontendMessage::SetMyPosition(position));
    }

    /// Requests a new frame.
    pub fn invalidate(&self) {
        self.commutator
            .post_to_render(FrontendMessage::Invalidate, MessagePriority::UberHighSingleton);
    }

    /// Returns the widget tapped at the given pixel, if any, once the render
    /// thread processed the messages posted before.
    pub fn tap(&self, p: Point<f64>) -> Option<Widget> {
        let (reply, rx) = oneshot::channel();
        let half = Self::TOUCH_SIZE / 2.0;
        let touch = Rect::new(p, p).inflated(half, half);
        self.post_to_frontend(FrontendMessage::Tap { touch, reply });
        // A closed render queue drops the sender.
        block_on(rx).unwrap_or_default()
    }

    /// Releases (`false`) or recovers (`true`) the graphics resources.
    pub fn set_rendering_enabled(&self, enabled: bool) {
        let message = if enabled {
            FrontendMessage::RecoverContextDependentResources
        } else {
            FrontendMessage::ContextDestroyed
        };
        self.commutator.post_to_render(message, MessagePriority::High);
    }

    /// Stops both threads, discards the pending messages and returns the
    /// statistics of the threads.
    pub fn stop(mut self) -> anyhow::Result<EngineStats> {
        self.shutdown()
    }

    fn shutdown(&mut self) -> anyhow::Result<EngineStats> {
        self.running.store(false, Ordering::Release);

        // A cancellation is lost if it happens right before a thread starts
        // waiting, so keep cancelling until both threads are done.
        while !is_finished(&self.render_thread) || !is_finished(&self.upload_thread) {
            self.commutator.cancel_waiting(ThreadName::RenderThread);
            self.commutator.cancel_waiting(ThreadName::ResourceUploadThread);
            thread::sleep(Duration::from_millis(1));
        }

        let frames = match self.render_thread.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| anyhow!("The render thread panicked"))?,
            None => FrameStats::default(),
        };
        let backend = match self.upload_thread.take() {
            Some(handle) => handle
                .join()
                .map_err(|_| anyhow!("The resource upload thread panicked"))?,
            None => BackendStats::default(),
        };

        self.commutator.close(ThreadName::RenderThread);
        self.commutator.close(ThreadName::ResourceUploadThread);
        debug!("Drape engine stopped");
        Ok(EngineStats { frames, backend })
    }
}

fn is_finished<T>(handle: &Option<JoinHandle<T>>) -> bool {
    handle.as_ref().map_or(true, JoinHandle::is_finished)
}

impl Drop for DrapeEngine {
    fn drop(&mut self) {
        if self.render_thread.is_some() || self.upload_thread.is_some() {
            if let Err(e) = self.shutdown() {
                error!("Failed to stop the drape engine: {e:?}");
            }
        }
    }
}
