//! Resource upload thread: owns the user marks and generates their geometry
//! for the tiles requested by the render thread.

use crate::frontend::FrontendMessage;
use crate::geometry::Rect;
use crate::gui::{GuiLayout, LayerCacher};
use crate::message::{
    BlockerSignal, Mailbox, Message, MessageAcceptor, MessagePriority, ThreadsCommutator,
};
use crate::render::{Batcher, TextureManager};
use crate::screen::Screen;
use crate::tile::TileKey;
use crate::user_marks::{
    IdCollections, MarkGroupId, MarkId, UserLinesRenderCollection, UserMarkGenerator,
    UserMarksRenderCollection,
};
use log::{debug, info, trace};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};

/// Messages accepted by the resource upload thread.
pub enum BackendMessage {
    /// The visible tiles changed. `tiles` must be generated, while `coverage`
    /// is the full set of visible tiles.
    UpdateReadManager {
        /// All the visible tiles.
        coverage: BTreeSet<TileKey>,
        /// Visible tiles without geometry on the render thread.
        tiles: BTreeSet<TileKey>,
    },
    /// Marks and lines were created, updated or removed.
    UpdateUserMarks {
        /// Removed marks and lines.
        removed: IdCollections,
        /// Marks to animate on their next display.
        created: Vec<MarkId>,
        /// New render parameters of marks.
        marks: UserMarksRenderCollection,
        /// New render parameters of lines.
        lines: UserLinesRenderCollection,
    },
    /// The content of a group changed.
    UpdateUserMarkGroup {
        /// Group identifier.
        group_id: MarkGroupId,
        /// All the marks and lines of the group.
        ids: IdCollections,
    },
    /// A group was deleted.
    ClearUserMarkGroup {
        /// Group identifier.
        group_id: MarkGroupId,
    },
    /// A group was shown or hidden.
    ChangeUserMarkGroupVisibility {
        /// Group identifier.
        group_id: MarkGroupId,
        /// Whether the group is displayed.
        visible: bool,
    },
    /// The user marks geometry must be regenerated.
    InvalidateUserMarks,
    /// The geometry of the visible tiles intersecting `rect` (or of all the
    /// visible tiles) must be regenerated.
    InvalidateReadManagerRect {
        /// World rectangle to regenerate, or everything.
        rect: Option<Rect>,
        /// Released once the regenerated geometry is posted.
        signal: Option<BlockerSignal>,
    },
    /// The GUI widgets must be laid out again for the given screen.
    GuiRecache {
        /// Screen to lay out the widgets on.
        screen: Screen,
    },
}

impl Message for BackendMessage {
    fn name(&self) -> &'static str {
        match self {
            BackendMessage::UpdateReadManager { .. } => "UpdateReadManager",
            BackendMessage::UpdateUserMarks { .. } => "UpdateUserMarks",
            BackendMessage::UpdateUserMarkGroup { .. } => "UpdateUserMarkGroup",
            BackendMessage::ClearUserMarkGroup { .. } => "ClearUserMarkGroup",
            BackendMessage::ChangeUserMarkGroupVisibility { .. } => {
                "ChangeUserMarkGroupVisibility"
            }
            BackendMessage::InvalidateUserMarks => "InvalidateUserMarks",
            BackendMessage::InvalidateReadManagerRect { .. } => "InvalidateReadManagerRect",
            BackendMessage::GuiRecache { .. } => "GuiRecache",
        }
    }
}

/// Statistics of the resource upload thread.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BackendStats {
    /// Number of messages processed.
    pub messages: usize,
    /// Number of tiles generated, including empty ones.
    pub generated_tiles: usize,
    /// Number of GUI layouts.
    pub gui_recaches: usize,
}

/// Worker of the resource upload thread.
pub struct BackendRenderer {
    mailbox: Mailbox<BackendMessage>,
    commutator: ThreadsCommutator,
    generator: UserMarkGenerator,
    textures: Box<dyn TextureManager>,
    batcher: Batcher,
    gui_layout: GuiLayout,
    /// Visible tiles, as last reported by the render thread.
    coverage: BTreeSet<TileKey>,
    stats: BackendStats,
}

impl BackendRenderer {
    /// Creates a worker accepting messages from the resource upload mailbox
    /// of the given commutator.
    pub fn new(
        commutator: ThreadsCommutator,
        generator: UserMarkGenerator,
        textures: Box<dyn TextureManager>,
        gui_layout: GuiLayout,
    ) -> Self {
        Self {
            mailbox: commutator.resource_upload().clone(),
            commutator,
            generator,
            textures,
            batcher: Batcher::default(),
            gui_layout,
            coverage: BTreeSet::new(),
            stats: BackendStats::default(),
        }
    }

    /// User marks owned by this worker.
    pub fn generator(&self) -> &UserMarkGenerator {
        &self.generator
    }

    /// Statistics so far.
    pub fn stats(&self) -> BackendStats {
        self.stats
    }

    /// Processes messages until `running` is cleared, then returns the
    /// statistics of the thread.
    pub fn run(mut self, running: &AtomicBool) -> BackendStats {
        info!("Start of resource upload thread");
        while running.load(Ordering::Acquire) {
            self.process_single_message(true);
        }
        info!("End of resource upload thread: {:?}", self.stats);
        self.stats
    }

    /// Generates the given tiles and posts their geometry to the render
    /// thread, one message per tile even when it is empty.
    fn generate_tiles(&mut self, tiles: impl IntoIterator<Item = TileKey>) {
        for tile_key in tiles {
            let mut data = Vec::new();
            self.generator.generate_user_marks_geometry(
                tile_key,
                self.textures.as_ref(),
                &mut self.batcher,
                |d| data.push(d),
            );
            self.stats.generated_tiles += 1;
            self.commutator.post_to_render(
                FrontendMessage::FlushUserMarks { tile_key, data },
                MessagePriority::Normal,
            );
        }
    }
}

impl MessageAcceptor for BackendRenderer {
    type Message = BackendMessage;

    fn mailbox(&self) -> &Mailbox<BackendMessage> {
        &self.mailbox
    }

    fn accept_message(&mut self, message: BackendMessage) {
        self.stats.messages += 1;
        match message {
            BackendMessage::UpdateReadManager { coverage, tiles } => {
                debug!(
                    "Coverage of {} tiles, generating {}",
                    coverage.len(),
                    tiles.len()
                );
                self.coverage = coverage;
                self.generate_tiles(tiles);
            }
            BackendMessage::UpdateUserMarks {
                removed,
                created,
                marks,
                lines,
            } => {
                trace!(
                    "Updating {} marks and {} lines, removing {:?}",
                    marks.len(),
                    lines.len(),
                    removed
                );
                self.generator.remove_user_marks(&removed);
                self.generator.set_user_marks(marks);
                self.generator.set_user_lines(lines);
                self.generator.set_just_created_user_marks(&created);
            }
            BackendMessage::UpdateUserMarkGroup { group_id, ids } => {
                self.generator.set_group(group_id, ids);
            }
            BackendMessage::ClearUserMarkGroup { group_id } => {
                self.generator.remove_group(group_id);
            }
            BackendMessage::ChangeUserMarkGroupVisibility { group_id, visible } => {
                self.generator.set_group_visibility(group_id, visible);
            }
            BackendMessage::InvalidateUserMarks => {
                self.commutator
                    .post_to_render(FrontendMessage::InvalidateUserMarks, MessagePriority::Normal);
            }
            BackendMessage::InvalidateReadManagerRect { rect, signal } => {
                let tiles: Vec<TileKey> = self
                    .coverage
                    .iter()
                    .filter(|key| rect.as_ref().map_or(true, |r| key.rect().intersects(r)))
                    .copied()
                    .collect();
                debug!("Invalidating {} tiles", tiles.len());
                self.generate_tiles(tiles);
                drop(signal);
            }
            BackendMessage::GuiRecache { screen } => {
                let cacher = LayerCacher::new(&self.gui_layout, self.textures.as_ref());
                let widgets = cacher.recache_widgets(&screen);
                let my_position = cacher.cache_my_position();
                self.stats.gui_recaches += 1;
                self.commutator.post_to_render(
                    FrontendMessage::GuiLayerRecached {
                        widgets,
                        my_position,
                    },
                    MessagePriority::Normal,
                );
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::Point;
    use crate::message::blocker;
    use crate::render::StaticTextureManager;
    use crate::user_marks::UserMarkRenderParams;
    use std::collections::BTreeMap;

    fn backend() -> (BackendRenderer, Mailbox<FrontendMessage>) {
        let render = Mailbox::new("render");
        let commutator = ThreadsCommutator::new(render.clone(), Mailbox::new("resource upload"));
        let backend = BackendRenderer::new(
            commutator,
            UserMarkGenerator::default(),
            Box::new(StaticTextureManager::new(&BTreeMap::new())),
            GuiLayout::default(),
        );
        (backend, render)
    }

    fn populate(backend: &mut BackendRenderer, pivot: Point<f64>) {
        let mut marks = UserMarksRenderCollection::new();
        marks.insert(1, UserMarkRenderParams::new(pivot));
        backend.accept_message(BackendMessage::UpdateUserMarks {
            removed: IdCollections::default(),
            created: vec![1],
            marks,
            lines: UserLinesRenderCollection::new(),
        });
        backend.accept_message(BackendMessage::UpdateUserMarkGroup {
            group_id: 7,
            ids: IdCollections {
                mark_ids: vec![1],
                line_ids: vec![],
            },
        });
        backend.accept_message(BackendMessage::ChangeUserMarkGroupVisibility {
            group_id: 7,
            visible: true,
        });
    }

    #[test]
    fn read_manager_generates_requested_tiles() {
        let (mut backend, render) = backend();
        populate(&mut backend, Point::new(0.3, 0.3));

        let full = TileKey::new(0, 0, 1);
        let empty = TileKey::new(1, 1, 1);
        backend.accept_message(BackendMessage::UpdateReadManager {
            coverage: [full, empty, TileKey::new(1, 0, 1)].into_iter().collect(),
            tiles: [full, empty].into_iter().collect(),
        });

        let messages = render.drain();
        assert_eq!(messages.len(), 2);
        for message in messages {
            match message {
                FrontendMessage::FlushUserMarks { tile_key, data } => {
                    assert_eq!(data.is_empty(), tile_key == empty);
                    assert!(data.iter().all(|d| d.tile_key == tile_key));
                }
                other => panic!("Unexpected message {}", other.name()),
            }
        }
        assert_eq!(backend.stats().generated_tiles, 2);
    }

    #[test]
    fn invalidate_rect_regenerates_intersecting_tiles() {
        let (mut backend, render) = backend();
        populate(&mut backend, Point::new(0.3, 0.3));
        let coverage: BTreeSet<TileKey> = [(0, 0), (1, 0), (0, 1), (1, 1)]
            .into_iter()
            .map(|(x, y)| TileKey::new(x, y, 1))
            .collect();
        backend.accept_message(BackendMessage::UpdateReadManager {
            coverage,
            tiles: BTreeSet::new(),
        });
        assert!(render.is_queue_empty());

        let (waiter, signal) = blocker::blocker();
        backend.accept_message(BackendMessage::InvalidateReadManagerRect {
            rect: Some(Rect::from_ltwh(0.1, 0.1, 0.1, 0.1)),
            signal: Some(signal),
        });
        // The signal was dropped by the handler.
        waiter.wait();
        let tiles: Vec<TileKey> = render.drain()
            .into_iter()
            .filter_map(|m| match m {
                FrontendMessage::FlushUserMarks { tile_key, .. } => Some(tile_key),
                _ => None,
            })
            .collect();
        assert_eq!(tiles, vec![TileKey::new(0, 0, 1)]);

        backend.accept_message(BackendMessage::InvalidateReadManagerRect {
            rect: None,
            signal: None,
        });
        assert_eq!(render.drain().len(), 4);
    }

    #[test]
    fn hidden_and_cleared_groups_generate_nothing() {
        let (mut backend, render) = backend();
        populate(&mut backend, Point::new(0.3, 0.3));
        let tile = TileKey::new(0, 0, 1);
        let request = |tile| BackendMessage::UpdateReadManager {
            coverage: [tile].into_iter().collect(),
            tiles: [tile].into_iter().collect(),
        };

        backend.accept_message(BackendMessage::ChangeUserMarkGroupVisibility {
            group_id: 7,
            visible: false,
        });
        backend.accept_message(request(tile));
        backend.accept_message(BackendMessage::ChangeUserMarkGroupVisibility {
            group_id: 7,
            visible: true,
        });
        backend.accept_message(BackendMessage::ClearUserMarkGroup { group_id: 7 });
        backend.accept_message(request(tile));
        assert_eq!(backend.generator().index_len(), 0);

        for message in render.drain() {
            match message {
                FrontendMessage::FlushUserMarks { data, .. } => assert!(data.is_empty()),
                other => panic!("Unexpected message {}", other.name()),
            }
        }
    }

    #[test]
    fn forwards_invalidation_and_gui() {
        let (mut backend, render) = backend();
        backend.accept_message(BackendMessage::InvalidateUserMarks);
        backend.accept_message(BackendMessage::GuiRecache {
            screen: Screen::new(800, 600),
        });

        let messages = render.drain();
        assert_eq!(messages.len(), 2);
        assert!(matches!(messages[0], FrontendMessage::InvalidateUserMarks));
        match &messages[1] {
            FrontendMessage::GuiLayerRecached {
                widgets,
                my_position,
            } => {
                assert_eq!(widgets.shape_count(), 1);
                assert_eq!(my_position.shape_count(), 1);
            }
            other => panic!("Unexpected message {}", other.name()),
        }
        assert_eq!(backend.stats().messages, 2);
        assert_eq!(backend.stats().gui_recaches, 1);
    }
}
