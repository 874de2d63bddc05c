//! Caching of the GUI widgets into overlay shapes.

use super::handle::{Anchor, Handle, Position, ShapeHandle, Widget};
use super::shape::ShapeRenderer;
use crate::geometry::Point;
use crate::render::projection::MAX_DEPTH;
use crate::render::{
    Batcher, Color, DepthLayer, ProgramId, RenderState, TextureManager, TextureRegion, Vertex,
};
use crate::screen::Screen;
use log::{debug, warn};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Layout of the GUI widgets.
#[derive(Clone, Debug, PartialEq, Deserialize)]
pub struct GuiLayout {
    /// Position of the compass.
    #[serde(default = "GuiLayout::default_compass")]
    pub compass: Position,
    /// Symbol of each widget. Widgets without symbol are drawn as plain
    /// squares.
    #[serde(default)]
    pub symbols: BTreeMap<Widget, String>,
    /// Size of the widgets, in pixels.
    #[serde(default = "GuiLayout::default_widget_size")]
    pub widget_size: f32,
}

impl Default for GuiLayout {
    fn default() -> Self {
        Self {
            compass: Self::default_compass(),
            symbols: BTreeMap::new(),
            widget_size: Self::default_widget_size(),
        }
    }
}

impl GuiLayout {
    fn default_compass() -> Position {
        Position {
            anchor: Anchor::BottomRight,
            offset: Point::new(48.0, 48.0),
        }
    }

    fn default_widget_size() -> f32 {
        32.0
    }
}

/// Builds the overlay shapes of the GUI widgets.
pub struct LayerCacher<'a> {
    layout: &'a GuiLayout,
    textures: &'a dyn TextureManager,
}

impl<'a> LayerCacher<'a> {
    /// Color of widgets drawn without symbol.
    const PLAIN_COLOR: Color = Color([0.2, 0.4, 0.9, 0.9]);

    /// Creates a cacher for the given layout.
    pub fn new(layout: &'a GuiLayout, textures: &'a dyn TextureManager) -> Self {
        Self { layout, textures }
    }

    /// Caches the widgets laid out against the window (the compass).
    pub fn recache_widgets(&self, screen: &Screen) -> ShapeRenderer {
        let mut renderer = ShapeRenderer::new();
        let Some((region, vertices)) = self.widget_quad(Widget::Compass) else {
            return renderer;
        };
        let mut handle = ShapeHandle::new(Widget::Compass, Point::default(), self.size())
            .with_position(self.layout.compass)
            .tappable();
        handle.update(screen);
        self.cache(&mut renderer, region, &vertices, Box::new(handle));
        debug!("Cached {} GUI widgets", renderer.shape_count());
        renderer
    }

    /// Caches the current position marker, initially hidden until a
    /// position is known.
    pub fn cache_my_position(&self) -> ShapeRenderer {
        let mut renderer = ShapeRenderer::new();
        let Some((region, vertices)) = self.widget_quad(Widget::MyPosition) else {
            return renderer;
        };
        let mut handle =
            ShapeHandle::new(Widget::MyPosition, Point::default(), self.size()).pulsing(&vertices);
        handle.set_visible(false);
        self.cache(&mut renderer, region, &vertices, Box::new(handle));
        renderer
    }

    fn size(&self) -> Point<f32> {
        Point::new(self.layout.widget_size, self.layout.widget_size)
    }

    /// Batches one widget in its own session, so that its bucket carries its
    /// handle alone.
    fn cache(
        &self,
        renderer: &mut ShapeRenderer,
        region: TextureRegion,
        vertices: &[Vertex],
        handle: Box<dyn Handle>,
    ) {
        let program = if handle.widget() == Widget::MyPosition {
            ProgramId::MyPosition
        } else {
            ProgramId::TexturingGui
        };
        let state = RenderState::new(program, DepthLayer::Gui, Some(region.texture));
        let mut batcher = Batcher::default();
        let mut session = batcher.start_session(|state, bucket| {
            renderer.add_shape(state, bucket);
        });
        session.insert_list_of_quads(state, vertices, Some(handle));
    }

    /// Texture region and quad of a widget, or [`None`] if neither its
    /// symbol nor a plain color is available.
    fn widget_quad(&self, widget: Widget) -> Option<(TextureRegion, [Vertex; 4])> {
        let symbol = self.layout.symbols.get(&widget);
        let region = match symbol.and_then(|name| self.textures.symbol_region(name)) {
            Some(region) => region,
            None => {
                if let Some(name) = symbol {
                    warn!("Missing symbol {name} for {widget:?}, drawing a plain square");
                }
                match self.textures.color_region(Self::PLAIN_COLOR) {
                    Some(region) => region,
                    None => {
                        warn!("Can't cache {widget:?}, no texture region available");
                        return None;
                    }
                }
            }
        };

        let half = self.layout.widget_size / 2.0;
        let [u0, v0, u1, v1] = region.tex_rect;
        let corner = |dx: f32, dy: f32, u: f32, v: f32| Vertex {
            position: [0.0, 0.0, MAX_DEPTH],
            normal: [dx, dy, 0.0],
            tex_coord: [u, v, 0.0, 0.0],
        };
        Some((
            region,
            [
                corner(-half, half, u0, v1),
                corner(-half, -half, u0, v0),
                corner(half, half, u1, v1),
                corner(half, -half, u1, v0),
            ],
        ))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::Rect;
    use crate::render::{
        ApiVersion, GraphicsContext, ProgramManager, RecordingContext, StaticTextureManager,
    };

    fn textures() -> StaticTextureManager {
        let mut symbols = BTreeMap::new();
        symbols.insert("compass".to_string(), [32.0, 32.0]);
        StaticTextureManager::new(&symbols)
    }

    #[test]
    fn compass_is_laid_out_and_tappable() {
        let textures = textures();
        let mut layout = GuiLayout::default();
        layout.symbols.insert(Widget::Compass, "compass".to_string());
        let screen = Screen::new(800, 600);

        let mut widgets = LayerCacher::new(&layout, &textures).recache_widgets(&screen);
        assert_eq!(widgets.shape_count(), 1);
        let touch = Rect::from_ltwh(750.0, 550.0, 4.0, 4.0);
        assert_eq!(widgets.process_tap_event(&touch), Some(Widget::Compass));
    }

    #[test]
    fn my_position_is_hidden_until_moved() {
        let textures = textures();
        let layout = GuiLayout::default();
        let programs = ProgramManager::new(ApiVersion::OpenGLES3);
        let mut context = RecordingContext::new(ApiVersion::OpenGLES3);
        let screen = Screen::new(400, 400);

        let mut marker = LayerCacher::new(&layout, &textures).cache_my_position();
        marker.build(&programs);
        context.begin_frame();
        marker.render(&mut context, &screen, &programs);
        assert!(context.draw_calls().is_empty());

        marker.set_pivot(Point::new(200.0, 100.0));
        marker.set_visible(true);
        context.begin_frame();
        marker.render(&mut context, &screen, &programs);
        assert_eq!(context.draw_calls().len(), 1);
        let call = &context.draw_calls()[0];
        assert_eq!(call.program, ProgramId::MyPosition);
        assert_eq!(call.uniforms.model_view, crate::render::UniformValues::translation(200.0, 100.0));
    }
}
