//! Persistent overlay geometry, drawn on top of the map on each frame.

use super::handle::{Handle, Widget};
use crate::geometry::{Point, Rect};
use crate::render::{
    make_projection, GraphicsContext, ProgramManager, RenderBucket, RenderState, UniformValues,
    VertexArrayBuffer,
};
use crate::screen::Screen;
use log::{debug, error, trace};

/// A buffer and its handle, created and destroyed together.
pub struct ShapeInfo {
    state: RenderState,
    buffer: VertexArrayBuffer,
    handle: Box<dyn Handle>,
}

impl ShapeInfo {
    /// Pipeline state of the shape.
    pub fn state(&self) -> &RenderState {
        &self.state
    }

    /// Handle of the shape.
    pub fn handle(&self) -> &dyn Handle {
        self.handle.as_ref()
    }
}

/// A group of shapes, e.g. all the parts of one widget.
#[derive(Default)]
pub struct ShapeControl {
    shapes: Vec<ShapeInfo>,
}

impl ShapeControl {
    /// Creates an empty control.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a shape made of the given buffer and handle.
    pub fn add_shape(&mut self, state: RenderState, buffer: VertexArrayBuffer, handle: Box<dyn Handle>) {
        self.shapes.push(ShapeInfo {
            state,
            buffer,
            handle,
        });
    }

    /// Shapes of this control.
    pub fn shapes(&self) -> &[ShapeInfo] {
        &self.shapes
    }

    fn for_each_shape(&mut self, f: &mut impl FnMut(&mut ShapeInfo)) {
        self.shapes.iter_mut().for_each(f);
    }
}

/// Owner of the persistent overlay shapes.
#[derive(Default)]
pub struct ShapeRenderer {
    controls: Vec<ShapeControl>,
}

impl ShapeRenderer {
    /// Creates a renderer without shapes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds the geometry of a bucket, which must carry exactly one overlay
    /// handle. Returns `false` and drops the bucket otherwise.
    pub fn add_shape(&mut self, state: RenderState, bucket: RenderBucket) -> bool {
        let count = bucket.overlay_handles_count();
        if count != 1 {
            error!("Refusing GUI bucket with {count} overlay handles, exactly 1 is required");
            return false;
        }
        let (buffer, handles) = bucket.into_parts();
        let Some(handle) = handles.into_iter().next() else {
            return false;
        };
        let mut control = ShapeControl::new();
        control.add_shape(state, buffer, handle);
        self.controls.push(control);
        true
    }

    /// Adds a whole control.
    pub fn add_shape_control(&mut self, control: ShapeControl) {
        self.controls.push(control);
    }

    /// Number of shapes across all the controls.
    pub fn shape_count(&self) -> usize {
        self.controls.iter().map(|c| c.shapes.len()).sum()
    }

    /// Checks whether there is no shape.
    pub fn is_empty(&self) -> bool {
        self.shape_count() == 0
    }

    /// Binds all the buffers to their programs. Must be called after the
    /// graphics context is (re)created and before rendering.
    pub fn build(&mut self, programs: &ProgramManager) {
        let mut missing = 0;
        self.for_each_shape(&mut |shape| match programs.program(shape.state.program) {
            Some(program) => shape.buffer.build(program),
            None => missing += 1,
        });
        if missing != 0 {
            error!("Couldn't build {missing} GUI shapes, their programs are missing");
        }
    }

    /// Draws all the valid and visible shapes.
    pub fn render(&mut self, context: &mut dyn GraphicsContext, screen: &Screen, programs: &ProgramManager) {
        let projection = make_projection(
            context.api(),
            0.0,
            screen.width() as f32,
            screen.height() as f32,
            0.0,
        );
        self.for_each_shape(&mut |shape| {
            shape.handle.update(screen);
            if !shape.handle.is_valid() || !shape.handle.is_visible() {
                return;
            }
            let Some(program) = programs.program(shape.state.program) else {
                trace!("Skipping {:?}, its program is missing", shape.handle.widget());
                return;
            };

            context.apply_state(&shape.state);
            let uniforms = UniformValues {
                projection,
                ..shape.handle.uniforms()
            };
            context.apply_uniforms(program, &uniforms);
            if let Some(mutation) = shape.handle.attribute_mutation() {
                shape.buffer.apply_mutation(&mutation);
            }
            shape.buffer.render(context, program);
        });
    }

    /// Returns the widget hit by the given touch rectangle, if any, and
    /// notifies its handle.
    ///
    /// Widgets mustn't overlap: if several of them are hit, the tap is
    /// refused.
    pub fn process_tap_event(&mut self, touch: &Rect) -> Option<Widget> {
        let mut tapped: Vec<&mut ShapeInfo> = self
            .controls
            .iter_mut()
            .flat_map(|c| c.shapes.iter_mut())
            .filter(|shape| shape.handle.is_tapped(touch))
            .collect();
        match tapped.len() {
            0 => None,
            1 => {
                let handle = &mut tapped[0].handle;
                handle.on_tap();
                debug!("Tapped {:?}", handle.widget());
                Some(handle.widget())
            }
            n => {
                error!("{n} overlapping GUI widgets hit by tap at {touch:?}");
                None
            }
        }
    }

    /// Moves the anchor of all the handles, in pixels.
    pub fn set_pivot(&mut self, pivot: Point<f32>) {
        self.for_each_shape(&mut |shape| shape.handle.set_pivot(pivot));
    }

    /// Shows or hides all the shapes.
    pub fn set_visible(&mut self, visible: bool) {
        self.for_each_shape(&mut |shape| shape.handle.set_visible(visible));
    }

    /// Drops the GPU bindings of all the buffers and invalidates their
    /// handles, after the graphics context was lost.
    pub fn invalidate(&mut self) {
        self.for_each_shape(&mut |shape| {
            shape.buffer.reset_binding();
            shape.handle.invalidate();
        });
    }

    fn for_each_shape(&mut self, f: &mut impl FnMut(&mut ShapeInfo)) {
        for control in &mut self.controls {
            control.for_each_shape(f);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::gui::ShapeHandle;
    use crate::render::{ApiVersion, DepthLayer, ProgramId, RecordingContext, Vertex};

    fn bucket(widget: Widget, pivot: Point<f32>, handles: usize) -> RenderBucket {
        let mut buffer = VertexArrayBuffer::new();
        buffer.append(&[Vertex::default(); 4], &[0, 1, 2, 2, 1, 3]);
        let mut bucket = RenderBucket::new(buffer);
        for _ in 0..handles {
            let handle = ShapeHandle::new(widget, pivot, Point::new(20.0, 20.0)).tappable();
            bucket.add_overlay_handle(Box::new(handle));
        }
        bucket
    }

    fn gui_state() -> RenderState {
        RenderState::new(ProgramId::TexturingGui, DepthLayer::Gui, None)
    }

    #[test]
    fn add_shape_requires_one_handle() {
        let mut renderer = ShapeRenderer::new();
        assert!(!renderer.add_shape(gui_state(), bucket(Widget::Compass, Point::default(), 0)));
        assert!(!renderer.add_shape(gui_state(), bucket(Widget::Compass, Point::default(), 2)));
        assert!(renderer.is_empty());
        assert!(renderer.add_shape(gui_state(), bucket(Widget::Compass, Point::default(), 1)));
        assert_eq!(renderer.shape_count(), 1);
    }

    #[test]
    fn render_draws_built_visible_shapes() {
        let programs = ProgramManager::new(ApiVersion::Metal);
        let mut context = RecordingContext::new(ApiVersion::Metal);
        let screen = Screen::new(800, 600);

        let mut renderer = ShapeRenderer::new();
        renderer.add_shape(gui_state(), bucket(Widget::Compass, Point::new(50.0, 50.0), 1));
        renderer.add_shape(gui_state(), bucket(Widget::MyPosition, Point::new(400.0, 300.0), 1));

        // Not built yet.
        context.begin_frame();
        renderer.render(&mut context, &screen, &programs);
        assert!(context.draw_calls().is_empty());

        renderer.build(&programs);
        context.begin_frame();
        renderer.render(&mut context, &screen, &programs);
        assert_eq!(context.draw_calls().len(), 2);
        let call = &context.draw_calls()[0];
        assert_eq!(call.state, Some(gui_state()));
        assert_eq!(call.uniforms.projection, make_projection(ApiVersion::Metal, 0.0, 800.0, 600.0, 0.0));
        assert_eq!(call.uniforms.model_view, UniformValues::translation(50.0, 50.0));

        renderer.set_visible(false);
        context.begin_frame();
        renderer.render(&mut context, &screen, &programs);
        assert!(context.draw_calls().is_empty());
    }

    #[test]
    fn invalid_shapes_are_skipped() {
        let programs = ProgramManager::new(ApiVersion::OpenGLES3);
        let mut context = RecordingContext::new(ApiVersion::OpenGLES3);
        let screen = Screen::new(320, 240);

        let mut renderer = ShapeRenderer::new();
        renderer.add_shape(gui_state(), bucket(Widget::Compass, Point::new(10.0, 10.0), 1));
        renderer.build(&programs);
        renderer.invalidate();

        context.begin_frame();
        renderer.render(&mut context, &screen, &programs);
        assert!(context.draw_calls().is_empty());
    }

    #[test]
    fn tap_hits_single_widget() {
        let mut renderer = ShapeRenderer::new();
        renderer.add_shape(gui_state(), bucket(Widget::Compass, Point::new(50.0, 50.0), 1));
        renderer.add_shape(gui_state(), bucket(Widget::MyPosition, Point::new(200.0, 200.0), 1));

        let touch = Rect::from_ltwh(45.0, 45.0, 10.0, 10.0);
        assert_eq!(renderer.process_tap_event(&touch), Some(Widget::Compass));
        assert_eq!(renderer.process_tap_event(&Rect::from_ltwh(500.0, 500.0, 1.0, 1.0)), None);

        // Both widgets are hit once moved onto the same pivot.
        renderer.set_pivot(Point::new(50.0, 50.0));
        assert_eq!(renderer.process_tap_event(&touch), None);
    }
}
