//! Geometry of user marks and lines within a tile.

use super::{LineId, MarkId, UserLinesRenderCollection, UserMarksRenderCollection};
use crate::geometry::{clip_segment, Point};
use crate::render::{
    BatcherSession, Color, DepthLayer, ProgramId, RenderBucket, RenderState, TextureManager,
    TextureRegion, Vertex,
};
use crate::tile::TileKey;
use log::{trace, warn};

/// Width factor of the lines at each zoom level, from the whole world on.
const LINE_WIDTH_ZOOM_FACTOR: [f32; 20] = [
    0.3, 0.3, 0.3, 0.4, 0.5, 0.6, 0.7, 0.7, 0.7, 0.7, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0,
    1.0,
];

/// Diameter of the circle displayed for marks without symbol, in pixels.
const COLORED_SYMBOL_SIZE: f32 = 12.0;

/// Vertical gap between a symbol and its title, in pixels.
const TITLE_MARGIN: f32 = 2.0;

/// Converts a world point into coordinates relative to the tile center, in
/// units of tile size.
fn to_local(tile_key: &TileKey, p: Point<f64>) -> [f32; 2] {
    let center = tile_key.center();
    let size = tile_key.size();
    [((p.x - center.x) / size) as f32, ((p.y - center.y) / size) as f32]
}

/// Builds the 4 vertices of a quad of the given pixel size around a pivot,
/// offset by `offset` pixels, in triangle strip order.
fn quad(
    position: [f32; 3],
    size: Point<f32>,
    offset: Point<f32>,
    region: &TextureRegion,
    color_uv: [f32; 2],
    animate: f32,
) -> [Vertex; 4] {
    let half = Point::new(size.x / 2.0, size.y / 2.0);
    let [u0, v0, u1, v1] = region.tex_rect;
    let corner = |dx: f32, dy: f32, u: f32, v: f32| Vertex {
        position,
        normal: [offset.x + dx, offset.y + dy, animate],
        tex_coord: [u, v, color_uv[0], color_uv[1]],
    };
    [
        corner(-half.x, half.y, u0, v1),
        corner(-half.x, -half.y, u0, v0),
        corner(half.x, half.y, u1, v1),
        corner(half.x, -half.y, u1, v0),
    ]
}

/// Batches the visible marks among `mark_ids` lying in the given tile, and
/// clears their "just created" flag.
///
/// Unknown identifiers are skipped.
pub fn cache_user_marks<F>(
    tile_key: &TileKey,
    textures: &dyn TextureManager,
    mark_ids: &[MarkId],
    marks: &mut UserMarksRenderCollection,
    session: &mut BatcherSession<'_, F>,
) where
    F: FnMut(RenderState, RenderBucket),
{
    for id in mark_ids {
        let Some(params) = marks.get_mut(id) else {
            trace!("Skipping unknown mark {id}");
            continue;
        };
        if !params.is_visible || TileKey::for_point(params.pivot, tile_key.zoom_level) != *tile_key {
            continue;
        }

        let [x, y] = to_local(tile_key, params.pivot);
        let position = [x, y, params.depth];
        let animate = if params.just_created { 1.0 } else { -1.0 };
        let color = params.color.unwrap_or(Color::WHITE);
        let Some(color_region) = textures.color_region(color) else {
            continue;
        };
        let color_uv = color_region.tex_center();

        let symbol = params.symbol_name(tile_key.zoom_level).and_then(|name| {
            let region = textures.symbol_region(name);
            if region.is_none() {
                warn!("Mark {id} refers to missing symbol {name}");
            }
            region
        });
        let symbol_size = match symbol {
            Some(region) => {
                let state = RenderState::new(ProgramId::UserMark, DepthLayer::UserMark, Some(region.texture));
                let vertices = quad(position, region.pixel_size, Point::default(), &region, color_uv, animate);
                session.insert_list_of_quads(state, &vertices, None);
                region.pixel_size
            }
            None => {
                let size = Point::new(COLORED_SYMBOL_SIZE, COLORED_SYMBOL_SIZE);
                let state = RenderState::new(
                    ProgramId::ColoredSymbol,
                    DepthLayer::UserMark,
                    Some(color_region.texture),
                );
                let vertices = quad(position, size, Point::default(), &color_region, color_uv, animate);
                session.insert_list_of_quads(state, &vertices, None);
                size
            }
        };

        if let Some(title) = &params.title {
            cache_title(title, position, symbol_size, textures, color_uv, session);
        }

        params.just_created = false;
    }
}

/// Batches the glyphs of a title, centered below a symbol of the given size.
fn cache_title<F>(
    title: &str,
    position: [f32; 3],
    symbol_size: Point<f32>,
    textures: &dyn TextureManager,
    color_uv: [f32; 2],
    session: &mut BatcherSession<'_, F>,
) where
    F: FnMut(RenderState, RenderBucket),
{
    let glyphs: Vec<TextureRegion> = title
        .chars()
        .filter_map(|c| textures.glyph_region(c))
        .collect();
    let Some(first) = glyphs.first() else {
        return;
    };
    let texture = first.texture;
    let width: f32 = glyphs.iter().map(|g| g.pixel_size.x).sum();

    let mut vertices = Vec::with_capacity(4 * glyphs.len());
    let mut x = -width / 2.0;
    for glyph in &glyphs {
        let offset = Point::new(
            x + glyph.pixel_size.x / 2.0,
            symbol_size.y / 2.0 + TITLE_MARGIN + glyph.pixel_size.y / 2.0,
        );
        vertices.extend(quad(position, glyph.pixel_size, offset, glyph, color_uv, -1.0));
        x += glyph.pixel_size.x;
    }

    let state = RenderState::new(ProgramId::Text, DepthLayer::UserMark, Some(texture));
    session.insert_list_of_quads(state, &vertices, None);
}

/// Batches the parts of the lines among `line_ids` lying in the given tile.
///
/// Unknown identifiers are skipped.
pub fn cache_user_lines<F>(
    tile_key: &TileKey,
    textures: &dyn TextureManager,
    line_ids: &[LineId],
    lines: &UserLinesRenderCollection,
    session: &mut BatcherSession<'_, F>,
) where
    F: FnMut(RenderState, RenderBucket),
{
    let tile_rect = tile_key.rect();
    let factor_index = (tile_key.zoom_level as usize).min(LINE_WIDTH_ZOOM_FACTOR.len() - 1);
    let width_factor = LINE_WIDTH_ZOOM_FACTOR[factor_index];

    for id in line_ids {
        let Some(params) = lines.get(id) else {
            trace!("Skipping unknown line {id}");
            continue;
        };

        let segments: Vec<(Point<f64>, Point<f64>)> = params
            .points
            .windows(2)
            .filter_map(|w| clip_segment(&tile_rect, w[0], w[1]))
            .collect();
        if segments.is_empty() {
            continue;
        }

        for layer in &params.layers {
            let Some(color_region) = textures.color_region(layer.color) else {
                continue;
            };
            let color_uv = color_region.tex_center();
            let half_width = layer.width * width_factor / 2.0;

            let mut vertices = Vec::with_capacity(4 * segments.len());
            for &(a, b) in &segments {
                let [ax, ay] = to_local(tile_key, a);
                let [bx, by] = to_local(tile_key, b);
                let (dx, dy) = (bx - ax, by - ay);
                let length = (dx * dx + dy * dy).sqrt();
                // Degenerate segments still get a square cap.
                let (nx, ny) = if length > 0.0 {
                    (-dy / length * half_width, dx / length * half_width)
                } else {
                    (0.0, half_width)
                };
                let vertex = |x: f32, y: f32, nx: f32, ny: f32| Vertex {
                    position: [x, y, layer.depth],
                    normal: [nx, ny, 0.0],
                    tex_coord: [color_uv[0], color_uv[1], color_uv[0], color_uv[1]],
                };
                vertices.extend([
                    vertex(ax, ay, nx, ny),
                    vertex(ax, ay, -nx, -ny),
                    vertex(bx, by, nx, ny),
                    vertex(bx, by, -nx, -ny),
                ]);
            }

            let state = RenderState::new(ProgramId::UserLine, DepthLayer::UserLine, Some(color_region.texture));
            session.insert_list_of_quads(state, &vertices, None);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::render::{Batcher, StaticTextureManager};
    use crate::user_marks::{UserLineLayer, UserLineRenderParams, UserMarkRenderParams};
    use std::collections::BTreeMap;

    fn textures() -> StaticTextureManager {
        let mut symbols = BTreeMap::new();
        symbols.insert("pin".to_string(), [24.0, 32.0]);
        StaticTextureManager::new(&symbols)
    }

    macro_rules! collect {
        (|$session:ident| $body:expr) => {{
            let mut buckets = Vec::new();
            let mut batcher = Batcher::default();
            {
                let mut $session =
                    batcher.start_session(|state, bucket| buckets.push((state, bucket)));
                $body;
            }
            buckets
        }};
    }

    #[test]
    fn marks_outside_tile_are_skipped() {
        let textures = textures();
        let tile = TileKey::new(0, 0, 1);
        let mut marks = UserMarksRenderCollection::new();
        marks.insert(1, UserMarkRenderParams::new(Point::new(0.25, 0.25)));
        marks.insert(2, UserMarkRenderParams::new(Point::new(0.75, 0.25)));
        let mut hidden = UserMarkRenderParams::new(Point::new(0.3, 0.3));
        hidden.is_visible = false;
        marks.insert(3, hidden);

        let buckets = collect!(|session| cache_user_marks(&tile, &textures, &[1, 2, 3, 4], &mut marks, &mut session));
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].0.program, ProgramId::ColoredSymbol);
        assert_eq!(buckets[0].1.buffer().vertex_count(), 4);
        // Centered in the tile.
        assert_eq!(buckets[0].1.buffer().vertices()[0].position, [0.0, 0.0, 0.0]);
    }

    #[test]
    fn symbol_title_and_animation() {
        let textures = textures();
        let tile = TileKey::new(0, 0, 0);
        let mut params = UserMarkRenderParams::new(Point::new(0.5, 0.5));
        params.symbol_names.insert(0, "pin".to_string());
        params.title = Some("Hi".to_string());
        params.just_created = true;
        let mut marks = UserMarksRenderCollection::new();
        marks.insert(7, params);

        let buckets = collect!(|session| cache_user_marks(&tile, &textures, &[7], &mut marks, &mut session));
        let programs: Vec<ProgramId> = buckets.iter().map(|(s, _)| s.program).collect();
        assert_eq!(programs, vec![ProgramId::UserMark, ProgramId::Text]);

        let symbol = buckets[0].1.buffer().vertices();
        assert_eq!(symbol[0].normal, [-12.0, 16.0, 1.0]);
        // Two glyphs.
        assert_eq!(buckets[1].1.buffer().vertex_count(), 8);
        assert!(!marks[&7].just_created);

        // The animation runs only once.
        let buckets = collect!(|session| cache_user_marks(&tile, &textures, &[7], &mut marks, &mut session));
        assert_eq!(buckets[0].1.buffer().vertices()[0].normal[2], -1.0);
    }

    #[test]
    fn lines_are_clipped_to_tile() {
        let textures = textures();
        let tile = TileKey::new(0, 0, 1);
        let mut lines = UserLinesRenderCollection::new();
        lines.insert(
            1,
            UserLineRenderParams {
                min_zoom: 0,
                layers: vec![UserLineLayer {
                    color: Color([1.0, 0.0, 0.0, 1.0]),
                    width: 10.0,
                    depth: 0.0,
                }],
                points: vec![Point::new(0.25, 0.25), Point::new(0.75, 0.25), Point::new(0.75, 0.75)],
            },
        );

        let buckets = collect!(|session| cache_user_lines(&tile, &textures, &[1], &lines, &mut session));
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].0.program, ProgramId::UserLine);
        let vertices = buckets[0].1.buffer().vertices();
        // Only the first segment, up to the tile border.
        assert_eq!(vertices.len(), 4);
        assert_eq!(vertices[0].position, [0.0, 0.0, 0.0]);
        assert_eq!(vertices[2].position, [0.5, 0.0, 0.0]);
        // Width 10 scaled by the factor of zoom level 1.
        assert!((vertices[0].normal[1] - 1.5).abs() < 1e-6);

        let far = TileKey::new(0, 1, 1);
        assert!(collect!(|session| cache_user_lines(&far, &textures, &[1], &lines, &mut session)).is_empty());
    }

    #[test]
    fn long_tracks_span_several_buckets() {
        let textures = textures();
        let tile = TileKey::new(0, 0, 0);
        let points: Vec<Point<f64>> = (0..17_000)
            .map(|i| {
                let t = i as f64 / 17_000.0;
                Point::new(0.1 + 0.8 * t, 0.5 + 0.3 * (t * 50.0).sin())
            })
            .collect();
        let mut lines = UserLinesRenderCollection::new();
        lines.insert(
            1,
            UserLineRenderParams {
                min_zoom: 0,
                layers: vec![UserLineLayer {
                    color: Color::WHITE,
                    width: 2.0,
                    depth: 0.0,
                }],
                points,
            },
        );

        let buckets = collect!(|session| cache_user_lines(&tile, &textures, &[1], &lines, &mut session));
        assert!(buckets.len() >= 2);
        let total: usize = buckets.iter().map(|(_, b)| b.buffer().vertex_count()).sum();
        assert_eq!(total, 4 * 16_999);
        for (_, bucket) in &buckets {
            assert!(bucket.buffer().vertex_count() <= Batcher::DEFAULT_MAX_VERTICES);
        }
    }
}
