//! Tile index of the user marks and lines, and per-tile generation of their
//! geometry.

use super::builder::{cache_user_lines, cache_user_marks};
use super::{
    IdCollections, LineId, MarkGroupId, MarkId, UserLineRenderParams, UserLinesRenderCollection,
    UserMarksRenderCollection,
};
use crate::geometry::{clip_segment, Point, Rect};
use crate::render::{Batcher, RenderBucket, RenderState, TextureManager};
use crate::tile::{TileBox, TileKey};
use log::{debug, trace, warn};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Geometry of user marks generated for a tile.
#[derive(Debug)]
pub struct UserMarkRenderData {
    /// Tile the geometry was requested for.
    pub tile_key: TileKey,
    /// Pipeline state of the bucket.
    pub state: RenderState,
    /// Batched geometry.
    pub bucket: RenderBucket,
}

/// Owner of the user marks and lines, indexing them by the tiles they
/// intersect at each zoom level.
///
/// The groups and render parameters are the source of truth; the tile index
/// is derived from them and rebuilt per group.
pub struct UserMarkGenerator {
    /// Highest zoom level of the index. Tiles beyond it are served from their
    /// ancestor at this level.
    max_zoom: u32,
    groups: BTreeMap<MarkGroupId, IdCollections>,
    index: BTreeMap<TileKey, BTreeMap<MarkGroupId, IdCollections>>,
    marks: UserMarksRenderCollection,
    lines: UserLinesRenderCollection,
    visible_groups: BTreeSet<MarkGroupId>,
}

impl UserMarkGenerator {
    /// Default highest zoom level of the index.
    pub const DEFAULT_MAX_ZOOM: u32 = 17;
    /// Highest zoom level the index can be built for.
    pub const MAX_INDEX_ZOOM: u32 = 20;

    /// Creates an empty generator indexing up to the given zoom level, at most
    /// [`Self::MAX_INDEX_ZOOM`].
    pub fn new(max_zoom: u32) -> Self {
        if max_zoom > Self::MAX_INDEX_ZOOM {
            warn!(
                "User marks index limited to zoom level {} instead of {max_zoom}",
                Self::MAX_INDEX_ZOOM
            );
        }
        let max_zoom = max_zoom.min(Self::MAX_INDEX_ZOOM);
        Self {
            max_zoom,
            groups: BTreeMap::new(),
            index: BTreeMap::new(),
            marks: UserMarksRenderCollection::new(),
            lines: UserLinesRenderCollection::new(),
            visible_groups: BTreeSet::new(),
        }
    }

    /// Highest zoom level of the index.
    pub fn max_zoom(&self) -> u32 {
        self.max_zoom
    }

    /// Replaces the content of a group and reindexes it.
    pub fn set_group(&mut self, group_id: MarkGroupId, ids: IdCollections) {
        self.groups.insert(group_id, ids);
        self.update_index(group_id);
    }

    /// Removes a group and its index entries.
    pub fn remove_group(&mut self, group_id: MarkGroupId) {
        self.groups.remove(&group_id);
        self.visible_groups.remove(&group_id);
        self.update_index(group_id);
    }

    /// Inserts or replaces marks, and reindexes the groups containing them.
    pub fn set_user_marks(&mut self, marks: UserMarksRenderCollection) {
        let ids: HashSet<MarkId> = marks.keys().copied().collect();
        self.marks.extend(marks);
        let groups = self.groups_containing(|ids_in_group| {
            ids_in_group.mark_ids.iter().any(|id| ids.contains(id))
        });
        for group_id in groups {
            self.update_index(group_id);
        }
    }

    /// Inserts or replaces lines, and reindexes the groups containing them.
    pub fn set_user_lines(&mut self, lines: UserLinesRenderCollection) {
        let ids: HashSet<LineId> = lines.keys().copied().collect();
        self.lines.extend(lines);
        let groups = self.groups_containing(|ids_in_group| {
            ids_in_group.line_ids.iter().any(|id| ids.contains(id))
        });
        for group_id in groups {
            self.update_index(group_id);
        }
    }

    /// Forgets the render parameters of the given marks and lines. Index
    /// entries still referring to them are skipped during generation until
    /// their groups are updated.
    pub fn remove_user_marks(&mut self, ids: &IdCollections) {
        for id in &ids.mark_ids {
            self.marks.remove(id);
        }
        for id in &ids.line_ids {
            self.lines.remove(id);
        }
    }

    /// Flags the given marks as just created, so that they are animated on
    /// their next generation.
    pub fn set_just_created_user_marks(&mut self, ids: &[MarkId]) {
        for id in ids {
            if let Some(params) = self.marks.get_mut(id) {
                params.just_created = true;
            }
        }
    }

    /// Shows or hides the geometry of a group.
    pub fn set_group_visibility(&mut self, group_id: MarkGroupId, visible: bool) {
        if visible {
            self.visible_groups.insert(group_id);
        } else {
            self.visible_groups.remove(&group_id);
        }
    }

    /// Checks whether a group is visible.
    pub fn is_group_visible(&self, group_id: MarkGroupId) -> bool {
        self.visible_groups.contains(&group_id)
    }

    /// Index entry of the given tile, if any.
    pub fn index_entry(&self, tile_key: &TileKey) -> Option<&BTreeMap<MarkGroupId, IdCollections>> {
        self.index.get(tile_key)
    }

    /// Number of tiles in the index.
    pub fn index_len(&self) -> usize {
        self.index.len()
    }

    fn groups_containing(&self, predicate: impl Fn(&IdCollections) -> bool) -> Vec<MarkGroupId> {
        self.groups
            .iter()
            .filter(|(_, ids)| predicate(ids))
            .map(|(&group_id, _)| group_id)
            .collect()
    }

    /// Rebuilds the index entries of a group from scratch.
    pub fn update_index(&mut self, group_id: MarkGroupId) {
        for groups in self.index.values_mut() {
            if let Some(ids) = groups.get_mut(&group_id) {
                ids.clear();
            }
        }

        if let Some(ids) = self.groups.get(&group_id) {
            for &mark_id in &ids.mark_ids {
                let Some(params) = self.marks.get(&mark_id) else {
                    trace!("Group {group_id} refers to unknown mark {mark_id}");
                    continue;
                };
                for zoom in params.min_zoom..=self.max_zoom {
                    let key = TileKey::for_point(params.pivot, zoom);
                    Self::entry(&mut self.index, key, group_id).mark_ids.push(mark_id);
                }
            }

            for &line_id in &ids.line_ids {
                let Some(params) = self.lines.get(&line_id) else {
                    trace!("Group {group_id} refers to unknown line {line_id}");
                    continue;
                };
                for zoom in params.min_zoom..=self.max_zoom {
                    for key in line_coverage(params, zoom) {
                        Self::entry(&mut self.index, key, group_id).line_ids.push(line_id);
                    }
                }
            }
        }

        self.clean_index();
    }

    fn entry(
        index: &mut BTreeMap<TileKey, BTreeMap<MarkGroupId, IdCollections>>,
        key: TileKey,
        group_id: MarkGroupId,
    ) -> &mut IdCollections {
        index.entry(key).or_default().entry(group_id).or_default()
    }

    /// Removes the empty group entries, and the tiles left without group.
    pub fn clean_index(&mut self) {
        self.index.retain(|_, groups| {
            groups.retain(|_, ids| !ids.is_empty());
            !groups.is_empty()
        });
    }

    /// Generates the geometry of the visible groups in the given tile, and
    /// hands it to `flush` tagged with `tile_key`.
    ///
    /// Tiles beyond the highest zoom level of the index are looked up at
    /// their ancestor at that level. A tile without index entry generates
    /// nothing.
    pub fn generate_user_marks_geometry(
        &mut self,
        tile_key: TileKey,
        textures: &dyn TextureManager,
        batcher: &mut Batcher,
        mut flush: impl FnMut(UserMarkRenderData),
    ) {
        let Some(index_key) = tile_key.ancestor_at(tile_key.zoom_level.min(self.max_zoom)) else {
            return;
        };
        let Self {
            index,
            marks,
            lines,
            visible_groups,
            ..
        } = self;
        let Some(groups) = index.get(&index_key) else {
            trace!("No user marks in {tile_key:?}");
            return;
        };

        let mut count = 0;
        {
            let mut session = batcher.start_session(|state, bucket| {
                count += 1;
                flush(UserMarkRenderData {
                    tile_key,
                    state,
                    bucket,
                });
            });
            for (group_id, ids) in groups {
                if !visible_groups.contains(group_id) {
                    continue;
                }
                cache_user_marks(&tile_key, textures, &ids.mark_ids, marks, &mut session);
                cache_user_lines(&tile_key, textures, &ids.line_ids, lines, &mut session);
            }
        }
        debug!("Generated {count} user mark buckets for {tile_key:?}");
    }
}

impl Default for UserMarkGenerator {
    fn default() -> Self {
        Self::new(Self::DEFAULT_MAX_ZOOM)
    }
}

/// Tiles at the given zoom level covered by a line, one piece of its path at
/// a time. Pieces are at most one tile long, so that a long diagonal doesn't
/// cover the whole bounding box of the line. Segments are clipped to the
/// world first.
fn line_coverage(params: &UserLineRenderParams, zoom: u32) -> BTreeSet<TileKey> {
    let mut result = BTreeSet::new();
    let world = Rect::from_ltwh(0.0, 0.0, 1.0, 1.0);
    let tile_size = 0.5_f64.powi(zoom as i32);
    let lerp = |a: Point<f64>, b: Point<f64>, t: f64| {
        Point::new(a.x + (b.x - a.x) * t, a.y + (b.y - a.y) * t)
    };
    let mut cover = |a: Point<f64>, b: Point<f64>| {
        if let Some(rect) = Rect::bounding(&[a, b]) {
            result.extend(TileBox::covering(&rect, zoom).tile_keys());
        }
    };

    match params.points.as_slice() {
        [] => {}
        [p] => cover(*p, *p),
        points => {
            for w in points.windows(2) {
                let Some((a, b)) = clip_segment(&world, w[0], w[1]) else {
                    continue;
                };
                let length = ((b.x - a.x).powi(2) + (b.y - a.y).powi(2)).sqrt();
                let pieces = (length / tile_size).ceil().max(1.0) as u32;
                for i in 0..pieces {
                    let t0 = i as f64 / pieces as f64;
                    let t1 = (i + 1) as f64 / pieces as f64;
                    cover(lerp(a, b, t0), lerp(a, b, t1));
                }
            }
        }
    }
    result
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::render::{Color, StaticTextureManager};
    use crate::user_marks::{UserLineLayer, UserMarkRenderParams};
    use rand::Rng;

    const MAX_ZOOM: u32 = 6;

    fn mark(x: f64, y: f64, min_zoom: u32) -> UserMarkRenderParams {
        UserMarkRenderParams {
            min_zoom,
            ..UserMarkRenderParams::new(Point::new(x, y))
        }
    }

    fn line(points: Vec<Point<f64>>, min_zoom: u32) -> UserLineRenderParams {
        UserLineRenderParams {
            min_zoom,
            layers: vec![UserLineLayer {
                color: Color([0.0, 0.5, 1.0, 1.0]),
                width: 4.0,
                depth: 0.0,
            }],
            points,
        }
    }

    fn ids(mark_ids: &[MarkId], line_ids: &[LineId]) -> IdCollections {
        IdCollections {
            mark_ids: mark_ids.to_vec(),
            line_ids: line_ids.to_vec(),
        }
    }

    /// Index recomputed from scratch from all the groups, as sorted sets.
    fn expected_index(
        generator: &UserMarkGenerator,
    ) -> BTreeMap<TileKey, BTreeMap<MarkGroupId, (BTreeSet<MarkId>, BTreeSet<LineId>)>> {
        let mut result: BTreeMap<TileKey, BTreeMap<MarkGroupId, (BTreeSet<MarkId>, BTreeSet<LineId>)>> =
            BTreeMap::new();
        for (&group_id, ids) in &generator.groups {
            for id in &ids.mark_ids {
                let Some(params) = generator.marks.get(id) else { continue };
                for zoom in params.min_zoom..=generator.max_zoom {
                    let key = TileKey::for_point(params.pivot, zoom);
                    result.entry(key).or_default().entry(group_id).or_default().0.insert(*id);
                }
            }
            for id in &ids.line_ids {
                let Some(params) = generator.lines.get(id) else { continue };
                for zoom in params.min_zoom..=generator.max_zoom {
                    for key in line_coverage(params, zoom) {
                        result.entry(key).or_default().entry(group_id).or_default().1.insert(*id);
                    }
                }
            }
        }
        result
    }

    fn actual_index(
        generator: &UserMarkGenerator,
    ) -> BTreeMap<TileKey, BTreeMap<MarkGroupId, (BTreeSet<MarkId>, BTreeSet<LineId>)>> {
        generator
            .index
            .iter()
            .map(|(key, groups)| {
                let groups = groups
                    .iter()
                    .map(|(&group_id, ids)| {
                        (
                            group_id,
                            (
                                ids.mark_ids.iter().copied().collect(),
                                ids.line_ids.iter().copied().collect(),
                            ),
                        )
                    })
                    .collect();
                (*key, groups)
            })
            .collect()
    }

    #[test]
    fn marks_indexed_from_min_zoom() {
        let mut generator = UserMarkGenerator::new(MAX_ZOOM);
        generator.set_user_marks([(1, mark(0.3, 0.7, 2))].into_iter().collect());
        generator.set_group(10, ids(&[1], &[]));

        assert_eq!(generator.index_len(), (MAX_ZOOM - 1) as usize);
        assert!(generator.index_entry(&TileKey::new(0, 0, 1)).is_none());
        let entry = generator.index_entry(&TileKey::new(1, 2, 2)).unwrap();
        assert_eq!(entry[&10].mark_ids, vec![1]);
    }

    #[test]
    fn index_is_derivable() {
        let mut rng = rand::rng();
        let mut generator = UserMarkGenerator::new(MAX_ZOOM);
        let mut next_id = 0;
        for round in 0..20 {
            let group_id = rng.random_range(0..4);
            let mut marks = UserMarksRenderCollection::new();
            let mut lines = UserLinesRenderCollection::new();
            let mut group = ids(&[], &[]);
            for _ in 0..rng.random_range(0..6) {
                next_id += 1;
                marks.insert(next_id, mark(rng.random(), rng.random(), rng.random_range(0..=MAX_ZOOM)));
                group.mark_ids.push(next_id);
            }
            for _ in 0..rng.random_range(0..3) {
                next_id += 1;
                let points = (0..rng.random_range(1..4))
                    .map(|_| Point::new(rng.random(), rng.random()))
                    .collect();
                lines.insert(next_id, line(points, rng.random_range(0..=MAX_ZOOM)));
                group.line_ids.push(next_id);
            }

            generator.set_user_marks(marks);
            generator.set_user_lines(lines);
            if round % 5 == 4 {
                generator.remove_group(group_id);
            } else {
                generator.set_group(group_id, group);
            }
            assert_eq!(actual_index(&generator), expected_index(&generator));
        }

        // Moving a mark reindexes its group.
        let first = generator.marks.keys().next().copied();
        if let Some(id) = first {
            generator.set_user_marks([(id, mark(0.01, 0.99, 0))].into_iter().collect());
            assert_eq!(actual_index(&generator), expected_index(&generator));
        }
    }

    #[test]
    fn remove_group_prunes_index() {
        let mut generator = UserMarkGenerator::new(MAX_ZOOM);
        generator.set_user_marks([(1, mark(0.1, 0.1, 0)), (2, mark(0.9, 0.9, 3))].into_iter().collect());
        generator.set_user_lines(
            [(3, line(vec![Point::new(0.1, 0.5), Point::new(0.9, 0.5)], 1))]
                .into_iter()
                .collect(),
        );
        generator.set_group(1, ids(&[1, 2], &[3]));
        generator.set_group(2, ids(&[1], &[]));
        assert!(generator.index_len() > 0);

        generator.remove_group(1);
        assert!(generator
            .index
            .values()
            .all(|groups| !groups.contains_key(&1) && groups.values().all(|ids| !ids.is_empty())));

        generator.remove_group(2);
        assert_eq!(generator.index_len(), 0);
    }

    #[test]
    fn index_zoom_is_bounded() {
        let mut generator = UserMarkGenerator::new(40);
        assert_eq!(generator.max_zoom(), UserMarkGenerator::MAX_INDEX_ZOOM);
        generator.set_user_marks([(1, mark(0.3, 0.3, 15))].into_iter().collect());
        generator.set_group(1, ids(&[1], &[]));
        let deepest = TileKey::for_point(Point::new(0.3, 0.3), UserMarkGenerator::MAX_INDEX_ZOOM);
        assert!(generator.index_entry(&deepest).is_some());
        assert_eq!(generator.index_len(), 6);
    }

    #[test]
    fn diagonal_line_covers_few_tiles() {
        let params = line(vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)], 0);
        let tiles = line_coverage(&params, 5);
        // The diagonal of a 32x32 grid, and its neighbors where pieces
        // straddle a tile border.
        assert!(tiles.len() >= 32);
        assert!(tiles.len() < 32 * 4);
        assert!(tiles.iter().all(|t| t.x.abs_diff(t.y) <= 1));
    }

    #[test]
    fn line_coverage_stays_in_world() {
        // Far off the world, e.g. a latitude close to a pole.
        let params = line(vec![Point::new(0.55, -1e9), Point::new(0.55, 0.5)], 0);
        let tiles = line_coverage(&params, 10);
        assert!(tiles.contains(&TileKey::new(563, 0, 10)));
        assert!(tiles.contains(&TileKey::new(563, 511, 10)));
        assert!(tiles.len() <= 513);
        assert!(tiles.iter().all(|t| t.x == 563));

        let outside = line(vec![Point::new(-5.0, -5.0), Point::new(-3.0, -3.0)], 0);
        assert!(line_coverage(&outside, 4).is_empty());
    }

    #[test]
    fn generation_round_trip() {
        let mut symbols = BTreeMap::new();
        symbols.insert("pin".to_string(), [16.0, 16.0]);
        let textures = StaticTextureManager::new(&symbols);
        let mut batcher = Batcher::default();

        let mut generator = UserMarkGenerator::new(MAX_ZOOM);
        let mut params = mark(0.3, 0.3, 0);
        params.symbol_names.insert(0, "pin".to_string());
        generator.set_user_marks([(1, params)].into_iter().collect());
        generator.set_group(5, ids(&[1], &[]));

        let generate = |generator: &mut UserMarkGenerator, batcher: &mut Batcher, key: TileKey| {
            let mut result = Vec::new();
            generator.generate_user_marks_geometry(key, &textures, batcher, |data| result.push(data));
            result
        };

        // Hidden group.
        let key = TileKey::for_point(Point::new(0.3, 0.3), 3);
        assert!(!generator.is_group_visible(5));
        assert!(generate(&mut generator, &mut batcher, key).is_empty());

        generator.set_group_visibility(5, true);
        assert!(generator.is_group_visible(5));
        let data = generate(&mut generator, &mut batcher, key);
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].tile_key, key);
        assert_eq!(data[0].bucket.buffer().vertex_count(), 4);

        // Tile without content.
        let empty = TileKey::for_point(Point::new(0.9, 0.9), 3);
        assert!(generate(&mut generator, &mut batcher, empty).is_empty());

        // Beyond the highest indexed zoom level.
        let deep = TileKey::for_point(Point::new(0.3, 0.3), MAX_ZOOM + 3);
        let data = generate(&mut generator, &mut batcher, deep);
        assert_eq!(data.len(), 1);
        assert_eq!(data[0].tile_key, deep);
        let sibling = TileKey::new(deep.x ^ 1, deep.y, deep.zoom_level);
        assert!(generate(&mut generator, &mut batcher, sibling).is_empty());

        generator.set_group_visibility(5, false);
        assert!(generate(&mut generator, &mut batcher, key).is_empty());
    }
}
