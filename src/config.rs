//! Configuration utilities: the JSON scene loaded into the engine.

use crate::engine::DrapeEngine;
use crate::geometry::LatLon;
use crate::gui::GuiLayout;
use crate::render::Color;
use crate::user_marks::{
    IdCollections, LineId, MarkGroupId, MarkId, UserLineLayer, UserLineRenderParams,
    UserLinesRenderCollection, UserMarkRenderParams, UserMarksRenderCollection,
};
use anyhow::Context;
use clap::builder;
use clap::error::ErrorKind;
use log::debug;
use rand::{rng, Rng};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// Description of the content displayed by the engine.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SceneConfig {
    /// Size in pixels of each symbol of the texture atlas.
    #[serde(default)]
    pub symbols: BTreeMap<String, [f32; 2]>,
    /// Groups of marks and lines.
    #[serde(default)]
    pub groups: Vec<GroupConfig>,
    /// Layout of the GUI widgets.
    #[serde(default)]
    pub gui: GuiLayout,
    /// Initial center of the view.
    pub center: Option<LatLon>,
    /// Current position, if known.
    pub my_position: Option<LatLon>,
}

/// A group of marks and lines.
#[derive(Clone, Debug, Deserialize)]
pub struct GroupConfig {
    /// Unique identifier of the group.
    pub id: MarkGroupId,
    /// Whether the group is displayed.
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Point marks.
    #[serde(default)]
    pub marks: Vec<MarkConfig>,
    /// Polylines.
    #[serde(default)]
    pub lines: Vec<LineConfig>,
}

/// A point mark.
#[derive(Clone, Debug, Deserialize)]
pub struct MarkConfig {
    /// Unique identifier of the mark.
    pub id: MarkId,
    /// Position of the mark.
    pub position: LatLon,
    /// Lowest zoom level at which the mark is displayed.
    #[serde(default = "default_min_zoom")]
    pub min_zoom: u32,
    /// Symbol to display from each zoom level on.
    #[serde(default)]
    pub symbols: BTreeMap<u32, String>,
    /// RGBA color of the mark.
    pub color: Option<Color>,
    /// Title displayed below the mark.
    pub title: Option<String>,
    /// Depth within the user mark layer.
    #[serde(default)]
    pub depth: f32,
}

/// A polyline.
#[derive(Clone, Debug, Deserialize)]
pub struct LineConfig {
    /// Unique identifier of the line.
    pub id: LineId,
    /// Lowest zoom level at which the line is displayed.
    #[serde(default = "default_min_zoom")]
    pub min_zoom: u32,
    /// Path of the line.
    pub points: Vec<LatLon>,
    /// Strokes of the line, drawn in order.
    pub layers: Vec<LineLayerConfig>,
}

/// One stroke of a polyline.
#[derive(Clone, Debug, Deserialize)]
pub struct LineLayerConfig {
    /// RGBA color of the stroke.
    pub color: Color,
    /// Width of the stroke, in pixels.
    pub width: f32,
    /// Depth within the user line layer.
    #[serde(default)]
    pub depth: f32,
}

fn default_visible() -> bool {
    true
}

fn default_min_zoom() -> u32 {
    1
}

impl MarkConfig {
    /// Render parameters of this mark.
    pub fn render_params(&self) -> UserMarkRenderParams {
        UserMarkRenderParams {
            min_zoom: self.min_zoom,
            symbol_names: self.symbols.clone(),
            color: self.color,
            title: self.title.clone(),
            depth: self.depth,
            ..UserMarkRenderParams::new(self.position.as_mercator())
        }
    }
}

impl LineConfig {
    /// Render parameters of this line.
    pub fn render_params(&self) -> UserLineRenderParams {
        UserLineRenderParams {
            min_zoom: self.min_zoom,
            layers: self
                .layers
                .iter()
                .map(|layer| UserLineLayer {
                    color: layer.color,
                    width: layer.width,
                    depth: layer.depth,
                })
                .collect(),
            points: self.points.iter().map(LatLon::as_mercator).collect(),
        }
    }
}

impl GroupConfig {
    /// Identifiers of the marks and lines of this group.
    pub fn ids(&self) -> IdCollections {
        IdCollections {
            mark_ids: self.marks.iter().map(|m| m.id).collect(),
            line_ids: self.lines.iter().map(|l| l.id).collect(),
        }
    }
}

impl SceneConfig {
    /// Reads a scene configuration from the given JSON file.
    fn read_from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).with_context(|| {
            format!("Failed to read scene configuration from: {}", path.display())
        })?;
        let reader = BufReader::new(file);
        let scene: Self = serde_json::from_reader(reader).with_context(|| {
            format!(
                "Failed to parse scene configuration from: {}",
                path.display()
            )
        })?;

        Ok(scene)
    }

    /// Render parameters of all the marks and lines.
    pub fn render_collections(&self) -> (UserMarksRenderCollection, UserLinesRenderCollection) {
        let marks = self
            .groups
            .iter()
            .flat_map(|g| &g.marks)
            .map(|m| (m.id, m.render_params()))
            .collect();
        let lines = self
            .groups
            .iter()
            .flat_map(|g| &g.lines)
            .map(|l| (l.id, l.render_params()))
            .collect();
        (marks, lines)
    }

    /// Adds a visible group of `count` marks with random positions and
    /// colors, with identifiers after the existing ones.
    pub fn add_random_marks(&mut self, count: usize) {
        if count == 0 {
            return;
        }
        let group_id = self.groups.iter().map(|g| g.id + 1).max().unwrap_or(0);
        let first_id = self
            .groups
            .iter()
            .flat_map(|g| &g.marks)
            .map(|m| m.id + 1)
            .max()
            .unwrap_or(0);

        let mut rng = rng();
        let marks = (0..count as MarkId)
            .map(|i| MarkConfig {
                id: first_id + i,
                position: LatLon {
                    lat: rng.random_range(-80.0..80.0),
                    lon: rng.random_range(-180.0..180.0),
                },
                min_zoom: default_min_zoom(),
                symbols: BTreeMap::new(),
                color: Some(Color::new_random()),
                title: None,
                depth: 0.0,
            })
            .collect();
        debug!("Adding {count} random marks in group {group_id}");
        self.groups.push(GroupConfig {
            id: group_id,
            visible: true,
            marks,
            lines: Vec::new(),
        });
    }

    /// Posts the content of the scene to the engine, and requests its
    /// geometry.
    pub fn load_into(&self, engine: &DrapeEngine) {
        let (marks, lines) = self.render_collections();
        engine.update_user_marks(IdCollections::default(), Vec::new(), marks, lines);
        for group in &self.groups {
            engine.update_user_mark_group(group.id, group.ids());
            engine.change_user_mark_group_visibility(group.id, group.visible);
        }
        if let Some(center) = &self.center {
            engine.set_center(center.as_mercator());
        }
        engine.set_my_position(self.my_position.as_ref().map(LatLon::as_mercator));
        engine.invalidate_user_marks();
    }
}

/// Helper struct to parse a [`SceneConfig`] directly from a Clap argument.
#[derive(Clone)]
pub struct SceneConfigParser;

impl builder::TypedValueParser for SceneConfigParser {
    type Value = SceneConfig;

    fn parse_ref(
        &self,
        cmd: &clap::Command,
        arg: Option<&clap::Arg>,
        value: &std::ffi::OsStr,
    ) -> Result<Self::Value, clap::Error> {
        SceneConfig::read_from_file(value).map_err(|e| {
            let arg_str = arg.map(|a| a.to_string());
            let msg = format!(
                "Failed to parse scene configuration{}{}: {:#}\n",
                arg_str.map(|a| format!(" ({})", a)).unwrap_or_default(),
                value
                    .to_str()
                    .map(|f| format!(" from file `{}`", f))
                    .unwrap_or_default(),
                e
            );
            clap::Error::raw(ErrorKind::Io, msg).with_cmd(cmd)
        })
    }
}

impl builder::ValueParserFactory for SceneConfig {
    type Parser = SceneConfigParser;

    fn value_parser() -> Self::Parser {
        SceneConfigParser
    }
}
