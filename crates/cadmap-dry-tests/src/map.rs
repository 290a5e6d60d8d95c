// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Recording draw surface.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use cadmap_port::{
    CameraMove, FeatureKey, FeatureQuery, LngLat, MapCommand, MapPort, PortError, QueryArea,
    RenderedFeature, ScreenPoint, SourceDef, StyleLayerDef,
};
use serde_json::Value;

/// Pixels per degree of the fake linear projection.
pub const PIXELS_PER_DEGREE: f64 = 10.0;

/// Point-query hit radius in pixels.
const HIT_RADIUS: f32 = 1.0;

/// [`MapPort`] that records every command and keeps a model of the surface.
///
/// Sources and styles behave like a real surface: adding a style whose source
/// is missing, or touching a style that does not exist, is rejected. Queries
/// only see features of styles that exist and are visible.
#[derive(Debug, Clone)]
pub struct RecordingMapPort {
    commands: Vec<MapCommand>,
    sources: BTreeMap<String, SourceDef>,
    styles: Vec<StyleLayerDef>,
    filters: HashMap<String, Value>,
    paint: HashMap<(String, String), Value>,
    feature_state: BTreeSet<(FeatureKey, String)>,
    bound: BTreeSet<String>,
    add_source_counts: HashMap<String, usize>,
    failing_sources: HashSet<String>,
    rendered: Vec<(Option<ScreenPoint>, RenderedFeature)>,
    cameras: Vec<CameraMove>,
    center: ScreenPoint,
}

impl Default for RecordingMapPort {
    fn default() -> Self {
        Self {
            commands: Vec::new(),
            sources: BTreeMap::new(),
            styles: Vec::new(),
            filters: HashMap::new(),
            paint: HashMap::new(),
            feature_state: BTreeSet::new(),
            bound: BTreeSet::new(),
            add_source_counts: HashMap::new(),
            failing_sources: HashSet::new(),
            rendered: Vec::new(),
            cameras: Vec::new(),
            center: ScreenPoint::new(400.0, 300.0),
        }
    }
}

impl RecordingMapPort {
    /// Empty surface.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every command applied so far, rejected ones included.
    pub fn commands(&self) -> &[MapCommand] {
        &self.commands
    }

    /// Forget recorded commands (surface state is kept).
    pub fn clear_commands(&mut self) {
        self.commands.clear();
    }

    /// Reject `AddSource` for `id` while `fail` is set.
    pub fn fail_on_source(&mut self, id: &str, fail: bool) {
        if fail {
            self.failing_sources.insert(id.to_owned());
        } else {
            self.failing_sources.remove(id);
        }
    }

    /// Successful `AddSource` calls for `id`.
    pub fn add_source_count(&self, id: &str) -> usize {
        self.add_source_counts.get(id).copied().unwrap_or(0)
    }

    /// Whether the source is registered.
    pub fn has_source(&self, id: &str) -> bool {
        self.sources.contains_key(id)
    }

    /// Registered source ids.
    pub fn source_ids(&self) -> Vec<String> {
        self.sources.keys().cloned().collect()
    }

    /// Whether the style layer exists.
    pub fn has_style(&self, id: &str) -> bool {
        self.style(id).is_some()
    }

    /// Style layer ids, in insertion order.
    pub fn style_ids(&self) -> Vec<String> {
        self.styles.iter().map(|s| s.id.clone()).collect()
    }

    /// Visibility of a style layer, `None` when absent.
    pub fn is_style_visible(&self, id: &str) -> Option<bool> {
        self.style(id).map(|s| s.visible)
    }

    /// Current filter of a style layer (the last `SetFilter`, or the initial one).
    pub fn filter(&self, id: &str) -> Option<Value> {
        self.filters
            .get(id)
            .cloned()
            .or_else(|| self.style(id).and_then(|s| s.filter.clone()))
    }

    /// Paint property last set through `SetPaint`.
    pub fn paint(&self, id: &str, property: &str) -> Option<&Value> {
        self.paint.get(&(id.to_owned(), property.to_owned()))
    }

    /// Number of `SetPaint` commands applied to `id`.
    pub fn set_paint_count(&self, id: &str) -> usize {
        self.commands
            .iter()
            .filter(|c| matches!(c, MapCommand::SetPaint { id: target, .. } if target == id))
            .count()
    }

    /// Features whose `key` state is on.
    pub fn features_with_state(&self, key: &str) -> Vec<FeatureKey> {
        self.feature_state
            .iter()
            .filter(|(_, k)| k == key)
            .map(|(f, _)| f.clone())
            .collect()
    }

    /// Whether pointer events are routed for a style.
    pub fn is_bound(&self, style: &str) -> bool {
        self.bound.contains(style)
    }

    /// Number of styles with a pointer binding.
    pub fn bound_count(&self) -> usize {
        self.bound.len()
    }

    /// Camera moves applied so far.
    pub fn cameras(&self) -> &[CameraMove] {
        &self.cameras
    }

    /// Make a feature visible to viewport queries.
    pub fn render(&mut self, feature: RenderedFeature) {
        self.rendered.push((None, feature));
    }

    /// Make a feature visible to viewport queries and to point queries at `point`.
    pub fn render_at(&mut self, point: ScreenPoint, feature: RenderedFeature) {
        self.rendered.push((Some(point), feature));
    }

    /// Drop every rendered feature.
    pub fn clear_rendered(&mut self) {
        self.rendered.clear();
    }

    /// Move the viewport center.
    pub fn set_center(&mut self, center: ScreenPoint) {
        self.center = center;
    }

    fn style(&self, id: &str) -> Option<&StyleLayerDef> {
        self.styles.iter().find(|s| s.id == id)
    }

    fn style_mut(&mut self, id: &str) -> Result<&mut StyleLayerDef, PortError> {
        self.styles
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| PortError::StyleRejected(format!("no style layer {id}")))
    }

    fn require_style(&self, id: &str) -> Result<(), PortError> {
        if self.has_style(id) {
            Ok(())
        } else {
            Err(PortError::StyleRejected(format!("no style layer {id}")))
        }
    }

    fn apply_inner(&mut self, command: &MapCommand) -> Result<(), PortError> {
        match command {
            MapCommand::AddSource(def) => {
                if self.failing_sources.contains(&def.id) {
                    return Err(PortError::SourceRejected(def.id.clone()));
                }
                if !self.sources.contains_key(&def.id) {
                    self.sources.insert(def.id.clone(), def.clone());
                    *self.add_source_counts.entry(def.id.clone()).or_default() += 1;
                }
            }
            MapCommand::RemoveSource { id } => {
                if self.styles.iter().any(|s| &s.source == id) {
                    return Err(PortError::Backend(format!("source {id} still in use")));
                }
                self.sources.remove(id);
            }
            MapCommand::AddStyleLayer(def) => {
                if !self.sources.contains_key(&def.source) {
                    return Err(PortError::StyleRejected(format!(
                        "style {} references missing source {}",
                        def.id, def.source
                    )));
                }
                if !self.has_style(&def.id) {
                    self.styles.push(def.clone());
                }
            }
            MapCommand::RemoveStyleLayer { id } => {
                self.styles.retain(|s| &s.id != id);
                self.filters.remove(id);
                self.paint.retain(|(style, _), _| style != id);
            }
            MapCommand::SetVisibility { id, visible } => {
                self.style_mut(id)?.visible = *visible;
            }
            MapCommand::SetPaint {
                id,
                property,
                value,
            } => {
                self.require_style(id)?;
                self.paint
                    .insert((id.clone(), property.clone()), value.clone());
            }
            MapCommand::SetFilter { id, filter } => {
                self.require_style(id)?;
                self.filters.insert(id.clone(), filter.clone());
            }
            MapCommand::SetFeatureState {
                feature,
                key,
                value,
            } => {
                let entry = (feature.clone(), key.clone());
                if *value {
                    self.feature_state.insert(entry);
                } else {
                    self.feature_state.remove(&entry);
                }
            }
            MapCommand::BindPointer { id } => {
                self.require_style(id)?;
                self.bound.insert(id.clone());
            }
            MapCommand::UnbindPointer { id } => {
                self.bound.remove(id);
            }
            MapCommand::Camera(camera) => self.cameras.push(*camera),
        }
        Ok(())
    }
}

impl MapPort for RecordingMapPort {
    fn apply(&mut self, command: &MapCommand) -> Result<(), PortError> {
        self.commands.push(command.clone());
        self.apply_inner(command)
    }

    fn query_rendered(&self, query: &FeatureQuery) -> Vec<RenderedFeature> {
        self.rendered
            .iter()
            .filter(|(_, f)| query.styles.contains(&f.style))
            .filter(|(_, f)| self.is_style_visible(&f.style) == Some(true))
            .filter(|(at, _)| match (query.area, at) {
                (QueryArea::Viewport, _) => true,
                (QueryArea::Point(p), Some(at)) => {
                    (p.x - at.x).abs() <= HIT_RADIUS && (p.y - at.y).abs() <= HIT_RADIUS
                }
                (QueryArea::Point(_), None) => false,
            })
            .map(|(_, f)| f.clone())
            .collect()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn project(&self, position: LngLat) -> ScreenPoint {
        ScreenPoint::new(
            ((position.lng + 180.0) * PIXELS_PER_DEGREE) as f32,
            ((90.0 - position.lat) * PIXELS_PER_DEGREE) as f32,
        )
    }

    fn unproject(&self, point: ScreenPoint) -> LngLat {
        LngLat::new(
            f64::from(point.x) / PIXELS_PER_DEGREE - 180.0,
            90.0 - f64::from(point.y) / PIXELS_PER_DEGREE,
        )
    }

    fn viewport_center(&self) -> ScreenPoint {
        self.center
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadmap_port::StyleKind;
    use serde_json::Map;

    fn style(id: &str, source: &str) -> StyleLayerDef {
        StyleLayerDef {
            id: id.into(),
            source: source.into(),
            source_layer: source.into(),
            kind: StyleKind::Fill,
            paint: Map::new(),
            filter: None,
            visible: true,
        }
    }

    fn source(id: &str) -> SourceDef {
        SourceDef {
            id: id.into(),
            tiles: format!("http://t/{id}/{{z}}/{{x}}/{{y}}.mvt"),
            min_zoom: 0,
            max_zoom: 19,
        }
    }

    #[test]
    fn styles_need_their_source() {
        let mut port = RecordingMapPort::new();
        assert!(port.apply(&MapCommand::AddStyleLayer(style("a-fill", "a"))).is_err());
        port.apply(&MapCommand::AddSource(source("a"))).ok();
        assert!(port.apply(&MapCommand::AddStyleLayer(style("a-fill", "a"))).is_ok());
        assert!(port.apply(&MapCommand::RemoveSource { id: "a".into() }).is_err());
        assert_eq!(port.commands().len(), 4);
    }

    #[test]
    fn hidden_styles_are_not_queried() {
        let mut port = RecordingMapPort::new();
        port.apply(&MapCommand::AddSource(source("a"))).ok();
        port.apply(&MapCommand::AddStyleLayer(style("a-fill", "a"))).ok();
        let feature = RenderedFeature {
            key: None,
            style: "a-fill".into(),
            properties: Map::new(),
            geometry: None,
        };
        port.render_at(ScreenPoint::new(5.0, 5.0), feature);
        let query = FeatureQuery::at(ScreenPoint::new(5.5, 4.5), vec!["a-fill".into()]);
        assert_eq!(port.query_rendered(&query).len(), 1);
        port.apply(&MapCommand::SetVisibility {
            id: "a-fill".into(),
            visible: false,
        })
        .ok();
        assert!(port.query_rendered(&query).is_empty());
    }

    #[test]
    fn projection_round_trips() {
        let port = RecordingMapPort::new();
        let p = port.project(LngLat::new(-0.5, 44.75));
        let back = port.unproject(p);
        assert!((back.lng + 0.5).abs() < 1e-3);
        assert!((back.lat - 44.75).abs() < 1e-3);
    }
}
