// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Headless draw surface: prints commands, answers queries from scripted features.

use std::collections::{HashMap, HashSet};
use std::f64::consts::PI;
use std::io::Write;

use cadmap_port::{
    CameraMove, FeatureQuery, LngLat, MapCommand, MapPort, PortError, QueryArea, RenderedFeature,
    ScreenPoint,
};

const TILE_SIZE: f64 = 256.0;
const HIT_RADIUS: f32 = 3.0;

/// Writes every command as a JSON line and keeps just enough surface state
/// (sources, style visibility, rendered features, camera) to answer queries.
pub struct ScriptedMapPort<W: Write> {
    out: W,
    sources: HashSet<String>,
    styles: HashMap<String, bool>,
    rendered: Vec<(Option<ScreenPoint>, RenderedFeature)>,
    center: LngLat,
    zoom: f64,
    size: (f32, f32),
}

impl<W: Write> ScriptedMapPort<W> {
    /// Surface of `size` pixels centered on `center` at `zoom`.
    pub fn new(out: W, center: LngLat, zoom: f64, size: (f32, f32)) -> Self {
        Self {
            out,
            sources: HashSet::new(),
            styles: HashMap::new(),
            rendered: Vec::new(),
            center,
            zoom,
            size,
        }
    }

    /// Write a free-form line.
    pub fn note(&mut self, line: &str) -> std::io::Result<()> {
        writeln!(self.out, "# {line}")
    }

    /// Move the camera without animation.
    pub fn set_camera(&mut self, center: Option<LngLat>, zoom: f64) {
        if let Some(center) = center {
            self.center = center;
        }
        self.zoom = zoom;
    }

    /// Add a feature to what queries see.
    pub fn render(&mut self, at: Option<ScreenPoint>, feature: RenderedFeature) {
        self.rendered.push((at, feature));
    }

    /// Forget every rendered feature.
    pub fn clear_rendered(&mut self) {
        self.rendered.clear();
    }

    fn world_scale(&self) -> f64 {
        TILE_SIZE * self.zoom.exp2()
    }

    fn world(&self, p: LngLat) -> (f64, f64) {
        let scale = self.world_scale();
        let x = (p.lng + 180.0) / 360.0 * scale;
        let sin = p.lat.to_radians().sin().clamp(-0.9999, 0.9999);
        let y = (0.5 - ((1.0 + sin) / (1.0 - sin)).ln() / (4.0 * PI)) * scale;
        (x, y)
    }

    fn track(&mut self, command: &MapCommand) {
        match command {
            MapCommand::AddSource(def) => {
                self.sources.insert(def.id.clone());
            }
            MapCommand::RemoveSource { id } => {
                self.sources.remove(id);
            }
            MapCommand::AddStyleLayer(def) => {
                self.styles.insert(def.id.clone(), def.visible);
            }
            MapCommand::RemoveStyleLayer { id } => {
                self.styles.remove(id);
            }
            MapCommand::SetVisibility { id, visible } => {
                if let Some(v) = self.styles.get_mut(id) {
                    *v = *visible;
                }
            }
            MapCommand::Camera(CameraMove::FlyTo { center, zoom }) => {
                self.center = *center;
                self.zoom = *zoom;
            }
            MapCommand::Camera(CameraMove::FitBounds { bounds, .. }) => {
                self.center = bounds.center();
            }
            _ => {}
        }
    }
}

impl<W: Write> MapPort for ScriptedMapPort<W> {
    fn apply(&mut self, command: &MapCommand) -> Result<(), PortError> {
        if let MapCommand::AddStyleLayer(def) = command {
            if !self.sources.contains(&def.source) {
                return Err(PortError::StyleRejected(format!(
                    "{} needs source {}",
                    def.id, def.source
                )));
            }
        }
        let json = serde_json::to_string(command).map_err(|e| PortError::Backend(e.to_string()))?;
        writeln!(self.out, "> {json}").map_err(|e| PortError::Backend(e.to_string()))?;
        self.track(command);
        Ok(())
    }

    fn query_rendered(&self, query: &FeatureQuery) -> Vec<RenderedFeature> {
        self.rendered
            .iter()
            .filter(|(_, f)| query.styles.contains(&f.style))
            .filter(|(_, f)| self.styles.get(&f.style).copied().unwrap_or(false))
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
        let (cx, cy) = self.world(self.center);
        let (x, y) = self.world(position);
        ScreenPoint::new(
            (x - cx + f64::from(self.size.0) / 2.0) as f32,
            (y - cy + f64::from(self.size.1) / 2.0) as f32,
        )
    }

    fn unproject(&self, point: ScreenPoint) -> LngLat {
        let scale = self.world_scale();
        let (cx, cy) = self.world(self.center);
        let x = cx + f64::from(point.x) - f64::from(self.size.0) / 2.0;
        let y = cy + f64::from(point.y) - f64::from(self.size.1) / 2.0;
        let lng = x / scale * 360.0 - 180.0;
        let n = PI - 2.0 * PI * y / scale;
        let lat = n.sinh().atan().to_degrees();
        LngLat::new(lng, lat)
    }

    fn viewport_center(&self) -> ScreenPoint {
        ScreenPoint::new(self.size.0 / 2.0, self.size.1 / 2.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn center_projects_to_viewport_center() {
        let center = LngLat::new(-0.5792, 44.8378);
        let port = ScriptedMapPort::new(Vec::new(), center, 15.0, (800.0, 600.0));
        let p = port.project(center);
        assert!((p.x - 400.0).abs() < 0.01 && (p.y - 300.0).abs() < 0.01);
        let back = port.unproject(port.viewport_center());
        assert!((back.lng - center.lng).abs() < 1e-6);
        assert!((back.lat - center.lat).abs() < 1e-6);
    }

    #[test]
    fn commands_are_written_as_json_lines() {
        let mut port = ScriptedMapPort::new(Vec::new(), LngLat::default(), 10.0, (800.0, 600.0));
        port.apply(&MapCommand::RemoveSource { id: "x".into() }).ok();
        let text = String::from_utf8(port.out).unwrap_or_default();
        assert_eq!(text, "> {\"op\":\"remove_source\",\"id\":\"x\"}\n");
    }
}
