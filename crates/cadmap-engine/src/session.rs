// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! One map view: scheduler, styles, highlight and selection over a [`MapPort`].
//!
//! The session owns the port and every engine component. It never performs
//! network I/O: REST work accumulates in an outbox drained with
//! [`MapSession::take_requests`], and completed responses come back through
//! [`MapSession::on_api_response`]. User-facing failures are pushed to the
//! session's [`ToastService`].

use std::time::{Duration, Instant};

use cadmap_app_core::prefs::MapPrefs;
use cadmap_app_core::toast::{ToastRender, ToastService, ToastSource};
use cadmap_port::{CameraMove, FeatureQuery, MapCommand, MapPort, ScreenPoint};
use tracing::{debug, info, warn};

use crate::api::{ApiRequest, ApiResponse};
use crate::highlight::FeatureHighlighter;
use crate::parcel::ParcelRef;
use crate::registry::{LayerDescriptor, LayerRegistry};
use crate::scheduler::{ScheduleReport, SchedulerError, ViewportLayerScheduler, DEFAULT_CAPACITY};
use crate::selection::{
    SelectionController, SelectionEffect, SelectionError, SelectionState, DEFAULT_MAX_UNIT_SIZE,
};
use crate::settle::{SettleDebouncer, DEFAULT_QUIET};
use crate::style_cache::CategoricalStyleCache;

/// Padding around a fitted unit, in pixels.
pub const FIT_PADDING: f32 = 40.0;

/// Toasts kept at once.
const TOAST_CAPACITY: usize = 8;

/// Session tuning, usually derived from [`MapPrefs`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Maximum concurrently attached layers.
    pub capacity: usize,
    /// Maximum parcels per unit.
    pub max_unit_size: usize,
    /// Quiet period before a camera change counts as settled.
    pub settle_quiet: Duration,
    /// Auto-inspect the parcel under the viewport center at or above this zoom.
    pub auto_inspect_min_zoom: Option<u8>,
    /// Layers toggled on at start.
    pub visible: Vec<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
            max_unit_size: DEFAULT_MAX_UNIT_SIZE,
            settle_quiet: DEFAULT_QUIET,
            auto_inspect_min_zoom: None,
            visible: Vec::new(),
        }
    }
}

impl SessionConfig {
    /// Tuning from saved preferences.
    pub fn from_prefs(prefs: &MapPrefs) -> Self {
        Self {
            capacity: prefs.layers.capacity,
            max_unit_size: prefs.selection.max_unit_size,
            settle_quiet: Duration::from_millis(prefs.layers.settle_quiet_ms),
            auto_inspect_min_zoom: prefs.selection.auto_inspect_min_zoom,
            visible: prefs.layers.visible.clone(),
        }
    }
}

/// Engine state for one map view.
pub struct MapSession<P: MapPort> {
    port: P,
    scheduler: ViewportLayerScheduler,
    styles: CategoricalStyleCache,
    highlighter: FeatureHighlighter,
    selection: SelectionController,
    settle: SettleDebouncer,
    toasts: ToastService,
    parcel_layer: Option<LayerDescriptor>,
    auto_inspect_min_zoom: Option<u8>,
    camera_zoom: Option<f64>,
    outbox: Vec<ApiRequest>,
}

impl<P: MapPort> MapSession<P> {
    /// Build a session over `port`. Start-up toggles naming unknown layers are skipped.
    pub fn new(port: P, registry: LayerRegistry, config: SessionConfig) -> Self {
        let parcel_layer = registry.all().iter().find(|l| l.selectable).cloned();
        let highlighter =
            FeatureHighlighter::new(parcel_layer.as_ref().and_then(LayerDescriptor::selection_style_id));
        let mut session = Self {
            port,
            scheduler: ViewportLayerScheduler::new(registry, config.capacity),
            styles: CategoricalStyleCache::default(),
            highlighter,
            selection: SelectionController::new(config.max_unit_size),
            settle: SettleDebouncer::new(config.settle_quiet),
            toasts: ToastService::new(TOAST_CAPACITY),
            parcel_layer,
            auto_inspect_min_zoom: config.auto_inspect_min_zoom,
            camera_zoom: None,
            outbox: Vec::new(),
        };
        for id in &config.visible {
            // No zoom yet: toggles only queue, nothing reaches the port.
            if let Err(err) = session.scheduler.set_visible(id, true, &mut session.port) {
                warn!(error = %err, "ignoring saved layer toggle");
            }
        }
        session
    }

    /// Draw surface.
    pub fn port(&self) -> &P {
        &self.port
    }

    /// Draw surface, mutably (hosts feeding rendered features).
    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Consume the session, returning the draw surface.
    pub fn into_port(self) -> P {
        self.port
    }

    /// Layer scheduler.
    pub fn scheduler(&self) -> &ViewportLayerScheduler {
        &self.scheduler
    }

    /// Categorical colors.
    pub fn styles(&self) -> &CategoricalStyleCache {
        &self.styles
    }

    /// Hover and selection feedback.
    pub fn highlighter(&self) -> &FeatureHighlighter {
        &self.highlighter
    }

    /// Selection state machine.
    pub fn selection(&self) -> &SelectionController {
        &self.selection
    }

    /// Toasts alive at `now`.
    pub fn visible_toasts(&self, now: Instant) -> Vec<ToastRender> {
        self.toasts.visible(now)
    }

    /// Surface a host-side failure (catalog fetch, prefs storage) as an error toast.
    pub fn report_error(&mut self, source: ToastSource, title: &str, detail: String, now: Instant) {
        warn!(?source, title, %detail, "host error");
        self.toasts.error(source, title.to_owned(), detail, now);
    }

    /// Drain REST work queued since the last call.
    pub fn take_requests(&mut self) -> Vec<ApiRequest> {
        std::mem::take(&mut self.outbox)
    }

    /// Record a camera frame; scheduling waits for [`Self::tick`].
    pub fn camera_moved(&mut self, zoom: f64, now: Instant) {
        self.camera_zoom = Some(zoom);
        self.settle.camera_moved(zoom, now);
    }

    /// Advance time: expire toasts and run a settle once the camera is quiet.
    pub fn tick(&mut self, now: Instant) -> Option<ScheduleReport> {
        self.toasts.retain_visible(now);
        let zoom = self.settle.poll(now)?;
        Some(self.on_viewport_settled(zoom, now))
    }

    /// Schedule layers for a settled integer zoom.
    pub fn on_viewport_settled(&mut self, zoom: u8, now: Instant) -> ScheduleReport {
        let report = self.scheduler.on_viewport_settled(zoom, &mut self.port);
        self.absorb(&report, now);
        self.auto_inspect(zoom, now);
        report
    }

    /// User toggle for a layer.
    pub fn set_layer_visible(
        &mut self,
        id: &str,
        on: bool,
        now: Instant,
    ) -> Result<ScheduleReport, SchedulerError> {
        match self.scheduler.set_visible(id, on, &mut self.port) {
            Ok(report) => {
                self.absorb(&report, now);
                Ok(report)
            }
            Err(err) => {
                self.toasts
                    .error(ToastSource::Layers, "Unknown layer", err.to_string(), now);
                Err(err)
            }
        }
    }

    /// Recolor categorical layers from the features now rendered.
    ///
    /// Call once per rendered batch; each layer's style is rebuilt at most
    /// once, and only when new categories appeared. Returns the restyled ids.
    pub fn on_features_rendered(&mut self) -> Vec<String> {
        let mut restyled = Vec::new();
        let layers: Vec<LayerDescriptor> = self
            .scheduler
            .attached_ids()
            .iter()
            .filter(|id| self.scheduler.is_shown(id) && self.styles.is_tracked(id))
            .filter_map(|id| self.scheduler.entry(id).map(|e| e.descriptor.clone()))
            .collect();
        for desc in layers {
            let Some(attr) = desc.category_attribute.as_deref() else {
                continue;
            };
            let style = desc.primary_style_id();
            let features = self
                .port
                .query_rendered(&FeatureQuery::viewport(vec![style.clone()]));
            let values: Vec<String> = features.iter().filter_map(|f| f.property_str(attr)).collect();
            let Some(expr) = self
                .styles
                .restyle(&desc.id, values.iter().map(String::as_str))
            else {
                continue;
            };
            let cmd = MapCommand::SetPaint {
                id: style,
                property: desc.geometry.color_property().to_owned(),
                value: expr,
            };
            match self.port.apply(&cmd) {
                Ok(()) => restyled.push(desc.id),
                Err(err) => warn!(layer = %desc.id, error = %err, "restyle rejected"),
            }
        }
        restyled
    }

    /// Move the hover to the feature under `point`, if any.
    pub fn pointer_moved(&mut self, point: ScreenPoint) -> bool {
        let styles = self.scheduler.interactive_styles();
        let key = self
            .port
            .query_rendered(&FeatureQuery::at(point, styles))
            .into_iter()
            .find_map(|f| f.key);
        self.highlighter.set_hover(key, &mut self.port)
    }

    /// Pointer left the map.
    pub fn pointer_left(&mut self) {
        self.highlighter.set_hover(None, &mut self.port);
    }

    /// Click at a screen point. Returns false when no parcel was hit.
    pub fn click(&mut self, point: ScreenPoint, now: Instant) -> Result<bool, SelectionError> {
        let Some(parcel) = self.parcel_at(point) else {
            return Ok(false);
        };
        self.click_parcel(parcel, now).map(|()| true)
    }

    /// Click on a known parcel.
    pub fn click_parcel(&mut self, parcel: ParcelRef, now: Instant) -> Result<(), SelectionError> {
        let result = self.selection.click(parcel);
        self.settle_selection(result, now)
    }

    /// Turn the unit builder on or off.
    pub fn set_builder_mode(&mut self, on: bool) {
        let effects = self.selection.set_builder_mode(on);
        self.run(effects);
    }

    /// Confirm the collected parcels as a unit.
    pub fn confirm(&mut self, now: Instant) -> Result<(), SelectionError> {
        let result = self.selection.confirm();
        self.settle_selection(result, now)
    }

    /// Clear selection, builder and the held unit.
    pub fn cancel(&mut self) {
        let effects = self.selection.cancel();
        self.run(effects);
    }

    /// Name for the unit being built.
    pub fn set_unit_name(&mut self, name: Option<&str>) {
        self.selection.set_unit_name(name);
    }

    /// Feed back a completed REST request.
    pub fn on_api_response(&mut self, response: ApiResponse, now: Instant) -> Result<(), SelectionError> {
        let result = self.selection.on_response(response);
        self.settle_selection(result, now)
    }

    /// Leaving the map view: cancel selection, clear feedback, detach every layer.
    ///
    /// User toggles survive so the next view restores them.
    pub fn navigate_away(&mut self) -> Vec<String> {
        let effects = self.selection.cancel();
        self.run(effects);
        self.highlighter.clear(&mut self.port);
        let detached = self.scheduler.detach_all(&mut self.port);
        for id in &detached {
            self.styles.forget_layer(id);
            self.highlighter.forget_source(id);
        }
        self.outbox.clear();
        info!(layers = detached.len(), "map view closed");
        detached
    }

    /// `base` with the current layer toggles and camera.
    pub fn export_prefs(&self, base: &MapPrefs) -> MapPrefs {
        let mut prefs = base.clone();
        prefs.layers.visible = self.scheduler.visible_flags();
        let center = self.port.unproject(self.port.viewport_center());
        prefs.camera.center = [center.lng, center.lat];
        if let Some(zoom) = self.camera_zoom {
            prefs.camera.zoom = zoom;
        }
        prefs
    }

    fn absorb(&mut self, report: &ScheduleReport, now: Instant) {
        for id in &report.detached {
            self.styles.forget_layer(id);
            self.highlighter.forget_source(id);
        }
        for id in &report.attached {
            let Some(entry) = self.scheduler.entry(id) else {
                continue;
            };
            if let Some(attr) = &entry.descriptor.category_attribute {
                self.styles.track(id, attr);
            }
            if entry.descriptor.selectable {
                self.highlighter.reapply(&mut self.port);
            }
        }
        if !report.failed.is_empty() {
            self.toasts.error(
                ToastSource::Layers,
                "Layer unavailable",
                report.failed.join(", "),
                now,
            );
        }
    }

    fn parcel_at(&self, point: ScreenPoint) -> Option<ParcelRef> {
        let layer = self.parcel_layer.as_ref()?;
        if !self.scheduler.is_shown(&layer.id) {
            return None;
        }
        self.port
            .query_rendered(&FeatureQuery::at(point, vec![layer.primary_style_id()]))
            .iter()
            .find_map(ParcelRef::from_feature)
    }

    /// Inspect the parcel under the viewport center, outside builder mode.
    fn auto_inspect(&mut self, zoom: u8, now: Instant) {
        if !self.auto_inspect_min_zoom.is_some_and(|min| zoom >= min) || self.selection.is_builder_mode() {
            return;
        }
        let Some(parcel) = self.parcel_at(self.port.viewport_center()) else {
            return;
        };
        let already = match self.selection.state() {
            SelectionState::Inspecting { parcel: shown, .. } => shown == &parcel,
            _ => false,
        } || self.selection.pending_inspect() == Some(&parcel);
        if already {
            return;
        }
        debug!(section = %parcel.section, number = %parcel.number, "auto-inspect");
        if let Err(err) = self.click_parcel(parcel, now) {
            debug!(error = %err, "auto-inspect skipped");
        }
    }

    fn settle_selection(
        &mut self,
        result: Result<Vec<SelectionEffect>, SelectionError>,
        now: Instant,
    ) -> Result<(), SelectionError> {
        match result {
            Ok(effects) => {
                self.run(effects);
                Ok(())
            }
            Err(err) => {
                self.toasts.error(
                    ToastSource::Selection,
                    err.to_string(),
                    err.reason_code().to_owned(),
                    now,
                );
                Err(err)
            }
        }
    }

    fn run(&mut self, effects: Vec<SelectionEffect>) {
        for effect in effects {
            match effect {
                SelectionEffect::Request(req) => self.outbox.push(req),
                SelectionEffect::Highlight(filter) => {
                    self.highlighter.set_selected(filter, &mut self.port);
                }
                SelectionEffect::FitBounds(bounds) => {
                    let cmd = MapCommand::Camera(CameraMove::FitBounds {
                        bounds,
                        padding: FIT_PADDING,
                    });
                    if let Err(err) = self.port.apply(&cmd) {
                        warn!(error = %err, "camera fit rejected");
                    }
                }
            }
        }
    }
}
