// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Viewport-driven layer attach/show/hide/evict scheduling.
//!
//! A layer is in one of three surface states: detached, attached-and-shown,
//! or attached-and-hidden. Leaving the zoom window only hides a layer so
//! crossing a zoom boundary back and forth never re-downloads tiles; the LRU
//! capacity bound is the only thing that detaches a wanted layer.

use std::collections::{HashMap, HashSet, VecDeque};

use cadmap_port::{MapCommand, MapPort, PortError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::registry::{LayerDescriptor, LayerRegistry};

/// Default maximum number of concurrently attached layers.
pub const DEFAULT_CAPACITY: usize = 5;

/// Scheduler errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchedulerError {
    /// The id is not in the registry.
    #[error("unknown layer: {0}")]
    UnknownLayer(String),
}

/// A layer whose source and styles are on the surface.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveLayerEntry {
    /// Descriptor the layer was attached from.
    pub descriptor: LayerDescriptor,
    /// Attach sequence number (monotonic per scheduler).
    pub attached_at: u64,
    /// Whether the styles are currently displayed.
    pub visible: bool,
}

/// What one scheduling pass changed on the surface.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScheduleReport {
    /// Layers newly attached.
    pub attached: Vec<String>,
    /// Layers detached to make room (or explicitly).
    pub detached: Vec<String>,
    /// Attached layers switched to displayed.
    pub shown: Vec<String>,
    /// Attached layers switched to hidden.
    pub hidden: Vec<String>,
    /// Layers whose attach failed; retried on the next settle.
    pub failed: Vec<String>,
}

impl ScheduleReport {
    /// True when nothing changed.
    pub fn is_empty(&self) -> bool {
        self.attached.is_empty()
            && self.detached.is_empty()
            && self.shown.is_empty()
            && self.hidden.is_empty()
            && self.failed.is_empty()
    }
}

/// Keeps attached layers consistent with zoom and user toggles under a capacity bound.
#[derive(Debug, Clone)]
pub struct ViewportLayerScheduler {
    registry: LayerRegistry,
    capacity: usize,
    zoom: Option<u8>,
    wanted: HashSet<String>,
    active: HashMap<String, ActiveLayerEntry>,
    lru: VecDeque<String>,
    attach_seq: u64,
}

impl ViewportLayerScheduler {
    /// New scheduler over `registry` with at most `capacity` attached layers (minimum 1).
    pub fn new(registry: LayerRegistry, capacity: usize) -> Self {
        Self {
            registry,
            capacity: capacity.max(1),
            zoom: None,
            wanted: HashSet::new(),
            active: HashMap::new(),
            lru: VecDeque::new(),
            attach_seq: 0,
        }
    }

    /// Layer catalog.
    pub fn registry(&self) -> &LayerRegistry {
        &self.registry
    }

    /// Capacity bound.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Zoom of the last settle, if any.
    pub fn current_zoom(&self) -> Option<u8> {
        self.zoom
    }

    /// Handle a settled viewport at integer `zoom`.
    ///
    /// Wanted layers are visited in registry order. When more wanted layers
    /// are in range than the capacity allows, every settle attaches the
    /// missing ones and evicts the least recently used in turn, so the
    /// attached set rotates through them. The capacity bound wins over
    /// tile reuse here; the settle never skips a wanted in-range layer.
    pub fn on_viewport_settled(&mut self, zoom: u8, port: &mut dyn MapPort) -> ScheduleReport {
        self.zoom = Some(zoom);
        let mut report = ScheduleReport::default();
        let wanted: Vec<LayerDescriptor> = self
            .registry
            .all()
            .iter()
            .filter(|l| self.wanted.contains(&l.id))
            .cloned()
            .collect();
        for desc in wanted {
            let in_range = desc.in_range(zoom);
            let attached = self.active.contains_key(&desc.id);
            match (attached, in_range) {
                (false, true) => self.attach(&desc, port, &mut report),
                (false, false) => {}
                (true, true) => {
                    self.show(&desc.id, port, &mut report);
                    self.touch(&desc.id);
                }
                (true, false) => self.hide(&desc.id, port, &mut report),
            }
        }
        if !report.is_empty() {
            debug!(zoom, ?report, "viewport settled");
        }
        report
    }

    /// User toggle for a layer.
    ///
    /// Turning off only hides. Turning on attaches immediately when the last
    /// settled zoom is in range, otherwise the layer waits for the next settle.
    pub fn set_visible(
        &mut self,
        id: &str,
        on: bool,
        port: &mut dyn MapPort,
    ) -> Result<ScheduleReport, SchedulerError> {
        let desc = self
            .registry
            .by_id(id)
            .cloned()
            .ok_or_else(|| SchedulerError::UnknownLayer(id.to_owned()))?;
        let mut report = ScheduleReport::default();
        if !on {
            self.wanted.remove(id);
            if self.active.contains_key(id) {
                self.hide(id, port, &mut report);
            }
            return Ok(report);
        }
        self.wanted.insert(id.to_owned());
        match self.zoom {
            Some(zoom) if desc.in_range(zoom) => {
                if self.active.contains_key(id) {
                    self.show(id, port, &mut report);
                    self.touch(id);
                } else {
                    self.attach(&desc, port, &mut report);
                }
            }
            _ => debug!(layer = id, "queued until the zoom is in range"),
        }
        Ok(report)
    }

    /// Detach a layer explicitly. Returns false if it was not attached.
    pub fn detach_layer(&mut self, id: &str, port: &mut dyn MapPort) -> bool {
        let mut report = ScheduleReport::default();
        self.detach(id, port, &mut report);
        !report.detached.is_empty()
    }

    /// Detach everything (navigation away). User toggles are kept.
    pub fn detach_all(&mut self, port: &mut dyn MapPort) -> Vec<String> {
        let mut report = ScheduleReport::default();
        let ids: Vec<String> = self.lru.iter().cloned().collect();
        for id in ids {
            self.detach(&id, port, &mut report);
        }
        report.detached
    }

    /// Whether the user toggle for `id` is on.
    pub fn is_wanted(&self, id: &str) -> bool {
        self.wanted.contains(id)
    }

    /// Whether the layer's source is on the surface.
    pub fn is_attached(&self, id: &str) -> bool {
        self.active.contains_key(id)
    }

    /// Whether the layer is attached and displayed.
    pub fn is_shown(&self, id: &str) -> bool {
        self.active.get(id).is_some_and(|e| e.visible)
    }

    /// Active entry for an attached layer.
    pub fn entry(&self, id: &str) -> Option<&ActiveLayerEntry> {
        self.active.get(id)
    }

    /// Attached layer ids, least recently used first.
    pub fn attached_ids(&self) -> Vec<String> {
        self.lru.iter().cloned().collect()
    }

    /// Primary style ids of attached, displayed layers, least recently used first.
    ///
    /// Feature queries are restricted to these so hidden or detached layers
    /// never answer pointer events.
    pub fn interactive_styles(&self) -> Vec<String> {
        self.lru
            .iter()
            .filter_map(|id| self.active.get(id))
            .filter(|e| e.visible)
            .map(|e| e.descriptor.primary_style_id())
            .collect()
    }

    /// Ids of layers toggled on, in registry order.
    pub fn visible_flags(&self) -> Vec<String> {
        self.registry
            .all()
            .iter()
            .filter(|l| self.wanted.contains(&l.id))
            .map(|l| l.id.clone())
            .collect()
    }

    fn attach(&mut self, desc: &LayerDescriptor, port: &mut dyn MapPort, report: &mut ScheduleReport) {
        if self.active.contains_key(&desc.id) {
            return;
        }
        if let Err(err) = add_to_surface(desc, port) {
            warn!(layer = %desc.id, error = %err, "attach failed; retrying on next settle");
            report.failed.push(desc.id.clone());
            return;
        }
        for style in desc.style_ids() {
            if let Err(err) = port.apply(&MapCommand::BindPointer { id: style.clone() }) {
                warn!(style = %style, error = %err, "pointer binding failed");
            }
        }
        self.attach_seq += 1;
        self.active.insert(
            desc.id.clone(),
            ActiveLayerEntry {
                descriptor: desc.clone(),
                attached_at: self.attach_seq,
                visible: true,
            },
        );
        self.lru.push_back(desc.id.clone());
        report.attached.push(desc.id.clone());
        info!(layer = %desc.id, seq = self.attach_seq, "layer attached");
        self.enforce_capacity(&desc.id, port, report);
    }

    fn enforce_capacity(&mut self, keep: &str, port: &mut dyn MapPort, report: &mut ScheduleReport) {
        while self.active.len() > self.capacity {
            let Some(victim) = self.lru.iter().find(|id| id.as_str() != keep).cloned() else {
                break;
            };
            debug!(layer = %victim, "evicting least recently used layer");
            self.detach(&victim, port, report);
        }
    }

    fn detach(&mut self, id: &str, port: &mut dyn MapPort, report: &mut ScheduleReport) {
        let Some(entry) = self.active.remove(id) else {
            return;
        };
        self.lru.retain(|l| l != id);
        let styles = entry.descriptor.style_ids();
        for style in &styles {
            log_port_error(port.apply(&MapCommand::UnbindPointer { id: style.clone() }));
        }
        for style in styles.iter().rev() {
            log_port_error(port.apply(&MapCommand::RemoveStyleLayer { id: style.clone() }));
        }
        log_port_error(port.apply(&MapCommand::RemoveSource { id: id.to_owned() }));
        report.detached.push(id.to_owned());
        info!(layer = id, "layer detached");
    }

    fn show(&mut self, id: &str, port: &mut dyn MapPort, report: &mut ScheduleReport) {
        if self.set_displayed(id, true, port) {
            report.shown.push(id.to_owned());
        }
    }

    fn hide(&mut self, id: &str, port: &mut dyn MapPort, report: &mut ScheduleReport) {
        if self.set_displayed(id, false, port) {
            report.hidden.push(id.to_owned());
        }
    }

    fn set_displayed(&mut self, id: &str, visible: bool, port: &mut dyn MapPort) -> bool {
        let Some(entry) = self.active.get_mut(id) else {
            return false;
        };
        if entry.visible == visible {
            return false;
        }
        entry.visible = visible;
        for style in entry.descriptor.style_ids() {
            log_port_error(port.apply(&MapCommand::SetVisibility { id: style, visible }));
        }
        true
    }

    fn touch(&mut self, id: &str) {
        if let Some(pos) = self.lru.iter().position(|l| l == id) {
            if let Some(moved) = self.lru.remove(pos) {
                self.lru.push_back(moved);
            }
        }
    }
}

/// Add source then styles; roll back whatever was added if any step fails.
fn add_to_surface(desc: &LayerDescriptor, port: &mut dyn MapPort) -> Result<(), PortError> {
    port.apply(&MapCommand::AddSource(desc.source_def()))?;
    let mut added: Vec<String> = Vec::new();
    for style in desc.style_defs() {
        let id = style.id.clone();
        if let Err(err) = port.apply(&MapCommand::AddStyleLayer(style)) {
            for done in added.iter().rev() {
                log_port_error(port.apply(&MapCommand::RemoveStyleLayer { id: done.clone() }));
            }
            log_port_error(port.apply(&MapCommand::RemoveSource {
                id: desc.id.clone(),
            }));
            return Err(err);
        }
        added.push(id);
    }
    Ok(())
}

fn log_port_error(result: Result<(), PortError>) {
    if let Err(err) = result {
        warn!(error = %err, "draw surface rejected command");
    }
}
