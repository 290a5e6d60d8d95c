// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Replay of scripted map events through a [`MapSession`].
//!
//! A script is a JSON array of events tagged by `event`. Times are
//! milliseconds from the start of the replay; events without one reuse the
//! latest time seen. REST work queued by an event is dispatched and fed back
//! before the next event runs.

use std::io::Write;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use cadmap_api_client::{dispatch, ParcelApi};
use cadmap_engine::{ApiRequest, MapSession, ParcelRef, SpatialUnit};
use cadmap_port::{FeatureKey, LngLat, MapPort, RenderedFeature, ScreenPoint};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::port::ScriptedMapPort;

/// One scripted input.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ScriptEvent {
    /// Camera frame; settles after the quiet period.
    Camera {
        zoom: f64,
        #[serde(default)]
        center: Option<[f64; 2]>,
        at_ms: u64,
    },
    /// Advance the clock and run due work.
    Tick { at_ms: u64 },
    /// Settle immediately at an integer zoom.
    Settle { zoom: u8 },
    /// User layer toggle.
    Toggle { layer: String, on: bool },
    /// Make a feature visible to queries.
    Render {
        style: String,
        #[serde(default)]
        source: Option<String>,
        #[serde(default)]
        id: Option<u64>,
        #[serde(default)]
        at: Option<[f32; 2]>,
        #[serde(default)]
        properties: Map<String, Value>,
        #[serde(default)]
        geometry: Option<Value>,
    },
    /// Drop every scripted feature.
    ClearRendered,
    /// Surface finished rendering: refresh categorical styles.
    Rendered,
    /// Pointer moved over the map.
    Pointer { at: [f32; 2] },
    /// Pointer left the map.
    PointerLeft,
    /// Click at a screen position.
    Click { at: [f32; 2] },
    /// Click a parcel by reference, bypassing hit testing.
    ClickParcel {
        section: String,
        number: String,
        #[serde(default)]
        municipality: String,
    },
    /// Enter or leave builder mode.
    Builder { on: bool },
    /// Name the unit being built.
    Name {
        #[serde(default)]
        name: Option<String>,
    },
    /// Resolve the collected parcels into a unit.
    Confirm,
    /// Drop the current selection.
    Cancel,
    /// Leave the map view.
    Leave,
}

/// Parse a script file body.
pub fn parse(text: &str) -> Result<Vec<ScriptEvent>> {
    serde_json::from_str(text).context("parsing replay script")
}

/// State at the end of a replay.
#[derive(Debug, Serialize)]
pub struct ReplaySummary {
    /// Final selection state name.
    pub state: &'static str,
    /// Attached layer ids.
    pub attached: Vec<String>,
    /// Resolved unit, if any.
    pub unit: Option<SpatialUnit>,
    /// Titles of toasts still visible.
    pub toasts: Vec<String>,
    /// Requests dispatched during the replay.
    pub requests: usize,
}

/// Drives one session through a script.
pub struct Replayer<'a, A, W: Write> {
    session: &'a mut MapSession<ScriptedMapPort<W>>,
    api: &'a A,
    start: Instant,
    now: Instant,
    requests: usize,
}

impl<'a, A, W> Replayer<'a, A, W>
where
    A: ParcelApi + Sync,
    W: Write + Send,
{
    /// Replay against `session`, with `start` as time zero.
    pub fn new(session: &'a mut MapSession<ScriptedMapPort<W>>, api: &'a A, start: Instant) -> Self {
        Self {
            session,
            api,
            start,
            now: start,
            requests: 0,
        }
    }

    /// Run every event, then summarize.
    pub async fn run(mut self, events: Vec<ScriptEvent>) -> Result<ReplaySummary> {
        for (index, event) in events.into_iter().enumerate() {
            debug!(index, ?event, "replaying");
            self.step(event)?;
            self.drain().await?;
        }
        let toasts = self
            .session
            .visible_toasts(self.now)
            .into_iter()
            .map(|t| match t.body {
                Some(body) => format!("{}: {body}", t.title),
                None => t.title,
            })
            .collect();
        Ok(ReplaySummary {
            state: self.session.selection().state().name(),
            attached: self.session.scheduler().attached_ids(),
            unit: self.session.selection().unit().cloned(),
            toasts,
            requests: self.requests,
        })
    }

    fn note(&mut self, line: &str) -> Result<()> {
        self.session
            .port_mut()
            .note(line)
            .context("writing replay output")
    }

    fn step(&mut self, event: ScriptEvent) -> Result<()> {
        match event {
            ScriptEvent::Camera { zoom, center, at_ms } => {
                self.now = self.start + Duration::from_millis(at_ms);
                let center = center.map(|[lng, lat]| LngLat::new(lng, lat));
                self.session.port_mut().set_camera(center, zoom);
                self.session.camera_moved(zoom, self.now);
            }
            ScriptEvent::Tick { at_ms } => {
                self.now = self.start + Duration::from_millis(at_ms);
                if let Some(report) = self.session.tick(self.now) {
                    self.note(&format!(
                        "settled: attached={:?} detached={:?}",
                        report.attached, report.detached
                    ))?;
                }
            }
            ScriptEvent::Settle { zoom } => {
                let report = self.session.on_viewport_settled(zoom, self.now);
                self.note(&format!(
                    "settled: attached={:?} detached={:?}",
                    report.attached, report.detached
                ))?;
            }
            ScriptEvent::Toggle { layer, on } => {
                if let Err(err) = self.session.set_layer_visible(&layer, on, self.now) {
                    self.note(&format!("toggle rejected: {err}"))?;
                }
            }
            ScriptEvent::Render {
                style,
                source,
                id,
                at,
                properties,
                geometry,
            } => {
                let source = source.unwrap_or_else(|| source_of(&style).to_owned());
                let key = id.map(|id| FeatureKey::new(source.clone(), source, id));
                let at = at.map(|[x, y]| ScreenPoint::new(x, y));
                self.session.port_mut().render(
                    at,
                    RenderedFeature {
                        key,
                        style,
                        properties,
                        geometry,
                    },
                );
            }
            ScriptEvent::ClearRendered => self.session.port_mut().clear_rendered(),
            ScriptEvent::Rendered => {
                let rebuilt = self.session.on_features_rendered();
                if !rebuilt.is_empty() {
                    self.note(&format!("restyled: {rebuilt:?}"))?;
                }
            }
            ScriptEvent::Pointer { at: [x, y] } => {
                self.session.pointer_moved(ScreenPoint::new(x, y));
            }
            ScriptEvent::PointerLeft => self.session.pointer_left(),
            ScriptEvent::Click { at: [x, y] } => {
                let point = ScreenPoint::new(x, y);
                let lnglat = self.session.port().unproject(point);
                match self.session.click(point, self.now) {
                    Ok(true) => {}
                    Ok(false) => self.note(&format!(
                        "no parcel at {:.5},{:.5}",
                        lnglat.lng, lnglat.lat
                    ))?,
                    Err(err) => self.note(&format!("rejected: {}", err.reason_code()))?,
                }
            }
            ScriptEvent::ClickParcel {
                section,
                number,
                municipality,
            } => {
                let parcel = ParcelRef::new(&section, &number, &municipality);
                if let Err(err) = self.session.click_parcel(parcel, self.now) {
                    self.note(&format!("rejected: {}", err.reason_code()))?;
                }
            }
            ScriptEvent::Builder { on } => self.session.set_builder_mode(on),
            ScriptEvent::Name { name } => self.session.set_unit_name(name.as_deref()),
            ScriptEvent::Confirm => {
                if let Err(err) = self.session.confirm(self.now) {
                    self.note(&format!("rejected: {}", err.reason_code()))?;
                }
            }
            ScriptEvent::Cancel => self.session.cancel(),
            ScriptEvent::Leave => {
                let detached = self.session.navigate_away();
                self.note(&format!("left map: detached={detached:?}"))?;
            }
        }
        let state = self.session.selection().state().name();
        self.note(&format!("state: {state}"))
    }

    async fn drain(&mut self) -> Result<()> {
        loop {
            let requests = self.session.take_requests();
            if requests.is_empty() {
                return Ok(());
            }
            for request in requests {
                self.requests += 1;
                self.note(&format!("request: {}", describe(&request)))?;
                let response = dispatch(self.api, request).await;
                if let Err(err) = self.session.on_api_response(response, self.now) {
                    self.note(&format!("failed: {}", err.reason_code()))?;
                }
            }
        }
    }
}

fn source_of(style: &str) -> &str {
    style.rsplit_once('-').map_or(style, |(source, _)| source)
}

fn describe(request: &ApiRequest) -> String {
    match request {
        ApiRequest::Zoning { token, parcel } => {
            format!("#{token} zoning {}{}", parcel.section, parcel.number)
        }
        ApiRequest::Union { token, request } => {
            format!("#{token} union of {} parcels", request.parcels.len())
        }
        ApiRequest::UnitZoning { token, request } => {
            format!("#{token} unit zoning of {} parcels", request.parcels.len())
        }
    }
}
