// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Hover and selection feedback on the draw surface.
//!
//! At most one feature carries the hover state at any time. The selection is
//! shown through the filter of the selectable layer's `-selected` style, so it
//! survives tile reloads and is re-applied when that layer is re-attached.

use cadmap_port::{FeatureKey, MapCommand, MapPort, FEATURE_STATE_HOVER};
use serde_json::{json, Value};
use tracing::debug;

use crate::parcel::{ParcelRef, PROP_NUMBER, PROP_SECTION};

/// Set of parcels drawn as selected.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionFilter {
    parcels: Vec<(String, String)>,
}

impl SelectionFilter {
    /// Filter matching nothing.
    pub fn none() -> Self {
        Self::default()
    }

    /// Filter matching the given parcels.
    pub fn parcels<'a>(parcels: impl IntoIterator<Item = &'a ParcelRef>) -> Self {
        Self {
            parcels: parcels
                .into_iter()
                .map(|p| (p.section.clone(), p.number.clone()))
                .collect(),
        }
    }

    /// True when nothing is selected.
    pub fn is_empty(&self) -> bool {
        self.parcels.is_empty()
    }

    /// Number of selected parcels.
    pub fn len(&self) -> usize {
        self.parcels.len()
    }

    /// Style filter expression; `["any"]` (matches nothing) when empty.
    pub fn to_expression(&self) -> Value {
        let mut expr = vec![json!("any")];
        for (section, number) in &self.parcels {
            expr.push(json!([
                "all",
                ["==", ["get", PROP_SECTION], section],
                ["==", ["to-string", ["get", PROP_NUMBER]], number]
            ]));
        }
        Value::Array(expr)
    }
}

/// Owns the hover and selection state pushed to the draw surface.
#[derive(Debug, Clone, Default)]
pub struct FeatureHighlighter {
    selection_style: Option<String>,
    hovered: Option<FeatureKey>,
    selected: SelectionFilter,
}

impl FeatureHighlighter {
    /// Highlighter drawing the selection through `selection_style`, if any.
    pub fn new(selection_style: Option<String>) -> Self {
        Self {
            selection_style,
            ..Self::default()
        }
    }

    /// Currently hovered feature.
    pub fn hovered(&self) -> Option<&FeatureKey> {
        self.hovered.as_ref()
    }

    /// Currently drawn selection.
    pub fn selected(&self) -> &SelectionFilter {
        &self.selected
    }

    /// Move the hover state. Returns false when `key` is already hovered.
    ///
    /// The previous feature is cleared before the next one is marked, so two
    /// features are never hovered at once.
    pub fn set_hover(&mut self, key: Option<FeatureKey>, port: &mut dyn MapPort) -> bool {
        if self.hovered == key {
            return false;
        }
        if let Some(prev) = self.hovered.take() {
            mark(port, prev, false);
        }
        if let Some(next) = key.clone() {
            mark(port, next, true);
        }
        self.hovered = key;
        true
    }

    /// Replace the drawn selection.
    pub fn set_selected(&mut self, filter: SelectionFilter, port: &mut dyn MapPort) {
        self.selected = filter;
        self.reapply(port);
    }

    /// Push the current selection filter again (after the layer re-attaches).
    pub fn reapply(&self, port: &mut dyn MapPort) {
        let Some(style) = &self.selection_style else {
            return;
        };
        let cmd = MapCommand::SetFilter {
            id: style.clone(),
            filter: self.selected.to_expression(),
        };
        if let Err(err) = port.apply(&cmd) {
            // Layer not attached; the filter is pushed again on attach.
            debug!(style = %style, error = %err, "selection filter deferred");
        }
    }

    /// Drop hover state for a source that left the surface.
    pub fn forget_source(&mut self, source: &str) {
        if self.hovered.as_ref().is_some_and(|k| k.source == source) {
            self.hovered = None;
        }
    }

    /// Clear hover and selection.
    pub fn clear(&mut self, port: &mut dyn MapPort) {
        self.set_hover(None, port);
        self.set_selected(SelectionFilter::none(), port);
    }
}

fn mark(port: &mut dyn MapPort, feature: FeatureKey, value: bool) {
    let cmd = MapCommand::SetFeatureState {
        feature,
        key: FEATURE_STATE_HOVER.to_owned(),
        value,
    };
    if let Err(err) = port.apply(&cmd) {
        debug!(error = %err, "hover state not applied");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cadmap_port::{FeatureQuery, LngLat, PortError, RenderedFeature, ScreenPoint};

    #[derive(Default)]
    struct Log(Vec<MapCommand>);

    impl MapPort for Log {
        fn apply(&mut self, command: &MapCommand) -> Result<(), PortError> {
            self.0.push(command.clone());
            Ok(())
        }
        fn query_rendered(&self, _: &FeatureQuery) -> Vec<RenderedFeature> {
            Vec::new()
        }
        fn project(&self, _: LngLat) -> ScreenPoint {
            ScreenPoint::default()
        }
        fn unproject(&self, _: ScreenPoint) -> LngLat {
            LngLat::default()
        }
        fn viewport_center(&self) -> ScreenPoint {
            ScreenPoint::default()
        }
    }

    fn hover_cmds(log: &Log) -> Vec<(u64, bool)> {
        log.0
            .iter()
            .filter_map(|c| match c {
                MapCommand::SetFeatureState { feature, value, .. } => Some((feature.id, *value)),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn hover_moves_clear_previous_first() {
        let mut log = Log::default();
        let mut hl = FeatureHighlighter::new(None);
        let a = FeatureKey::new("parcelles", "parcelles", 1);
        let b = FeatureKey::new("parcelles", "parcelles", 2);
        assert!(hl.set_hover(Some(a.clone()), &mut log));
        assert!(!hl.set_hover(Some(a), &mut log));
        assert!(hl.set_hover(Some(b), &mut log));
        assert!(hl.set_hover(None, &mut log));
        assert_eq!(hover_cmds(&log), vec![(1, true), (1, false), (2, true), (2, false)]);
        assert!(hl.hovered().is_none());
    }

    #[test]
    fn empty_selection_matches_nothing() {
        assert_eq!(SelectionFilter::none().to_expression(), json!(["any"]));
        let p = ParcelRef::new("AC", "12", "33063");
        let expr = SelectionFilter::parcels([&p]).to_expression();
        assert_eq!(
            expr,
            json!(["any", ["all",
                ["==", ["get", "section"], "AC"],
                ["==", ["to-string", ["get", "numero"]], "12"]]])
        );
    }

    #[test]
    fn selection_goes_through_the_selected_style() {
        let mut log = Log::default();
        let mut hl = FeatureHighlighter::new(Some("parcelles-selected".into()));
        let p = ParcelRef::new("AC", "12", "33063");
        hl.set_selected(SelectionFilter::parcels([&p]), &mut log);
        assert!(matches!(
            log.0.last(),
            Some(MapCommand::SetFilter { id, .. }) if id == "parcelles-selected"
        ));
        hl.clear(&mut log);
        assert!(hl.selected().is_empty());
    }

    #[test]
    fn forgetting_a_source_drops_its_hover() {
        let mut log = Log::default();
        let mut hl = FeatureHighlighter::new(None);
        hl.set_hover(Some(FeatureKey::new("batiments", "batiments", 7)), &mut log);
        hl.forget_source("parcelles");
        assert!(hl.hovered().is_some());
        hl.forget_source("batiments");
        assert!(hl.hovered().is_none());
    }
}
