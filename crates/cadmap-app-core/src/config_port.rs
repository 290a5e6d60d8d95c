// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Config port shared across cadmap hosts (CLI, webview bridge).

use crate::prefs::MapPrefs;

/// Config-facing port for loading/saving map preferences.
pub trait ConfigPort {
    /// Load map preferences (returns None if missing or unreadable).
    fn load_prefs(&self) -> Option<MapPrefs>;
    /// Persist map preferences (best-effort; impl may log errors internally).
    fn save_prefs(&self, prefs: &MapPrefs);
}
