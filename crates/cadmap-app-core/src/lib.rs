// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Shared application services for cadmap hosts (config, prefs, toasts).
//! Keeps the engine and its host adapters free of storage and UI concerns.

pub mod config;
pub mod config_port;
pub mod prefs;
pub mod toast;
