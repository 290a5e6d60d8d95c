// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
#![allow(missing_docs)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
//! End-to-end checks of the `cadmap` binary. None of them reach the network:
//! the base URL points at a closed local port and catalogs come from the
//! builtin set.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const OFFLINE: &str = "http://127.0.0.1:9";

fn cadmap(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("cadmap").unwrap();
    cmd.arg("--config-dir").arg(config).arg("--base-url").arg(OFFLINE);
    cmd
}

#[test]
fn builtin_layers_are_listed() {
    let dir = TempDir::new().unwrap();
    cadmap(dir.path())
        .args(["layers", "--builtin"])
        .assert()
        .success()
        .stdout(predicate::str::contains("parcelles"))
        .stdout(predicate::str::contains("zonage_plu"))
        .stdout(predicate::str::contains("14-19"))
        .stdout(predicate::str::contains("typezone"));
}

#[test]
fn unreachable_catalog_fails_layer_listing() {
    let dir = TempDir::new().unwrap();
    cadmap(dir.path())
        .args(["--timeout-ms", "500", "layers"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("fetching layer catalog"));
}

#[test]
fn prefs_show_prints_defaults_with_overrides() {
    let dir = TempDir::new().unwrap();
    cadmap(dir.path())
        .args(["prefs", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"capacity\": 5"))
        .stdout(predicate::str::contains(OFFLINE));
}

#[test]
fn prefs_reset_writes_defaults() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("map_prefs.json"), r#"{"layers":{"capacity":2}}"#).unwrap();
    cadmap(dir.path())
        .args(["prefs", "reset"])
        .assert()
        .success()
        .stdout(predicate::str::contains("preferences reset"));
    let saved = fs::read_to_string(dir.path().join("map_prefs.json")).unwrap();
    assert!(saved.contains("\"capacity\": 5"));
}

#[test]
fn replay_schedules_layers_and_rejects_mixed_units() {
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("script.json");
    fs::write(
        &script,
        r#"[
            {"event": "settle", "zoom": 15},
            {"event": "toggle", "layer": "batiments", "on": true},
            {"event": "toggle", "layer": "nowhere", "on": true},
            {"event": "builder", "on": true},
            {"event": "click_parcel", "section": "AB", "number": "12", "municipality": "33063"},
            {"event": "click_parcel", "section": "AC", "number": "7", "municipality": "33281"},
            {"event": "confirm"}
        ]"#,
    )
    .unwrap();
    cadmap(dir.path())
        .arg("replay")
        .arg(&script)
        .arg("--builtin")
        .arg("--save-prefs")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""op":"add_source","id":"parcelles""#))
        .stdout(predicate::str::contains(r#""op":"add_source","id":"batiments""#))
        .stdout(predicate::str::contains("toggle rejected: unknown layer: nowhere"))
        .stdout(predicate::str::contains("rejected: mixed_municipalities"))
        .stdout(predicate::str::contains(r#""state": "accumulating""#))
        .stdout(predicate::str::contains(r#""requests": 0"#));

    let saved = fs::read_to_string(dir.path().join("map_prefs.json")).unwrap();
    assert!(saved.contains("batiments"));
}

#[test]
fn malformed_scripts_are_reported() {
    let dir = TempDir::new().unwrap();
    let script = dir.path().join("bad.json");
    fs::write(&script, r#"[{"event": "teleport"}]"#).unwrap();
    cadmap(dir.path())
        .arg("replay")
        .arg(&script)
        .arg("--builtin")
        .assert()
        .failure()
        .stderr(predicate::str::contains("parsing replay script"));
}
