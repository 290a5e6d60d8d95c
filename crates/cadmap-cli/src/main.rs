// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Headless cadmap host.
//! Lists the layer catalog, replays scripted map sessions against the parcel
//! API, and manages saved preferences.

mod port;
mod script;

use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use cadmap_api_client::{fetch_registry, HttpParcelApi};
use cadmap_app_core::config::{ConfigService, PREFS_KEY};
use cadmap_app_core::config_port::ConfigPort;
use cadmap_app_core::prefs::MapPrefs;
use cadmap_app_core::toast::ToastSource;
use cadmap_config_fs::FsConfigStore;
use cadmap_engine::{LayerRegistry, MapSession, SessionConfig};
use cadmap_port::LngLat;
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Table};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::port::ScriptedMapPort;
use crate::script::Replayer;

const VIEWPORT: (f32, f32) = (800.0, 600.0);

#[derive(Parser, Debug)]
#[command(author, version, about = "cadmap headless host")]
struct Args {
    /// Directory holding saved preferences (defaults to the platform config dir)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,
    /// API base URL (overrides saved preferences)
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Per-request timeout in milliseconds (overrides saved preferences)
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List thematic layers with their zoom windows
    Layers {
        /// Use the builtin catalog instead of fetching it
        #[arg(long)]
        builtin: bool,
    },
    /// Replay a JSON event script and print every draw command
    Replay {
        /// Script file (JSON array of events)
        script: PathBuf,
        /// Use the builtin catalog instead of fetching it
        #[arg(long)]
        builtin: bool,
        /// Save layer toggles and camera at the end of the replay
        #[arg(long)]
        save_prefs: bool,
    },
    /// Show or reset saved preferences
    Prefs {
        #[command(subcommand)]
        action: PrefsAction,
    },
}

#[derive(Subcommand, Debug)]
enum PrefsAction {
    /// Print effective preferences as JSON
    Show,
    /// Overwrite saved preferences with defaults
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .with_writer(io::stderr)
        .init();

    let config = ConfigService::new(open_store(args.config_dir.as_deref())?);
    let mut prefs = config.load_prefs().unwrap_or_default();
    if let Some(base) = &args.base_url {
        prefs.api.base_url.clone_from(base);
    }
    if let Some(ms) = args.timeout_ms {
        prefs.api.request_timeout_ms = ms;
    }

    match args.command {
        Command::Layers { builtin } => list_layers(&prefs, builtin).await,
        Command::Prefs {
            action: PrefsAction::Show,
        } => {
            let json = serde_json::to_string_pretty(&prefs)?;
            writeln!(io::stdout().lock(), "{json}")?;
            Ok(())
        }
        Command::Prefs {
            action: PrefsAction::Reset,
        } => {
            config
                .save(PREFS_KEY, &MapPrefs::default())
                .context("resetting preferences")?;
            writeln!(io::stdout().lock(), "preferences reset")?;
            Ok(())
        }
        Command::Replay {
            script,
            builtin,
            save_prefs,
        } => {
            let text = std::fs::read_to_string(&script)
                .with_context(|| format!("reading {}", script.display()))?;
            let events = script::parse(&text)?;
            let exported = replay(&prefs, events, builtin).await?;
            if save_prefs {
                config
                    .save(PREFS_KEY, &exported)
                    .context("saving preferences")?;
            }
            Ok(())
        }
    }
}

fn open_store(dir: Option<&Path>) -> Result<FsConfigStore> {
    let store = match dir {
        Some(dir) => FsConfigStore::at(dir),
        None => FsConfigStore::new(),
    };
    store.context("opening config directory")
}

fn client(prefs: &MapPrefs) -> Result<HttpParcelApi> {
    HttpParcelApi::new(
        &prefs.api.base_url,
        Duration::from_millis(prefs.api.request_timeout_ms),
    )
    .with_context(|| format!("invalid base url {}", prefs.api.base_url))
}

async fn list_layers(prefs: &MapPrefs, builtin: bool) -> Result<()> {
    let registry = if builtin {
        LayerRegistry::builtin(&prefs.api.base_url)
    } else {
        let api = client(prefs)?;
        fetch_registry(&api, &prefs.api.base_url)
            .await
            .context("fetching layer catalog")?
    };
    let mut table = Table::new();
    table.load_preset(UTF8_FULL).set_header(vec![
        "id",
        "label",
        "geometry",
        "zoom",
        "category",
        "selectable",
    ]);
    for layer in registry.all() {
        table.add_row(vec![
            layer.id.clone(),
            layer.label.clone(),
            format!("{:?}", layer.geometry).to_lowercase(),
            format!("{}-{}", layer.zoom_min, layer.zoom_max),
            layer.category_attribute.clone().unwrap_or_default(),
            if layer.selectable { "yes" } else { "" }.to_owned(),
        ]);
    }
    writeln!(io::stdout().lock(), "{table}")?;
    Ok(())
}

async fn replay(prefs: &MapPrefs, events: Vec<script::ScriptEvent>, builtin: bool) -> Result<MapPrefs> {
    let api = client(prefs)?;
    let base = prefs.api.base_url.as_str();
    let (registry, catalog_error) = if builtin {
        (LayerRegistry::builtin(base), None)
    } else {
        match fetch_registry(&api, base).await {
            Ok(registry) => (registry, None),
            Err(err) => {
                warn!(error = %err, "catalog unavailable, using builtin layers");
                (LayerRegistry::builtin(base), Some(err.to_string()))
            }
        }
    };
    info!(layers = registry.len(), "registry ready");

    let [lng, lat] = prefs.camera.center;
    let port = ScriptedMapPort::new(io::stdout(), LngLat::new(lng, lat), prefs.camera.zoom, VIEWPORT);
    let mut session = MapSession::new(port, registry, SessionConfig::from_prefs(prefs));
    let start = Instant::now();
    if let Some(detail) = catalog_error {
        session.report_error(ToastSource::Layers, "Layer catalog unavailable", detail, start);
    }

    let summary = Replayer::new(&mut session, &api, start).run(events).await?;
    let json = serde_json::to_string_pretty(&summary)?;
    writeln!(io::stdout().lock(), "{json}")?;
    Ok(session.export_prefs(prefs))
}
