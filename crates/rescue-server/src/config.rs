//! Server configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use rescue_run::RunConfig;
use rescue_scenario::MapGeometry;

const DEFAULT_SCENARIO_FILE: &str = "./config/simulation_config.yaml";

/// Configuration for the rescue server.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP API listen address
    pub api_addr: SocketAddr,

    /// Directory holding map images
    pub maps_dir: PathBuf,

    /// Where the scenario of the latest run is written
    pub scenario_file: PathBuf,

    /// Hand-off directory for rendered frames
    pub buffer_dir: PathBuf,

    /// Canvas geometry shared with the viewer
    pub geometry: MapGeometry,

    /// Controller timings
    pub run: RunConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl ServerConfig {
    /// Create config from environment variables with sensible defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let api_addr = parse_or(&lookup, "RESCUE_API_ADDR", || {
            SocketAddr::from(([0, 0, 0, 0], 5000))
        });

        let maps_dir = PathBuf::from(lookup("RESCUE_MAPS_DIR").unwrap_or_else(|| "./maps".into()));
        let scenario_file = PathBuf::from(
            lookup("RESCUE_SCENARIO_FILE").unwrap_or_else(|| DEFAULT_SCENARIO_FILE.into()),
        );
        let buffer_dir = PathBuf::from(
            lookup("RESCUE_BUFFER_DIR").unwrap_or_else(|| "./animation_buffer".into()),
        );

        let defaults = RunConfig::default();
        let max_steps = parse_or(&lookup, "RESCUE_MAX_STEPS", || defaults.max_steps);
        let frame_interval_ms = parse_or(&lookup, "RESCUE_FRAME_INTERVAL_MS", || {
            defaults.frame_interval.as_millis() as u64
        });

        Self {
            api_addr,
            maps_dir,
            scenario_file,
            buffer_dir,
            geometry: MapGeometry::default(),
            run: RunConfig {
                max_steps,
                frame_interval: Duration::from_millis(frame_interval_ms),
                ..defaults
            },
        }
    }

    /// File stem the engine names its frames with.
    pub fn artifact_stem(&self) -> String {
        self.scenario_file
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("simulation_config")
            .to_string()
    }

    /// Render viewport in pixels.
    pub fn viewport(&self) -> (u32, u32) {
        (
            self.geometry.width_px.round() as u32,
            self.geometry.height_px.round() as u32,
        )
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: impl FnOnce() -> T,
) -> T {
    match lookup(key) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!("Invalid {key}={raw:?}, using default");
                default()
            }
        },
        None => default(),
    }
}
