//! Shared state and the server entry point.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use rescue_engine::{ArtifactBuffer, EngineFactory, KinematicEngineFactory};
use rescue_run::RunRegistry;
use rescue_scenario::{ScenarioBuilder, ScenarioStore};

use crate::api;
use crate::config::ServerConfig;
use crate::error::Result;

/// Shared application state.
pub struct AppState {
    maps_dir: PathBuf,
    builder: ScenarioBuilder,
    store: ScenarioStore,
    registry: RunRegistry,
}

impl AppState {
    pub fn new(config: &ServerConfig, factory: Arc<dyn EngineFactory>) -> Self {
        let buffer = ArtifactBuffer::new(&config.buffer_dir, config.artifact_stem());
        Self {
            maps_dir: config.maps_dir.clone(),
            builder: ScenarioBuilder::new(config.geometry),
            store: ScenarioStore::new(&config.scenario_file),
            registry: RunRegistry::new(factory, buffer, config.run.clone()),
        }
    }

    pub fn maps_dir(&self) -> &Path {
        &self.maps_dir
    }

    pub fn builder(&self) -> &ScenarioBuilder {
        &self.builder
    }

    pub fn store(&self) -> &ScenarioStore {
        &self.store
    }

    pub fn registry(&self) -> &RunRegistry {
        &self.registry
    }
}

/// Rescue simulation server.
pub struct RescueServer {
    config: ServerConfig,
    state: Arc<AppState>,
}

impl RescueServer {
    /// Create a server that runs the built-in kinematic engine.
    pub fn new(config: ServerConfig) -> Self {
        let factory = KinematicEngineFactory::new(&config.maps_dir, config.viewport());
        Self::with_factory(config, Arc::new(factory))
    }

    /// Create a server that builds engines with `factory`.
    pub fn with_factory(config: ServerConfig, factory: Arc<dyn EngineFactory>) -> Self {
        let state = Arc::new(AppState::new(&config, factory));
        Self { config, state }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Build the router for the server.
    pub fn router(&self) -> Router {
        api::build_router(self.state.clone())
    }

    /// Create the working directories and the default scenario file.
    pub fn prepare(&self) -> Result<()> {
        std::fs::create_dir_all(&self.config.maps_dir)?;
        std::fs::create_dir_all(&self.config.buffer_dir)?;
        self.state.store.ensure_exists()?;
        Ok(())
    }

    /// Serve until Ctrl-C, then stop any active run.
    pub async fn serve(self) -> Result<()> {
        self.prepare()?;

        let listener = tokio::net::TcpListener::bind(self.config.api_addr).await?;
        tracing::info!("Rescue server listening on http://{}", listener.local_addr()?);

        self.serve_on(listener, ctrl_c()).await
    }

    /// Serve on `listener` until `signal` resolves.
    ///
    /// The active run is stopped as soon as the signal fires, so open event
    /// streams (including a paused one) end and graceful shutdown can drain.
    pub async fn serve_on<F>(self, listener: tokio::net::TcpListener, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let state = self.state.clone();
        let shutdown = async move {
            signal.await;
            tracing::info!("Shutting down");
            if let Ok(outcome) = state.registry().stop().await {
                tracing::info!(?outcome, "Stopped active run on shutdown");
            }
        };

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown)
            .await?;
        Ok(())
    }
}

async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}

/// Fixtures shared by the server tests.
#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use rescue_run::{ArtifactWait, RunConfig};
    use rescue_scenario::MapGeometry;
    use std::time::Duration;

    pub fn test_config(dir: &Path, max_steps: u64) -> ServerConfig {
        ServerConfig {
            api_addr: "127.0.0.1:0".parse().unwrap(),
            maps_dir: dir.join("maps"),
            scenario_file: dir.join("config/simulation_config.yaml"),
            buffer_dir: dir.join("animation_buffer"),
            geometry: MapGeometry::default(),
            run: RunConfig {
                max_steps,
                pause_poll: Duration::from_millis(5),
                frame_interval: Duration::ZERO,
                artifact_wait: ArtifactWait {
                    poll: Duration::from_millis(1),
                    attempts: 3,
                },
                handoff_poll: Duration::from_millis(1),
                channel_capacity: 1,
            },
        }
    }

    /// Server over a temporary directory, with its directories created.
    pub fn test_server(dir: &Path, max_steps: u64) -> RescueServer {
        let server = RescueServer::new(test_config(dir, max_steps));
        server.prepare().unwrap();
        server
    }

    pub fn test_state(dir: &Path) -> Arc<AppState> {
        let config = test_config(dir, 3000);
        std::fs::create_dir_all(&config.maps_dir).unwrap();
        let factory = KinematicEngineFactory::new(&config.maps_dir, config.viewport());
        Arc::new(AppState::new(&config, Arc::new(factory)))
    }
}
