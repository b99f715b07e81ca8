//! YAML persistence of the current scenario.
//!
//! There is exactly one scenario file; every run start overwrites it.

use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::model::ScenarioDescription;

/// The scenario file on disk.
#[derive(Debug, Clone)]
pub struct ScenarioStore {
    path: PathBuf,
}

impl ScenarioStore {
    /// Create a store backed by the given file path.
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    /// Path of the scenario file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write a default scenario if the file does not exist yet.
    pub fn ensure_exists(&self) -> Result<()> {
        if self.path.exists() {
            return Ok(());
        }
        self.save(&ScenarioDescription::default())?;
        tracing::info!("Created default scenario at {}", self.path.display());
        Ok(())
    }

    /// Load the scenario from disk.
    pub fn load(&self) -> Result<ScenarioDescription> {
        let contents = std::fs::read_to_string(&self.path)?;
        Ok(serde_yaml::from_str(&contents)?)
    }

    /// Overwrite the scenario file.
    pub fn save(&self, scenario: &ScenarioDescription) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let yaml = serde_yaml::to_string(scenario)?;
        std::fs::write(&self.path, yaml)?;
        tracing::debug!(
            robots = scenario.robots.len(),
            obstacles = scenario.obstacles.len(),
            "Saved scenario to {}",
            self.path.display()
        );
        Ok(())
    }

    /// Attach a custom attribute to a persisted robot.
    ///
    /// Returns `false` without touching the file when `index` is out of range.
    pub fn set_robot_attribute(
        &self,
        index: usize,
        name: &str,
        value: serde_yaml::Value,
    ) -> Result<bool> {
        let mut scenario = self.load()?;
        let Some(robot) = scenario.robots.get_mut(index) else {
            return Ok(false);
        };
        robot.extra.insert(name.to_string(), value);
        self.save(&scenario)?;
        Ok(true)
    }

    /// Attach a custom attribute to a persisted obstacle.
    ///
    /// Returns `false` without touching the file when `index` is out of range.
    pub fn set_obstacle_attribute(
        &self,
        index: usize,
        name: &str,
        value: serde_yaml::Value,
    ) -> Result<bool> {
        let mut scenario = self.load()?;
        let Some(obstacle) = scenario.obstacles.get_mut(index) else {
            return Ok(false);
        };
        obstacle.extra.insert(name.to_string(), value);
        self.save(&scenario)?;
        Ok(true)
    }
}
