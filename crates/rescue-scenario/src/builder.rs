//! Pixel-space scenario requests to physically-scaled scenario descriptions.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::model::{
    Behavior, Kinematics, ObstacleSpec, Pose, RobotSpec, ScenarioDescription, Shape, WorldSpec,
    ROBOT_PALETTE,
};

/// A point on the viewer's canvas, origin top-left, `y` down.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PixelPoint {
    pub x: f64,
    pub y: f64,
}

impl PixelPoint {
    /// Create a pixel point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl TryFrom<&Value> for PixelPoint {
    type Error = Error;

    /// Accepts `{"x": .., "y": ..}` where each coordinate is a JSON number or
    /// a numeric string.
    fn try_from(value: &Value) -> Result<Self> {
        let object = value
            .as_object()
            .ok_or_else(|| Error::InvalidInput(format!("expected {{x, y}} object, got {value}")))?;

        let coord = |axis: &str| -> Result<f64> {
            let raw = object
                .get(axis)
                .ok_or_else(|| Error::InvalidInput(format!("missing coordinate '{axis}'")))?;
            let parsed = match raw {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            match parsed {
                Some(v) if v.is_finite() => Ok(v),
                _ => Err(Error::InvalidInput(format!(
                    "coordinate '{axis}' is not numeric: {raw}"
                ))),
            }
        };

        Ok(Self::new(coord("x")?, coord("y")?))
    }
}

/// Start-run request as sent by the viewer.
///
/// Coordinates are kept loosely typed so that malformed input is reported as
/// [`Error::InvalidInput`] rather than a generic decoding failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ScenarioRequest {
    pub map_name: Option<String>,
    #[serde(default)]
    pub robot_count: Option<Value>,
    #[serde(default)]
    pub robot_position: Option<Value>,
    #[serde(default)]
    pub survivors: Vec<Value>,
}

/// Pixel dimensions of the map canvas and its pixels-per-meter ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapGeometry {
    /// Pixels per meter
    pub scale: f64,
    pub width_px: f64,
    pub height_px: f64,
}

impl Default for MapGeometry {
    fn default() -> Self {
        Self {
            scale: 100.0,
            width_px: 800.0,
            height_px: 600.0,
        }
    }
}

impl MapGeometry {
    /// Convert a canvas point to world coordinates in meters.
    pub fn to_world(&self, point: PixelPoint) -> (f64, f64) {
        (point.x / self.scale, (self.height_px - point.y) / self.scale)
    }

    /// Convert world coordinates back to a canvas point.
    pub fn to_pixels(&self, x: f64, y: f64) -> PixelPoint {
        PixelPoint::new(x * self.scale, self.height_px - y * self.scale)
    }

    /// World width in meters.
    pub fn world_width(&self) -> f64 {
        self.width_px / self.scale
    }

    /// World height in meters.
    pub fn world_height(&self) -> f64 {
        self.height_px / self.scale
    }
}

/// Most robots a single scenario may hold.
pub const DEFAULT_MAX_ROBOTS: usize = 50;

/// Most survivors a single scenario may hold.
pub const DEFAULT_MAX_SURVIVORS: usize = 200;

/// Builds [`ScenarioDescription`]s from viewer input.
#[derive(Debug, Clone)]
pub struct ScenarioBuilder {
    geometry: MapGeometry,
    robot_radius: f64,
    survivor_radius: f64,
    step_time: f64,
    max_robots: usize,
    max_survivors: usize,
}

impl Default for ScenarioBuilder {
    fn default() -> Self {
        Self::new(MapGeometry::default())
    }
}

impl ScenarioBuilder {
    /// Create a builder for the given canvas geometry.
    pub fn new(geometry: MapGeometry) -> Self {
        Self {
            geometry,
            robot_radius: 0.15,
            survivor_radius: 0.1,
            step_time: 0.1,
            max_robots: DEFAULT_MAX_ROBOTS,
            max_survivors: DEFAULT_MAX_SURVIVORS,
        }
    }

    /// Override the robot and survivor limits.
    pub fn with_limits(mut self, max_robots: usize, max_survivors: usize) -> Self {
        self.max_robots = max_robots;
        self.max_survivors = max_survivors;
        self
    }

    /// Canvas geometry used for the transform.
    pub fn geometry(&self) -> MapGeometry {
        self.geometry
    }

    /// Validate a raw request and build its scenario.
    pub fn build_request(&self, request: &ScenarioRequest) -> Result<ScenarioDescription> {
        let map_name = request
            .map_name
            .as_deref()
            .ok_or_else(|| Error::InvalidInput("map_name is required".into()))?;

        let robot_count = match &request.robot_count {
            None | Some(Value::Null) => 1,
            Some(raw) => parse_count(raw)?,
        };

        let start = request
            .robot_position
            .as_ref()
            .ok_or_else(|| Error::InvalidInput("robot_position is required".into()))
            .and_then(PixelPoint::try_from)?;

        let survivors = request
            .survivors
            .iter()
            .map(PixelPoint::try_from)
            .collect::<Result<Vec<_>>>()?;

        self.build(map_name, robot_count, start, &survivors)
    }

    /// Build a scenario.
    ///
    /// All robots start at `robot_start` and share one goal: the first
    /// survivor, or their own start when `survivors` is empty. Every survivor
    /// also becomes a static obstacle.
    pub fn build(
        &self,
        map_name: &str,
        robot_count: usize,
        robot_start: PixelPoint,
        survivors: &[PixelPoint],
    ) -> Result<ScenarioDescription> {
        if map_name.trim().is_empty() {
            return Err(Error::InvalidInput("map_name must not be empty".into()));
        }
        if robot_count < 1 {
            return Err(Error::InvalidInput("robot_count must be at least 1".into()));
        }
        if robot_count > self.max_robots {
            return Err(Error::InvalidInput(format!(
                "robot_count must be at most {}, got {robot_count}",
                self.max_robots
            )));
        }
        if survivors.len() > self.max_survivors {
            return Err(Error::InvalidInput(format!(
                "at most {} survivors are supported, got {}",
                self.max_survivors,
                survivors.len()
            )));
        }
        for point in std::iter::once(&robot_start).chain(survivors) {
            if !point.x.is_finite() || !point.y.is_finite() {
                return Err(Error::InvalidInput(format!(
                    "non-numeric coordinate ({}, {})",
                    point.x, point.y
                )));
            }
        }

        let (start_x, start_y) = self.geometry.to_world(robot_start);
        let (goal_x, goal_y) = survivors
            .first()
            .map(|p| self.geometry.to_world(*p))
            .unwrap_or((start_x, start_y));

        let robots = (0..robot_count)
            .map(|i| RobotSpec {
                kinematics: Kinematics::Diff,
                shape: Shape::Circle {
                    radius: self.robot_radius,
                },
                state: Pose::new(start_x, start_y, 0.0),
                goal: Pose::new(goal_x, goal_y, 0.0),
                behavior: Behavior::Dash,
                color: ROBOT_PALETTE[i % ROBOT_PALETTE.len()].to_string(),
                extra: BTreeMap::new(),
            })
            .collect();

        let obstacles = survivors
            .iter()
            .map(|p| {
                let (x, y) = self.geometry.to_world(*p);
                ObstacleSpec {
                    shape: Shape::Circle {
                        radius: self.survivor_radius,
                    },
                    state: Pose::new(x, y, 0.0),
                    extra: BTreeMap::new(),
                }
            })
            .collect();

        let world = WorldSpec {
            height: self.geometry.world_height(),
            width: self.geometry.world_width(),
            step_time: self.step_time,
            sample_time: self.step_time,
            obstacle_map: Some(map_name.to_string()),
            save_ani: true,
            ..WorldSpec::default()
        };

        tracing::debug!(
            map = map_name,
            robots = robot_count,
            survivors = survivors.len(),
            "Built scenario"
        );

        Ok(ScenarioDescription {
            world,
            robots,
            obstacles,
        })
    }
}

fn parse_count(raw: &Value) -> Result<usize> {
    let count = match raw {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
    .ok_or_else(|| Error::InvalidInput(format!("robot_count is not an integer: {raw}")))?;

    usize::try_from(count)
        .ok()
        .filter(|c| *c >= 1)
        .ok_or_else(|| Error::InvalidInput(format!("robot_count must be at least 1, got {count}")))
}
