//! Scenario description handed to the simulation engine.
//!
//! The serialized layout follows the engine's YAML schema: a `world` section,
//! a `robot` list and an `obstacle` list, with poses written as
//! `[x, y, theta]` triples.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Display colors assigned to robots in order, wrapping around.
pub const ROBOT_PALETTE: [&str; 10] = [
    "#00d9ff", // cyan
    "#00ff88", // green
    "#ff6b00", // orange
    "#ff00ff", // magenta
    "#ffff00", // yellow
    "#00ffff", // cyan
    "#ff0088", // pink
    "#88ff00", // lime
    "#0088ff", // blue
    "#ff8800", // orange
];

/// A planar pose in meters and radians.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct Pose {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

impl Pose {
    /// Create a pose.
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self { x, y, theta }
    }

    /// Euclidean distance between the positions of two poses.
    pub fn distance_to(&self, other: &Pose) -> f64 {
        (other.x - self.x).hypot(other.y - self.y)
    }
}

impl From<[f64; 3]> for Pose {
    fn from([x, y, theta]: [f64; 3]) -> Self {
        Self { x, y, theta }
    }
}

impl From<Pose> for [f64; 3] {
    fn from(pose: Pose) -> Self {
        [pose.x, pose.y, pose.theta]
    }
}

/// How the engine reacts to contact between bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// Bodies never move into contact
    #[default]
    Stop,
    /// Robots pass through each other but not through obstacles
    Unobstructed,
    /// Robots pass through everything
    UnobstructedObstacles,
}

/// World bounds and timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorldSpec {
    /// World height in meters
    pub height: f64,
    /// World width in meters
    pub width: f64,
    /// Integration step in seconds
    pub step_time: f64,
    /// Render/sample period in seconds
    pub sample_time: f64,
    /// Offset of the world origin
    pub offset: [f64; 2],
    pub collision_mode: CollisionPolicy,
    /// Background map file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub obstacle_map: Option<String>,
    /// Whether the engine writes a render artifact per step
    #[serde(default)]
    pub save_ani: bool,
}

impl Default for WorldSpec {
    fn default() -> Self {
        Self {
            height: 6.0,
            width: 8.0,
            step_time: 0.1,
            sample_time: 0.1,
            offset: [0.0, 0.0],
            collision_mode: CollisionPolicy::Stop,
            obstacle_map: None,
            save_ani: false,
        }
    }
}

/// Motion model of a robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Kinematics {
    /// Differential drive
    Diff,
    /// Omnidirectional
    Omni,
}

/// Steering behavior of a robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Behavior {
    /// Head straight for the goal
    Dash,
}

/// Geometric footprint of a body.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Shape {
    Circle { radius: f64 },
}

impl Shape {
    /// Radius of the bounding circle.
    pub fn radius(&self) -> f64 {
        match self {
            Shape::Circle { radius } => *radius,
        }
    }
}

/// A robot agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotSpec {
    pub kinematics: Kinematics,
    pub shape: Shape,
    /// Initial pose
    pub state: Pose,
    pub goal: Pose,
    pub behavior: Behavior,
    /// Display color as `#rrggbb`
    pub color: String,
    /// Custom attributes attached after the scenario was built
    #[serde(flatten, default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// A static obstacle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObstacleSpec {
    pub shape: Shape,
    pub state: Pose,
    #[serde(flatten, default, skip_serializing_if = "BTreeMap::is_empty")]
    pub extra: BTreeMap<String, serde_yaml::Value>,
}

/// Physically-scaled scenario consumed by the simulation engine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ScenarioDescription {
    pub world: WorldSpec,
    #[serde(rename = "robot", default)]
    pub robots: Vec<RobotSpec>,
    #[serde(rename = "obstacle", default)]
    pub obstacles: Vec<ObstacleSpec>,
}

impl ScenarioDescription {
    /// Number of robots in the scenario.
    pub fn robot_count(&self) -> usize {
        self.robots.len()
    }

    /// Background map file name, if any.
    pub fn map_name(&self) -> Option<&str> {
        self.world.obstacle_map.as_deref()
    }
}
