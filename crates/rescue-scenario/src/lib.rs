//! Rescue Scenario
//!
//! Translates a viewer's on-screen scenario (map, robot start, survivor
//! markers, all in pixels) into the physically-scaled description consumed by
//! the simulation engine, and persists that description as YAML.
//!
//! # Coordinate frames
//!
//! The viewer draws with the origin at the top-left corner and `y` growing
//! downward. The engine works in meters with the origin at the bottom-left
//! corner and `y` growing upward:
//!
//! ```text
//! physical_x = pixel_x / scale
//! physical_y = (map_height_px - pixel_y) / scale
//! ```
//!
//! # Goal assignment
//!
//! Every robot is sent to the same goal: the first survivor, or its own start
//! when there are no survivors. Survivors beyond the first are only static
//! obstacles and are never visited.
//!
//! # Example
//!
//! ```
//! use rescue_scenario::{PixelPoint, ScenarioBuilder};
//!
//! let builder = ScenarioBuilder::default();
//! let scenario = builder
//!     .build(
//!         "arena.png",
//!         1,
//!         PixelPoint::new(100.0, 500.0),
//!         &[PixelPoint::new(400.0, 100.0)],
//!     )
//!     .unwrap();
//!
//! assert_eq!(scenario.robots[0].state.x, 1.0);
//! assert_eq!(scenario.robots[0].goal.y, 5.0);
//! ```

mod builder;
mod error;
mod model;
mod store;

pub use builder::{
    MapGeometry, PixelPoint, ScenarioBuilder, ScenarioRequest, DEFAULT_MAX_ROBOTS,
    DEFAULT_MAX_SURVIVORS,
};
pub use error::{Error, Result};
pub use model::{
    Behavior, CollisionPolicy, Kinematics, ObstacleSpec, Pose, RobotSpec, ScenarioDescription,
    Shape, WorldSpec, ROBOT_PALETTE,
};
pub use store::ScenarioStore;
