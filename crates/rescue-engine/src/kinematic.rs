//! Built-in kinematic engine.
//!
//! Robots steer straight for their goal under bounded linear and angular
//! speed. Contact is resolved by refusing any move that deepens an overlap
//! the collision policy cares about; the robot simply holds its pose for that
//! tick. A robot has arrived once its footprint comes within
//! `goal_threshold` of the goal point, which lets robots reach survivors that
//! are themselves obstacles. Arrived robots stop moving and no longer block
//! other robots.

use std::f64::consts::PI;
use std::path::PathBuf;

use image::{Rgba, RgbaImage};
use rescue_scenario::{CollisionPolicy, Kinematics, Pose, ScenarioDescription, WorldSpec};

use crate::artifact::ArtifactBuffer;
use crate::error::{EngineError, Result};
use crate::render::{self, Canvas};
use crate::{EngineFactory, SimulationEngine};

/// Speed limits and arrival tolerance shared by all robots.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionLimits {
    /// Meters per second
    pub max_linear: f64,
    /// Radians per second
    pub max_angular: f64,
    /// Meters between footprint edge and goal point
    pub goal_threshold: f64,
}

impl Default for MotionLimits {
    fn default() -> Self {
        Self {
            max_linear: 1.0,
            max_angular: 1.0,
            goal_threshold: 0.1,
        }
    }
}

/// Builds [`KinematicEngine`]s, resolving background maps from a directory.
#[derive(Debug, Clone)]
pub struct KinematicEngineFactory {
    maps_dir: PathBuf,
    viewport: (u32, u32),
    limits: MotionLimits,
}

impl KinematicEngineFactory {
    /// Create a factory rendering frames of `viewport` pixels.
    pub fn new<P: Into<PathBuf>>(maps_dir: P, viewport: (u32, u32)) -> Self {
        Self {
            maps_dir: maps_dir.into(),
            viewport,
            limits: MotionLimits::default(),
        }
    }

    /// Override the motion limits.
    pub fn with_limits(mut self, limits: MotionLimits) -> Self {
        self.limits = limits;
        self
    }

    fn load_background(&self, world: &WorldSpec) -> Result<Option<RgbaImage>> {
        let Some(name) = world.obstacle_map.as_deref() else {
            return Ok(None);
        };
        let path = self.maps_dir.join(name);
        if !path.exists() {
            tracing::warn!("Map not found at {}, rendering without background", path.display());
            return Ok(None);
        }
        let map = image::open(&path)?;
        let (w, h) = self.viewport;
        Ok(Some(render::fit_background(map, w, h)))
    }
}

impl EngineFactory for KinematicEngineFactory {
    fn create(
        &self,
        scenario: &ScenarioDescription,
        buffer: &ArtifactBuffer,
    ) -> Result<Box<dyn SimulationEngine>> {
        let engine = KinematicEngine::new(scenario, buffer.clone(), self.viewport, self.limits)?
            .with_background(self.load_background(&scenario.world)?);
        Ok(Box::new(engine))
    }
}

struct Body {
    pose: Pose,
    goal: Pose,
    radius: f64,
    kinematics: Kinematics,
    color: Rgba<u8>,
    arrived: bool,
}

/// Kinematic simulation of robots dashing toward their goals.
pub struct KinematicEngine {
    world: WorldSpec,
    robots: Vec<Body>,
    obstacles: Vec<(Pose, f64)>,
    background: Option<RgbaImage>,
    viewport: (u32, u32),
    buffer: ArtifactBuffer,
    limits: MotionLimits,
    renders: u64,
    ticks: u64,
    ended: bool,
}

impl KinematicEngine {
    /// Build an engine for a scenario.
    pub fn new(
        scenario: &ScenarioDescription,
        buffer: ArtifactBuffer,
        viewport: (u32, u32),
        limits: MotionLimits,
    ) -> Result<Self> {
        let world = scenario.world.clone();
        if !(world.width > 0.0 && world.height > 0.0) {
            return Err(EngineError::InvalidScenario(format!(
                "world must have positive size, got {}x{}",
                world.width, world.height
            )));
        }
        if !(world.step_time > 0.0) {
            return Err(EngineError::InvalidScenario(format!(
                "step_time must be positive, got {}",
                world.step_time
            )));
        }
        if viewport.0 == 0 || viewport.1 == 0 {
            return Err(EngineError::InvalidScenario("empty viewport".into()));
        }
        if scenario.robots.is_empty() {
            return Err(EngineError::InvalidScenario("scenario has no robots".into()));
        }

        let robots = scenario
            .robots
            .iter()
            .enumerate()
            .map(|(i, spec)| {
                let color = render::parse_color(&spec.color).ok_or_else(|| {
                    EngineError::InvalidScenario(format!(
                        "robot {i} has invalid color '{}'",
                        spec.color
                    ))
                })?;
                let mut body = Body {
                    pose: spec.state,
                    goal: spec.goal,
                    radius: spec.shape.radius(),
                    kinematics: spec.kinematics,
                    color,
                    arrived: false,
                };
                body.arrived = reached(&body, &body.pose, &limits);
                Ok(body)
            })
            .collect::<Result<Vec<_>>>()?;

        let obstacles = scenario
            .obstacles
            .iter()
            .map(|o| (o.state, o.shape.radius()))
            .collect();

        tracing::debug!(
            robots = scenario.robots.len(),
            obstacles = scenario.obstacles.len(),
            "Kinematic engine ready"
        );

        Ok(Self {
            world,
            robots,
            obstacles,
            background: None,
            viewport,
            buffer,
            limits,
            renders: 0,
            ticks: 0,
            ended: false,
        })
    }

    /// Draw frames over the given background.
    pub fn with_background(mut self, background: Option<RgbaImage>) -> Self {
        self.background = background;
        self
    }

    /// Current robot poses, in scenario order.
    pub fn robot_poses(&self) -> Vec<Pose> {
        self.robots.iter().map(|r| r.pose).collect()
    }

    /// Ticks simulated so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    fn propose(&self, body: &Body) -> Pose {
        let dt = self.world.step_time;
        let (dx, dy) = (body.goal.x - body.pose.x, body.goal.y - body.pose.y);
        let distance = dx.hypot(dy);
        let bearing = dy.atan2(dx);

        match body.kinematics {
            Kinematics::Diff => {
                let error = wrap_angle(bearing - body.pose.theta);
                let omega = (error / dt).clamp(-self.limits.max_angular, self.limits.max_angular);
                let speed = (self.limits.max_linear * error.cos().max(0.0)).min(distance / dt);
                let theta = wrap_angle(body.pose.theta + omega * dt);
                Pose::new(
                    body.pose.x + speed * theta.cos() * dt,
                    body.pose.y + speed * theta.sin() * dt,
                    theta,
                )
            }
            Kinematics::Omni => {
                let speed = self.limits.max_linear.min(distance / dt);
                Pose::new(
                    body.pose.x + speed * bearing.cos() * dt,
                    body.pose.y + speed * bearing.sin() * dt,
                    body.pose.theta,
                )
            }
        }
    }

    fn blocked(&self, index: usize, candidate: &Pose) -> bool {
        let policy = self.world.collision_mode;
        if policy == CollisionPolicy::UnobstructedObstacles {
            return false;
        }

        let body = &self.robots[index];
        let deepens = |before: f64, after: f64| after > 0.0 && after > before;

        let [ox, oy] = self.world.offset;
        let bounds = |p: &Pose| {
            [
                body.radius - (p.x - ox),
                (p.x - ox) + body.radius - self.world.width,
                body.radius - (p.y - oy),
                (p.y - oy) + body.radius - self.world.height,
            ]
            .into_iter()
            .fold(0.0, f64::max)
        };
        if deepens(bounds(&body.pose), bounds(candidate)) {
            return true;
        }

        let overlap = |p: &Pose, other: &Pose, other_radius: f64| {
            body.radius + other_radius - p.distance_to(other)
        };

        let hits_obstacle = self.obstacles.iter().any(|(pose, radius)| {
            deepens(overlap(&body.pose, pose, *radius), overlap(candidate, pose, *radius))
        });
        if hits_obstacle {
            return true;
        }

        policy == CollisionPolicy::Stop
            && self.robots.iter().enumerate().any(|(j, other)| {
                j != index
                    && !other.arrived
                    && deepens(
                        overlap(&body.pose, &other.pose, other.radius),
                        overlap(candidate, &other.pose, other.radius),
                    )
            })
    }
}

impl SimulationEngine for KinematicEngine {
    fn step(&mut self) -> Result<()> {
        if self.ended {
            return Err(EngineError::Ended);
        }

        for i in 0..self.robots.len() {
            if self.robots[i].arrived {
                continue;
            }
            let candidate = self.propose(&self.robots[i]);
            let arriving = reached(&self.robots[i], &candidate, &self.limits);
            if !arriving && self.blocked(i, &candidate) {
                continue;
            }
            let robot = &mut self.robots[i];
            robot.pose = candidate;
            robot.arrived = arriving;
        }

        self.ticks += 1;
        Ok(())
    }

    fn render(&mut self) -> Result<()> {
        if self.ended {
            return Err(EngineError::Ended);
        }

        let [ox, oy] = self.world.offset;
        let mut canvas = Canvas::new(
            self.background.as_ref(),
            self.viewport,
            (self.world.width, self.world.height),
        );

        for (pose, radius) in &self.obstacles {
            canvas.fill_circle(pose.x - ox, pose.y - oy, *radius, render::SURVIVOR);
        }
        for robot in &self.robots {
            canvas.ring(robot.goal.x - ox, robot.goal.y - oy, robot.radius, 2.0, render::GOAL);
        }
        for robot in &self.robots {
            let (x, y) = (robot.pose.x - ox, robot.pose.y - oy);
            canvas.fill_circle(x, y, robot.radius, robot.color);
            let tip = (
                x + robot.radius * robot.pose.theta.cos(),
                y + robot.radius * robot.pose.theta.sin(),
            );
            canvas.line((x, y), tip, render::HEADING);
        }

        let png = canvas.encode_png()?;
        let path = self.buffer.publish(self.renders, &png)?;
        tracing::trace!(render = self.renders, "Published {}", path.display());
        self.renders += 1;
        Ok(())
    }

    fn done(&self) -> bool {
        self.robots.iter().all(|r| r.arrived)
    }

    fn end(&mut self) {
        if !self.ended {
            self.ended = true;
            self.background = None;
            tracing::debug!(ticks = self.ticks, renders = self.renders, "Kinematic engine ended");
        }
    }
}

fn reached(body: &Body, at: &Pose, limits: &MotionLimits) -> bool {
    at.distance_to(&body.goal) <= body.radius + limits.goal_threshold
}

fn wrap_angle(angle: f64) -> f64 {
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    if wrapped <= -PI {
        wrapped + 2.0 * PI
    } else {
        wrapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rescue_scenario::{PixelPoint, ScenarioBuilder};

    fn arena(survivors: &[PixelPoint]) -> ScenarioDescription {
        ScenarioBuilder::default()
            .build("arena.png", 1, PixelPoint::new(100.0, 500.0), survivors)
            .unwrap()
    }

    fn engine(scenario: &ScenarioDescription, dir: &std::path::Path) -> KinematicEngine {
        let buffer = ArtifactBuffer::new(dir, "frame");
        buffer.prepare().unwrap();
        KinematicEngine::new(scenario, buffer, (80, 60), MotionLimits::default()).unwrap()
    }

    fn run_until_done(engine: &mut KinematicEngine, limit: u64) -> bool {
        for _ in 0..limit {
            engine.step().unwrap();
            if engine.done() {
                return true;
            }
        }
        false
    }

    #[test]
    fn wraps_angles_into_half_open_range() {
        assert!((wrap_angle(3.0 * PI / 2.0) + PI / 2.0).abs() < 1e-12);
        assert!((wrap_angle(-3.0 * PI / 2.0) - PI / 2.0).abs() < 1e-12);
        assert!((wrap_angle(PI) - PI).abs() < 1e-12);
        assert!((wrap_angle(-PI) - PI).abs() < 1e-12);
    }

    #[test]
    fn robot_reaches_survivor() {
        let dir = tempfile::tempdir().unwrap();
        let scenario = arena(&[PixelPoint::new(400.0, 100.0)]);
        let mut engine = engine(&scenario, dir.path());

        assert!(!engine.done());
        assert!(run_until_done(&mut engine, 200));

        let pose = engine.robot_poses()[0];
        assert!(pose.distance_to(&Pose::new(4.0, 5.0, 0.0)) <= 0.25 + 1e-9);
    }

    #[test]
    fn degenerate_goal_is_done_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine(&arena(&[]), dir.path());

        assert!(engine.done());
        engine.step().unwrap();
        assert_eq!(engine.robot_poses()[0], Pose::new(1.0, 1.0, 0.0));
    }

    #[test]
    fn obstacle_in_path_blocks_under_stop_policy() {
        let dir = tempfile::tempdir().unwrap();
        let mut scenario = arena(&[PixelPoint::new(400.0, 500.0)]);
        // Wall of obstacles between start (1, 1) and goal (4, 1)
        for y in [0.6, 0.8, 1.0, 1.2, 1.4] {
            scenario.obstacles.push(rescue_scenario::ObstacleSpec {
                shape: rescue_scenario::Shape::Circle { radius: 0.1 },
                state: Pose::new(2.5, y, 0.0),
                extra: Default::default(),
            });
        }
        let mut engine = engine(&scenario, dir.path());

        assert!(!run_until_done(&mut engine, 300));
        let pose = engine.robot_poses()[0];
        assert!(pose.x < 2.5);
        assert!(pose.distance_to(&Pose::new(2.5, 1.0, 0.0)) >= 0.25 - 1e-9);
    }

    #[test]
    fn unobstructed_obstacles_passes_through() {
        let dir = tempfile::tempdir().unwrap();
        let mut scenario = arena(&[PixelPoint::new(400.0, 500.0)]);
        scenario.world.collision_mode = CollisionPolicy::UnobstructedObstacles;
        scenario.obstacles.push(rescue_scenario::ObstacleSpec {
            shape: rescue_scenario::Shape::Circle { radius: 0.3 },
            state: Pose::new(2.5, 1.0, 0.0),
            extra: Default::default(),
        });
        let mut engine = engine(&scenario, dir.path());

        assert!(run_until_done(&mut engine, 200));
    }

    #[test]
    fn stacked_robots_all_arrive() {
        let dir = tempfile::tempdir().unwrap();
        let scenario = ScenarioBuilder::default()
            .build(
                "arena.png",
                3,
                PixelPoint::new(100.0, 500.0),
                &[PixelPoint::new(300.0, 500.0)],
            )
            .unwrap();
        let mut engine = engine(&scenario, dir.path());

        assert!(run_until_done(&mut engine, 200));
    }

    #[test]
    fn renders_are_published_in_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let scenario = arena(&[PixelPoint::new(400.0, 100.0)]);
        let mut engine = engine(&scenario, dir.path());
        let buffer = ArtifactBuffer::new(dir.path(), "frame");

        for i in 0..3 {
            engine.step().unwrap();
            engine.render().unwrap();
            let png = buffer.take(i).unwrap().expect("artifact published");
            assert_eq!(&png[..4], b"\x89PNG");
        }
        assert_eq!(buffer.pending().unwrap(), 0);
    }

    #[test]
    fn ended_engine_refuses_work() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = engine(&arena(&[]), dir.path());

        engine.end();
        engine.end();
        assert!(matches!(engine.step(), Err(EngineError::Ended)));
        assert!(matches!(engine.render(), Err(EngineError::Ended)));
    }

    #[test]
    fn factory_rejects_bad_scenarios() {
        let dir = tempfile::tempdir().unwrap();
        let factory = KinematicEngineFactory::new(dir.path(), (80, 60));
        let buffer = ArtifactBuffer::new(dir.path().join("buf"), "frame");

        let mut bad_color = arena(&[]);
        bad_color.robots[0].color = "teal".into();
        assert!(matches!(
            factory.create(&bad_color, &buffer),
            Err(EngineError::InvalidScenario(_))
        ));

        let mut empty = arena(&[]);
        empty.robots.clear();
        assert!(matches!(
            factory.create(&empty, &buffer),
            Err(EngineError::InvalidScenario(_))
        ));

        std::fs::write(dir.path().join("arena.png"), b"not a png").unwrap();
        assert!(matches!(
            factory.create(&arena(&[]), &buffer),
            Err(EngineError::Image(_))
        ));
    }

    #[test]
    fn factory_tolerates_missing_map_and_loads_real_one() {
        let dir = tempfile::tempdir().unwrap();
        let factory = KinematicEngineFactory::new(dir.path(), (80, 60));
        let buffer = ArtifactBuffer::new(dir.path().join("buf"), "frame");
        buffer.prepare().unwrap();

        assert!(factory.create(&arena(&[]), &buffer).is_ok());

        RgbaImage::from_pixel(40, 30, Rgba([0, 128, 0, 255]))
            .save(dir.path().join("arena.png"))
            .unwrap();
        let mut engine = factory.create(&arena(&[]), &buffer).unwrap();
        engine.step().unwrap();
        engine.render().unwrap();
        assert!(buffer.take(0).unwrap().is_some());
    }
}
