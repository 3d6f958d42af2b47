use crate::config::VehicleConfig;
use bevy::prelude::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub fn label(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlTuning {
    pub move_speed: f32,
    pub reverse_speed_factor: f32,
    pub rotation_speed: f32,
    /// Per-tick multiplier on angular velocity.
    pub angular_damping: f32,
    pub max_speed: f32,
}

impl Default for ControlTuning {
    fn default() -> Self {
        Self {
            move_speed: 0.2,
            reverse_speed_factor: 0.5,
            rotation_speed: 0.05,
            angular_damping: 0.9,
            max_speed: 5.0,
        }
    }
}

impl From<&VehicleConfig> for ControlTuning {
    fn from(vehicle: &VehicleConfig) -> Self {
        Self {
            move_speed: vehicle.move_speed,
            reverse_speed_factor: vehicle.reverse_speed_factor,
            rotation_speed: vehicle.rotation_speed,
            angular_damping: vehicle.angular_damping,
            max_speed: vehicle.max_speed,
        }
    }
}

/// Result of one logical tick: what to hand to the physics engine and the corrected velocity.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ControlStep {
    pub force: Vec3,
    pub torque: Vec3,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
}

pub fn apply_control(
    direction: Option<Direction>,
    tuning: &ControlTuning,
    orientation: Quat,
    linear_velocity: Vec3,
    angular_velocity: Vec3,
) -> ControlStep {
    let (force, torque) = control_force(direction, tuning, orientation);

    ControlStep {
        force,
        torque,
        linear_velocity: clamp_linear_speed(linear_velocity, tuning.max_speed),
        angular_velocity: damp_angular_velocity(angular_velocity, tuning.angular_damping),
    }
}

/// Force in world space and torque about world Y for the active direction.
///
/// Drive forces are authored in the car's local frame (nose along -Z) and rotated by the current
/// orientation; turning never adds translation.
pub fn control_force(
    direction: Option<Direction>,
    tuning: &ControlTuning,
    orientation: Quat,
) -> (Vec3, Vec3) {
    match direction {
        Some(Direction::Up) => (
            orientation * Vec3::new(0.0, 0.0, -tuning.move_speed),
            Vec3::ZERO,
        ),
        Some(Direction::Down) => (
            orientation * Vec3::new(0.0, 0.0, tuning.move_speed * tuning.reverse_speed_factor),
            Vec3::ZERO,
        ),
        Some(Direction::Left) => (Vec3::ZERO, Vec3::Y * tuning.rotation_speed),
        Some(Direction::Right) => (Vec3::ZERO, Vec3::NEG_Y * tuning.rotation_speed),
        None => (Vec3::ZERO, Vec3::ZERO),
    }
}

pub fn damp_angular_velocity(angular_velocity: Vec3, factor: f32) -> Vec3 {
    angular_velocity * factor
}

pub fn clamp_linear_speed(linear_velocity: Vec3, max_speed: f32) -> Vec3 {
    linear_velocity.clamp_length_max(max_speed.max(0.0))
}

/// Gates logical updates to a minimum interval of wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickThrottle {
    interval_s: f64,
    last_tick_s: Option<f64>,
}

impl TickThrottle {
    pub fn new(interval_s: f32) -> Self {
        Self {
            interval_s: f64::from(interval_s.max(0.0)),
            last_tick_s: None,
        }
    }

    pub fn reset(&mut self) {
        self.last_tick_s = None;
    }

    /// The first call after construction or reset always ticks.
    pub fn should_tick(&mut self, now_s: f64) -> bool {
        if let Some(last_tick_s) = self.last_tick_s {
            if now_s - last_tick_s < self.interval_s {
                return false;
            }
        }

        self.last_tick_s = Some(now_s);
        true
    }
}

impl Default for TickThrottle {
    fn default() -> Self {
        Self::new(0.016)
    }
}
