//! The shared orientation: integrator on the coordinator, conversion on
//! every renderer.
//!
//! Angles are degrees and velocities degrees per second. Every node turns
//! the broadcast Euler triple into a quaternion with [`Orientation::rotation`],
//! and every node must use the same composition order or physically adjacent
//! displays stop lining up.

use crate::error::CoreError;
use nalgebra::{Quaternion, UnitQuaternion};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One rotation axis of the shared pose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Axis {
    Yaw,
    Pitch,
    Roll,
}

impl Axis {
    /// All axes, in storage order.
    pub const ALL: [Axis; 3] = [Axis::Yaw, Axis::Pitch, Axis::Roll];

    fn index(self) -> usize {
        match self {
            Axis::Yaw => 0,
            Axis::Pitch => 1,
            Axis::Roll => 2,
        }
    }

    /// Returns the wire name.
    pub fn name(&self) -> &'static str {
        match self {
            Axis::Yaw => "yaw",
            Axis::Pitch => "pitch",
            Axis::Roll => "roll",
        }
    }
}

impl std::str::FromStr for Axis {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "yaw" => Ok(Axis::Yaw),
            "pitch" => Ok(Axis::Pitch),
            "roll" => Ok(Axis::Roll),
            other => Err(CoreError::invalid_argument(
                "pose",
                format!("unknown axis '{}'", other),
            )),
        }
    }
}

/// Operator command on one axis.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PoseCommand {
    /// Zero the axis angle and velocity
    Reset(Axis),
    /// Set the axis velocity (deg/s) until reset or replaced
    Level(Axis, f64),
}

/// A yaw/pitch/roll triple in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Orientation {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl Orientation {
    pub fn new(yaw: f64, pitch: f64, roll: f64) -> Self {
        Self { yaw, pitch, roll }
    }

    /// Converts to a rotation with yaw outermost, roll in the middle and
    /// pitch innermost: `q = q_yaw * q_roll * q_pitch`, where yaw turns
    /// about +Y, pitch about +X and roll about +Z.
    ///
    /// The product is written out from half-angle sines and cosines so every
    /// node evaluates exactly the same floating point expression.
    pub fn rotation(&self) -> UnitQuaternion<f64> {
        let (sy, cy) = (self.yaw.to_radians() * 0.5).sin_cos();
        let (sp, cp) = (self.pitch.to_radians() * 0.5).sin_cos();
        let (sr, cr) = (self.roll.to_radians() * 0.5).sin_cos();

        let w = cy * cr * cp - sy * sr * sp;
        let x = cy * cr * sp + sy * sr * cp;
        let y = sy * cr * cp + cy * sr * sp;
        let z = cy * sr * cp - sy * cr * sp;

        // Product of unit quaternions is already unit length
        UnitQuaternion::new_unchecked(Quaternion::new(w, x, y, z))
    }
}

/// Angles and angular velocities integrated by the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PoseState {
    angles: [f64; 3],
    velocities: [f64; 3],
}

impl PoseState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies an operator command.
    pub fn apply(&mut self, command: PoseCommand) {
        match command {
            PoseCommand::Reset(axis) => {
                self.angles[axis.index()] = 0.0;
                self.velocities[axis.index()] = 0.0;
            }
            PoseCommand::Level(axis, value) => {
                self.velocities[axis.index()] = value;
            }
        }
    }

    /// Advances every axis by `velocity * dt`.
    pub fn integrate(&mut self, dt: Duration) {
        let dt = dt.as_secs_f64();
        for i in 0..3 {
            self.angles[i] += self.velocities[i] * dt;
        }
    }

    pub fn angle(&self, axis: Axis) -> f64 {
        self.angles[axis.index()]
    }

    pub fn velocity(&self, axis: Axis) -> f64 {
        self.velocities[axis.index()]
    }

    /// Current angles as an orientation.
    pub fn orientation(&self) -> Orientation {
        Orientation::new(self.angles[0], self.angles[1], self.angles[2])
    }
}
