//! Configuration types for simulation.
//!
//! This module provides configuration types that control how the simulation
//! runs: timestep, gravity and the contact solver's tuning knobs.

use crate::dynamics::Gravity;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Main configuration for a simulation.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SimulationConfig {
    /// Fixed timestep used by `Stepper::step` (seconds).
    pub timestep: f64,
    /// Gravity configuration.
    pub gravity: Gravity,
    /// Contact solver configuration.
    pub solver: SolverConfig,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            timestep: 1.0 / 60.0,
            gravity: Gravity::standard(),
            solver: SolverConfig::default(),
        }
    }
}

impl SimulationConfig {
    /// Create a new simulation config with the given timestep.
    #[must_use]
    pub fn with_timestep(timestep: f64) -> Self {
        Self {
            timestep,
            ..Default::default()
        }
    }

    /// Configuration for real-time simulation (60 Hz).
    #[must_use]
    pub fn realtime() -> Self {
        Self::default()
    }

    /// Configuration for high-fidelity simulation (1000 Hz).
    #[must_use]
    pub fn high_fidelity() -> Self {
        Self {
            timestep: 1.0 / 1000.0,
            ..Default::default()
        }
    }

    /// Configuration for fast, low-fidelity simulation (30 Hz).
    #[must_use]
    pub fn fast() -> Self {
        Self {
            timestep: 1.0 / 30.0,
            ..Default::default()
        }
    }

    /// Set the gravity.
    #[must_use]
    pub fn gravity(mut self, gravity: Gravity) -> Self {
        self.gravity = gravity;
        self
    }

    /// Disable gravity.
    #[must_use]
    pub fn zero_gravity(mut self) -> Self {
        self.gravity = Gravity::zero();
        self
    }

    /// Set the solver configuration.
    #[must_use]
    pub fn solver(mut self, solver: SolverConfig) -> Self {
        self.solver = solver;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> crate::Result<()> {
        validate_timestep(self.timestep)?;

        if self.timestep > 1.0 {
            return Err(crate::SimError::invalid_config(
                "timestep > 1 second is likely an error",
            ));
        }

        if !self.gravity.acceleration.iter().all(|x| x.is_finite()) {
            return Err(crate::SimError::invalid_config("gravity must be finite"));
        }

        self.solver.validate()
    }

    /// Get the frequency in Hz.
    #[must_use]
    pub fn frequency(&self) -> f64 {
        1.0 / self.timestep
    }
}

/// Check that a tick length is positive and finite.
pub fn validate_timestep(dt: f64) -> crate::Result<()> {
    if !dt.is_finite() || dt <= 0.0 {
        return Err(crate::SimError::InvalidTimestep(dt));
    }
    Ok(())
}

/// Configuration for narrowphase thresholds and contact response.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SolverConfig {
    /// How the two bodies' elasticities combine into one restitution.
    pub restitution_combine: CombineRule,
    /// How the two bodies' friction coefficients combine.
    pub friction_combine: CombineRule,
    /// Relative displacement per tick below which motion is negligible.
    ///
    /// Also the contact slop added to the summed radii in that case.
    pub velocity_epsilon: f64,
    /// Margin added to each body's swept bounds in the broadphase.
    ///
    /// Must be at least `velocity_epsilon`, otherwise a near-touching pair
    /// the narrowphase would accept could be pruned.
    pub broad_phase_margin: f64,
    /// Push penetrating bodies apart along the contact gap after the impulse.
    ///
    /// On by default. A one-shot projection per contact, not an iterative
    /// resting-contact solver; disable it for the bare impulse response.
    pub position_correction: bool,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            restitution_combine: CombineRule::Multiply,
            friction_combine: CombineRule::Multiply,
            velocity_epsilon: 0.001,
            broad_phase_margin: 0.01,
            position_correction: true,
        }
    }
}

impl SolverConfig {
    /// Set both combine rules.
    #[must_use]
    pub fn with_combine_rules(mut self, restitution: CombineRule, friction: CombineRule) -> Self {
        self.restitution_combine = restitution;
        self.friction_combine = friction;
        self
    }

    /// Enable or disable positional correction.
    #[must_use]
    pub fn with_position_correction(mut self, enable: bool) -> Self {
        self.position_correction = enable;
        self
    }

    /// Validate the solver configuration.
    pub fn validate(&self) -> crate::Result<()> {
        if !self.velocity_epsilon.is_finite() || self.velocity_epsilon <= 0.0 {
            return Err(crate::SimError::invalid_config(
                "velocity_epsilon must be positive",
            ));
        }
        if !self.broad_phase_margin.is_finite() || self.broad_phase_margin < self.velocity_epsilon
        {
            return Err(crate::SimError::invalid_config(
                "broad_phase_margin must be finite and at least velocity_epsilon",
            ));
        }
        Ok(())
    }
}

/// Rule for merging a per-body coefficient into a per-contact coefficient.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CombineRule {
    /// `a * b`. Either surface at zero wins.
    #[default]
    Multiply,
    /// `(a + b) / 2`.
    Average,
    /// `min(a, b)`.
    Min,
    /// `max(a, b)`.
    Max,
    /// `sqrt(a * b)`.
    GeometricMean,
}

impl CombineRule {
    /// Combine two coefficients.
    #[must_use]
    pub fn combine(self, a: f64, b: f64) -> f64 {
        match self {
            Self::Multiply => a * b,
            Self::Average => 0.5 * (a + b),
            Self::Min => a.min(b),
            Self::Max => a.max(b),
            Self::GeometricMean => (a * b).sqrt(),
        }
    }
}
