//! Simulation world container and entity management.
//!
//! The [`World`] owns everything a tick touches: the shape arena, the body
//! arena and the presentation sinks. Bodies refer to shapes and sinks by
//! handle. Arenas only grow, so a handle stays valid for the world's
//! lifetime and a body's [`BodyId`] is also its index in
//! [`bodies`](World::bodies).

use hashbrown::HashMap;
use impulse_types::{BodyId, ShapeId, SimError, SimulationConfig, SinkId};
use nalgebra::{Matrix4, Point3, Vector3};

use crate::body::{Body, BodyDesc};
use crate::math;
use crate::presentation::TransformSink;
use crate::shape::Shape;

/// The simulation world containing all entities.
#[derive(Debug)]
pub struct World {
    /// Simulation configuration.
    config: SimulationConfig,
    /// Current simulation time.
    time: f64,
    /// Step counter.
    step_count: u64,
    /// Shape arena.
    shapes: Vec<Shape>,
    /// Body arena, indexed by `BodyId`.
    bodies: Vec<Body>,
    /// Presentation sinks, indexed by `SinkId`.
    sinks: Vec<Box<dyn TransformSink>>,
    /// Body name to ID mapping.
    body_names: HashMap<String, BodyId>,
}

impl Default for World {
    fn default() -> Self {
        Self::new(SimulationConfig::default())
    }
}

impl World {
    /// Create a new empty world with the given configuration.
    #[must_use]
    pub fn new(config: SimulationConfig) -> Self {
        Self {
            config,
            time: 0.0,
            step_count: 0,
            shapes: Vec::new(),
            bodies: Vec::new(),
            sinks: Vec::new(),
            body_names: HashMap::new(),
        }
    }

    /// Get the simulation configuration.
    #[must_use]
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Replace the simulation configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid; the old one is kept.
    pub fn set_config(&mut self, config: SimulationConfig) -> impulse_types::Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    /// Get the current simulation time.
    #[must_use]
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Get the step count.
    #[must_use]
    pub fn step_count(&self) -> u64 {
        self.step_count
    }

    /// Get the timestep from configuration.
    #[must_use]
    pub fn timestep(&self) -> f64 {
        self.config.timestep
    }

    /// Get the number of bodies.
    #[must_use]
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// Get the number of shapes.
    #[must_use]
    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    // =========================================================================
    // Shapes and Sinks
    // =========================================================================

    /// Add a shape and return its handle.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidShape`] for a degenerate shape.
    pub fn add_shape(&mut self, shape: impl Into<Shape>) -> impulse_types::Result<ShapeId> {
        let shape = shape.into();
        shape.validate()?;

        let id = ShapeId::new(self.shapes.len());
        self.shapes.push(shape);
        Ok(id)
    }

    /// Get a shape by handle.
    #[must_use]
    pub fn shape(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.get(id.index())
    }

    /// All shapes, indexed by `ShapeId`.
    #[must_use]
    pub fn shapes(&self) -> &[Shape] {
        &self.shapes
    }

    /// Hand a presentation sink to the world and return its handle.
    pub fn add_sink(&mut self, sink: impl TransformSink + 'static) -> SinkId {
        let id = SinkId::new(self.sinks.len());
        self.sinks.push(Box::new(sink));
        id
    }

    /// Get the number of sinks.
    #[must_use]
    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    // =========================================================================
    // Body Management
    // =========================================================================

    /// Create a body from its description and return its ID.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The shape or sink handle does not resolve
    /// - The name is already taken
    /// - The description is invalid (see [`BodyDesc::validate`])
    pub fn add_body(&mut self, desc: BodyDesc) -> impulse_types::Result<BodyId> {
        let shape = self
            .shapes
            .get(desc.shape.index())
            .ok_or(SimError::InvalidShapeId(desc.shape.index()))?;

        if let Some(sink) = desc.sink {
            if sink.index() >= self.sinks.len() {
                return Err(SimError::InvalidSinkId(sink.index()));
            }
        }

        if let Some(name) = &desc.name {
            if self.body_names.contains_key(name) {
                return Err(SimError::invalid_config(format!(
                    "body name '{name}' already in use"
                )));
            }
        }

        let id = BodyId::new(self.bodies.len());
        let body = Body::new(id, desc, shape)?;

        if let Some(name) = &body.name {
            self.body_names.insert(name.clone(), id);
        }
        tracing::debug!(body = %id, shape = %body.shape, "added body");
        self.bodies.push(body);
        Ok(id)
    }

    /// Get a body by ID.
    #[must_use]
    pub fn body(&self, id: BodyId) -> Option<&Body> {
        self.bodies.get(id.index())
    }

    /// Get a mutable body by ID.
    pub fn body_mut(&mut self, id: BodyId) -> Option<&mut Body> {
        self.bodies.get_mut(id.index())
    }

    /// Get a body by name.
    #[must_use]
    pub fn body_by_name(&self, name: &str) -> Option<&Body> {
        self.body_names.get(name).and_then(|id| self.body(*id))
    }

    /// Get a mutable body by name.
    pub fn body_by_name_mut(&mut self, name: &str) -> Option<&mut Body> {
        let id = *self.body_names.get(name)?;
        self.body_mut(id)
    }

    /// All bodies, indexed by `BodyId`.
    #[must_use]
    pub fn bodies(&self) -> &[Body] {
        &self.bodies
    }

    /// All bodies, mutably.
    pub fn bodies_mut(&mut self) -> &mut [Body] {
        &mut self.bodies
    }

    /// Apply an impulse to a body at a world-space point.
    ///
    /// Immovable bodies ignore it.
    ///
    /// # Errors
    ///
    /// Returns [`SimError::InvalidBodyId`] if the body does not exist.
    pub fn apply_impulse(
        &mut self,
        id: BodyId,
        point: &Point3<f64>,
        impulse: &Vector3<f64>,
    ) -> impulse_types::Result<()> {
        let body = self
            .bodies
            .get_mut(id.index())
            .ok_or(SimError::InvalidBodyId(id.index()))?;
        body.apply_impulse(point, impulse);
        Ok(())
    }

    /// Iterate over body IDs.
    pub fn body_ids(&self) -> impl Iterator<Item = BodyId> + '_ {
        self.bodies.iter().map(|b| b.id)
    }

    /// Shapes and bodies borrowed together, for passes that mutate bodies
    /// while reading their shapes.
    pub(crate) fn shapes_and_bodies_mut(&mut self) -> (&[Shape], &mut [Body]) {
        (&self.shapes, &mut self.bodies)
    }

    // =========================================================================
    // Integration
    // =========================================================================

    /// Apply one tick of gravity as an impulse `m·g·dt` to every movable body.
    pub fn apply_gravity(&mut self, dt: f64) {
        let gravity = self.config.gravity;
        if gravity.is_zero() {
            return;
        }
        for body in &mut self.bodies {
            if let Some(mass) = body.mass() {
                body.apply_impulse_linear(&gravity.impulse_on_mass(mass, dt));
            }
        }
    }

    /// Advance every body by `dt` (which may be negative).
    pub fn advance_bodies(&mut self, dt: f64) {
        for body in &mut self.bodies {
            body.update(dt);
        }
    }

    // =========================================================================
    // Presentation
    // =========================================================================

    /// Composed transform of a body: translation × rotation × shape scale.
    #[must_use]
    pub fn body_transform(&self, id: BodyId) -> Option<Matrix4<f64>> {
        let body = self.body(id)?;
        let shape = self.shape(body.shape)?;
        Some(math::compose_transform(
            &body.pose.position,
            &body.pose.rotation,
            &shape.presentation_scale(),
        ))
    }

    /// Push every body's transform into its sink, then update each sink once.
    pub fn publish_transforms(&mut self, dt: f64) {
        for body in &self.bodies {
            let (Some(sink_id), Some(shape)) = (body.sink, self.shapes.get(body.shape.index()))
            else {
                continue;
            };
            if let Some(sink) = self.sinks.get_mut(sink_id.index()) {
                let transform = math::compose_transform(
                    &body.pose.position,
                    &body.pose.rotation,
                    &shape.presentation_scale(),
                );
                sink.set_transform(&transform);
            }
        }

        for sink in &mut self.sinks {
            sink.update(dt);
        }
    }

    // =========================================================================
    // Diagnostics
    // =========================================================================

    /// Sum of kinetic energy over all bodies.
    #[must_use]
    pub fn total_kinetic_energy(&self) -> f64 {
        self.bodies.iter().map(Body::kinetic_energy).sum()
    }

    /// Sum of linear momentum over all movable bodies.
    #[must_use]
    pub fn total_linear_momentum(&self) -> Vector3<f64> {
        self.bodies.iter().map(Body::linear_momentum).sum()
    }

    // =========================================================================
    // Simulation Control
    // =========================================================================

    /// Advance the simulation time (called by stepper).
    pub(crate) fn advance_time(&mut self, dt: f64) {
        self.time += dt;
        self.step_count += 1;
    }

    /// Reset simulation time to zero.
    pub fn reset_time(&mut self) {
        self.time = 0.0;
        self.step_count = 0;
    }

    /// Validate the world state.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The configuration is invalid
    /// - Any body has non-finite state values (`NaN` or `Inf`)
    pub fn validate(&self) -> impulse_types::Result<()> {
        self.config.validate()?;

        for body in &self.bodies {
            if !body.is_finite() {
                return Err(SimError::diverged(format!(
                    "body {} has non-finite state",
                    body.id
                )));
            }
        }

        Ok(())
    }
}
