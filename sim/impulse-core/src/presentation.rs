//! Hand-off of body transforms to whatever draws them.
//!
//! The simulation never renders. Once per tick the world composes each
//! body's transform (translation × rotation × shape scale) and pushes it into
//! the [`TransformSink`] the body is attached to, then lets every sink advance
//! by the tick length.

use std::cell::RefCell;
use std::rc::Rc;

use nalgebra::Matrix4;

/// Receiver of a body's presentation transform.
pub trait TransformSink: std::fmt::Debug {
    /// Advance any presentation-side state by `dt` seconds.
    fn update(&mut self, dt: f64);

    /// Replace the model transform.
    fn set_transform(&mut self, transform: &Matrix4<f64>);
}

/// Shared sinks let the owner keep a handle after giving one to the world.
impl<T: TransformSink> TransformSink for Rc<RefCell<T>> {
    fn update(&mut self, dt: f64) {
        self.borrow_mut().update(dt);
    }

    fn set_transform(&mut self, transform: &Matrix4<f64>) {
        self.borrow_mut().set_transform(transform);
    }
}

/// A headless sink that keeps the last transform it received.
///
/// Useful for tests, benchmarks and servers without a renderer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformRecorder {
    transform: Option<Matrix4<f64>>,
    updates: u64,
    elapsed: f64,
}

impl TransformRecorder {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Last transform pushed, if any.
    #[must_use]
    pub fn transform(&self) -> Option<&Matrix4<f64>> {
        self.transform.as_ref()
    }

    /// Number of `update` calls received.
    #[must_use]
    pub fn updates(&self) -> u64 {
        self.updates
    }

    /// Sum of all `dt` values received.
    #[must_use]
    pub fn elapsed(&self) -> f64 {
        self.elapsed
    }
}

impl TransformSink for TransformRecorder {
    fn update(&mut self, dt: f64) {
        self.updates += 1;
        self.elapsed += dt;
    }

    fn set_transform(&mut self, transform: &Matrix4<f64>) {
        self.transform = Some(*transform);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::float_cmp)]
mod tests {
    use super::*;

    #[test]
    fn test_recorder_tracks_updates() {
        let mut recorder = TransformRecorder::new();
        assert!(recorder.transform().is_none());

        recorder.update(0.5);
        recorder.update(0.25);
        recorder.set_transform(&Matrix4::new_scaling(2.0));

        assert_eq!(recorder.updates(), 2);
        assert_eq!(recorder.elapsed(), 0.75);
        assert_eq!(recorder.transform(), Some(&Matrix4::new_scaling(2.0)));
    }

    #[test]
    fn test_shared_handle_sees_writes() {
        let shared = Rc::new(RefCell::new(TransformRecorder::new()));
        let mut boxed: Box<dyn TransformSink> = Box::new(Rc::clone(&shared));

        boxed.set_transform(&Matrix4::identity());
        boxed.update(1.0);

        assert_eq!(shared.borrow().updates(), 1);
        assert_eq!(shared.borrow().transform(), Some(&Matrix4::identity()));
    }
}
