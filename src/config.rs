// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The configuration snapshot and the mutation boundary around it.
//!
//! The UI side owns the canonical `RenderConfig` inside a
//! `ConfigHandle` and mutates it freely; the engine only ever sees
//! owned copies handed out by `ConfigHandle::snapshot`, so nothing the
//! UI does later can race with a run that is already computing.

use std::sync::{Arc, RwLock};

use crate::error::{MandelviewError, Result};
use crate::planes::{Resolution, Vec2, Viewport};

/// Zoom never goes below this.
pub const MIN_ZOOM: f32 = 1.0;

/// Fraction of the current zoom added or removed per wheel notch.
pub const WHEEL_ZOOM_STEP: f32 = 0.11;

/// Default iteration bound.
pub const DEFAULT_MAX_ITERATIONS: u32 = 512;

/// Default squared-magnitude bailout.
pub const DEFAULT_THRESHOLD: f32 = 65535.0;

/// One frame's rendering parameters.  Two snapshots are equal only
/// if every field is equal; any difference restarts the computation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RenderConfig {
    /// Inverse scale, at least `MIN_ZOOM` once set through `set_zoom`.
    pub zoom: f32,
    /// Squared-magnitude bailout.
    pub threshold: f32,
    /// Iteration bound.
    pub max_iterations: u32,
    /// Target raster.
    pub window_size: Resolution,
    /// Fractal-space center.
    pub position: Vec2<f32>,
    /// Pan delta while a drag is in progress, zero otherwise.
    pub offset: Vec2<f32>,
    /// Palette coloring when true, green ramp when false.
    pub color_enabled: bool,
    /// Selects the CPU engine over the GPU renderer.  The engine
    /// computes regardless; the switch is for the application.
    pub use_cpu: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        RenderConfig {
            zoom: MIN_ZOOM,
            threshold: DEFAULT_THRESHOLD,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            window_size: Resolution::default(),
            position: Vec2::default(),
            offset: Vec2::default(),
            color_enabled: true,
            use_cpu: true,
        }
    }
}

impl RenderConfig {
    /// A default configuration for the given raster.
    pub fn with_size(width: usize, height: usize) -> Self {
        RenderConfig {
            window_size: Resolution::new(width, height),
            ..RenderConfig::default()
        }
    }

    /// Sets the zoom, clamped to `MIN_ZOOM`.
    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = if zoom < MIN_ZOOM { MIN_ZOOM } else { zoom };
    }

    /// Mouse wheel: each notch adds (or, negative, removes) 11% of the
    /// current zoom.
    pub fn zoom_by_wheel(&mut self, notches: f32) {
        let diff = self.zoom * WHEEL_ZOOM_STEP * notches;
        self.set_zoom(self.zoom + diff);
    }

    /// Updates the transient pan from a drag delta in window pixels.
    /// Screen y grows downwards, fractal y grows upwards.
    pub fn drag(&mut self, delta: Vec2<f32>) {
        let height = self.window_size.height;
        if height == 0 {
            return;
        }
        let window_scale = 2.0 / height as f32;
        self.offset = Vec2::new(delta.x, -delta.y) * (1.0 / self.zoom) * window_scale;
    }

    /// Commits the transient pan into the position.
    pub fn end_drag(&mut self) {
        self.position += self.offset;
        self.offset = Vec2::default();
    }

    /// Restores the view parameters the settings panel resets.
    pub fn reset(&mut self) {
        let defaults = RenderConfig::default();
        self.position = defaults.position;
        self.offset = defaults.offset;
        self.zoom = defaults.zoom;
        self.max_iterations = defaults.max_iterations;
        self.threshold = defaults.threshold;
    }

    /// Where the view is centered, including any pan in progress.
    pub fn center(&self) -> Vec2<f32> {
        self.position + self.offset
    }

    /// Checks the fields the kernel relies on.
    pub fn validate(&self) -> Result<()> {
        if !(self.zoom.is_finite() && self.zoom >= MIN_ZOOM) {
            return Err(MandelviewError::InvalidConfig(format!(
                "zoom must be at least {}, got {}",
                MIN_ZOOM, self.zoom
            )));
        }
        if !(self.threshold.is_finite() && self.threshold > 0.0) {
            return Err(MandelviewError::InvalidConfig(format!(
                "threshold must be positive, got {}",
                self.threshold
            )));
        }
        if self.max_iterations == 0 {
            return Err(MandelviewError::InvalidConfig(
                "max_iterations must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// The immutable per-run copy handed to the workers, widened to
    /// double precision.
    pub fn viewport(&self) -> Viewport {
        Viewport::new(
            self.window_size,
            f64::from(self.zoom),
            self.center().to_f64(),
            f64::from(self.threshold),
            self.max_iterations,
            self.color_enabled,
        )
    }
}

/// The canonical, shared configuration.  Cloning the handle shares
/// the same configuration.
#[derive(Clone, Debug, Default)]
pub struct ConfigHandle {
    inner: Arc<RwLock<RenderConfig>>,
}

impl ConfigHandle {
    /// Wraps an initial configuration.
    pub fn new(config: RenderConfig) -> Self {
        ConfigHandle {
            inner: Arc::new(RwLock::new(config)),
        }
    }

    /// An owned copy of the current configuration.
    pub fn snapshot(&self) -> RenderConfig {
        match self.inner.read() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    /// Mutates the configuration in place.
    pub fn modify<F: FnOnce(&mut RenderConfig)>(&self, f: F) {
        match self.inner.write() {
            Ok(mut guard) => f(&mut guard),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}
