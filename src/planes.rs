// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Contains the value types shared by the configuration and the
//! kernel: a small 2D vector, the integral raster (`Resolution` and
//! `Pixel`), and the `Viewport`, which maps a pixel of the raster to
//! a point on the complex plane for a single run.
use num::Complex;
use std::ops::{Add, AddAssign, Mul, Sub};

/// A plain two-component vector.  Used for positions and pan offsets
/// in fractal space, where the configuration keeps single precision.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Vec2<T> {
    /// Horizontal component.
    pub x: T,
    /// Vertical component.
    pub y: T,
}

impl<T> Vec2<T> {
    /// Constructor.
    pub const fn new(x: T, y: T) -> Self {
        Vec2 { x, y }
    }
}

impl<T: Copy + Add<Output = T> + Mul<Output = T>> Vec2<T> {
    /// The dot product of two vectors.
    pub fn dot(self, rhs: Vec2<T>) -> T {
        self.x * rhs.x + self.y * rhs.y
    }
}

impl Vec2<f32> {
    /// Widen to double precision.
    pub fn to_f64(self) -> Vec2<f64> {
        Vec2::new(f64::from(self.x), f64::from(self.y))
    }
}

impl<T: Add<Output = T>> Add for Vec2<T> {
    type Output = Vec2<T>;
    fn add(self, rhs: Vec2<T>) -> Vec2<T> {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl<T: Sub<Output = T>> Sub for Vec2<T> {
    type Output = Vec2<T>;
    fn sub(self, rhs: Vec2<T>) -> Vec2<T> {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl<T: Copy + Mul<Output = T>> Mul<T> for Vec2<T> {
    type Output = Vec2<T>;
    fn mul(self, rhs: T) -> Vec2<T> {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl<T: AddAssign> AddAssign for Vec2<T> {
    fn add_assign(&mut self, rhs: Vec2<T>) {
        self.x += rhs.x;
        self.y += rhs.y;
    }
}

/// Describes the width and height of an integral plane that is
/// assumed to start at 0,0.  Either dimension may be zero, in which
/// case there is nothing to compute.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Resolution {
    /// Pixels per row.
    pub width: usize,
    /// Number of rows.
    pub height: usize,
}

impl Resolution {
    /// Constructor.
    pub const fn new(width: usize, height: usize) -> Self {
        Resolution { width, height }
    }

    /// The total number of points in the integral grid.
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    /// True if either dimension is zero.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Describes the x, y of a point in a region.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Pixel(pub usize, pub usize);

/// The immutable per-run description of what to compute: the raster,
/// where it sits on the complex plane, and the escape parameters.
/// Every worker of a run receives the same copy, so the row and
/// column ranges a worker walks always agree with the buffer the
/// run was sized for.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Viewport {
    /// The raster this run fills.
    pub resolution: Resolution,
    /// Squared-magnitude bailout.
    pub threshold: f64,
    /// Iteration bound.
    pub max_iterations: u32,
    /// Palette coloring when true, a green ramp when false.
    pub color_enabled: bool,
    // 1 / zoom
    scale: f64,
    // Effective center, subtracted from the scaled pixel coordinate.
    center: Complex<f64>,
}

impl Viewport {
    /// Takes the raster, the zoom factor, the fractal-space center
    /// and the escape parameters.
    pub fn new(
        resolution: Resolution,
        zoom: f64,
        center: Vec2<f64>,
        threshold: f64,
        max_iterations: u32,
        color_enabled: bool,
    ) -> Viewport {
        Viewport {
            resolution,
            threshold,
            max_iterations,
            color_enabled,
            scale: 1.0 / zoom,
            center: Complex::new(center.x, center.y),
        }
    }

    /// Given a pixel on the integral plane, map it to a point on the
    /// complex plane.  The vertical resolution fixes the aspect: the
    /// full height spans `2 / zoom` units and the width follows the
    /// width/height ratio.
    pub fn pixel_to_point(&self, pixel: Pixel) -> Complex<f64> {
        let w = self.resolution.width as f64;
        let h = self.resolution.height as f64;
        Complex::new(
            self.scale * (2.0 * (pixel.0 as f64) - w) / h - self.center.re,
            self.scale * (2.0 * (pixel.1 as f64) - h) / h - self.center.im,
        )
    }
}
