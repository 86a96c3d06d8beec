// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The escape-time kernel: interior shortcuts, the iteration itself,
//! continuous coloring, and filling one row of a frame.

use num::Complex;

use crate::buffer::RowWriter;
use crate::palette::{green_ramp, shade, Rgb};
use crate::planes::{Pixel, Viewport};

/// Within a row, cancellation is polled every this many pixels.
pub const CANCEL_CHECK_INTERVAL: usize = 64;

/// The principal cardioid, as a quartic in `|c|^2` and `re(c)`.
#[inline]
pub fn in_main_cardioid(c: Complex<f64>) -> bool {
    let q = c.norm_sqr();
    256.0 * q * q - 96.0 * q + 32.0 * c.re - 3.0 < 0.0
}

/// The period-2 bulb, the disc of radius 1/4 around -1.
#[inline]
pub fn in_period2_bulb(c: Complex<f64>) -> bool {
    let q = c.norm_sqr();
    16.0 * (q + 2.0 * c.re + 1.0) - 1.0 < 0.0
}

/// True if `c` is guaranteed to be inside the Mandelbrot set by one
/// of the two closed-form tests.  A point is iterated only when it is
/// outside both regions.
#[inline]
pub fn is_known_interior(c: Complex<f64>) -> bool {
    in_main_cardioid(c) || in_period2_bulb(c)
}

/// Iterates `z <- z^2 + c` from zero.  Returns 0 for points that do not
/// escape within `max_iterations`, the renormalized escape count
/// `n + 1 - ln|z|^2 / ln(threshold)` for points that escape early, and
/// the plain count for points that escape on the last iteration.
/// Thresholds of 1 or less have no usable logarithm and always give
/// the plain count.
pub fn iterate(c: Complex<f64>, threshold: f64, max_iterations: u32) -> f64 {
    let max = u64::from(max_iterations);
    let mut z = Complex::new(0.0_f64, 0.0_f64);
    let mut count: u64 = 0;
    while count <= max {
        z = z * z + c;
        if z.norm_sqr() > threshold {
            break;
        }
        count += 1;
    }

    if count > max {
        return 0.0;
    }
    let n = count as f64;
    if count == max || threshold <= 1.0 {
        return n;
    }
    let smooth = n + 1.0 - z.norm_sqr().ln() / threshold.ln();
    if smooth.is_finite() {
        smooth
    } else {
        n
    }
}

/// The pre-palette value of a point: 0 for known-interior points,
/// otherwise whatever `iterate` finds.
#[inline]
pub fn escape_value(c: Complex<f64>, threshold: f64, max_iterations: u32) -> f64 {
    if is_known_interior(c) {
        0.0
    } else {
        iterate(c, threshold, max_iterations)
    }
}

/// Maps an escape value to a color according to the viewport's
/// coloring mode.
#[inline]
pub fn colorize(viewport: &Viewport, value: f64) -> Rgb {
    if viewport.color_enabled {
        shade(value)
    } else {
        green_ramp(value, viewport.max_iterations)
    }
}

/// Fills row `y`.  `stop` is polled before the first pixel and then
/// every `CANCEL_CHECK_INTERVAL` pixels; returns false if it fired and
/// the row was abandoned.
pub fn render_row(viewport: &Viewport, y: usize, row: &RowWriter, stop: &dyn Fn() -> bool) -> bool {
    for x in 0..viewport.resolution.width {
        if x % CANCEL_CHECK_INTERVAL == 0 && stop() {
            return false;
        }
        let c = viewport.pixel_to_point(Pixel(x, y));
        let value = escape_value(c, viewport.threshold, viewport.max_iterations);
        row.put(x, colorize(viewport, value));
    }
    true
}
