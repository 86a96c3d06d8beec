// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The color table, and the two ways a continuous escape value is
//! turned into bytes: cyclic palette interpolation, and a single
//! channel green ramp for monochrome output.

/// One color stop, red, green, blue.
pub type Rgb = [u8; 3];

/// Number of stops in the palette.
pub const PALETTE_SIZE: usize = 16;

/// Added to every escape value before the palette is consulted, so
/// that interior points (value 0) land on a dark stop.
pub const PALETTE_OFFSET: f64 = 2.0;

/// The palette, walked cyclically: earth, deep blue, sky, white, gold.
pub static PALETTE: [Rgb; PALETTE_SIZE] = [
    [66, 30, 15],
    [25, 7, 26],
    [9, 1, 47],
    [4, 4, 73],
    [0, 7, 100],
    [12, 44, 138],
    [24, 82, 177],
    [57, 125, 209],
    [134, 181, 229],
    [211, 236, 248],
    [241, 233, 191],
    [248, 201, 95],
    [255, 170, 0],
    [204, 128, 0],
    [153, 87, 0],
    [106, 52, 3],
];

/// Cyclic lookup.  Negative indices wrap as well.
#[inline]
pub fn palette_lookup(index: i64) -> Rgb {
    PALETTE[index.rem_euclid(PALETTE_SIZE as i64) as usize]
}

#[inline]
fn lerp(a: u8, b: u8, t: f64) -> u8 {
    let v = f64::from(a) + (f64::from(b) - f64::from(a)) * t;
    v.round() as u8
}

/// Interpolates between the two palette stops surrounding
/// `value + PALETTE_OFFSET`.
pub fn shade(value: f64) -> Rgb {
    let v = if value.is_finite() {
        value + PALETTE_OFFSET
    } else {
        PALETTE_OFFSET
    };
    let whole = v.floor();
    let t = v - whole;
    let i = whole as i64;
    let (lo, hi) = (palette_lookup(i), palette_lookup(i + 1));
    [
        lerp(lo[0], hi[0], t),
        lerp(lo[1], hi[1], t),
        lerp(lo[2], hi[2], t),
    ]
}

/// Monochrome ramp: `value / max_iterations` scaled to a byte, in the
/// green channel only.
pub fn green_ramp(value: f64, max_iterations: u32) -> Rgb {
    let level = if max_iterations == 0 || !value.is_finite() {
        0.0
    } else {
        (value / f64::from(max_iterations)).max(0.0).min(1.0)
    };
    [0, (level * 255.0).round() as u8, 0]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_wraps_in_both_directions() {
        for i in -40_i64..40 {
            assert_eq!(palette_lookup(i), palette_lookup(i + PALETTE_SIZE as i64));
        }
        assert_eq!(palette_lookup(-1), PALETTE[PALETTE_SIZE - 1]);
    }

    #[test]
    fn whole_values_hit_stops_exactly() {
        assert_eq!(shade(0.0), PALETTE[2]);
        assert_eq!(shade(3.0), PALETTE[5]);
        assert_eq!(shade(14.0), PALETTE[0]);
    }

    #[test]
    fn fractions_blend_neighbours() {
        // Stops 2 and 3: [9, 1, 47] -> [4, 4, 73]
        assert_eq!(shade(0.5), [7, 3, 60]);
    }

    #[test]
    fn non_finite_values_fall_back_to_interior() {
        assert_eq!(shade(std::f64::NAN), shade(0.0));
        assert_eq!(shade(std::f64::INFINITY), shade(0.0));
    }

    #[test]
    fn green_ramp_is_clamped_and_leaves_red_and_blue_dark() {
        assert_eq!(green_ramp(0.0, 100), [0, 0, 0]);
        assert_eq!(green_ramp(100.0, 100), [0, 255, 0]);
        assert_eq!(green_ramp(250.0, 100), [0, 255, 0]);
        assert_eq!(green_ramp(50.0, 100), [0, 128, 0]);
        assert_eq!(green_ramp(-3.0, 100), [0, 0, 0]);
    }
}
