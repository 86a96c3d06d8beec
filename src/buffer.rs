// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The pixel buffer.
//!
//! Bytes are stored as `AtomicU8` and touched with relaxed ordering
//! only.  That is what lets the display side copy a frame out while a
//! run is still writing it: the copy may be torn between rows, which
//! shows up as a progressive fill, but it is never undefined
//! behavior.  Each byte is written by exactly one worker per run.
//!
//! All offset arithmetic lives here.  Workers never compute a byte
//! offset themselves; they ask a `FrameView` for a `RowWriter`, and
//! both are bounds checked against the run's own resolution.
//!
//! Preparing a buffer for a new raster is split in two so the engine
//! can keep its lock short: `Storage::ready_for` does the O(n) work
//! on a shared handle, and `PixelBuffer::install` only swaps it in.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

use crate::palette::Rgb;
use crate::planes::{Pixel, Resolution};

/// Byte layout of one pixel.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum PixelFormat {
    /// Red, green, blue.
    Rgb,
    /// Red, green, blue, and an opaque alpha byte.
    Rgba,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub fn channels(self) -> usize {
        match self {
            PixelFormat::Rgb => 3,
            PixelFormat::Rgba => 4,
        }
    }
}

impl Default for PixelFormat {
    fn default() -> Self {
        PixelFormat::Rgb
    }
}

fn allocate(len: usize) -> Arc<[AtomicU8]> {
    (0..len).map(|_| AtomicU8::new(0)).collect::<Vec<_>>().into()
}

/// A handle on the bytes behind a buffer.  Cloning shares them.
#[derive(Clone, Debug)]
pub struct Storage {
    bytes: Arc<[AtomicU8]>,
}

impl Storage {
    /// Allocated bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True when nothing is allocated.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Zeroed storage for `resolution`.  Reuses this allocation, cleared
    /// over the bytes the raster needs, when it is large enough;
    /// otherwise allocates afresh.  Returns whether it allocated.
    pub fn ready_for(self, format: PixelFormat, resolution: Resolution) -> (Storage, bool) {
        let needed = format.channels() * resolution.len();
        if needed > self.bytes.len() {
            return (
                Storage {
                    bytes: allocate(needed),
                },
                true,
            );
        }
        for byte in self.bytes[..needed].iter() {
            byte.store(0, Ordering::Relaxed);
        }
        (self, false)
    }
}

/// The engine's frame storage.  The allocation only ever grows;
/// preparing for a smaller raster reuses what is already there.
#[derive(Debug)]
pub struct PixelBuffer {
    bytes: Arc<[AtomicU8]>,
    resolution: Resolution,
    format: PixelFormat,
}

impl PixelBuffer {
    /// An empty buffer.  Nothing is allocated until `prepare`.
    pub fn new(format: PixelFormat) -> Self {
        PixelBuffer {
            bytes: allocate(0),
            resolution: Resolution::default(),
            format,
        }
    }

    /// Allocated bytes.
    pub fn capacity(&self) -> usize {
        self.bytes.len()
    }

    /// The raster the buffer was last prepared for.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Pixel layout.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Bytes the current raster occupies.
    pub fn len(&self) -> usize {
        self.format.channels() * self.resolution.len()
    }

    /// True when there is nothing to show.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A shared handle on the current allocation.
    pub fn storage(&self) -> Storage {
        Storage {
            bytes: Arc::clone(&self.bytes),
        }
    }

    /// Switches to `storage` at `resolution` and hands back the
    /// previous allocation.  Constant time.  `storage` must have come
    /// from `Storage::ready_for` with this buffer's format.
    pub fn install(&mut self, storage: Storage, resolution: Resolution) -> Storage {
        debug_assert!(storage.len() >= self.format.channels() * resolution.len());
        self.resolution = resolution;
        Storage {
            bytes: std::mem::replace(&mut self.bytes, storage.bytes),
        }
    }

    /// Makes room for a raster and clears it, in one step.  Reallocates
    /// only when the raster needs more bytes than are allocated;
    /// returns whether it did.  Must not be called while a run holds a
    /// view.
    pub fn prepare(&mut self, resolution: Resolution) -> bool {
        let (storage, grew) = self.storage().ready_for(self.format, resolution);
        self.install(storage, resolution);
        grew
    }

    /// A shareable view of the current raster.
    pub fn view(&self) -> FrameView {
        FrameView {
            bytes: Arc::clone(&self.bytes),
            resolution: self.resolution,
            format: self.format,
        }
    }
}

/// A view of one raster inside a `PixelBuffer`.  Cheap to clone; a
/// run holds one for its whole life.
#[derive(Clone, Debug)]
pub struct FrameView {
    bytes: Arc<[AtomicU8]>,
    resolution: Resolution,
    format: PixelFormat,
}

impl FrameView {
    /// A standalone frame, mostly for tests and benchmarks.
    pub fn detached(resolution: Resolution, format: PixelFormat) -> Self {
        FrameView {
            bytes: allocate(format.channels() * resolution.len()),
            resolution,
            format,
        }
    }

    /// The raster this view covers.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Pixel layout.
    pub fn format(&self) -> PixelFormat {
        self.format
    }

    /// Bytes covered by the view.
    pub fn len(&self) -> usize {
        self.format.channels() * self.resolution.len()
    }

    /// True for a zero-area raster.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Byte offset of the first channel of `pixel`.
    pub fn offset(&self, pixel: Pixel) -> usize {
        debug_assert!(pixel.0 < self.resolution.width && pixel.1 < self.resolution.height);
        (pixel.1 * self.resolution.width + pixel.0) * self.format.channels()
    }

    /// Write access to row `y`.  Panics if `y` is outside the raster.
    pub fn row(&self, y: usize) -> RowWriter<'_> {
        assert!(
            y < self.resolution.height,
            "row {} outside a raster of height {}",
            y,
            self.resolution.height
        );
        let start = self.offset(Pixel(0, y));
        let stride = self.resolution.width * self.format.channels();
        RowWriter {
            bytes: &self.bytes[start..start + stride],
            format: self.format,
        }
    }

    /// Sets every byte of the raster to `value`.
    pub fn fill(&self, value: u8) {
        for byte in self.bytes[..self.len()].iter() {
            byte.store(value, Ordering::Relaxed);
        }
    }

    /// Zeroes the raster.
    pub fn clear(&self) {
        self.fill(0);
    }

    /// Copies the raster out, replacing the contents of `out`.
    pub fn copy_into(&self, out: &mut Vec<u8>) {
        out.clear();
        out.extend(
            self.bytes[..self.len()]
                .iter()
                .map(|b| b.load(Ordering::Relaxed)),
        );
    }

    /// The raster as an owned byte vector.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        self.copy_into(&mut out);
        out
    }
}

/// One row of a frame.
#[derive(Debug)]
pub struct RowWriter<'a> {
    bytes: &'a [AtomicU8],
    format: PixelFormat,
}

impl<'a> RowWriter<'a> {
    /// Pixels in the row.
    pub fn width(&self) -> usize {
        self.bytes.len() / self.format.channels()
    }

    /// Writes the color of pixel `x`, plus an opaque alpha byte for
    /// RGBA frames.  Panics if `x` is outside the row.
    pub fn put(&self, x: usize, color: Rgb) {
        let channels = self.format.channels();
        let pixel = &self.bytes[x * channels..(x + 1) * channels];
        pixel[0].store(color[0], Ordering::Relaxed);
        pixel[1].store(color[1], Ordering::Relaxed);
        pixel[2].store(color[2], Ordering::Relaxed);
        if self.format == PixelFormat::Rgba {
            pixel[3].store(255, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_are_row_major() {
        let view = FrameView::detached(Resolution::new(5, 3), PixelFormat::Rgb);
        assert_eq!(view.offset(Pixel(0, 0)), 0);
        assert_eq!(view.offset(Pixel(4, 0)), 12);
        assert_eq!(view.offset(Pixel(0, 1)), 15);
        assert_eq!(view.offset(Pixel(2, 2)), 36);

        let view = FrameView::detached(Resolution::new(5, 3), PixelFormat::Rgba);
        assert_eq!(view.offset(Pixel(2, 2)), 48);
    }

    #[test]
    fn rows_write_their_own_bytes() {
        let view = FrameView::detached(Resolution::new(2, 2), PixelFormat::Rgba);
        view.row(1).put(0, [1, 2, 3]);
        assert_eq!(view.row(1).width(), 2);
        assert_eq!(
            view.to_vec(),
            vec![0, 0, 0, 0, 0, 0, 0, 0, 1, 2, 3, 255, 0, 0, 0, 0]
        );
    }

    #[test]
    #[should_panic]
    fn rows_past_the_raster_are_rejected() {
        let view = FrameView::detached(Resolution::new(2, 2), PixelFormat::Rgb);
        view.row(2);
    }

    #[test]
    #[should_panic]
    fn columns_past_the_row_are_rejected() {
        let view = FrameView::detached(Resolution::new(2, 2), PixelFormat::Rgb);
        view.row(0).put(2, [9, 9, 9]);
    }

    #[test]
    fn prepare_grows_but_never_shrinks() {
        let mut buffer = PixelBuffer::new(PixelFormat::Rgb);
        assert!(buffer.is_empty());
        assert!(buffer.prepare(Resolution::new(10, 10)));
        assert_eq!(buffer.capacity(), 300);

        buffer.view().fill(7);
        assert!(!buffer.prepare(Resolution::new(4, 4)));
        assert_eq!(buffer.capacity(), 300);
        assert_eq!(buffer.len(), 48);
        assert!(buffer.view().to_vec().iter().all(|&b| b == 0));

        assert!(!buffer.prepare(Resolution::new(10, 10)));
        assert!(buffer.prepare(Resolution::new(11, 10)));
        assert_eq!(buffer.capacity(), 330);
    }

    #[test]
    fn storage_is_readied_apart_from_the_buffer() {
        let mut buffer = PixelBuffer::new(PixelFormat::Rgb);
        buffer.prepare(Resolution::new(4, 4));
        buffer.view().fill(5);

        // Reuse clears only what the smaller raster covers.
        let (storage, grew) = buffer.storage().ready_for(PixelFormat::Rgb, Resolution::new(2, 2));
        assert!(!grew);
        assert_eq!(buffer.capacity(), 48);
        let view = buffer.view();
        assert!(view.to_vec()[..12].iter().all(|&b| b == 0));
        assert!(view.to_vec()[12..].iter().all(|&b| b == 5));

        let previous = buffer.install(storage, Resolution::new(2, 2));
        assert_eq!(previous.len(), 48);
        assert_eq!(buffer.resolution(), Resolution::new(2, 2));

        // Growing leaves the installed bytes alone until the swap.
        let (storage, grew) = buffer.storage().ready_for(PixelFormat::Rgb, Resolution::new(8, 8));
        assert!(grew);
        assert_eq!(storage.len(), 192);
        assert_eq!(buffer.capacity(), 48);
        buffer.install(storage, Resolution::new(8, 8));
        assert_eq!(buffer.capacity(), 192);
        assert!(buffer.view().to_vec().iter().all(|&b| b == 0));
    }

    #[test]
    fn zero_area_needs_nothing() {
        let mut buffer = PixelBuffer::new(PixelFormat::Rgba);
        assert!(!buffer.prepare(Resolution::new(0, 100)));
        assert_eq!(buffer.capacity(), 0);
        assert!(buffer.view().is_empty());
    }
}
