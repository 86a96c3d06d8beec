// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

#[macro_use]
extern crate criterion;

use criterion::{black_box, Criterion};
use num::complex::Complex;

use mandelview::buffer::{PixelBuffer, PixelFormat};
use mandelview::kernel::escape_value;
use mandelview::run::{render_frame, CancelToken};
use mandelview::RenderConfig;

fn escape_points(c: &mut Criterion) {
    c.bench_function("escape_value near the boundary", |b| {
        b.iter(|| escape_value(black_box(Complex::new(-0.7436, 0.1318)), 65535.0, 512))
    });
    c.bench_function("escape_value in the cardioid", |b| {
        b.iter(|| escape_value(black_box(Complex::new(-0.1, 0.1)), 65535.0, 512))
    });
}

fn whole_frames(c: &mut Criterion) {
    let config = RenderConfig::with_size(160, 120);
    let viewport = config.viewport();
    let mut buffer = PixelBuffer::new(PixelFormat::Rgb);
    buffer.prepare(config.window_size);
    let frame = buffer.view();

    c.bench_function("160x120 frame, one worker", move |b| {
        b.iter(|| render_frame(&frame, &viewport, 1, &CancelToken::new()))
    });
}

criterion_group!(benches, escape_points, whole_frames);
criterion_main!(benches);
