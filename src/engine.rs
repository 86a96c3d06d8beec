// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! The compute engine.
//!
//! Once per tick the application hands the engine the latest
//! configuration snapshot.  If it differs from the snapshot of the
//! last launched run, the engine cancels and joins that run, prepares
//! the pixel buffer for the new raster and launches a fresh run.
//! Independently, and from any thread, `render` copies whatever the
//! buffer currently holds onto a display surface, finished or not.
//!
//! All three operations take `&self`, so one engine can be shared
//! between a ticking thread and a display thread behind an `Arc`.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use tracing::{debug, trace, warn};

use crate::buffer::{PixelBuffer, PixelFormat};
use crate::config::RenderConfig;
use crate::planes::Resolution;
use crate::run::{worker_count, LiveRuns, Run, RunOutcome};
use crate::surface::Surface;

/// Construction-time knobs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EngineOptions {
    /// Worker threads per run.
    pub workers: usize,
    /// Byte layout the display surface wants.
    pub format: PixelFormat,
}

impl Default for EngineOptions {
    fn default() -> Self {
        EngineOptions {
            workers: worker_count(),
            format: PixelFormat::Rgb,
        }
    }
}

/// Lifetime counters, for diagnostics and tests.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Runs started.
    pub launches: usize,
    /// Times the pixel buffer had to grow.
    pub allocations: usize,
    /// Runs that ended because they were cancelled.
    pub cancellations: usize,
    /// Most runs ever computing at the same time.
    pub peak_live_runs: usize,
}

#[derive(Debug, Default)]
struct EngineState {
    last_launched: Option<RenderConfig>,
    run: Option<Run>,
}

/// Owns the pixel buffer and the run in flight.
#[derive(Debug)]
pub struct ComputeEngine {
    options: EngineOptions,
    frame: RwLock<PixelBuffer>,
    state: Mutex<EngineState>,
    joinable: AtomicBool,
    live: Arc<LiveRuns>,
    launches: AtomicUsize,
    allocations: AtomicUsize,
    cancellations: AtomicUsize,
}

impl Default for ComputeEngine {
    fn default() -> Self {
        ComputeEngine::new(EngineOptions::default())
    }
}

impl ComputeEngine {
    /// An idle engine with no buffer.
    pub fn new(options: EngineOptions) -> Self {
        ComputeEngine {
            options: EngineOptions {
                workers: options.workers.max(1),
                ..options
            },
            frame: RwLock::new(PixelBuffer::new(options.format)),
            state: Mutex::new(EngineState::default()),
            joinable: AtomicBool::new(false),
            live: Arc::new(LiveRuns::default()),
            launches: AtomicUsize::new(0),
            allocations: AtomicUsize::new(0),
            cancellations: AtomicUsize::new(0),
        }
    }

    /// The options the engine runs with.
    pub fn options(&self) -> EngineOptions {
        self.options
    }

    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Called once per tick with the latest configuration, or `None`
    /// if there is none.  Starts a new run when the snapshot differs
    /// from the last launched one, and reaps a run that finished on
    /// its own.  May block while joining; never fails.
    pub fn update(&self, snapshot: Option<RenderConfig>) {
        let mut state = self.lock_state();

        if let Some(config) = snapshot {
            if state.last_launched.as_ref() != Some(&config) {
                self.relaunch(&mut state, config);
            }
        }

        let finished = state.run.as_ref().map_or(false, |run| run.is_done());
        if finished {
            self.reap(&mut state);
        }
    }

    fn reap(&self, state: &mut EngineState) {
        if let Some(mut run) = state.run.take() {
            if let Some(RunOutcome::Cancelled) = run.join() {
                self.cancellations.fetch_add(1, Ordering::Relaxed);
            }
        }
        self.joinable.store(false, Ordering::Release);
    }

    fn relaunch(&self, state: &mut EngineState, config: RenderConfig) {
        if let Some(run) = state.run.as_ref() {
            if !run.is_done() {
                debug!("cancelling run for {:?}", run.config().window_size);
                run.request_cancel();
            }
        }
        self.reap(state);

        // Allocate or zero without holding the frame lock; `render`
        // only ever waits for the swap.
        let (storage, format) = {
            let frame = self.frame.read().unwrap_or_else(PoisonError::into_inner);
            (frame.storage(), frame.format())
        };
        let (storage, grew) = storage.ready_for(format, config.window_size);
        if grew {
            self.allocations.fetch_add(1, Ordering::Relaxed);
            debug!(bytes = storage.len(), "pixel buffer reallocated");
        }
        let (view, _previous) = {
            let mut frame = self.frame.write().unwrap_or_else(PoisonError::into_inner);
            let previous = frame.install(storage, config.window_size);
            (frame.view(), previous)
        };
        state.last_launched = Some(config);

        if view.is_empty() {
            trace!("zero-area raster, nothing to compute");
            return;
        }

        match Run::launch(config, view, self.options.workers, Arc::clone(&self.live)) {
            Ok(run) => {
                self.launches.fetch_add(1, Ordering::Relaxed);
                self.joinable.store(true, Ordering::Release);
                debug!(
                    width = config.window_size.width,
                    height = config.window_size.height,
                    zoom = config.zoom,
                    max_iterations = config.max_iterations,
                    "run launched"
                );
                state.run = Some(run);
            }
            Err(err) => warn!("could not start a run: {}", err),
        }
    }

    /// Paints the buffer, at the resolution it was prepared for, onto
    /// `surface`.  Never waits for a run; rows a run has not reached
    /// yet are still black.  Does nothing before the first non-empty
    /// buffer exists.
    pub fn render(&self, surface: &mut dyn Surface) {
        let view = {
            let frame = self.frame.read().unwrap_or_else(PoisonError::into_inner);
            if frame.is_empty() {
                return;
            }
            frame.view()
        };
        let pixels = view.to_vec();
        surface.present(view.resolution(), view.format(), &pixels);
    }

    /// True while a run is computing or waiting to be reaped.
    pub fn is_busy(&self) -> bool {
        self.live.live() > 0 || self.joinable.load(Ordering::Acquire)
    }

    /// Blocks until the current run, if any, finishes on its own, and
    /// reaps it.
    pub fn wait(&self) {
        let mut state = self.lock_state();
        self.reap(&mut state);
    }

    /// The raster the buffer currently holds.
    pub fn resolution(&self) -> Resolution {
        self.frame
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .resolution()
    }

    /// Bytes allocated for the buffer.
    pub fn capacity(&self) -> usize {
        self.frame
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .capacity()
    }

    /// Lifetime counters.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            launches: self.launches.load(Ordering::Relaxed),
            allocations: self.allocations.load(Ordering::Relaxed),
            cancellations: self.cancellations.load(Ordering::Relaxed),
            peak_live_runs: self.live.peak(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::FrameView;
    use crate::planes::Vec2;
    use crate::run::{render_frame, CancelToken};
    use crate::surface::ImageSurface;
    use std::thread;
    use std::time::{Duration, Instant};

    fn engine(format: PixelFormat) -> ComputeEngine {
        ComputeEngine::new(EngineOptions { workers: 3, format })
    }

    fn scenario_one() -> RenderConfig {
        let mut config = RenderConfig::with_size(4, 4);
        config.threshold = 4.0;
        config.max_iterations = 100;
        config
    }

    fn expected(config: &RenderConfig, format: PixelFormat) -> Vec<u8> {
        let frame = FrameView::detached(config.window_size, format);
        render_frame(&frame, &config.viewport(), 1, &CancelToken::new());
        frame.to_vec()
    }

    fn slow_config() -> RenderConfig {
        // Inside the period-3 bulb, out of reach of the shortcuts.
        let mut config = RenderConfig::with_size(320, 240);
        config.set_zoom(20.0);
        config.position = Vec2::new(0.1226, -0.7449);
        config.max_iterations = 50_000;
        config
    }

    #[test]
    fn no_snapshot_is_a_no_op() {
        let engine = engine(PixelFormat::Rgb);
        engine.update(None);
        assert!(!engine.is_busy());
        assert_eq!(engine.stats(), EngineStats::default());
        let mut surface = ImageSurface::new();
        engine.render(&mut surface);
        assert!(surface.frame().is_none());
    }

    #[test]
    fn small_frame_end_to_end() {
        for &format in [PixelFormat::Rgb, PixelFormat::Rgba].iter() {
            let engine = engine(format);
            let config = scenario_one();
            engine.update(Some(config));
            assert!(engine.capacity() >= format.channels() * 16);
            engine.wait();
            assert!(!engine.is_busy());

            let mut surface = ImageSurface::new();
            engine.render(&mut surface);
            let frame = surface.frame().unwrap();
            assert_eq!(frame.resolution, Resolution::new(4, 4));
            assert_eq!(frame.pixels.len(), 16 * format.channels());
            assert_eq!(frame.pixels, expected(&config, format));
        }
    }

    #[test]
    fn unchanged_snapshots_launch_once() {
        let engine = engine(PixelFormat::Rgb);
        let config = scenario_one();
        for _ in 0..50 {
            engine.update(Some(config));
        }
        engine.wait();
        for _ in 0..50 {
            engine.update(Some(config));
        }
        assert_eq!(engine.stats().launches, 1);
        assert!(!engine.is_busy());
    }

    #[test]
    fn finished_runs_are_reaped_by_update() {
        let engine = engine(PixelFormat::Rgb);
        engine.update(Some(scenario_one()));
        while engine.live.live() > 0 {
            thread::sleep(Duration::from_millis(1));
        }
        assert!(engine.is_busy());
        engine.update(None);
        assert!(!engine.is_busy());
    }

    #[test]
    fn newer_snapshot_replaces_older_run() {
        let engine = engine(PixelFormat::Rgb);
        let a = slow_config();
        let mut b = scenario_one();
        b.window_size = Resolution::new(40, 30);

        engine.update(Some(a));
        assert!(engine.is_busy());
        engine.update(Some(b));
        engine.wait();

        let stats = engine.stats();
        assert_eq!(stats.launches, 2);
        assert_eq!(stats.peak_live_runs, 1);
        assert!(stats.cancellations <= 1);

        let mut surface = ImageSurface::new();
        engine.render(&mut surface);
        let frame = surface.frame().unwrap();
        assert_eq!(frame.resolution, b.window_size);
        assert_eq!(frame.pixels, expected(&b, PixelFormat::Rgb));
    }

    #[test]
    fn shrinking_reuses_and_growing_reallocates() {
        let engine = engine(PixelFormat::Rgb);
        let mut config = scenario_one();
        config.window_size = Resolution::new(64, 48);
        engine.update(Some(config));
        assert_eq!(engine.stats().allocations, 1);
        let capacity = engine.capacity();
        assert_eq!(capacity, 3 * 64 * 48);

        config.window_size = Resolution::new(32, 24);
        engine.update(Some(config));
        assert_eq!(engine.stats().allocations, 1);
        assert_eq!(engine.capacity(), capacity);
        assert_eq!(engine.resolution(), Resolution::new(32, 24));

        config.window_size = Resolution::new(80, 60);
        engine.update(Some(config));
        assert_eq!(engine.stats().allocations, 2);
        assert!(engine.capacity() >= 3 * 80 * 60);
        engine.wait();
    }

    #[test]
    fn zero_area_windows_compute_nothing() {
        let engine = engine(PixelFormat::Rgba);
        let mut config = scenario_one();
        config.window_size = Resolution::new(0, 48);
        engine.update(Some(config));
        assert!(!engine.is_busy());
        assert_eq!(engine.stats().launches, 0);

        let mut surface = ImageSurface::new();
        engine.render(&mut surface);
        assert!(surface.frame().is_none());

        config.window_size = Resolution::new(8, 8);
        engine.update(Some(config));
        engine.wait();
        config.window_size = Resolution::new(8, 0);
        engine.update(Some(config));
        engine.render(&mut surface);
        assert!(surface.frame().is_none());
        assert_eq!(engine.stats().launches, 1);
    }

    #[test]
    fn rendering_never_waits_for_a_run() {
        let engine = Arc::new(engine(PixelFormat::Rgba));
        engine.update(Some(slow_config()));

        let display = {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                let mut surface = ImageSurface::new();
                for _ in 0..5 {
                    engine.render(&mut surface);
                }
                surface.presentations()
            })
        };
        assert_eq!(display.join().unwrap(), 5);
        assert!(engine.is_busy());

        // Cancelling by switching to a tiny raster clears the slow run.
        engine.update(Some(scenario_one()));
        engine.wait();
        assert!(!engine.is_busy());
        assert_eq!(engine.stats().peak_live_runs, 1);
    }

    #[test]
    fn growing_the_buffer_does_not_stall_the_display() {
        let engine = Arc::new(engine(PixelFormat::Rgba));
        engine.update(Some(scenario_one()));
        engine.wait();

        let done = Arc::new(AtomicBool::new(false));
        let display = {
            let engine = Arc::clone(&engine);
            let done = Arc::clone(&done);
            thread::spawn(move || {
                let mut worst = Duration::default();
                let mut surface = ImageSurface::new();
                while !done.load(Ordering::Acquire) {
                    let asked = Instant::now();
                    let frame = engine.frame.read().unwrap_or_else(PoisonError::into_inner);
                    worst = worst.max(asked.elapsed());
                    drop(frame);
                    thread::yield_now();
                }
                engine.render(&mut surface);
                (worst, surface.presentations())
            })
        };

        let mut large = scenario_one();
        large.window_size = Resolution::new(3000, 3000);
        let started = Instant::now();
        engine.update(Some(large));
        let elapsed = started.elapsed();
        done.store(true, Ordering::Release);

        let (worst, presented) = display.join().unwrap();
        assert_eq!(presented, 1);
        assert_eq!(engine.stats().allocations, 2);
        assert!(
            worst * 4 < elapsed,
            "display waited {:?} during a {:?} update",
            worst,
            elapsed
        );
    }
}
