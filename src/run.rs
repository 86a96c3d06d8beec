// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! A run is one launch-compute-join cycle for a single configuration
//! snapshot.  A coordinator thread spawns the worker pool for the
//! frame, waits for it, and cleans up; the `Run` handle the engine
//! keeps is the only way to cancel or reap it.

use std::io;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::thread::ScopedJoinHandle;
use tracing::{debug, warn};

use crate::buffer::FrameView;
use crate::config::RenderConfig;
use crate::kernel::render_row;
use crate::planes::Viewport;

const IDLE: u8 = 0;
const REQUESTED: u8 = 1;
const ACKNOWLEDGED: u8 = 2;

/// Where a cancellation stands.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CancelState {
    /// Nobody asked.
    Idle,
    /// Asked; workers stop at their next check.
    Requested,
    /// Asked, and the run has been joined since.
    Acknowledged,
}

/// Cooperative cancellation flag, polled by the workers.
#[derive(Debug, Default)]
pub struct CancelToken {
    state: AtomicU8,
}

impl CancelToken {
    /// A token nobody has pulled yet.
    pub fn new() -> Self {
        CancelToken::default()
    }

    /// Asks the workers to stop.  Has no effect once acknowledged.
    pub fn request(&self) {
        let _ = self
            .state
            .compare_exchange(IDLE, REQUESTED, Ordering::Relaxed, Ordering::Relaxed);
    }

    /// True once cancellation has been asked for.
    #[inline]
    pub fn is_requested(&self) -> bool {
        self.state.load(Ordering::Relaxed) != IDLE
    }

    /// Marks a requested cancellation as seen by the joining side.
    pub fn acknowledge(&self) {
        let _ = self.state.compare_exchange(
            REQUESTED,
            ACKNOWLEDGED,
            Ordering::Relaxed,
            Ordering::Relaxed,
        );
    }

    /// Current state.
    pub fn state(&self) -> CancelState {
        match self.state.load(Ordering::Relaxed) {
            IDLE => CancelState::Idle,
            REQUESTED => CancelState::Requested,
            _ => CancelState::Acknowledged,
        }
    }
}

/// How a run ended.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every row was written.
    Completed,
    /// Workers saw the cancel token; the frame was zeroed.
    Cancelled,
    /// A worker or the coordinator panicked.
    Panicked,
}

/// Counts coordinator threads that are alive, and the most that ever
/// were at once.
#[derive(Debug, Default)]
pub struct LiveRuns {
    live: AtomicUsize,
    peak: AtomicUsize,
}

impl LiveRuns {
    fn enter(&self) {
        let now = self.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn exit(&self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }

    /// Runs currently computing.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Highest number of simultaneously computing runs seen.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

// Marks a coordinator as computing for as long as it lives, even if
// it unwinds.
struct Active<'a> {
    live: &'a LiveRuns,
    busy: &'a AtomicBool,
}

impl<'a> Active<'a> {
    fn enter(live: &'a LiveRuns, busy: &'a AtomicBool) -> Self {
        live.enter();
        Active { live, busy }
    }
}

impl<'a> Drop for Active<'a> {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
        self.live.exit();
    }
}

/// Default pool size: every hardware thread but one, at least one.
pub fn worker_count() -> usize {
    num_cpus::get().saturating_sub(1).max(1)
}

/// The rows worker `worker` of `workers` owns: `worker`,
/// `worker + workers`, `worker + 2 * workers`, and so on.  Across all
/// workers this partitions `0..height`.
pub fn stripe_rows(worker: usize, workers: usize, height: usize) -> impl Iterator<Item = usize> {
    (worker..height).step_by(workers.max(1))
}

/// One worker's share of the frame.  Returns false if it stopped
/// because of cancellation.
pub fn render_stripe(
    frame: &FrameView,
    viewport: &Viewport,
    worker: usize,
    workers: usize,
    cancel: &CancelToken,
) -> bool {
    let stop = || cancel.is_requested();
    for y in stripe_rows(worker, workers, viewport.resolution.height) {
        if stop() || !render_row(viewport, y, &frame.row(y), &stop) {
            return false;
        }
    }
    true
}

/// Computes a whole frame on `workers` scoped threads and waits for
/// them.  If cancellation was observed the frame is zeroed before
/// returning, so a cancelled run never leaves a partial image.
pub fn render_frame(
    frame: &FrameView,
    viewport: &Viewport,
    workers: usize,
    cancel: &CancelToken,
) -> RunOutcome {
    assert_eq!(
        frame.resolution(),
        viewport.resolution,
        "frame and viewport disagree on the raster"
    );
    let workers = workers.max(1);

    let joined = crossbeam::scope(|spawner| {
        let handles: Vec<ScopedJoinHandle<bool>> = (0..workers)
            .map(|worker| {
                spawner.spawn(move |_| render_stripe(frame, viewport, worker, workers, cancel))
            })
            .collect();

        handles
            .into_iter()
            .map(|handle| handle.join())
            .fold(RunOutcome::Completed, |outcome, finished| {
                match (outcome, finished) {
                    (RunOutcome::Panicked, _) | (_, Err(_)) => RunOutcome::Panicked,
                    (_, Ok(false)) => RunOutcome::Cancelled,
                    (outcome, Ok(true)) => outcome,
                }
            })
    });

    let outcome = match joined {
        Ok(outcome) => outcome,
        Err(_) => RunOutcome::Panicked,
    };
    if outcome != RunOutcome::Completed {
        frame.clear();
    }
    outcome
}

/// Handle to the run in flight.  Dropping it cancels and joins.
#[derive(Debug)]
pub struct Run {
    config: RenderConfig,
    cancel: Arc<CancelToken>,
    busy: Arc<AtomicBool>,
    handle: Option<JoinHandle<RunOutcome>>,
}

impl Run {
    /// Starts computing `config` into `frame` on a coordinator thread
    /// with a pool of `workers`.  The frame must have been prepared
    /// for the configuration's window size.
    pub fn launch(
        config: RenderConfig,
        frame: FrameView,
        workers: usize,
        live: Arc<LiveRuns>,
    ) -> io::Result<Run> {
        let viewport = config.viewport();
        let cancel = Arc::new(CancelToken::new());
        let busy = Arc::new(AtomicBool::new(true));

        let handle = {
            let cancel = Arc::clone(&cancel);
            let busy = Arc::clone(&busy);
            thread::Builder::new()
                .name("mandelview-run".to_string())
                .spawn(move || {
                    let _active = Active::enter(&live, &busy);
                    render_frame(&frame, &viewport, workers, &cancel)
                })
        };

        match handle {
            Ok(handle) => Ok(Run {
                config,
                cancel,
                busy,
                handle: Some(handle),
            }),
            Err(err) => {
                busy.store(false, Ordering::Release);
                Err(err)
            }
        }
    }

    /// The snapshot this run computes.
    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    /// Asks the workers to stop at their next check.
    pub fn request_cancel(&self) {
        self.cancel.request();
    }

    /// Where the cancellation stands.
    pub fn cancel_state(&self) -> CancelState {
        self.cancel.state()
    }

    /// True once the coordinator has finished, cancelled or not.
    pub fn is_done(&self) -> bool {
        !self.busy.load(Ordering::Acquire)
    }

    /// True until `join` has reaped the coordinator.
    pub fn is_joinable(&self) -> bool {
        self.handle.is_some()
    }

    /// Waits for the coordinator and reaps it.  Returns `None` if it
    /// was already joined.
    pub fn join(&mut self) -> Option<RunOutcome> {
        let handle = self.handle.take()?;
        let outcome = match handle.join() {
            Ok(outcome) => outcome,
            Err(_) => RunOutcome::Panicked,
        };
        self.cancel.acknowledge();
        self.busy.store(false, Ordering::Release);
        match outcome {
            RunOutcome::Panicked => warn!("run for {:?} panicked", self.config.window_size),
            _ => debug!(?outcome, "run joined"),
        }
        Some(outcome)
    }
}

impl Drop for Run {
    fn drop(&mut self) {
        if self.is_joinable() {
            self.request_cancel();
            self.join();
        }
    }
}
