//! Progress smoothing controller.
//!
//! Providers report progress sparsely, sometimes only 0% and 100%. A
//! bar that mirrors that literally looks frozen. The controller keeps
//! two numbers: `backend` (the last truthful value) and `display` (what
//! is shown), and advances `display` on a fixed 300 ms tick even when no
//! backend data arrives:
//!
//! - `display` approaches `backend_cap` (`backend + 8`, at most 99) with
//!   a step that shrinks as the gap closes;
//! - once caught up it crawls at 0.2 per tick towards 96, so the bar
//!   keeps moving without ever looking finished;
//! - only when the backend reports 100 does `display` run to 100.
//!
//! All arithmetic lives in [`ProgressState`]. [`ProgressHandle`] owns the
//! state plus the ticker task and publishes deduplicated
//! [`ProgressUpdate`]s on a `watch` channel. A [`ProgressSlot`] holds at
//! most one live handle and stops the previous one before starting the
//! next.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use genjob_core::{JobStatusSnapshot, NormalizedStatus};
use tokio::sync::watch;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Period of the smoothing tick.
pub const TICK_INTERVAL: Duration = Duration::from_millis(300);

/// How far `display` may run ahead of the last backend value.
const CAP_LEAD: f64 = 8.0;
/// Highest `display` value reachable before the backend reports 100.
const CAP_MAX: f64 = 99.0;
/// Ceiling of the slow crawl after `display` has caught `backend_cap`.
const CRAWL_CEILING: f64 = 96.0;
const CRAWL_STEP: f64 = 0.2;
/// Step used once the backend has reported 100.
const FINISH_STEP: f64 = 1.5;

/// One published progress observation.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    /// Whole percent, `0..=100`.
    pub progress: u8,
    pub status: NormalizedStatus,
    pub stage: Option<String>,
    pub job_id: Option<String>,
}

impl ProgressUpdate {
    /// Value of a channel no controller has written to yet.
    pub fn idle() -> Self {
        Self {
            progress: 0,
            status: NormalizedStatus::Queued,
            stage: None,
            job_id: None,
        }
    }
}

/// New information from the backend.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendUpdate {
    pub progress: Option<f64>,
    pub status: Option<NormalizedStatus>,
    pub stage: Option<String>,
    pub job_id: Option<String>,
}

impl BackendUpdate {
    pub fn from_snapshot(job_id: &str, snapshot: &JobStatusSnapshot) -> Self {
        Self {
            progress: snapshot.progress,
            status: Some(snapshot.status),
            stage: snapshot.stage.clone(),
            job_id: Some(job_id.to_string()),
        }
    }
}

/// Final values applied by [`ProgressHandle::stop`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinishUpdate {
    pub status: Option<NormalizedStatus>,
    /// Floor for both `backend` and `display`.
    pub progress: Option<f64>,
    pub stage: Option<String>,
}

/// Smoothing state, free of timers and channels.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressState {
    backend: f64,
    display: f64,
    status: NormalizedStatus,
    stage: Option<String>,
    job_id: Option<String>,
    last_emitted: Option<ProgressUpdate>,
}

impl ProgressState {
    /// Seed with `backend = clamp(initial, 0, 100)` and
    /// `display = max(backend, 1)`.
    pub fn new(status: NormalizedStatus, initial_progress: f64) -> Self {
        let backend = clamp_percent(initial_progress);
        Self {
            backend,
            display: backend.max(1.0),
            status,
            stage: None,
            job_id: None,
            last_emitted: None,
        }
    }

    pub fn backend(&self) -> f64 {
        self.backend
    }

    pub fn display(&self) -> f64 {
        self.display
    }

    pub fn status(&self) -> NormalizedStatus {
        self.status
    }

    pub fn stage(&self) -> Option<&str> {
        self.stage.as_deref()
    }

    pub fn job_id(&self) -> Option<&str> {
        self.job_id.as_deref()
    }

    /// Highest value `display` approaches before the backend reports 100.
    pub fn backend_cap(&self) -> f64 {
        if self.backend >= 100.0 {
            100.0
        } else {
            (self.backend + CAP_LEAD).min(CAP_MAX)
        }
    }

    /// Advance `display` by one tick. Returns whether it moved.
    ///
    /// Does nothing once the status is terminal.
    pub fn tick(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }

        let before = self.display;
        if self.backend >= 100.0 {
            self.display = (self.display + FINISH_STEP).min(100.0);
        } else {
            let cap = self.backend_cap();
            if self.display < cap {
                let step = approach_step(cap - self.display);
                self.display = (self.display + step).min(cap);
            } else if self.display < CRAWL_CEILING {
                self.display = (self.display + CRAWL_STEP).min(CRAWL_CEILING);
            }
        }
        self.display != before
    }

    /// Fold in new backend information. `backend` never decreases and
    /// `display` is lifted to at least the new backend value.
    pub fn apply_backend(&mut self, update: BackendUpdate) {
        if let Some(progress) = update.progress {
            let progress = clamp_percent(progress);
            if progress > self.backend {
                self.backend = progress;
            }
            if progress > self.display {
                self.display = progress;
            }
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        if update.stage.is_some() {
            self.stage = update.stage;
        }
        if update.job_id.is_some() {
            self.job_id = update.job_id;
        }
    }

    /// Apply final values before the controller is discarded.
    pub fn finish(&mut self, finish: FinishUpdate) {
        if let Some(progress) = finish.progress {
            let progress = clamp_percent(progress);
            self.backend = self.backend.max(progress);
            self.display = self.display.max(progress);
        }
        if let Some(status) = finish.status {
            self.status = status;
        }
        if finish.stage.is_some() {
            self.stage = finish.stage;
        }
    }

    /// The observation the current state represents.
    pub fn current(&self) -> ProgressUpdate {
        ProgressUpdate {
            progress: self.display.floor().clamp(0.0, 100.0) as u8,
            status: self.status,
            stage: self.stage.clone(),
            job_id: self.job_id.clone(),
        }
    }

    /// The current observation, unless it equals the last one taken.
    pub fn take_emission(&mut self) -> Option<ProgressUpdate> {
        let current = self.current();
        if self.last_emitted.as_ref() == Some(&current) {
            return None;
        }
        self.last_emitted = Some(current.clone());
        Some(current)
    }
}

/// Step towards `backend_cap` for a given remaining gap.
fn approach_step(gap: f64) -> f64 {
    if gap > 15.0 {
        1.8
    } else if gap > 8.0 {
        1.2
    } else if gap > 3.0 {
        0.8
    } else {
        0.4
    }
}

fn clamp_percent(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 100.0)
    } else {
        0.0
    }
}

/// State shared between a handle and its ticker task.
struct Shared {
    state: Mutex<ProgressState>,
    tx: Arc<watch::Sender<ProgressUpdate>>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, ProgressState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, state: &mut ProgressState) {
        if let Some(update) = state.take_emission() {
            tracing::trace!(
                progress = update.progress,
                status = %update.status,
                job_id = update.job_id.as_deref(),
                "Progress update",
            );
            self.tx.send_replace(update);
        }
    }

    /// One timer firing. Returns `false` once the ticker should stop.
    fn tick(&self) -> bool {
        let mut state = self.lock();
        if state.status().is_terminal() {
            return false;
        }
        if state.tick() {
            self.publish(&mut state);
        }
        true
    }
}

/// A running progress controller.
///
/// Owned by exactly one in-flight generation. Dropping the handle stops
/// its ticker; [`stop`](Self::stop) additionally publishes final values.
pub struct ProgressHandle {
    shared: Arc<Shared>,
    timer: CancellationToken,
}

impl ProgressHandle {
    /// Seed the state, publish it once on a fresh channel, and start the
    /// 300 ms ticker.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(status: NormalizedStatus, initial_progress: f64) -> Self {
        let (tx, _rx) = watch::channel(ProgressUpdate::idle());
        Self::start_on(Arc::new(tx), status, initial_progress)
    }

    /// Like [`start`](Self::start), publishing into an existing channel.
    fn start_on(
        tx: Arc<watch::Sender<ProgressUpdate>>,
        status: NormalizedStatus,
        initial_progress: f64,
    ) -> Self {
        let shared = Arc::new(Shared {
            state: Mutex::new(ProgressState::new(status, initial_progress)),
            tx,
        });
        {
            let mut state = shared.lock();
            shared.publish(&mut state);
        }

        let timer = CancellationToken::new();
        tokio::spawn(run_ticker(Arc::clone(&shared), timer.clone()));
        tracing::debug!(status = %status, initial_progress, "Progress controller started");

        Self { shared, timer }
    }

    /// Receive every published [`ProgressUpdate`].
    pub fn subscribe(&self) -> watch::Receiver<ProgressUpdate> {
        self.shared.tx.subscribe()
    }

    /// Copy of the current smoothing state.
    pub fn state(&self) -> ProgressState {
        self.shared.lock().clone()
    }

    pub fn display(&self) -> f64 {
        self.shared.lock().display()
    }

    /// Fold in backend information and publish if anything changed.
    pub fn update_with_backend(&self, update: BackendUpdate) {
        let mut state = self.shared.lock();
        state.apply_backend(update);
        self.shared.publish(&mut state);
    }

    /// Stop the ticker, apply `finish`, publish one last time and
    /// discard the controller. Returns the final observation.
    pub fn stop(self, finish: FinishUpdate) -> ProgressUpdate {
        self.timer.cancel();
        let mut state = self.shared.lock();
        state.finish(finish);
        self.shared.publish(&mut state);
        tracing::debug!(
            status = %state.status(),
            display = state.display(),
            "Progress controller stopped",
        );
        state.current()
    }
}

impl Drop for ProgressHandle {
    fn drop(&mut self) {
        self.timer.cancel();
    }
}

async fn run_ticker(shared: Arc<Shared>, stop: CancellationToken) {
    let mut interval = tokio::time::interval_at(Instant::now() + TICK_INTERVAL, TICK_INTERVAL);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = stop.cancelled() => break,
            _ = interval.tick() => {
                if !shared.tick() {
                    break;
                }
            }
        }
    }
}

/// One logical progress display (a progress bar, a card in a job list).
///
/// Holds at most one live controller. All controllers started in the
/// slot publish into the slot's channel, so observers subscribe once.
pub struct ProgressSlot {
    tx: Arc<watch::Sender<ProgressUpdate>>,
    active: Option<ProgressHandle>,
}

impl Default for ProgressSlot {
    fn default() -> Self {
        let (tx, _rx) = watch::channel(ProgressUpdate::idle());
        Self {
            tx: Arc::new(tx),
            active: None,
        }
    }
}

impl ProgressSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Observe every update published by controllers in this slot.
    pub fn subscribe(&self) -> watch::Receiver<ProgressUpdate> {
        self.tx.subscribe()
    }

    /// Stop the current controller, if any, then start a new one.
    pub fn start(&mut self, status: NormalizedStatus, initial_progress: f64) -> &ProgressHandle {
        if let Some(previous) = self.active.take() {
            previous.stop(FinishUpdate::default());
        }
        let handle = ProgressHandle::start_on(Arc::clone(&self.tx), status, initial_progress);
        self.active.insert(handle)
    }

    pub fn active(&self) -> Option<&ProgressHandle> {
        self.active.as_ref()
    }

    /// Stop and discard the current controller.
    pub fn stop(&mut self, finish: FinishUpdate) -> Option<ProgressUpdate> {
        self.active.take().map(|handle| handle.stop(finish))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn processing_at(backend: f64) -> ProgressState {
        let mut state = ProgressState::new(NormalizedStatus::Processing, 0.0);
        state.apply_backend(BackendUpdate {
            progress: Some(backend),
            ..Default::default()
        });
        state
    }

    #[test]
    fn seeds_backend_and_display() {
        let state = ProgressState::new(NormalizedStatus::Queued, 0.0);
        assert_eq!(state.backend(), 0.0);
        assert_eq!(state.display(), 1.0);

        let state = ProgressState::new(NormalizedStatus::Processing, 150.0);
        assert_eq!(state.backend(), 100.0);
        assert_eq!(state.display(), 100.0);
    }

    #[test]
    fn backend_cap() {
        assert_eq!(processing_at(10.0).backend_cap(), 18.0);
        assert_eq!(processing_at(95.0).backend_cap(), 99.0);
        assert_eq!(processing_at(100.0).backend_cap(), 100.0);
    }

    #[test]
    fn approach_steps_shrink_with_gap() {
        assert_eq!(approach_step(20.0), 1.8);
        assert_eq!(approach_step(10.0), 1.2);
        assert_eq!(approach_step(5.0), 0.8);
        assert_eq!(approach_step(3.0), 0.4);
        assert_eq!(approach_step(0.5), 0.4);
    }

    #[test]
    fn tick_approaches_cap() {
        let mut state = processing_at(50.0);
        assert_eq!(state.display(), 50.0);
        assert!(state.tick());
        assert!((state.display() - 50.8).abs() < 1e-9);
    }

    #[test]
    fn approach_never_overshoots_cap() {
        let mut state = processing_at(40.0);
        let cap = state.backend_cap();
        while state.display() < cap {
            state.tick();
            assert!(state.display() <= cap, "display {} above cap {cap}", state.display());
        }
        assert_eq!(state.display(), cap);
    }

    #[test]
    fn display_is_monotonic_and_below_100_for_fixed_backend() {
        for backend in [0.0, 12.0, 50.0, 90.0, 99.0] {
            let mut state = processing_at(backend);
            let mut previous = state.display();
            for _ in 0..1_000 {
                state.tick();
                assert!(state.display() >= previous);
                assert!(state.display() <= state.backend_cap().max(CRAWL_CEILING));
                assert!(state.display() < 100.0);
                previous = state.display();
            }
        }
    }

    #[test]
    fn crawls_to_ceiling_after_catching_cap() {
        let mut state = processing_at(50.0);
        while state.display() < state.backend_cap() {
            state.tick();
        }
        assert_eq!(state.display(), 58.0);
        state.tick();
        assert!((state.display() - 58.2).abs() < 1e-9);

        for _ in 0..1_000 {
            state.tick();
        }
        assert_eq!(state.display(), CRAWL_CEILING);
        assert!(!state.tick());
    }

    #[test]
    fn runs_to_100_once_backend_is_maxed() {
        let mut state = processing_at(90.0);
        state.apply_backend(BackendUpdate {
            progress: Some(100.0),
            ..Default::default()
        });
        assert_eq!(state.display(), 100.0);

        let mut state = ProgressState::new(NormalizedStatus::Processing, 0.0);
        state.backend = 100.0;
        state.display = 97.0;
        state.tick();
        assert_eq!(state.display(), 98.5);
        state.tick();
        state.tick();
        assert_eq!(state.display(), 100.0);
    }

    #[test]
    fn terminal_status_freezes_ticks() {
        let mut state = processing_at(30.0);
        state.apply_backend(BackendUpdate {
            status: Some(NormalizedStatus::Failed),
            ..Default::default()
        });
        let before = state.display();
        assert!(!state.tick());
        assert_eq!(state.display(), before);
    }

    #[test]
    fn backend_never_decreases() {
        let mut state = processing_at(60.0);
        state.apply_backend(BackendUpdate {
            progress: Some(20.0),
            stage: Some("upscaling".into()),
            ..Default::default()
        });
        assert_eq!(state.backend(), 60.0);
        assert_eq!(state.display(), 60.0);
        assert_eq!(state.stage(), Some("upscaling"));
    }

    #[test]
    fn emissions_are_deduplicated() {
        let mut state = ProgressState::new(NormalizedStatus::Queued, 0.0);
        assert!(state.take_emission().is_some());
        assert!(state.take_emission().is_none());

        // 1.0 -> 1.8 stays at whole percent 1.
        state.tick();
        assert!(state.take_emission().is_none());

        state.apply_backend(BackendUpdate {
            job_id: Some("job-1".into()),
            ..Default::default()
        });
        let update = state.take_emission().unwrap();
        assert_eq!(update.job_id.as_deref(), Some("job-1"));
        assert_eq!(update.progress, 1);

        state.apply_backend(BackendUpdate {
            status: Some(NormalizedStatus::Processing),
            ..Default::default()
        });
        assert_eq!(
            state.take_emission().map(|u| u.status),
            Some(NormalizedStatus::Processing)
        );
    }

    #[test]
    fn finish_applies_floor() {
        let mut state = processing_at(40.0);
        state.finish(FinishUpdate {
            status: Some(NormalizedStatus::Completed),
            progress: Some(100.0),
            stage: None,
        });
        assert_eq!(state.current().progress, 100);
        assert_eq!(state.status(), NormalizedStatus::Completed);

        let mut state = processing_at(70.0);
        state.finish(FinishUpdate {
            progress: Some(10.0),
            ..Default::default()
        });
        assert_eq!(state.display(), 70.0);
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_advances_display_between_backend_updates() {
        let handle = ProgressHandle::start(NormalizedStatus::Queued, 0.0);
        let rx = handle.subscribe();
        assert_eq!(rx.borrow().progress, 1);

        tokio::time::sleep(TICK_INTERVAL * 10 + Duration::from_millis(10)).await;

        let display = handle.display();
        assert!(display > 1.0, "display should have advanced, got {display}");
        assert!(display <= CRAWL_CEILING);
        assert_eq!(rx.borrow().progress, display.floor() as u8);
    }

    #[tokio::test(start_paused = true)]
    async fn ticker_stops_on_terminal_status() {
        let handle = ProgressHandle::start(NormalizedStatus::Processing, 20.0);
        handle.update_with_backend(BackendUpdate {
            status: Some(NormalizedStatus::Completed),
            ..Default::default()
        });
        let frozen = handle.display();

        tokio::time::sleep(TICK_INTERVAL * 5).await;
        assert_eq!(handle.display(), frozen);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_publishes_final_update() {
        let handle = ProgressHandle::start(NormalizedStatus::Processing, 30.0);
        let rx = handle.subscribe();

        let last = handle.stop(FinishUpdate {
            status: Some(NormalizedStatus::Completed),
            progress: Some(100.0),
            stage: Some("done".into()),
        });

        assert_eq!(last.progress, 100);
        assert_eq!(*rx.borrow(), last);
    }

    #[tokio::test(start_paused = true)]
    async fn slot_replaces_previous_controller() {
        let mut slot = ProgressSlot::new();
        let rx = slot.subscribe();
        assert_eq!(*rx.borrow(), ProgressUpdate::idle());

        slot.start(NormalizedStatus::Processing, 50.0);
        assert_eq!(rx.borrow().progress, 50);

        slot.start(NormalizedStatus::Queued, 0.0);
        assert_eq!(rx.borrow().progress, 1);

        tokio::time::sleep(TICK_INTERVAL * 20).await;

        // Only the second controller ticks: a surviving first one would
        // have pushed the shared channel back above 50.
        let seen = rx.borrow().clone();
        assert_eq!(seen.status, NormalizedStatus::Queued);
        assert!(seen.progress < 50, "unexpected progress {}", seen.progress);
        assert!(slot.active().is_some_and(|h| h.display() > 1.0));

        assert!(slot.stop(FinishUpdate::default()).is_some());
        assert!(slot.active().is_none());
    }
}
