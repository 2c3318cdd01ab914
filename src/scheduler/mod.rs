//! Background polling loop.
//!
//! The scheduler owns two independent timers: the feed poll (re-resolve the
//! series list, then check every configured feed) and the progress poll (one
//! lifecycle sweep). A single task wakes on a short tick, runs whatever is
//! due and checks for a stop request between ticks.
//!
//! # Example
//!
//! ```no_run
//! use rssdld::{Config, EpisodeManager};
//! use rssdld::scheduler::Scheduler;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manager = EpisodeManager::new(Config::default()).await?;
//! let mut scheduler = Scheduler::new(manager);
//! scheduler.start()?;
//! // ...
//! scheduler.stop().await;
//! # Ok(())
//! # }
//! ```

use crate::clients::{AuthOutcome, DeviceChallenge};
use crate::error::{Error, Result};
use crate::manager::EpisodeManager;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;

/// Default wake-up granularity of the loop
pub const DEFAULT_TICK: Duration = Duration::from_millis(500);

/// Extra wait added when the watchlist asks to slow down
const SLOW_DOWN_STEP: Duration = Duration::from_secs(5);

/// Lifecycle of the scheduler itself
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    /// No loop running
    Stopped,
    /// Loop running
    Running,
    /// Stop requested, waiting for the loop to exit
    Stopping,
}

/// Interval timer; an interval of zero or less disables it
#[derive(Clone, Debug)]
pub struct PollTimer {
    interval: Option<Duration>,
    last: Option<Instant>,
}

impl PollTimer {
    /// Timer firing every `interval_secs` seconds, first at the first check
    pub fn new(interval_secs: i64) -> Self {
        let interval = u64::try_from(interval_secs)
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs);
        Self {
            interval,
            last: None,
        }
    }

    /// False when the interval was zero or negative
    pub fn is_enabled(&self) -> bool {
        self.interval.is_some()
    }

    /// True when enabled and the interval has elapsed since the last reset
    pub fn is_due(&self, now: Instant) -> bool {
        match (self.interval, self.last) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(interval), Some(last)) => now.saturating_duration_since(last) >= interval,
        }
    }

    /// Mark the timer as fired at `now`
    pub fn reset(&mut self, now: Instant) {
        self.last = Some(now);
    }
}

struct PendingAuth {
    challenge: DeviceChallenge,
    interval: Duration,
    next_poll: Instant,
    deadline: Instant,
}

/// Runs feed checks and lifecycle sweeps in the background
pub struct Scheduler {
    manager: EpisodeManager,
    tick: Duration,
    state: Arc<Mutex<SchedulerState>>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Scheduler {
    /// Scheduler driving `manager` with the default tick
    pub fn new(manager: EpisodeManager) -> Self {
        Self {
            manager,
            tick: DEFAULT_TICK,
            state: Arc::new(Mutex::new(SchedulerState::Stopped)),
            cancel: CancellationToken::new(),
            handle: None,
        }
    }

    /// Override the loop tick
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Current scheduler state
    pub fn state(&self) -> SchedulerState {
        self.state
            .lock()
            .map(|state| *state)
            .unwrap_or(SchedulerState::Stopped)
    }

    fn set_state(&self, next: SchedulerState) {
        if let Ok(mut state) = self.state.lock() {
            *state = next;
        }
    }

    /// Spawn the loop
    ///
    /// # Errors
    /// Returns error if the scheduler is not stopped.
    pub fn start(&mut self) -> Result<()> {
        if self.state() != SchedulerState::Stopped {
            return Err(Error::Other("Scheduler is already running".to_string()));
        }

        self.cancel = CancellationToken::new();
        let worker = Worker {
            manager: self.manager.clone(),
            tick: self.tick,
            cancel: self.cancel.clone(),
        };
        self.handle = Some(tokio::spawn(worker.run()));
        self.set_state(SchedulerState::Running);
        info!(tick = ?self.tick, "Scheduler started");
        Ok(())
    }

    /// Request a stop and wait for the loop and its shutdown hook to finish
    pub async fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        self.set_state(SchedulerState::Stopping);
        self.cancel.cancel();
        if let Err(e) = handle.await {
            error!(error = %e, "Scheduler task failed");
        }
        self.set_state(SchedulerState::Stopped);
        info!("Scheduler stopped");
    }
}

struct Worker {
    manager: EpisodeManager,
    tick: Duration,
    cancel: CancellationToken,
}

impl Worker {
    async fn run(self) {
        let config = self.manager.config();
        let mut feed_timer = PollTimer::new(config.feed_poll_interval);
        let mut progress_timer = PollTimer::new(config.progress_poll_interval);
        if !feed_timer.is_enabled() {
            info!("Feed polling disabled");
        }
        if !progress_timer.is_enabled() {
            info!("Progress polling disabled");
        }

        let mut pending_auth = self.begin_authentication().await;

        let mut ticker = tokio::time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if feed_timer.is_due(Instant::now()) {
                self.poll_feeds().await;
                feed_timer.reset(Instant::now());
            }

            if progress_timer.is_due(Instant::now()) {
                self.poll_progress().await;
                progress_timer.reset(Instant::now());
            }

            if let Some(auth) = pending_auth.take() {
                pending_auth = self.poll_authentication(auth).await;
            }
        }

        self.manager.shutdown().await;
    }

    async fn poll_feeds(&self) {
        let series = self.manager.refresh_filter().await;
        debug!(series = series.len(), "Series list resolved");

        match self.manager.check_feeds().await {
            Ok(summary) => debug!(summary = %summary, "Feed poll complete"),
            Err(e) => error!(error = %e, "Feed poll failed"),
        }
    }

    async fn poll_progress(&self) {
        match self.manager.advance().await {
            Ok(report) => debug!(
                examined = report.examined,
                transitions = report.transitions.len(),
                "Progress poll complete"
            ),
            Err(e) => error!(error = %e, "Progress poll failed"),
        }
    }

    async fn begin_authentication(&self) -> Option<PendingAuth> {
        if self.manager.watchlist_authenticated().await != Some(false) {
            return None;
        }

        let challenge = self.manager.start_authentication().await?;
        info!(
            user_code = %challenge.user_code,
            verification_url = %challenge.verification_url,
            "Watchlist authorization required: visit the URL and enter the code"
        );
        let now = Instant::now();
        Some(PendingAuth {
            interval: challenge.interval,
            next_poll: now + challenge.interval,
            deadline: now + challenge.expires_in,
            challenge,
        })
    }

    async fn poll_authentication(&self, mut auth: PendingAuth) -> Option<PendingAuth> {
        let now = Instant::now();
        if now >= auth.deadline {
            warn!(user_code = %auth.challenge.user_code, "Watchlist authorization expired");
            self.manager.cancel_authentication().await;
            return None;
        }
        if now < auth.next_poll {
            return Some(auth);
        }

        match self.manager.check_authentication().await {
            Some(AuthOutcome::Pending) | None => {}
            Some(AuthOutcome::SlowDown) => auth.interval += SLOW_DOWN_STEP,
            Some(AuthOutcome::Authorized) => {
                info!("Watchlist authorized");
                return None;
            }
            Some(outcome) => {
                warn!(outcome = ?outcome, "Watchlist authorization ended");
                return None;
            }
        }
        auth.next_poll = Instant::now() + auth.interval;
        Some(auth)
    }
}
