use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::RegoStore;
use crate::coordinates::MAX_REFRESH_INTERVAL_MINUTES;
use crate::errors::RefreshError;

/// Receives failures from background refresh cycles.
pub type ErrorSink = Arc<dyn Fn(&RefreshError) + Send + Sync + 'static>;

pub fn logging_sink() -> ErrorSink {
    Arc::new(|err: &RefreshError| {
        warn!(category = %err.category, error = %err, "scheduled policy refresh failed");
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum SchedulerState {
    Idle,
    Running,
    Stopped,
}

pub(crate) struct RefreshScheduler {
    period: Option<Duration>,
    slot: Mutex<SchedulerSlot>,
}

struct SchedulerSlot {
    state: SchedulerState,
    cancel: Option<CancellationToken>,
    handle: Option<JoinHandle<()>>,
}

impl RefreshScheduler {
    pub(crate) fn new(refresh_interval_minutes: i64) -> Self {
        // clamped so the period arithmetic cannot overflow
        let period = u64::try_from(refresh_interval_minutes.min(MAX_REFRESH_INTERVAL_MINUTES))
            .ok()
            .filter(|minutes| *minutes > 0)
            .map(|minutes| Duration::from_secs(minutes * 60));
        Self {
            period,
            slot: Mutex::new(SchedulerSlot {
                state: SchedulerState::Idle,
                cancel: None,
                handle: None,
            }),
        }
    }

    pub(crate) fn period(&self) -> Option<Duration> {
        self.period
    }

    pub(crate) fn state(&self) -> SchedulerState {
        self.slot.lock().state
    }

    /// One-shot stores go straight to `Stopped`.
    pub(crate) fn mark_stopped(&self) {
        let mut slot = self.slot.lock();
        if slot.state == SchedulerState::Idle {
            slot.state = SchedulerState::Stopped;
        }
    }

    pub(crate) fn start(&self, store: &Arc<RegoStore>) -> bool {
        let Some(period) = self.period else {
            self.mark_stopped();
            return false;
        };
        let mut slot = self.slot.lock();
        if slot.state == SchedulerState::Running {
            return false;
        }
        let Ok(runtime) = Handle::try_current() else {
            warn!("policy refresh scheduler needs a tokio runtime; not started");
            return false;
        };

        let cancel = CancellationToken::new();
        let handle = runtime.spawn(run_refresh_loop(
            Arc::downgrade(store),
            period,
            cancel.clone(),
        ));
        slot.state = SchedulerState::Running;
        slot.cancel = Some(cancel);
        slot.handle = Some(handle);
        info!(period_secs = period.as_secs(), "policy refresh scheduler started");
        true
    }

    /// Takes effect before the next cycle; a cycle already running completes.
    pub(crate) fn stop(&self) -> bool {
        let mut slot = self.slot.lock();
        let was_running = slot.state == SchedulerState::Running;
        if let Some(cancel) = slot.cancel.take() {
            cancel.cancel();
        }
        slot.handle = None;
        slot.state = SchedulerState::Stopped;
        if was_running {
            info!("policy refresh scheduler stopped");
        }
        was_running
    }
}

async fn run_refresh_loop(store: Weak<RegoStore>, period: Duration, cancel: CancellationToken) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }
        let Some(store) = store.upgrade() else {
            break;
        };
        if let Err(err) = store.refresh_once().await {
            store.report_error(&err);
        }
    }
    debug!("policy refresh loop exited");
}
