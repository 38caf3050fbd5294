use super::{
    checkpoint_schedule, format_remaining, ControlError, ServerControlSignal, ServerHost,
};
use crate::config::ControlConfig;
use crate::coordination::HostHandle;
use crate::metrics::CoordinationMetrics;
use crate::protocol::ControlAction;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Idle,
    Countdown,
    /// Terminal action under way; further signals and cancels are ignored.
    Executing,
}

/// Result of offering a signal to the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    /// Addressed to another process
    NotTargeted,
    Started { checkpoints: usize },
    /// A running countdown was cancelled and this one started in its place
    Replaced {
        checkpoints: usize,
        cancelled_checkpoints: usize,
        cancelled_terminal: bool,
    },
    IgnoredExecuting,
    /// Delay above the configured maximum; any running countdown is untouched
    RejectedDelay,
    /// Called outside a tokio runtime; nothing was scheduled
    NoRuntime,
}

/// Snapshot of the active countdown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountdownTask {
    pub remaining_seconds: u64,
    pub reason: String,
    pub is_restart: bool,
    pub issued_by: String,
}

struct ActiveCountdown {
    id: u64,
    signal: ServerControlSignal,
    deadline: Instant,
    checkpoints: Vec<JoinHandle<()>>,
    terminal: JoinHandle<()>,
}

impl ActiveCountdown {
    /// Abort every unfinished task. Returns (checkpoints cancelled, terminal cancelled).
    fn abort(self) -> (usize, bool) {
        let mut cancelled = 0;
        for task in self.checkpoints {
            if !task.is_finished() {
                task.abort();
                cancelled += 1;
            }
        }
        let terminal = !self.terminal.is_finished();
        self.terminal.abort();
        (cancelled, terminal)
    }
}

enum Phase {
    Idle,
    Countdown(ActiveCountdown),
    Executing,
}

struct Shared {
    self_name: String,
    config: ControlConfig,
    host: HostHandle,
    server: Arc<dyn ServerHost>,
    metrics: Arc<CoordinationMetrics>,
    phase: Mutex<Phase>,
    next_id: AtomicU64,
}

impl Shared {
    fn phase(&self) -> MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_current(&self, id: u64) -> bool {
        matches!(&*self.phase(), Phase::Countdown(active) if active.id == id)
    }

    fn broadcast(&self, message: String) {
        let server = Arc::clone(&self.server);
        self.host.submit(move || server.broadcast(&message));
    }
}

/// Runs the restart/shutdown countdown for one process.
///
/// Every side effect (broadcasts, kicks, restart, shutdown) is submitted to
/// the host context; the coordinator's own timers never call the
/// [`ServerHost`] directly.
#[derive(Clone)]
pub struct ServerControlCoordinator {
    shared: Arc<Shared>,
}

impl ServerControlCoordinator {
    pub fn new(
        self_name: &str,
        config: ControlConfig,
        host: HostHandle,
        server: Arc<dyn ServerHost>,
        metrics: Arc<CoordinationMetrics>,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                self_name: self_name.to_string(),
                config,
                host,
                server,
                metrics,
                phase: Mutex::new(Phase::Idle),
                next_id: AtomicU64::new(0),
            }),
        }
    }

    pub fn state(&self) -> CoordinatorState {
        match &*self.shared.phase() {
            Phase::Idle => CoordinatorState::Idle,
            Phase::Countdown(_) => CoordinatorState::Countdown,
            Phase::Executing => CoordinatorState::Executing,
        }
    }

    pub fn active_countdown(&self) -> Option<CountdownTask> {
        match &*self.shared.phase() {
            Phase::Countdown(active) => Some(CountdownTask {
                remaining_seconds: active
                    .deadline
                    .saturating_duration_since(Instant::now())
                    .as_secs(),
                reason: active.signal.reason.clone(),
                is_restart: active.signal.action.is_restart(),
                issued_by: active.signal.issued_by.clone(),
            }),
            _ => None,
        }
    }

    /// Apply a signal received from the broker.
    pub fn handle_signal(&self, signal: ServerControlSignal) -> SignalOutcome {
        let shared = &self.shared;
        if !signal.targets(&shared.self_name) {
            return SignalOutcome::NotTargeted;
        }
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            error!("Control signal received outside a tokio runtime; ignored");
            shared.metrics.increment_control_signals_ignored();
            return SignalOutcome::NoRuntime;
        };

        let started = Instant::now();
        let deadline = (signal.delay_seconds <= shared.config.max_delay_secs)
            .then(|| started.checked_add(Duration::from_secs(signal.delay_seconds)))
            .flatten();
        let Some(deadline) = deadline else {
            shared.metrics.increment_control_signals_ignored();
            warn!(
                action = %signal.action,
                delay_secs = signal.delay_seconds,
                max_delay_secs = shared.config.max_delay_secs,
                "Control signal delay out of range; signal ignored"
            );
            return SignalOutcome::RejectedDelay;
        };

        let mut phase = shared.phase();
        let replaced = match std::mem::replace(&mut *phase, Phase::Idle) {
            Phase::Executing => {
                *phase = Phase::Executing;
                shared.metrics.increment_control_signals_ignored();
                warn!(action = %signal.action, "Terminal action already running; signal ignored");
                return SignalOutcome::IgnoredExecuting;
            }
            Phase::Countdown(previous) => {
                let (cancelled_checkpoints, cancelled_terminal) = previous.abort();
                shared.metrics.add_countdown_tasks_cancelled(
                    cancelled_checkpoints as u64 + u64::from(cancelled_terminal),
                );
                Some((cancelled_checkpoints, cancelled_terminal))
            }
            Phase::Idle => None,
        };

        let active = self.schedule(&runtime, signal, started, deadline);
        let checkpoints = active.checkpoints.len();
        info!(
            action = %active.signal.action,
            delay_secs = active.signal.delay_seconds,
            reason = %active.signal.reason,
            issued_by = %active.signal.issued_by,
            checkpoints,
            replaced = replaced.is_some(),
            "Server control countdown started"
        );
        *phase = Phase::Countdown(active);
        drop(phase);
        shared.metrics.increment_control_signals_applied();

        match replaced {
            Some((cancelled_checkpoints, cancelled_terminal)) => SignalOutcome::Replaced {
                checkpoints,
                cancelled_checkpoints,
                cancelled_terminal,
            },
            None => SignalOutcome::Started { checkpoints },
        }
    }

    /// Abort the running countdown. No-op unless a countdown is active.
    pub fn cancel(&self) -> bool {
        let shared = &self.shared;
        let active = {
            let mut phase = shared.phase();
            if !matches!(&*phase, Phase::Countdown(_)) {
                return false;
            }
            match std::mem::replace(&mut *phase, Phase::Idle) {
                Phase::Countdown(active) => active,
                _ => return false,
            }
        };

        let action = active.signal.action;
        let (checkpoints, terminal) = active.abort();
        shared
            .metrics
            .add_countdown_tasks_cancelled(checkpoints as u64 + u64::from(terminal));
        shared.broadcast(format!(
            "Scheduled server {} has been cancelled.",
            action_noun(action)
        ));
        info!(%action, "Server control countdown cancelled");
        true
    }

    fn schedule(
        &self,
        runtime: &tokio::runtime::Handle,
        signal: ServerControlSignal,
        started: Instant,
        deadline: Instant,
    ) -> ActiveCountdown {
        let shared = &self.shared;
        let id = shared.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let verb = action_verb(signal.action);

        let mut headline = format!(
            "Server {verb} in {}",
            format_remaining(signal.delay_seconds)
        );
        if !signal.reason.is_empty() {
            headline.push_str(": ");
            headline.push_str(&signal.reason);
        }
        shared.broadcast(headline);

        let checkpoints = checkpoint_schedule(signal.delay_seconds, &shared.config.checkpoints)
            .into_iter()
            .map(|checkpoint| {
                let shared = Arc::clone(shared);
                let message = format!("Server {verb} in {}", format_remaining(checkpoint.remaining));
                runtime.spawn(async move {
                    tokio::time::sleep_until(started + checkpoint.offset).await;
                    if shared.is_current(id) {
                        shared.broadcast(message);
                    }
                })
            })
            .collect();

        let terminal = {
            let shared = Arc::clone(shared);
            let action = signal.action;
            runtime.spawn(async move {
                tokio::time::sleep_until(deadline).await;
                execute(&shared, id, action).await;
            })
        };

        ActiveCountdown {
            id,
            signal,
            deadline,
            checkpoints,
            terminal,
        }
    }
}

async fn execute(shared: &Arc<Shared>, id: u64, action: ControlAction) {
    {
        let mut phase = shared.phase();
        if !matches!(&*phase, Phase::Countdown(active) if active.id == id) {
            return;
        }
        *phase = Phase::Executing;
    }
    info!(%action, "Executing server control action");

    let kick = if action.is_restart() {
        shared.config.restart_kick_message.clone()
    } else {
        shared.config.shutdown_kick_message.clone()
    };
    let final_message = format!("Server {} now.", action_verb(action));
    let server = Arc::clone(&shared.server);
    shared.host.submit(move || {
        server.broadcast(&final_message);
        server.disconnect_all(&kick);
    });

    tokio::time::sleep(shared.config.grace_period()).await;

    let server = Arc::clone(&shared.server);
    shared.host.submit(move || {
        if !action.is_restart() {
            server.shutdown();
            return;
        }
        match server.restart() {
            Ok(()) => {}
            Err(ControlError::RestartUnavailable) => {
                warn!("Restart unavailable on this host; shutting down instead");
                server.shutdown();
            }
            Err(e @ ControlError::RestartFailed(_)) => {
                error!(error = %e, "Restart failed; shutting down instead");
                server.shutdown();
            }
        }
    });
}

fn action_verb(action: ControlAction) -> &'static str {
    match action {
        ControlAction::Restart => "restarting",
        ControlAction::Shutdown => "shutting down",
    }
}

fn action_noun(action: ControlAction) -> &'static str {
    match action {
        ControlAction::Restart => "restart",
        ControlAction::Shutdown => "shutdown",
    }
}
