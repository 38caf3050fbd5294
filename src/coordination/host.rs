//! The host application's single serialized execution context.
//!
//! Broker-side tasks never touch game state directly. They submit closures
//! through a [`HostHandle`]; the application drains the matching
//! [`HostQueue`] from its own main loop, one job at a time, in submission
//! order.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error};

pub type HostJob = Box<dyn FnOnce() + Send + 'static>;

/// Cloneable submitter for host jobs.
#[derive(Clone)]
pub struct HostHandle {
    tx: mpsc::UnboundedSender<HostJob>,
}

impl HostHandle {
    /// Queue a job. Returns false once the queue has been dropped.
    pub fn submit<F>(&self, job: F) -> bool
    where
        F: FnOnce() + Send + 'static,
    {
        self.tx.send(Box::new(job)).is_ok()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Receiving end, owned by whatever drives the host's main loop.
pub struct HostQueue {
    rx: mpsc::UnboundedReceiver<HostJob>,
}

pub fn host_context() -> (HostHandle, HostQueue) {
    let (tx, rx) = mpsc::unbounded_channel();
    (HostHandle { tx }, HostQueue { rx })
}

impl HostQueue {
    /// Run the jobs queued when this call started. Jobs they submit run on
    /// the next call. Returns how many jobs ran.
    pub fn run_pending(&mut self) -> usize {
        let budget = self.rx.len();
        let mut ran = 0;
        while ran < budget {
            match self.rx.try_recv() {
                Ok(job) => {
                    run_job(job);
                    ran += 1;
                }
                Err(_) => break,
            }
        }
        ran
    }

    /// Run jobs as they arrive until every handle is dropped.
    pub async fn run(mut self) {
        while let Some(job) = self.rx.recv().await {
            run_job(job);
        }
        debug!("Host queue closed");
    }

    /// Drive the queue from a fixed-rate tick, like a game server's main loop.
    pub fn spawn_ticker(mut self, tick: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(tick);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                self.run_pending();
                if self.rx.is_closed() && self.rx.is_empty() {
                    break;
                }
            }
        })
    }
}

fn run_job(job: HostJob) {
    if catch_unwind(AssertUnwindSafe(job)).is_err() {
        error!("Host job panicked; continuing with the next job");
    }
}
