use super::connection::BrokerConnection;
use super::transport::InboundMessage;
use crate::coordination::MessageRouter;
use crate::metrics::CoordinationMetrics;
use crate::protocol::Envelope;
use futures_util::StreamExt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct RunningLoop {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Clears the running flag when the loop exits, including by unwinding.
struct RunningGuard(Arc<AtomicBool>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// The single long-lived listening loop of a node.
///
/// The channel set is fixed when the loop starts. Losing the subscription
/// sleeps for the configured backoff and resubscribes until [`stop`](Self::stop).
pub struct Subscriber {
    connection: Arc<BrokerConnection>,
    running: Arc<AtomicBool>,
    state: Mutex<Option<RunningLoop>>,
}

impl Subscriber {
    pub fn new(connection: Arc<BrokerConnection>) -> Self {
        Self {
            connection,
            running: Arc::new(AtomicBool::new(false)),
            state: Mutex::new(None),
        }
    }

    /// Start listening. Returns false when the broker is disconnected or a
    /// loop is already running.
    pub async fn start(&self, channels: Vec<String>, router: Arc<MessageRouter>) -> bool {
        if !self.connection.is_connected() {
            debug!("Broker disconnected; subscriber not started");
            return false;
        }

        let mut state = self.state.lock().await;
        if state.as_ref().is_some_and(|running| !running.handle.is_finished()) {
            warn!("Subscriber already running; start ignored");
            return false;
        }

        let cancel = CancellationToken::new();
        self.running.store(true, Ordering::Release);
        let handle = tokio::spawn(subscribe_loop(
            Arc::clone(&self.connection),
            channels,
            router,
            cancel.clone(),
            Arc::clone(&self.running),
        ));
        *state = Some(RunningLoop { cancel, handle });
        true
    }

    /// Interrupt the loop and wait for it to exit.
    pub async fn stop(&self) {
        let running = self.state.lock().await.take();
        if let Some(RunningLoop { cancel, handle }) = running {
            cancel.cancel();
            if let Err(e) = handle.await {
                warn!(error = %e, "Subscriber task ended abnormally");
            }
        }
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

async fn subscribe_loop(
    connection: Arc<BrokerConnection>,
    channels: Vec<String>,
    router: Arc<MessageRouter>,
    cancel: CancellationToken,
    running: Arc<AtomicBool>,
) {
    let _running = RunningGuard(running);
    let metrics = Arc::clone(connection.metrics());
    let backoff = connection.settings().subscriber_backoff();

    loop {
        let Some(transport) = connection.transport() else {
            info!("Broker disconnected; subscriber loop exiting");
            break;
        };

        let subscribed = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = transport.subscribe(&channels) => result,
        };

        match subscribed {
            Ok(mut stream) => {
                info!(channels = channels.len(), "Subscribed to broker channels");
                loop {
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return,
                        next = stream.next() => match next {
                            Some(message) => handle_message(&router, &metrics, message),
                            None => break,
                        },
                    }
                }
                warn!(
                    backoff_secs = backoff.as_secs(),
                    "Broker subscription lost; retrying after backoff"
                );
            }
            Err(e) => {
                warn!(
                    error = %e,
                    backoff_secs = backoff.as_secs(),
                    "Broker subscribe failed; retrying after backoff"
                );
            }
        }

        metrics.increment_subscriber_reconnects();
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(backoff) => {}
        }
    }
}

fn handle_message(router: &MessageRouter, metrics: &CoordinationMetrics, message: InboundMessage) {
    metrics.increment_messages_received();
    match Envelope::decode(&message.payload) {
        Ok(envelope) => {
            router.dispatch(&message.channel, envelope);
        }
        Err(e) => {
            metrics.increment_decode_failures();
            warn!(channel = %message.channel, error = %e, "Dropping malformed envelope");
        }
    }
}
