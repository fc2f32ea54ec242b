// Event Emitter - Delivers ownership events to subscribers after commit
//
// The transfer engine only enqueues; delivery runs separately so a slow or
// failing subscriber can never undo a settlement. Each subscriber gets every
// event at least once: failed deliveries are retried, then parked as dead
// letters that can be redelivered later.

use crate::events::OwnershipChanged;
use crate::model::PackageId;
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

// ============================================================================
// SUBSCRIBER TRAIT
// ============================================================================

/// Receiver of ownership events (event bus, notifier, audit log, ...)
#[async_trait]
pub trait EventSubscriber: Send + Sync {
    /// Name used in logs and dead letters. Must be unique per emitter.
    fn name(&self) -> &str;

    /// Accept one event. An error asks the emitter to retry.
    async fn deliver(&self, event: &OwnershipChanged) -> Result<(), String>;
}

// ============================================================================
// SUBSCRIBERS
// ============================================================================

/// Writes every event to the log
pub struct LogSubscriber;

#[async_trait]
impl EventSubscriber for LogSubscriber {
    fn name(&self) -> &str {
        "log"
    }

    async fn deliver(&self, event: &OwnershipChanged) -> Result<(), String> {
        info!(
            package = %event.package(),
            old_owner = %event.old_owner(),
            new_owner = %event.new_owner(),
            status = %event.status(),
            "ownership changed"
        );
        Ok(())
    }
}

/// Forwards events into a tokio channel
pub struct ChannelSubscriber {
    name: String,
    tx: mpsc::UnboundedSender<OwnershipChanged>,
}

impl ChannelSubscriber {
    /// Create a subscriber and the receiving end of its channel
    pub fn new(name: &str) -> (Self, mpsc::UnboundedReceiver<OwnershipChanged>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                name: name.to_string(),
                tx,
            },
            rx,
        )
    }
}

#[async_trait]
impl EventSubscriber for ChannelSubscriber {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, event: &OwnershipChanged) -> Result<(), String> {
        self.tx
            .send(event.clone())
            .map_err(|_| format!("receiver for {} dropped", self.name))
    }
}

/// Mock subscriber for testing
pub struct MockSubscriber {
    name: String,
    always_fail: bool,
    delay_ms: u64,
    failures_before_success: AtomicUsize,
    call_count: AtomicUsize,
    delivered: Mutex<Vec<OwnershipChanged>>,
}

impl MockSubscriber {
    /// Create a mock that accepts every event
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            always_fail: false,
            delay_ms: 0,
            failures_before_success: AtomicUsize::new(0),
            call_count: AtomicUsize::new(0),
            delivered: Mutex::new(Vec::new()),
        }
    }

    /// Reject every delivery
    pub fn always_failing(mut self) -> Self {
        self.always_fail = true;
        self
    }

    /// Fail the first N calls, then succeed
    pub fn with_failures_then_success(mut self, failures: usize) -> Self {
        self.failures_before_success = AtomicUsize::new(failures);
        self
    }

    /// Add a delay before responding
    pub fn with_delay_ms(mut self, ms: u64) -> Self {
        self.delay_ms = ms;
        self
    }

    /// Let a previously failing mock start accepting
    pub fn recover(&self) {
        self.failures_before_success.store(0, Ordering::SeqCst);
    }

    /// Number of delivery attempts seen
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Events accepted so far, in delivery order
    pub fn delivered(&self) -> Vec<OwnershipChanged> {
        self.delivered
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

#[async_trait]
impl EventSubscriber for MockSubscriber {
    fn name(&self) -> &str {
        &self.name
    }

    async fn deliver(&self, event: &OwnershipChanged) -> Result<(), String> {
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }

        let call_num = self.call_count.fetch_add(1, Ordering::SeqCst);
        let failures_remaining = self.failures_before_success.load(Ordering::SeqCst);

        if self.always_fail || call_num < failures_remaining {
            return Err("Mock failure".to_string());
        }

        self.delivered
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event.clone());
        Ok(())
    }
}

// ============================================================================
// EMITTER CONFIG
// ============================================================================

/// Configuration for event delivery
#[derive(Clone, Debug)]
pub struct EmitterConfig {
    /// Retries per subscriber after the first attempt
    pub max_retries: u32,
    /// Delay between retries in milliseconds
    pub retry_delay_ms: u64,
    /// Timeout for one delivery attempt in milliseconds
    pub timeout_ms: u64,
}

impl EmitterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_retry_delay_ms(mut self, ms: u64) -> Self {
        self.retry_delay_ms = ms;
        self
    }

    pub fn with_timeout_ms(mut self, ms: u64) -> Self {
        self.timeout_ms = ms;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), EmitError> {
        if self.timeout_ms == 0 {
            return Err(EmitError::InvalidConfig("timeout_ms must be > 0".to_string()));
        }
        Ok(())
    }
}

impl Default for EmitterConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 100,
            timeout_ms: 5_000,
        }
    }
}

// ============================================================================
// EMIT ERROR
// ============================================================================

/// Errors from event emission
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EmitError {
    #[error("Event queue closed: ownership event for package {package} was not queued")]
    QueueClosed { package: PackageId },

    #[error("Subscriber {subscriber} rejected event for package {package} after {attempts} attempts: {reason}")]
    DeliveryFailed {
        subscriber: String,
        package: PackageId,
        attempts: u32,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

// ============================================================================
// EVENT QUEUE
// ============================================================================

/// Post-commit hand-off from the transfer engine to the emitter
#[derive(Clone, Debug)]
pub struct EventQueue {
    tx: mpsc::UnboundedSender<OwnershipChanged>,
}

impl EventQueue {
    /// Queue an event for delivery. Never blocks.
    pub fn publish(&self, event: OwnershipChanged) -> Result<(), EmitError> {
        self.tx.send(event).map_err(|rejected| EmitError::QueueClosed {
            package: rejected.0.package().clone(),
        })
    }

    /// True once the emitter has been dropped
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

// ============================================================================
// DEAD LETTERS AND STATS
// ============================================================================

/// An event a subscriber never accepted
#[derive(Clone, Debug)]
pub struct DeadLetter {
    pub subscriber: String,
    pub event: OwnershipChanged,
    pub error: String,
    pub attempts: u32,
}

/// Statistics about event delivery
#[derive(Clone, Debug, Default)]
pub struct EmitterStats {
    pub events_received: u64,
    pub deliveries: u64,
    pub retries: u64,
    pub dead_letters: u64,
}

// ============================================================================
// EMITTER
// ============================================================================

/// Drains the event queue and fans events out to subscribers
pub struct EventEmitter {
    config: EmitterConfig,
    subscribers: Vec<Arc<dyn EventSubscriber>>,
    rx: mpsc::UnboundedReceiver<OwnershipChanged>,
    dead_letters: Vec<DeadLetter>,
    stats: EmitterStats,
}

impl EventEmitter {
    /// Create an emitter and the queue handle the engine publishes into
    pub fn new(config: EmitterConfig) -> (Self, EventQueue) {
        let (tx, rx) = mpsc::unbounded_channel();
        let emitter = Self {
            config,
            subscribers: Vec::new(),
            rx,
            dead_letters: Vec::new(),
            stats: EmitterStats::default(),
        };
        (emitter, EventQueue { tx })
    }

    /// Register a subscriber for all future events
    pub fn subscribe(&mut self, subscriber: Arc<dyn EventSubscriber>) {
        debug!(subscriber = subscriber.name(), "subscriber registered");
        self.subscribers.push(subscriber);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliver one event to every subscriber. Returns how many accepted it.
    pub async fn dispatch(&mut self, event: &OwnershipChanged) -> usize {
        self.stats.events_received += 1;
        let mut accepted = 0;

        for subscriber in &self.subscribers {
            match deliver_with_retry(&self.config, subscriber.as_ref(), event).await {
                Ok(attempts) => {
                    accepted += 1;
                    self.stats.deliveries += 1;
                    self.stats.retries += u64::from(attempts - 1);
                }
                Err(EmitError::DeliveryFailed {
                    subscriber: name,
                    attempts,
                    reason,
                    ..
                }) => {
                    error!(
                        subscriber = %name,
                        package = %event.package(),
                        attempts,
                        "event delivery failed, parked as dead letter: {}",
                        reason
                    );
                    self.stats.retries += u64::from(attempts - 1);
                    self.stats.dead_letters += 1;
                    self.dead_letters.push(DeadLetter {
                        subscriber: name,
                        event: event.clone(),
                        error: reason,
                        attempts,
                    });
                }
                Err(other) => {
                    error!("unexpected emitter error: {}", other);
                }
            }
        }

        accepted
    }

    /// Deliver everything currently queued. Returns the number of events handled.
    pub async fn drain(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.rx.try_recv() {
            self.dispatch(&event).await;
            handled += 1;
        }
        handled
    }

    /// Deliver events until every queue handle has been dropped
    pub async fn run(mut self) -> Self {
        while let Some(event) = self.rx.recv().await {
            self.dispatch(&event).await;
        }
        debug!("event queue closed, emitter stopping");
        self
    }

    /// Retry every dead letter once more. Returns how many were delivered.
    pub async fn redeliver_dead_letters(&mut self) -> usize {
        let pending = std::mem::take(&mut self.dead_letters);
        let mut delivered = 0;

        for mut letter in pending {
            let Some(subscriber) = self
                .subscribers
                .iter()
                .find(|s| s.name() == letter.subscriber)
            else {
                warn!(subscriber = %letter.subscriber, "dead letter for unknown subscriber kept");
                self.dead_letters.push(letter);
                continue;
            };

            match deliver_with_retry(&self.config, subscriber.as_ref(), &letter.event).await {
                Ok(_) => {
                    delivered += 1;
                    self.stats.deliveries += 1;
                    self.stats.dead_letters = self.stats.dead_letters.saturating_sub(1);
                }
                Err(e) => {
                    letter.attempts += match &e {
                        EmitError::DeliveryFailed { attempts, .. } => *attempts,
                        _ => 0,
                    };
                    letter.error = e.to_string();
                    self.dead_letters.push(letter);
                }
            }
        }

        delivered
    }

    pub fn dead_letters(&self) -> &[DeadLetter] {
        &self.dead_letters
    }

    pub fn stats(&self) -> &EmitterStats {
        &self.stats
    }
}

/// Try one subscriber until it accepts or the retries run out.
/// Returns the number of attempts used.
async fn deliver_with_retry(
    config: &EmitterConfig,
    subscriber: &dyn EventSubscriber,
    event: &OwnershipChanged,
) -> Result<u32, EmitError> {
    let timeout = Duration::from_millis(config.timeout_ms);
    let mut attempts = 0u32;
    let last_error;

    loop {
        attempts += 1;

        match tokio::time::timeout(timeout, subscriber.deliver(event)).await {
            Ok(Ok(())) => return Ok(attempts),
            Ok(Err(e)) => {
                warn!(subscriber = subscriber.name(), attempt = attempts, "delivery failed: {}", e);
                if attempts > config.max_retries {
                    last_error = e;
                    break;
                }
            }
            Err(_) => {
                warn!(subscriber = subscriber.name(), attempt = attempts, "delivery timed out");
                if attempts > config.max_retries {
                    last_error = "Timeout".to_string();
                    break;
                }
            }
        }

        if config.retry_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(config.retry_delay_ms)).await;
        }
    }

    Err(EmitError::DeliveryFailed {
        subscriber: subscriber.name().to_string(),
        package: event.package().clone(),
        attempts,
        reason: last_error,
    })
}
