use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use tokio::sync::mpsc;

use edge_api::{Bus, BusError, BusFuture, BusMessage, BusSubscription};

const DEFAULT_BUFFER: usize = 1024;

// ═══════════════════════════════════════════════════════════════
//  MemorySubscription
// ═══════════════════════════════════════════════════════════════

pub struct MemorySubscription {
    rx: mpsc::Receiver<BusMessage>,
}

impl BusSubscription for MemorySubscription {
    fn recv(&mut self) -> BusFuture<'_, Option<BusMessage>> {
        Box::pin(async { self.rx.recv().await })
    }
}

// ═══════════════════════════════════════════════════════════════
//  MemoryBus
// ═══════════════════════════════════════════════════════════════

/// In-process bus with exact-subject routing.
///
/// Every subscriber gets its own bounded channel. A full channel drops the
/// message with a warning instead of blocking the publisher. Requests use
/// `_INBOX.<n>` reply subjects, like NATS.
///
/// `set_connected(false)` simulates an outage: publishes fail with
/// [`BusError::NotConnected`] until the flag is raised again.
pub struct MemoryBus {
    subjects: RwLock<HashMap<String, Vec<mpsc::Sender<BusMessage>>>>,
    buffer: usize,
    connected: AtomicBool,
    closed: AtomicBool,
    inbox_seq: AtomicU64,
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBus")
            .field("buffer", &self.buffer)
            .field("connected", &self.connected.load(Ordering::Relaxed))
            .field("closed", &self.closed.load(Ordering::Relaxed))
            .finish()
    }
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::with_buffer(DEFAULT_BUFFER)
    }

    /// Per-subscriber channel capacity.
    pub fn with_buffer(buffer: usize) -> Self {
        Self {
            subjects: RwLock::new(HashMap::new()),
            buffer: buffer.max(1),
            connected: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            inbox_seq: AtomicU64::new(0),
        }
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Live subscribers on an exact subject.
    pub fn subscriber_count(&self, subject: &str) -> usize {
        self.read_subjects()
            .get(subject)
            .map(|subs| subs.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    fn read_subjects(&self) -> RwLockReadGuard<'_, HashMap<String, Vec<mpsc::Sender<BusMessage>>>> {
        match self.subjects.read() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("memory bus read lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write_subjects(&self) -> RwLockWriteGuard<'_, HashMap<String, Vec<mpsc::Sender<BusMessage>>>> {
        match self.subjects.write() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("memory bus write lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn ensure_sendable(&self) -> Result<(), BusError> {
        if self.is_closed() {
            return Err(BusError::Closed);
        }
        if !self.connected.load(Ordering::SeqCst) {
            return Err(BusError::NotConnected);
        }
        Ok(())
    }

    /// Deliver to every live subscriber of `message.subject`.
    /// Returns how many subscribers accepted it.
    fn deliver(&self, message: BusMessage) -> Result<usize, BusError> {
        self.ensure_sendable()?;

        let mut subjects = self.write_subjects();
        let Some(subs) = subjects.get_mut(&message.subject) else {
            return Ok(0);
        };

        let mut delivered = 0;
        subs.retain(|tx| match tx.try_send(message.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(subject = %message.subject, "subscriber channel full, dropping");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
        if subs.is_empty() {
            subjects.remove(&message.subject);
        }
        Ok(delivered)
    }

    fn add_subscriber(&self, subject: &str) -> Result<MemorySubscription, BusError> {
        if self.is_closed() {
            return Err(BusError::Closed);
        }
        let (tx, rx) = mpsc::channel(self.buffer);
        self.write_subjects().entry(subject.to_string()).or_default().push(tx);
        Ok(MemorySubscription { rx })
    }

    fn next_inbox(&self) -> String {
        format!("_INBOX.{}", self.inbox_seq.fetch_add(1, Ordering::Relaxed))
    }
}

impl Bus for MemoryBus {
    fn publish(&self, subject: &str, payload: Vec<u8>) -> BusFuture<'_, Result<(), BusError>> {
        let message = BusMessage::new(subject, payload);
        Box::pin(async move { self.deliver(message).map(|_| ()) })
    }

    fn subscribe(&self, subject: &str)
        -> BusFuture<'_, Result<Box<dyn BusSubscription>, BusError>>
    {
        let subject = subject.to_string();
        Box::pin(async move {
            let sub = self.add_subscriber(&subject)?;
            tracing::debug!(subject = %subject, "memory bus subscription added");
            Ok(Box::new(sub) as Box<dyn BusSubscription>)
        })
    }

    fn request(
        &self,
        subject: &str,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> BusFuture<'_, Result<BusMessage, BusError>> {
        let subject = subject.to_string();
        Box::pin(async move {
            let inbox = self.next_inbox();
            let mut reply_sub = self.add_subscriber(&inbox)?;

            let message = BusMessage::new(subject.clone(), payload).with_reply(inbox.clone());
            let outcome = match self.deliver(message) {
                Ok(0) => Err(BusError::send(&subject, "no responders")),
                Ok(_) => match tokio::time::timeout(timeout, reply_sub.recv()).await {
                    Ok(Some(reply)) => Ok(reply),
                    Ok(None) => Err(BusError::Closed),
                    Err(_) => Err(BusError::timeout(&subject, timeout)),
                },
                Err(e) => Err(e),
            };

            self.write_subjects().remove(&inbox);
            outcome
        })
    }

    fn is_connected(&self) -> bool {
        !self.is_closed() && self.connected.load(Ordering::SeqCst)
    }

    fn close(&self) -> BusFuture<'_, ()> {
        Box::pin(async move {
            if self.closed.swap(true, Ordering::SeqCst) {
                return;
            }
            // Dropping the senders ends every subscription stream.
            self.write_subjects().clear();
            tracing::debug!("memory bus closed");
        })
    }
}
