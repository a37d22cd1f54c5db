use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use crate::BusError;

/// Boxed future returned by the bus traits.
pub type BusFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ════════════════════════════════════════════════════════════════
//  BusMessage
// ════════════════════════════════════════════════════════════════

/// A message delivered to a subscriber.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusMessage {
    /// Subject the message was published on.
    pub subject: String,
    /// Ephemeral reply subject for RPC-style requests.
    pub reply: Option<String>,
    /// Raw payload bytes (JSON for everything the SDK sends).
    pub payload: Vec<u8>,
}

impl BusMessage {
    pub fn new(subject: impl Into<String>, payload: Vec<u8>) -> Self {
        Self { subject: subject.into(), reply: None, payload }
    }

    pub fn with_reply(mut self, reply: impl Into<String>) -> Self {
        self.reply = Some(reply.into());
        self
    }
}

// ════════════════════════════════════════════════════════════════
//  Bus traits
// ════════════════════════════════════════════════════════════════

/// Subscription to a subject: an async stream of messages.
pub trait BusSubscription: Send {
    /// Next message. `None` = the bus closed or the subscription ended.
    fn recv(&mut self) -> BusFuture<'_, Option<BusMessage>>;
}

/// Messaging substrate used by the SDK.
///
/// Implementations own reconnection. Callers never see a "disconnected"
/// state as an error from `subscribe`; a publish against a down connection
/// returns an error the caller is expected to log and drop.
pub trait Bus: Send + Sync {
    /// Publish a payload on a subject.
    fn publish(&self, subject: &str, payload: Vec<u8>) -> BusFuture<'_, Result<(), BusError>>;

    /// Subscribe to a subject. Every inbound message is yielded once.
    fn subscribe(&self, subject: &str)
        -> BusFuture<'_, Result<Box<dyn BusSubscription>, BusError>>;

    /// One-shot correlated round trip bounded by `timeout`.
    fn request(
        &self,
        subject: &str,
        payload: Vec<u8>,
        timeout: Duration,
    ) -> BusFuture<'_, Result<BusMessage, BusError>>;

    /// Reply to a request. Same as `publish`, on the request's reply subject.
    fn respond(&self, reply: &str, payload: Vec<u8>) -> BusFuture<'_, Result<(), BusError>> {
        self.publish(reply, payload)
    }

    /// Whether the underlying connection is currently up.
    fn is_connected(&self) -> bool;

    /// Flush pending messages and tear the connection down.
    fn close(&self) -> BusFuture<'_, ()>;
}
