use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use edge_api::{Bus, BusMessage, BusSubscription};

use crate::error::SdkError;

/// JSON over a [`Bus`].
///
/// Every payload the SDK sends or receives goes through here. Errors are
/// returned, never logged; callers decide whether a failure is worth a
/// log line.
#[derive(Clone)]
pub struct Transport {
    bus: Arc<dyn Bus>,
}

impl Transport {
    pub fn new(bus: Arc<dyn Bus>) -> Self {
        Self { bus }
    }

    pub fn is_connected(&self) -> bool {
        self.bus.is_connected()
    }

    /// Serialize `value` and publish it on `subject`.
    pub async fn publish<T: Serialize + ?Sized>(&self, subject: &str, value: &T) -> Result<(), SdkError> {
        let payload = encode(value)?;
        self.bus.publish(subject, payload).await?;
        Ok(())
    }

    /// Serialize `value` and send it to a request's reply subject.
    pub async fn respond<T: Serialize + ?Sized>(&self, reply: &str, value: &T) -> Result<(), SdkError> {
        let payload = encode(value)?;
        self.bus.respond(reply, payload).await?;
        Ok(())
    }

    /// JSON round trip: serialize `value`, wait for one reply, decode it.
    pub async fn request<T, R>(&self, subject: &str, value: &T, timeout: Duration) -> Result<R, SdkError>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let payload = encode(value)?;
        let reply = self.bus.request(subject, payload, timeout).await?;
        decode(&reply.payload)
    }

    pub async fn subscribe(&self, subject: &str) -> Result<Box<dyn BusSubscription>, SdkError> {
        Ok(self.bus.subscribe(subject).await?)
    }

    pub async fn close(&self) {
        self.bus.close().await;
    }
}

pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, SdkError> {
    serde_json::to_vec(value).map_err(SdkError::Encode)
}

pub fn decode<R: DeserializeOwned>(bytes: &[u8]) -> Result<R, SdkError> {
    serde_json::from_slice(bytes).map_err(SdkError::Decode)
}

/// Drive a subscription until the bus ends it or `token` fires.
///
/// Messages are handled one at a time, in arrival order.
pub(crate) fn spawn_listener<F, Fut>(
    name: &'static str,
    mut subscription: Box<dyn BusSubscription>,
    token: CancellationToken,
    handler: F,
) -> JoinHandle<()>
where
    F: Fn(BusMessage) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        loop {
            tokio::select! {
                msg = subscription.recv() => {
                    match msg {
                        Some(msg) => handler(msg).await,
                        None => break,
                    }
                }
                _ = token.cancelled() => break,
            }
        }
        tracing::debug!(listener = name, "stopped");
    })
}
