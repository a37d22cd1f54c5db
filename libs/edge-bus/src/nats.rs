use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::StreamExt;

use edge_api::{Bus, BusError, BusFuture, BusMessage, BusSubscription};

/// Fixed wait between reconnect attempts.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

fn into_bus_message(msg: async_nats::Message) -> BusMessage {
    BusMessage {
        subject: msg.subject.to_string(),
        reply: msg.reply.map(|r| r.to_string()),
        payload: msg.payload.to_vec(),
    }
}

// ═══════════════════════════════════════════════════════════════
//  NatsSubscription
// ═══════════════════════════════════════════════════════════════

pub struct NatsSubscription {
    inner: async_nats::Subscriber,
}

impl BusSubscription for NatsSubscription {
    fn recv(&mut self) -> BusFuture<'_, Option<BusMessage>> {
        Box::pin(async { self.inner.next().await.map(into_bus_message) })
    }
}

// ═══════════════════════════════════════════════════════════════
//  NatsBus
// ═══════════════════════════════════════════════════════════════

/// [`Bus`] over a NATS connection.
///
/// Reconnection is left to `async-nats`: it retries forever with a fixed
/// delay and buffers publishes while disconnected. Connection events are
/// logged, never surfaced as errors.
pub struct NatsBus {
    client: async_nats::Client,
    url: String,
    closed: AtomicBool,
}

impl std::fmt::Debug for NatsBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NatsBus").field("url", &self.url).finish()
    }
}

impl NatsBus {
    /// Connect to a NATS server. Fails if the server is unreachable now.
    pub async fn connect(url: &str) -> Result<Self, BusError> {
        let client = async_nats::ConnectOptions::new()
            .reconnect_delay_callback(|_attempts| RECONNECT_DELAY)
            .event_callback(|event| async move {
                match event {
                    async_nats::Event::Disconnected => tracing::warn!("nats disconnected"),
                    async_nats::Event::Connected => tracing::info!("nats connected"),
                    other => tracing::debug!(event = ?other, "nats connection event"),
                }
            })
            .connect(url)
            .await
            .map_err(|e| BusError::Connection { url: url.to_string(), detail: e.to_string() })?;

        tracing::info!(url = %url, "connected to nats");
        Ok(Self { client, url: url.to_string(), closed: AtomicBool::new(false) })
    }

    fn ensure_open(&self) -> Result<(), BusError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(BusError::Closed);
        }
        Ok(())
    }
}

impl Bus for NatsBus {
    fn publish(&self, subject: &str, payload: Vec<u8>) -> BusFuture<'_, Result<(), BusError>> {
        let subject = subject.to_string();
        Box::pin(async move {
            self.ensure_open()?;
            self.client
                .publish(subject.clone(), payload.into())
                .await
                .map_err(|e| BusError::send(subject, e))
        })
    }

    fn subscribe(&self, subject: &str)
        -> BusFuture<'_, Result<Box<dyn BusSubscription>, BusError>>
    {
        let subject = subject.to_string();
        Box::pin(async move {
            self.ensure_open()?;
            let inner = self
                .client
                .subscribe(subject.clone())
                .await
                .map_err(|e| BusError::subscribe(&subject, e))?;
            tracing::debug!(subject = %subject, "nats subscription added");
            Ok(Box::new(NatsSubscription { inner }) as Box<dyn BusSubscription>)
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
            self.ensure_open()?;
            let request = async_nats::Request::new()
                .payload(payload.into())
                .timeout(Some(timeout));
            match self.client.send_request(subject.clone(), request).await {
                Ok(msg) => Ok(into_bus_message(msg)),
                Err(e) if matches!(e.kind(), async_nats::RequestErrorKind::TimedOut) => {
                    Err(BusError::timeout(subject, timeout))
                }
                Err(e) => Err(BusError::send(subject, e)),
            }
        })
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
            && matches!(self.client.connection_state(), async_nats::connection::State::Connected)
    }

    fn close(&self) -> BusFuture<'_, ()> {
        Box::pin(async move {
            if self.closed.swap(true, Ordering::SeqCst) {
                return;
            }
            // Flushes pending publishes, unsubscribes and ends the connection.
            if let Err(e) = self.client.drain().await {
                tracing::warn!(error = %e, "nats drain on close failed");
            }
            tracing::info!(url = %self.url, "nats connection closed");
        })
    }
}
