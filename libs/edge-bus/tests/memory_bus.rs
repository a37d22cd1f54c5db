use std::sync::Arc;
use std::time::Duration;

use rstest::{fixture, rstest};

use edge_api::{Bus, BusError};
use edge_bus::MemoryBus;

#[fixture]
fn bus() -> Arc<MemoryBus> {
    Arc::new(MemoryBus::new())
}

/// Echo responder: replies to every request on `subject` with its payload.
async fn spawn_echo(bus: &Arc<MemoryBus>, subject: &str) -> tokio::task::JoinHandle<()> {
    let mut sub = bus.subscribe(subject).await.expect("subscribe echo");
    let bus = bus.clone();
    tokio::spawn(async move {
        while let Some(msg) = sub.recv().await {
            if let Some(reply) = msg.reply {
                bus.respond(&reply, msg.payload).await.expect("respond");
            }
        }
    })
}

#[rstest]
#[tokio::test]
async fn request_round_trips_through_reply_inbox(bus: Arc<MemoryBus>) {
    let echo = spawn_echo(&bus, "app.x.cmd").await;

    let reply = bus
        .request("app.x.cmd", b"ping".to_vec(), Duration::from_secs(1))
        .await
        .expect("reply");

    assert_eq!(reply.payload, b"ping");
    assert!(reply.subject.starts_with("_INBOX."));
    assert_eq!(bus.subscriber_count(&reply.subject), 0, "inbox is released");

    bus.close().await;
    echo.await.expect("echo task");
}

#[rstest]
#[tokio::test]
async fn request_times_out_when_nobody_answers(bus: Arc<MemoryBus>) {
    let _silent = bus.subscribe("app.x.cmd").await.expect("subscribe");

    let err = bus
        .request("app.x.cmd", Vec::new(), Duration::from_millis(20))
        .await
        .expect_err("should time out");

    assert!(err.is_timeout(), "{err}");
}

#[rstest]
#[tokio::test]
async fn request_without_subscribers_fails_fast(bus: Arc<MemoryBus>) {
    let err = bus
        .request("app.x.cmd", Vec::new(), Duration::from_secs(5))
        .await
        .expect_err("no responders");

    assert!(matches!(err, BusError::Send { .. }));
    assert!(err.to_string().contains("no responders"));
}

#[rstest]
#[tokio::test]
async fn outage_fails_publish_softly_and_recovers(bus: Arc<MemoryBus>) {
    let mut sub = bus.subscribe("app.x.logs").await.expect("subscribe");

    bus.set_connected(false);
    assert!(!bus.is_connected());
    let err = bus.publish("app.x.logs", b"lost".to_vec()).await.expect_err("down");
    assert!(matches!(err, BusError::NotConnected));

    bus.set_connected(true);
    bus.publish("app.x.logs", b"kept".to_vec()).await.expect("publish");
    assert_eq!(sub.recv().await.expect("message").payload, b"kept");
}

#[rstest]
#[tokio::test]
async fn closed_bus_rejects_everything(bus: Arc<MemoryBus>) {
    bus.close().await;
    bus.close().await;

    assert!(matches!(bus.publish("s", Vec::new()).await, Err(BusError::Closed)));
    assert!(matches!(bus.subscribe("s").await, Err(BusError::Closed)));
    assert!(!bus.is_connected());
}
