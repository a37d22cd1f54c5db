use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use rstest::{fixture, rstest};
use serde_json::{Value, json};
use tempfile::TempDir;

use edge_api::{Bus, BusError, BusFuture, BusMessage, BusSubscription};
use edge_bus::MemoryBus;
use edge_sdk::{Client, Command, CommandResult, Options, Payload, SdkError};

const WAIT: Duration = Duration::from_secs(2);

struct Harness {
    bus: Arc<MemoryBus>,
    dir: TempDir,
}

#[fixture]
fn harness() -> Harness {
    Harness { bus: Arc::new(MemoryBus::new()), dir: tempfile::tempdir().unwrap() }
}

impl Harness {
    fn options(&self) -> Options {
        Options::new("camera")
            .with_version("1.2.3")
            .with_config_dir(self.dir.path())
            .with_heartbeat_interval(Duration::from_secs(3600))
            .with_signal_handling(false)
            .with_logger(false)
    }

    async fn start(&self, options: Options) -> Client {
        Client::with_bus(options, self.bus.clone()).await.unwrap()
    }

    async fn subscribe(&self, subject: &str) -> Box<dyn BusSubscription> {
        self.bus.subscribe(subject).await.unwrap()
    }

    async fn push(&self, subject: &str, body: Value) {
        self.bus.publish(subject, serde_json::to_vec(&body).unwrap()).await.unwrap();
    }
}

async fn next_json(sub: &mut Box<dyn BusSubscription>) -> Value {
    let msg = tokio::time::timeout(WAIT, sub.recv())
        .await
        .expect("timed out waiting for a message")
        .expect("subscription ended");
    serde_json::from_slice(&msg.payload).unwrap()
}

async fn nothing_within(sub: &mut Box<dyn BusSubscription>, window: Duration) -> bool {
    tokio::time::timeout(window, sub.recv()).await.is_err()
}

fn payload(value: Value) -> Payload {
    value.as_object().cloned().unwrap()
}

/// Delegates to a [`MemoryBus`] but ignores `close`, so anything the client
/// still sends after shutdown stays observable.
struct KeepOpenBus(Arc<MemoryBus>);

impl Bus for KeepOpenBus {
    fn publish(&self, subject: &str, payload: Vec<u8>) -> BusFuture<'_, Result<(), BusError>> {
        self.0.publish(subject, payload)
    }

    fn subscribe(&self, subject: &str) -> BusFuture<'_, Result<Box<dyn BusSubscription>, BusError>> {
        self.0.subscribe(subject)
    }

    fn request(&self, subject: &str, payload: Vec<u8>, timeout: Duration) -> BusFuture<'_, Result<BusMessage, BusError>> {
        self.0.request(subject, payload, timeout)
    }

    fn is_connected(&self) -> bool {
        self.0.is_connected()
    }

    fn close(&self) -> BusFuture<'_, ()> {
        Box::pin(async {})
    }
}

// ═══════════════════════════════════════════════════════════════
//  Construction
// ═══════════════════════════════════════════════════════════════

#[rstest]
#[tokio::test]
async fn empty_app_key_is_rejected(harness: Harness) {
    let err = Client::with_bus(Options::new(""), harness.bus.clone()).await.unwrap_err();
    assert!(matches!(err, SdkError::Options(_)));
}

#[rstest]
#[tokio::test]
async fn subscribes_to_command_and_config_subjects(harness: Harness) {
    let client = harness.start(harness.options()).await;

    assert_eq!(harness.bus.subscriber_count("app.camera.cmd"), 1);
    assert_eq!(harness.bus.subscriber_count("app.camera.config.set"), 1);
    assert_eq!(client.identity().key(), "camera");
    assert_eq!(client.config_path(), harness.dir.path().join("camera").join("config.yaml"));
    client.close().await;
}

// ═══════════════════════════════════════════════════════════════
//  Commands
// ═══════════════════════════════════════════════════════════════

#[rstest]
#[tokio::test]
async fn unknown_command_fails_with_action_in_message(harness: Harness) {
    let mut results = harness.subscribe("app.camera.cmd.result").await;
    let client = harness.start(harness.options()).await;

    harness.push("app.camera.cmd", json!({"action": "self-destruct", "command_id": "c-9"})).await;

    let result = next_json(&mut results).await;
    assert_eq!(result["success"], false);
    assert_eq!(result["command_id"], "c-9");
    assert!(result["message"].as_str().unwrap().contains("self-destruct"));
    assert!(result["timestamp"].as_i64().unwrap() > 0);
    client.close().await;
}

#[rstest]
#[case("start", "App is already running")]
#[case("stop", "Stop command received (managed by systemd)")]
#[case("restart", "Restart command received (managed by systemd)")]
#[tokio::test]
async fn default_lifecycle_commands_succeed(harness: Harness, #[case] action: &str, #[case] message: &str) {
    let mut results = harness.subscribe("app.camera.cmd.result").await;
    let client = harness.start(harness.options()).await;

    harness.push("app.camera.cmd", json!({"action": action, "command_id": "c-1"})).await;

    let result = next_json(&mut results).await;
    assert_eq!(result["success"], true);
    assert_eq!(result["message"], message);
    client.close().await;
}

#[rstest]
#[tokio::test]
async fn snapshot_reports_version_and_status(harness: Harness) {
    let mut results = harness.subscribe("app.camera.cmd.result").await;
    let client = harness.start(harness.options()).await;

    harness.push("app.camera.cmd", json!({"action": "snapshot", "command_id": "s-1"})).await;

    let result = next_json(&mut results).await;
    assert_eq!(result["message"], "Snapshot command received");
    assert_eq!(result["data"]["version"], "1.2.3");
    assert_eq!(result["data"]["status"], "running");
    assert!(result["data"]["uptime"].is_u64());
    client.close().await;
}

#[rstest]
#[tokio::test]
async fn request_style_command_gets_reply_with_real_id(harness: Harness) {
    let mut results = harness.subscribe("app.camera.cmd.result").await;
    let client = harness.start(harness.options()).await;
    client.on_command(|cmd| {
        let mut result = CommandResult::success(format!("handled {}", cmd.action));
        result.command_id = "spoofed".into();
        result.data = Some(cmd.payload.clone());
        result
    });

    let command = Command::new("calibrate", "req-7").with_payload(payload(json!({"target": "lens"})));
    let body = serde_json::to_vec(&command).unwrap();
    let reply = harness.bus.request("app.camera.cmd", body, WAIT).await.unwrap();
    let result: CommandResult = serde_json::from_slice(&reply.payload).unwrap();

    assert!(result.success);
    assert_eq!(result.message, "handled calibrate");
    assert_eq!(result.command_id, "req-7");
    assert_eq!(result.data, Some(payload(json!({"target": "lens"}))));
    // Replied, not also published on the result subject.
    assert!(nothing_within(&mut results, Duration::from_millis(100)).await);
    client.close().await;
}

#[rstest]
#[tokio::test]
async fn panicking_handler_does_not_stop_the_router(harness: Harness) {
    let mut results = harness.subscribe("app.camera.cmd.result").await;
    let client = harness.start(harness.options()).await;
    client.on_command(|cmd| {
        if cmd.action == "boom" {
            panic!("handler exploded");
        }
        CommandResult::success("fine")
    });

    harness.push("app.camera.cmd", json!({"action": "boom", "command_id": "b-1"})).await;
    harness.push("app.camera.cmd", json!({"action": "ok", "command_id": "b-2"})).await;

    let first = next_json(&mut results).await;
    assert_eq!(first["success"], false);
    assert_eq!(first["command_id"], "b-1");
    let second = next_json(&mut results).await;
    assert_eq!(second["success"], true);
    assert_eq!(second["command_id"], "b-2");
    client.close().await;
}

#[rstest]
#[tokio::test]
async fn malformed_command_is_logged_not_answered(harness: Harness) {
    let mut results = harness.subscribe("app.camera.cmd.result").await;
    let mut logs = harness.subscribe("app.camera.logs").await;
    let client = harness.start(harness.options()).await;

    harness.bus.publish("app.camera.cmd", b"{oops".to_vec()).await.unwrap();

    let log = next_json(&mut logs).await;
    assert_eq!(log["level"], "Error");
    assert!(log["msg"].as_str().unwrap().starts_with("Failed to unmarshal command"));
    assert!(nothing_within(&mut results, Duration::from_millis(100)).await);
    client.close().await;
}

// ═══════════════════════════════════════════════════════════════
//  Logs / events / status
// ═══════════════════════════════════════════════════════════════

#[rstest]
#[tokio::test]
async fn logs_below_minimum_are_not_forwarded(harness: Harness) {
    let mut logs = harness.subscribe("app.camera.logs").await;
    let client = harness.start(harness.options().with_log_level("Warn")).await;

    client.log_debug("noise").await;
    client.log_info("still noise").await;
    client.log_error("disk full").await;

    let log = next_json(&mut logs).await;
    assert_eq!(log["level"], "Error");
    assert_eq!(log["msg"], "disk full");
    assert!(nothing_within(&mut logs, Duration::from_millis(100)).await);
    client.close().await;
}

#[rstest]
#[tokio::test]
async fn unknown_minimum_forwards_everything(harness: Harness) {
    let mut logs = harness.subscribe("app.camera.logs").await;
    let client = harness.start(harness.options()).await;
    client.set_min_log_level("Verbose");

    client.log_trace("fine grained").await;

    let log = next_json(&mut logs).await;
    assert_eq!(log["level"], "Trace");
    client.close().await;
}

#[rstest]
#[tokio::test]
async fn raised_minimum_gates_forwarding(harness: Harness) {
    let mut logs = harness.subscribe("app.camera.logs").await;
    let client = harness.start(harness.options()).await;

    client.set_min_log_level("Error");
    assert_eq!(client.min_log_level(), "Error");

    client.log_warn("low battery").await;
    client.log_error("battery dead").await;

    let log = next_json(&mut logs).await;
    assert_eq!(log["level"], "Error");
    assert_eq!(log["msg"], "battery dead");
    assert!(nothing_within(&mut logs, Duration::from_millis(100)).await);
    client.close().await;
}

#[rstest]
#[tokio::test]
async fn fatal_and_panic_are_forwarded_without_exiting(harness: Harness) {
    let mut logs = harness.subscribe("app.camera.logs").await;
    let client = harness.start(harness.options()).await;

    client.log_fatal("sensor lost").await;
    client.log_panic("state corrupt").await;

    assert_eq!(next_json(&mut logs).await["level"], "Fatal");
    assert_eq!(next_json(&mut logs).await["level"], "Panic");
    assert!(client.is_running());
    client.close().await;
}

#[rstest]
#[tokio::test]
async fn events_and_status_carry_payloads(harness: Harness) {
    let mut events = harness.subscribe("app.camera.events").await;
    let mut status = harness.subscribe("app.camera.status").await;
    let client = harness.start(harness.options()).await;

    client.emit_event("motion", payload(json!({"zone": 3}))).await;
    client.report_status(payload(json!({"fps": 29.5}))).await;

    let event = next_json(&mut events).await;
    assert_eq!(event["event"], "motion");
    assert_eq!(event["data"]["zone"], 3);

    let report = next_json(&mut status).await;
    assert_eq!(report["app_key"], "camera");
    assert_eq!(report["status"], "running");
    assert_eq!(report["data"]["fps"], 29.5);
    client.close().await;
}

// ═══════════════════════════════════════════════════════════════
//  Config
// ═══════════════════════════════════════════════════════════════

#[rstest]
#[tokio::test]
async fn pushed_log_level_is_applied_and_acked(harness: Harness) {
    let mut acks = harness.subscribe("app.camera.config.ack").await;
    let client = harness.start(harness.options()).await;

    harness.push("app.camera.config.set", json!({"config": {"sdk": {"log_level": "Debug"}}})).await;

    let ack = next_json(&mut acks).await;
    assert_eq!(ack["success"], true);
    assert_eq!(ack["message"], "Config updated successfully");
    assert_eq!(ack["timestamp"], 0);
    assert_eq!(client.min_log_level(), "Debug");
    assert_eq!(client.load_config().unwrap(), payload(json!({"sdk": {"log_level": "Debug"}})));
    client.close().await;
}

#[rstest]
#[tokio::test]
async fn handler_sees_persisted_config(harness: Harness) {
    let mut acks = harness.subscribe("app.camera.config.ack").await;
    let client = harness.start(harness.options()).await;
    let path = client.config_path().to_path_buf();
    let seen_on_disk = Arc::new(AtomicBool::new(false));
    let flag = seen_on_disk.clone();
    client.on_config(move |config| {
        flag.store(path.exists() && config.contains_key("fps"), Ordering::SeqCst);
        Ok(())
    });

    harness.push("app.camera.config.set", json!({"config": {"fps": 15}, "version": "7"})).await;

    assert_eq!(next_json(&mut acks).await["success"], true);
    assert!(seen_on_disk.load(Ordering::SeqCst));
    client.close().await;
}

#[rstest]
#[tokio::test]
async fn rejected_config_is_acked_as_failure(harness: Harness) {
    let mut acks = harness.subscribe("app.camera.config.ack").await;
    let client = harness.start(harness.options()).await;
    client.on_config(|_| Err("fps out of range".into()));

    harness.push("app.camera.config.set", json!({"config": {"fps": 900, "log_level": "Trace"}})).await;

    let ack = next_json(&mut acks).await;
    assert_eq!(ack["success"], false);
    assert_eq!(ack["message"], "Failed to apply config: fps out of range");
    // Persisted before the handler ran, but the level was not applied.
    assert_eq!(client.load_config().unwrap()["fps"], 900);
    assert_eq!(client.min_log_level(), "Info");
    client.close().await;
}

#[rstest]
#[tokio::test]
async fn save_failure_skips_handler(harness: Harness) {
    let mut acks = harness.subscribe("app.camera.config.ack").await;
    let client = harness.start(harness.options()).await;
    std::fs::create_dir_all(client.config_path()).unwrap();
    let called = Arc::new(AtomicBool::new(false));
    let flag = called.clone();
    client.on_config(move |_| {
        flag.store(true, Ordering::SeqCst);
        Ok(())
    });

    harness.push("app.camera.config.set", json!({"config": {"fps": 15}})).await;

    let ack = next_json(&mut acks).await;
    assert_eq!(ack["success"], false);
    assert!(ack["message"].as_str().unwrap().starts_with("Failed to save config: "));
    assert!(!called.load(Ordering::SeqCst));
    client.close().await;
}

#[rstest]
#[tokio::test]
async fn malformed_config_is_not_acked(harness: Harness) {
    let mut acks = harness.subscribe("app.camera.config.ack").await;
    let client = harness.start(harness.options()).await;

    harness.bus.publish("app.camera.config.set", b"[1,2".to_vec()).await.unwrap();

    assert!(nothing_within(&mut acks, Duration::from_millis(150)).await);
    assert!(client.load_config().unwrap().is_empty());
    client.close().await;
}

// ═══════════════════════════════════════════════════════════════
//  Heartbeat
// ═══════════════════════════════════════════════════════════════

#[rstest]
#[tokio::test]
async fn heartbeat_merges_callback_metrics(harness: Harness) {
    let mut beats = harness.subscribe("app.camera.heartbeat").await;
    let client = harness.start(harness.options().with_heartbeat_interval(Duration::from_millis(50))).await;
    client.set_heartbeat_callback(|| payload(json!({"custom": 1})));

    // The first beat may have gone out before the callback was set.
    let beat = loop {
        let beat = next_json(&mut beats).await;
        if beat["metrics"].get("custom").is_some() {
            break beat;
        }
    };
    assert_eq!(beat["app_key"], "camera");
    assert_eq!(beat["version"], "1.2.3");
    assert_eq!(beat["status"], "running");
    let metrics = beat["metrics"].as_object().unwrap();
    assert_eq!(metrics.len(), 2);
    assert!(metrics["uptime"].is_u64());
    assert_eq!(metrics["custom"], 1);
    client.close().await;
}

#[rstest]
#[tokio::test]
async fn callback_metrics_override_builtin_uptime(harness: Harness) {
    let mut beats = harness.subscribe("app.camera.heartbeat").await;
    let client = harness.start(harness.options().with_heartbeat_interval(Duration::from_millis(50))).await;
    client.set_heartbeat_callback(|| payload(json!({"uptime": 999})));

    // Beats sent before the callback was set carry the real uptime; a
    // later one must carry the callback's value instead.
    let beat = loop {
        let beat = next_json(&mut beats).await;
        if beat["metrics"]["uptime"] == 999 {
            break beat;
        }
    };
    assert_eq!(beat["metrics"].as_object().unwrap().len(), 1);
    client.close().await;
}

#[rstest]
#[tokio::test]
async fn first_heartbeat_is_immediate(harness: Harness) {
    let mut beats = harness.subscribe("app.camera.heartbeat").await;
    let client = harness.start(harness.options()).await;

    let beat = next_json(&mut beats).await;
    assert_eq!(beat["metrics"]["uptime"], 0);
    client.close().await;
}

#[rstest]
#[tokio::test]
async fn heartbeat_skipped_while_disconnected(harness: Harness) {
    let client = harness.start(harness.options().with_heartbeat_interval(Duration::from_millis(20))).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    client.set_heartbeat_callback(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Payload::new()
    });

    harness.bus.set_connected(false);
    tokio::time::sleep(Duration::from_millis(50)).await;
    let before = calls.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(calls.load(Ordering::SeqCst), before);

    harness.bus.set_connected(true);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(calls.load(Ordering::SeqCst) > before);
    client.close().await;
}

#[rstest]
#[tokio::test]
async fn interval_change_restarts_heartbeat(harness: Harness) {
    let mut beats = harness.subscribe("app.camera.heartbeat").await;
    let client = harness.start(harness.options()).await;
    next_json(&mut beats).await;
    assert!(nothing_within(&mut beats, Duration::from_millis(100)).await);

    client.set_heartbeat_interval(Duration::from_millis(20));

    next_json(&mut beats).await;
    next_json(&mut beats).await;
    client.close().await;
}

// ═══════════════════════════════════════════════════════════════
//  Shutdown
// ═══════════════════════════════════════════════════════════════

#[rstest]
#[tokio::test]
async fn double_close_is_safe_and_stops_heartbeat(harness: Harness) {
    let client = harness.start(harness.options().with_heartbeat_interval(Duration::from_millis(20))).await;
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = calls.clone();
    client.set_heartbeat_callback(move || {
        counter.fetch_add(1, Ordering::SeqCst);
        Payload::new()
    });
    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(calls.load(Ordering::SeqCst) > 0);

    client.close().await;
    let after_close = calls.load(Ordering::SeqCst);
    client.close().await;

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(calls.load(Ordering::SeqCst), after_close);
    assert!(!client.is_running());
    assert!(harness.bus.is_closed());
}

#[rstest]
#[tokio::test]
async fn concurrent_close_from_clones(harness: Harness) {
    let client = harness.start(harness.options()).await;
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let c = client.clone();
            tokio::spawn(async move { c.close().await })
        })
        .collect();
    for h in handles {
        h.await.unwrap();
    }
    assert!(!client.is_running());
}

#[rstest]
#[tokio::test]
async fn wait_for_shutdown_resolves_after_close(harness: Harness) {
    let client = harness.start(harness.options()).await;
    let waiter = {
        let c = client.clone();
        tokio::spawn(async move { c.wait_for_shutdown().await })
    };

    client.close().await;
    tokio::time::timeout(WAIT, waiter).await.unwrap().unwrap();
}

#[rstest]
#[tokio::test]
async fn emitters_are_silent_after_close(harness: Harness) {
    let client = harness.start(harness.options()).await;
    client.close().await;

    // Would fail loudly if anything touched the closed bus and panicked.
    client.log_error("late").await;
    client.emit_event("late", Payload::new()).await;
    client.report_status(Payload::new()).await;
    client.set_heartbeat_interval(Duration::from_millis(10));
    assert!(!client.is_running());
}

#[rstest]
#[tokio::test]
async fn nothing_is_published_after_close_even_if_bus_stays_open(harness: Harness) {
    let bus: Arc<dyn Bus> = Arc::new(KeepOpenBus(harness.bus.clone()));
    let options = harness.options().with_heartbeat_interval(Duration::from_millis(20));
    let client = Client::with_bus(options, bus).await.unwrap();
    client.close().await;
    assert!(!harness.bus.is_closed());

    let mut logs = harness.subscribe("app.camera.logs").await;
    let mut events = harness.subscribe("app.camera.events").await;
    let mut status = harness.subscribe("app.camera.status").await;
    let mut beats = harness.subscribe("app.camera.heartbeat").await;

    client.log_error("late").await;
    client.log_panic("late").await;
    client.emit_event("late", payload(json!({"n": 1}))).await;
    client.report_status(payload(json!({"n": 1}))).await;
    client.set_heartbeat_interval(Duration::from_millis(10));

    let window = Duration::from_millis(150);
    assert!(nothing_within(&mut logs, window).await);
    assert!(nothing_within(&mut events, window).await);
    assert!(nothing_within(&mut status, window).await);
    assert!(nothing_within(&mut beats, window).await);
}

// ═══════════════════════════════════════════════════════════════
//  Request / reply
// ═══════════════════════════════════════════════════════════════

#[rstest]
#[tokio::test]
async fn request_round_trips_json(harness: Harness) {
    let mut inbound = harness.subscribe("svc.echo").await;
    let bus = harness.bus.clone();
    tokio::spawn(async move {
        while let Some(msg) = inbound.recv().await {
            if let Some(reply) = msg.reply {
                let _ = bus.respond(&reply, msg.payload).await;
            }
        }
    });
    let client = harness.start(harness.options()).await;

    let reply: Value = client.request("svc.echo", &json!({"ping": 1})).await.unwrap();
    assert_eq!(reply, json!({"ping": 1}));

    let err = client
        .request_with_timeout::<_, Value>("svc.nobody", &json!({}), Duration::from_millis(50))
        .await
        .unwrap_err();
    assert!(matches!(err, SdkError::Bus(_)));
    assert!(!err.is_timeout());
    client.close().await;
}

#[rstest]
#[tokio::test]
async fn unanswered_request_times_out(harness: Harness) {
    let _silent = harness.subscribe("svc.silent").await;
    let client = harness.start(harness.options()).await;

    let err = client
        .request_with_timeout::<_, Value>("svc.silent", &json!({"ping": 1}), Duration::from_millis(50))
        .await
        .unwrap_err();
    assert!(err.is_timeout(), "{err}");
    client.close().await;
}
