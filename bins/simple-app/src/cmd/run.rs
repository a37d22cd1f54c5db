use std::time::Instant;

use serde_json::json;

use edge_sdk::{Client, Command, CommandResult, LogLevel, Payload, logging, now_secs};

use crate::config::{AppConfig, RunArgs};
use crate::error::AppError;

pub async fn run(args: RunArgs) -> Result<(), AppError> {
    let config = AppConfig::resolve(&args)?;

    // The client reuses this subscriber and its reload handle.
    if let Err(e) = logging::install(config.sdk.log_level.parse().unwrap_or(LogLevel::Info)) {
        eprintln!("warning: {e}");
    }
    tracing::info!(app_key = %config.sdk.app_key, nats = %config.sdk.nats_url, "simple-app starting");

    let client = Client::connect(config.sdk.clone()).await?;

    client.set_heartbeat_callback(|| object(json!({"custom_metric": 42, "custom_status": "healthy"})));

    let version = client.identity().version().to_string();
    let started = Instant::now();
    client.on_command(move |cmd| handle_command(cmd, &version, started.elapsed().as_secs()));

    client.on_config(|cfg| {
        tracing::info!(config = %serde_json::Value::Object(cfg.clone()), "config updated");
        Ok(())
    });

    client.log_info("Simple app initialized").await;
    client.log_info("Ready to receive commands").await;
    client.report_status(object(json!({"initialized": true, "ready": true}))).await;

    let mut ticker = tokio::time::interval(config.report_interval());
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = ticker.tick() => report(&client).await,
            _ = client.wait_for_shutdown() => break,
        }
    }

    tracing::info!("simple-app stopped");
    Ok(())
}

async fn report(client: &Client) {
    let now = now_secs();
    client
        .report_status(object(json!({"uptime": client.uptime(), "status": "running", "last_check": now})))
        .await;
    client.emit_event("app.heartbeat", object(json!({"timestamp": now}))).await;
    client.log_info("App is running normally").await;
}

fn handle_command(cmd: &Command, version: &str, uptime: u64) -> CommandResult {
    tracing::info!(action = %cmd.action, "received command");
    match cmd.action.as_str() {
        "start" => CommandResult::success("App started"),
        "stop" => CommandResult::success("App stopped"),
        "restart" => CommandResult::success("App restarted"),
        "snapshot" => CommandResult::success("Snapshot taken")
            .with_data(object(json!({"uptime": uptime, "version": version}))),
        other => CommandResult::failure(format!("Unknown command: {other}")),
    }
}

fn object(value: serde_json::Value) -> Payload {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Payload::new(),
    }
}
