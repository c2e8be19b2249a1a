//! Tracing session example.
//!
//! Registers the event-log and runtime-internals agents, runs one capture window
//! through the `Tracing` domain, prints the collected batches, then shows a
//! freeze/thaw cycle while tracing is active.
//!
//! Run with `RUST_LOG=debug` to see the coordinator and agent logs.

use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracelink::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    println!("=== Tracing Session Example ===\n");

    let (dispatcher, mut notifications) = DebugDispatcher::new();
    let dispatcher = Arc::new(dispatcher);
    let trace_log = Arc::new(TraceLog::new());
    let runtime_tracer = Arc::new(RuntimeTracer::new());

    let coordinator = TracingCoordinator::with_default_agents(
        dispatcher.clone(),
        trace_log.clone(),
        runtime_tracer.clone(),
        CoordinatorConfig::default(),
    )?;
    coordinator.thaw(None);
    println!("Agents: {:?}\n", coordinator.agent_names());

    let response = dispatcher
        .dispatch("Tracing.start", json!({"categories": "net,v8"}))
        .await;
    println!("Tracing.start -> {}", response.to_json());

    // Agents start on their own workers; give them a moment
    tokio::time::sleep(Duration::from_millis(50)).await;

    for i in 0..150 {
        trace_log.add_trace_event(TraceEvent::instant("net", format!("request-{}", i)).with_arg("id", i));
    }
    trace_log.add_trace_event(TraceEvent::instant("gpu", "filtered-out"));
    runtime_tracer.add_trace_event(TraceEvent::complete("v8", "V8.Execute", 120));
    runtime_tracer.add_trace_event(TraceEvent::complete("v8.gc", "V8.GCScavenger", 35));

    let response = dispatcher.dispatch("Tracing.end", json!({})).await;
    println!("Tracing.end -> {}\n", response.to_json());

    let mut total = 0;
    while let Some(notification) = notifications.recv().await {
        match notification.method.as_str() {
            "Tracing.dataCollected" => {
                let count = notification
                    .params
                    .as_ref()
                    .and_then(|p| p["value"].as_array())
                    .map(Vec::len)
                    .unwrap_or(0);
                total += count;
                println!("dataCollected: {} events", count);
            }
            "Tracing.tracingComplete" => {
                println!("tracingComplete ({} events total)\n", total);
                break;
            }
            other => println!("Unexpected notification: {}", other),
        }
    }

    println!("=== Freeze and thaw ===\n");

    dispatcher
        .dispatch("Tracing.start", json!({"categories": "net"}))
        .await;
    let snapshot = coordinator.freeze();
    let saved = snapshot.to_json()?;
    println!("Frozen snapshot: {}", saved);

    let response = dispatcher.dispatch("Tracing.end", json!({})).await;
    println!("Tracing.end while frozen -> {}", response.to_json());

    coordinator.thaw(Some(TracingSnapshot::from_json(&saved)?));
    println!("Thawed, tracing active: {}", coordinator.is_tracing());

    let response = dispatcher.dispatch("Tracing.end", json!({})).await;
    println!("Tracing.end -> {}", response.to_json());
    while let Some(notification) = notifications.recv().await {
        if notification.method == "Tracing.tracingComplete" {
            println!("tracingComplete");
            break;
        }
    }

    Ok(())
}
