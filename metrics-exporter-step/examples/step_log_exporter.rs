use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use metrics_exporter_step::{Id, LogTransport, MeterType, StepExporterBuilder};
use tracing::Level;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let exporter = StepExporterBuilder::default()
        .with_namespace("demo")
        .with_step(Duration::from_secs(5))
        .with_batch_size(4)
        .build(LogTransport::new(Level::INFO))
        .expect("failed to build exporter");

    let registry = Arc::clone(exporter.registry());
    let loops = registry
        .counter(Id::new("server.loops", MeterType::Counter).with_tag(("system", "foo")))
        .expect("failed to register counter");
    let loop_time = registry
        .timer(Id::new("server.loop.time", MeterType::Timer).with_tag(("system", "foo")))
        .expect("failed to register timer");
    let payload = registry
        .summary(Id::new("server.payload", MeterType::DistributionSummary).with_base_unit("bytes"))
        .expect("failed to register summary");

    let queue_depth = Arc::new(AtomicU64::new(0));
    registry
        .gauge_weak(Id::new("server.queue.depth", MeterType::Gauge), &queue_depth, |depth| {
            depth.load(Ordering::Relaxed) as f64
        })
        .expect("failed to register gauge");

    let handled = Arc::new(AtomicU64::new(0));
    registry
        .function_counter(
            Id::new("server.handled", MeterType::FunctionCounter),
            &handled,
            |handled| handled.load(Ordering::Relaxed) as f64,
        )
        .expect("failed to register function counter");

    exporter.start().expect("failed to start exporter");

    // Pretend to do some work for a few steps.
    for i in 0..200u64 {
        loop_time.record_with(|| std::thread::sleep(Duration::from_millis(1)));
        loops.increment();
        payload.record((i % 17) as f64 * 64.0);
        queue_depth.store(i % 8, Ordering::Relaxed);
        handled.fetch_add(1, Ordering::Relaxed);

        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    let report = exporter.close().await;
    tracing::info!(?report, "Exporter closed.");
}
