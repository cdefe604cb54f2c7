use anyhow::Context;
use clap::Parser;
use generator::profile::SyntheticSensor;
use generator::stream::SensorStream;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::runtime::Builder as TokioBuilder;
use tokio::signal;
use viewer_bridge::bridge::ViewerBridge;
use workflow::config::WorkflowConfig;
use workflow::coordinator::IngestionCoordinator;

mod generator;
mod viewer_bridge;
mod workflow;

#[derive(Parser)]
#[command(author, version, about = "Underwater survey ingestion and live distribution")]
struct Args {
    /// Load a workflow config from YAML
    #[arg(long)]
    config: Option<PathBuf>,
    /// Address for the HTTP/WebSocket bridge, e.g. 127.0.0.1:9000
    #[arg(long)]
    bind: Option<String>,
    /// Feed synthetic sensor frames to connected viewers
    #[arg(long, default_value_t = false)]
    stream: bool,
    #[arg(long)]
    interval_ms: Option<u64>,
    /// Analyze one frame of every kind, print the results and exit
    #[arg(long, default_value_t = false)]
    offline: bool,
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => WorkflowConfig::load(path)?,
        None => WorkflowConfig::default(),
    };
    config.apply_overrides(args.bind, args.stream, args.interval_ms, args.seed);

    let coordinator = Arc::new(IngestionCoordinator::new(&config));

    if args.offline {
        return run_offline(&coordinator, &config);
    }

    let runtime = TokioBuilder::new_multi_thread()
        .enable_all()
        .build()
        .context("creating tokio runtime")?;
    runtime.block_on(serve(coordinator, config))
}

fn run_offline(coordinator: &IngestionCoordinator, config: &WorkflowConfig) -> anyhow::Result<()> {
    let summary = coordinator.warm_up()?;
    println!(
        "Classifier ready -> train accuracy {:.2}, test accuracy {:.2}",
        summary.train_accuracy, summary.test_accuracy
    );

    let mut sensor = SyntheticSensor::new(config.stream.seed, config.stream.jitter);
    for _ in 0..4 {
        let frame = sensor.next_frame();
        let analytics = coordinator
            .analyze(&frame)
            .with_context(|| format!("analyzing {} frame", frame.kind()))?;
        let rendered =
            serde_json::to_string_pretty(&analytics).context("rendering offline analytics")?;
        println!("Offline {} ->\n{}", frame.kind(), rendered);
    }
    Ok(())
}

async fn serve(
    coordinator: Arc<IngestionCoordinator>,
    config: WorkflowConfig,
) -> anyhow::Result<()> {
    let warm = Arc::clone(&coordinator);
    match tokio::task::spawn_blocking(move || warm.warm_up()).await {
        Ok(Ok(summary)) => info!(
            "classifier ready (train {:.2}, test {:.2})",
            summary.train_accuracy, summary.test_accuracy
        ),
        Ok(Err(err)) => warn!("classifier warm-up failed, will retry lazily: {:#}", err),
        Err(err) => warn!("classifier warm-up aborted: {}", err),
    }

    coordinator.hub().start_broadcasting().await;

    let bridge = ViewerBridge::new(Arc::clone(&coordinator), config.subscriber_queue);
    let (_, server) = bridge.bind(config.bind_address()?, async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("awaiting Ctrl+C failed: {}", err);
        }
    })?;

    let stream = if config.stream.enabled {
        Some(
            SensorStream::spawn(Arc::clone(&coordinator), &config.stream)
                .context("starting sensor stream")?,
        )
    } else {
        None
    };

    info!("bridge running (Ctrl+C to stop)");
    server.await;

    coordinator.hub().stop_broadcasting().await;
    if let Some(stream) = stream {
        tokio::task::spawn_blocking(move || stream.stop())
            .await
            .context("joining sensor stream")?;
    }
    coordinator.log_summary();
    Ok(())
}
