use anyhow::{anyhow, Context, Result};
use tokio::sync::{mpsc, watch};

use volume_scanner::config::{Config, LoggingConfig};
use volume_scanner::engine::AlertEngine;
use volume_scanner::model::alert::Alert;
use volume_scanner::model::tick::Tick;
use volume_scanner::polygon::ws::PolygonWsClient;
use volume_scanner::runtime::signal::TerminationSignal;
use volume_scanner::runtime::{run_engine, run_sink_dispatcher};
use volume_scanner::sink::build_sink;

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::try_new(&logging.level)
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    });
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match (&logging.file, logging.json) {
        (Some(path), json) => {
            let log_file = std::fs::File::create(path)
                .with_context(|| format!("failed to create log file {}", path))?;
            let builder = builder.with_writer(log_file).with_ansi(false);
            if json {
                builder.json().init();
            } else {
                builder.init();
            }
        }
        (None, true) => builder.json().init(),
        (None, false) => builder.init(),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    // Install rustls crypto provider (required by rustls 0.23+)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("failed to install rustls crypto provider"))?;

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config: {:#}", e);
            eprintln!("Make sure .env or the environment provides POLYGON_API_KEY");
            std::process::exit(1);
        }
    };

    init_tracing(&config.logging)?;

    let sink = build_sink(&config.sink).context("failed to build alert sink")?;
    tracing::info!(
        ws_url = %config.stream.ws_url,
        subscription = %config.stream.subscription_params(),
        volume_threshold = config.scanner.volume_threshold,
        sinks = ?sink.names(),
        "Starting volume-scanner"
    );

    let (tick_tx, tick_rx) = mpsc::channel::<Tick>(config.stream.tick_channel_capacity);
    let (alert_tx, alert_rx) = mpsc::channel::<Alert>(config.scanner.alert_channel_capacity);
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let engine = AlertEngine::from_config(&config.scanner);
    let engine_task = tokio::spawn(run_engine(
        engine,
        tick_rx,
        alert_tx,
        config.scanner.daily_reset,
        shutdown_rx.clone(),
    ));
    let sink_task = tokio::spawn(run_sink_dispatcher(sink, alert_rx, shutdown_rx.clone()));

    let client = PolygonWsClient::new(&config.stream);
    let ws_shutdown = shutdown_rx.clone();
    let ws_task = tokio::spawn(async move { client.connect_and_run(tick_tx, ws_shutdown).await });

    // Ctrl+C / SIGTERM handler
    let mut termination =
        TerminationSignal::register().context("failed to register signal handlers")?;
    let signal_shutdown = shutdown_tx.clone();
    tokio::spawn(async move {
        let signal = termination.recv().await;
        tracing::info!(%signal, "Termination signal received");
        let _ = signal_shutdown.send(true);
    });

    match ws_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!(error = %e, "Stream task failed"),
        Err(e) => tracing::error!(error = %e, "Stream task panicked"),
    }
    let _ = shutdown_tx.send(true);

    let engine_stats = engine_task.await.context("engine task panicked")?;
    // In-flight sink writes are abandoned on shutdown.
    sink_task.abort();
    tracing::info!(
        ticks = engine_stats.ticks,
        alerts = engine_stats.alerts,
        alerts_dropped = engine_stats.alerts_dropped,
        ticks_failed = engine_stats.ticks_failed,
        resets = engine_stats.resets,
        "volume-scanner stopped"
    );
    Ok(())
}
