use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use genjob_cli::args::CliArgs;
use genjob_client::progress::ProgressSlot;
use genjob_client::{ClientConfig, GenerateOptions, GenerationClient};
use genjob_core::request::GenerationRequest;
use genjob_events::{JobBoard, JobEventBus};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let json_logs =
        std::env::var("GENJOB_LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "genjob_cli=info,genjob_client=info".into()),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run() -> anyhow::Result<()> {
    let args = CliArgs::parse(std::env::args().skip(1))?;

    // --- Configuration ---
    let config = ClientConfig::from_env().context("invalid configuration")?;
    tracing::info!(
        api_url = %config.api_url,
        poll_interval_ms = config.poll.interval.as_millis() as u64,
        poll_timeout_ms = config.poll.timeout.as_millis() as u64,
        "Loaded client configuration",
    );
    let client = GenerationClient::from_config(&config);

    // --- Job events ---
    let bus = Arc::new(JobEventBus::default());
    let board = Arc::new(JobBoard::new());
    let board_task = {
        let board = Arc::clone(&board);
        let rx = bus.subscribe();
        tokio::spawn(async move { board.follow(rx).await })
    };
    let log_task = tokio::spawn(log_events(bus.subscribe()));

    // --- Progress ---
    let mut slot = ProgressSlot::new();
    let mut progress = slot.subscribe();
    let progress_task = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let update = progress.borrow_and_update().clone();
            tracing::info!(
                progress = update.progress,
                status = %update.status,
                stage = update.stage.as_deref(),
                "Progress",
            );
        }
    });

    // --- Cancellation ---
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::info!("Interrupt received, cancelling generation");
                cancel.cancel();
            }
        });
    }

    let request = GenerationRequest::new(args.prompt, args.model);
    let result = client
        .generate(
            args.provider,
            &request,
            bus.as_ref(),
            GenerateOptions::new()
                .with_cancel(&cancel)
                .with_progress(&mut slot),
        )
        .await;

    // Dropping the senders lets the background tasks drain and exit.
    drop(slot);
    drop(bus);
    let _ = tokio::join!(board_task, log_task, progress_task);

    if !board.is_empty() {
        tracing::warn!(remaining = board.len(), "Jobs left on the board after the run");
    }

    match result {
        Ok(outcome) => {
            println!("{}", outcome.result.url);
            Ok(())
        }
        Err(e) if e.is_cancelled() => anyhow::bail!("generation cancelled"),
        Err(e) => {
            let context = format!("{} generation failed [{}]", args.provider, e.code());
            Err(anyhow::Error::new(e).context(context))
        }
    }
}

async fn log_events(mut receiver: broadcast::Receiver<genjob_events::JobEvent>) {
    loop {
        match receiver.recv().await {
            Ok(event) => {
                tracing::info!(job_id = %event.job_id, event = event.name(), "Job event");
            }
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!(skipped = n, "Event log lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}
