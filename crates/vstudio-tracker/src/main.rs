//! Command-line generation runner.
//!
//! `vstudio <prompt...>` submits a text-to-video job, follows it to the end
//! and records the result in the JSONL store (`VSTUDIO_STORE_DIR`).

use std::sync::Arc;

use anyhow::{anyhow, bail, Context};
use tokio::sync::broadcast::error::RecvError;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use vstudio_client::{VeoClient, VeoClientConfig};
use vstudio_models::{GenerationRequest, VeoModel};
use vstudio_store::{ArtifactStore, GalleryQuery, JsonlArtifactStore, StoreConfig};
use vstudio_tracker::{JobEvent, JobTracker, TrackerConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Install rustls crypto provider (required for TLS/HTTPS)
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("failed to install rustls crypto provider"))?;

    dotenvy::dotenv().ok();
    init_tracing()?;

    let prompt = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if prompt.trim().is_empty() {
        bail!("usage: vstudio <prompt>");
    }
    let model = std::env::var("VSTUDIO_MODEL")
        .unwrap_or_else(|_| VeoModel::default().id().to_string());

    let tracker_config = TrackerConfig::from_env();
    info!("Tracker config: {:?}", tracker_config);

    let client = VeoClient::new(VeoClientConfig::from_env()).context("creating provider client")?;
    let store = Arc::new(
        JsonlArtifactStore::open(StoreConfig::from_env())
            .await
            .context("opening artifact store")?,
    );

    let tracker = JobTracker::new(Arc::new(client), store.clone(), tracker_config);
    let mut events = tracker.subscribe();

    let request = GenerationRequest::text_to_video(prompt, model);
    info!(mode = request.mode.label(), model = %request.model, "Starting generation");
    let handle = tracker.start(request).await.context("starting generation")?;
    info!(job_handle = %handle, "Generation submitted");

    let outcome = tokio::select! {
        outcome = wait_for_terminal(&mut events) => outcome,
        _ = tokio::signal::ctrl_c() => {
            warn!("Received shutdown signal, cancelling");
            tracker.cancel();
            bail!("cancelled");
        }
    };

    match outcome? {
        JobEvent::Completed { artifact, .. } => {
            // Recording failures are only logged, so the newest record may
            // belong to an earlier run.
            let records = store.list(&GalleryQuery::default()).await?;
            let location = records
                .iter()
                .find(|r| r.describes(artifact.artifact()))
                .and_then(|r| r.location.as_deref())
                .map(|l| store.dir().join(l).display().to_string())
                .unwrap_or_else(|| "<not recorded>".to_string());
            info!(
                bytes = artifact.artifact().len(),
                content_type = %artifact.content_type(),
                "Artifact saved to {}", location
            );
            Ok(())
        }
        JobEvent::Failed { error, .. } => {
            error!(stage = error.stage(), "Generation failed: {}", error);
            Err(error.into())
        }
        other => bail!("tracker stopped without a result: {:?}", other),
    }
}

async fn wait_for_terminal(
    events: &mut tokio::sync::broadcast::Receiver<JobEvent>,
) -> anyhow::Result<JobEvent> {
    loop {
        match events.recv().await {
            Ok(event) if event.is_terminal() => return Ok(event),
            Ok(JobEvent::PhaseChanged { phase, .. }) => info!(phase = %phase, "Phase changed"),
            Ok(JobEvent::Progress { polls, elapsed, .. }) => info!(
                polls,
                "Generating video... ({}s elapsed)",
                elapsed.as_secs()
            ),
            Ok(_) => {}
            Err(RecvError::Lagged(n)) => warn!("Missed {} lifecycle events", n),
            Err(RecvError::Closed) => bail!("tracker stopped without a result"),
        }
    }
}

fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env()
        .add_directive("vstudio=info".parse()?)
        .add_directive("vstudio_tracker=info".parse()?)
        .add_directive("hyper=warn".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}
