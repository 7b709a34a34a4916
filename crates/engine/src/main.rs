//! howl engine - headless runner
//!
//! Wires the oracle, event bus and game service together, starts one game,
//! and streams every event to stdout as JSON lines. Ctrl-C requests a stop
//! and the game unwinds to the terminated status.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use howl_engine::oracle::{OllamaOracle, ResilientOracle, RetryConfig};
use howl_engine::{EngineConfig, EventBus, GameService, SharedEventBus};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv_from_repo_root();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "howl_engine=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = EngineConfig::from_env()?;
    tracing::info!(
        model = %config.oracle.model,
        base_url = %config.oracle.base_url,
        max_rounds = config.max_game_rounds,
        "Starting howl engine"
    );

    let ollama = Arc::new(OllamaOracle::new(&config.oracle));
    let oracle = Arc::new(ResilientOracle::new(ollama, RetryConfig::default()));
    let bus: SharedEventBus = Arc::new(EventBus::new(
        config.event_buffer,
        config.subscriber_capacity,
    ));

    let service = GameService::new(config, oracle, bus);
    let mut subscription = service.bus().subscribe();

    let game_id = service.start()?;
    tracing::info!(game_id = %game_id, "Game started");

    let stopper = service.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Ctrl-C received, requesting stop");
            stopper.stop();
        }
    });

    let printer = tokio::spawn(async move {
        while let Some(event) = subscription.receiver.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{line}"),
                Err(e) => tracing::warn!(error = %e, "event serialization failed"),
            }
        }
    });

    service.wait().await;

    let snapshot = service.status();
    tracing::info!(
        status = %snapshot.status,
        log_path = ?snapshot.log_path,
        experience_path = ?snapshot.experience_path,
        "Game over"
    );
    if let Some(error) = snapshot.last_error {
        tracing::error!(error = %error, "Game ended with an error");
    }

    // Give the printer a moment to drain the tail of the stream
    drop(service);
    let _ = tokio::time::timeout(std::time::Duration::from_millis(250), printer).await;
    Ok(())
}

fn load_dotenv_from_repo_root() {
    let repo_root = std::path::Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("..")
        .join("..");

    // Prefer local overrides.
    for filename in [".env.local", ".env"] {
        let path = repo_root.join(filename);
        if path.exists() {
            let _ = dotenvy::from_path(path);
        }
    }
}
