use std::process::ExitCode;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use framegen::config::{GenerationConfig, PurgeConfig};
use framegen::store::PgStore;
use framegen::BatchError;

const USAGE: &str = "usage: framegen [generate|purge]";

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let metrics_port: Option<u16> = std::env::var("FRAMEGEN_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok());
    framegen::observability::init(metrics_port);

    let mode = std::env::args().nth(1).unwrap_or_else(|| "generate".into());
    let summary = match mode.as_str() {
        "generate" => generate().await,
        "purge" => purge().await,
        other => {
            error!("unknown batch {other:?}; {USAGE}");
            return ExitCode::from(2);
        }
    };

    match summary {
        Ok(summary) => {
            println!("{summary}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            let out = serde_json::json!({ "batch": mode, "error": e.to_string(), "kind": e.kind() });
            println!("{out}");
            ExitCode::FAILURE
        }
    }
}

async fn generate() -> Result<serde_json::Value, BatchError> {
    let config = GenerationConfig::from_env().inspect_err(|e| error!("{e}"))?;
    let store = connect().await?;
    let now = chrono::Utc::now().naive_utc();
    let report = framegen::run_generation(&store, &config, now).await?;
    Ok(serde_json::json!({
        "batch": "generate",
        "inserted": report.inserted.len(),
        "rolled_back": report.rolled_back,
        "spaces": report.spaces,
    }))
}

async fn purge() -> Result<serde_json::Value, BatchError> {
    let config = PurgeConfig::from_env().inspect_err(|e| error!("{e}"))?;
    let store = connect().await?;
    let now = chrono::Utc::now().naive_utc();
    let report = framegen::run_purge(&store, &config, now).await?;
    Ok(serde_json::json!({ "batch": "purge", "deleted": report.deleted.len() }))
}

async fn connect() -> Result<PgStore, BatchError> {
    let url = std::env::var("DATABASE_URL").map_err(|_| {
        framegen::store::StoreError::Connect("DATABASE_URL is not set".into())
    })?;
    let store = PgStore::connect(&url).await.inspect_err(|e| error!("{e}"))?;
    info!("connected to store");
    Ok(store)
}
