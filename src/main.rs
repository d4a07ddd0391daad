use std::sync::Arc;

use anyhow::Context;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use intake_agent::channels::{self, CliChannel, WebhookState};
use intake_agent::config::{IntakeConfig, StorageConfig};
use intake_agent::delivery::{BlobStore, DocumentDelivery, GcsBlobStore, LocalBlobStore};
use intake_agent::interview::{InterviewController, build_policy};
use intake_agent::llm::create_provider;
use intake_agent::store::{LibSqlBackend, MemoryStore, SessionStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli_mode = std::env::args().skip(1).any(|arg| arg == "--cli");
    let config = IntakeConfig::from_env().context("Invalid configuration")?;

    eprintln!("Intake Agent v{}", env!("CARGO_PKG_VERSION"));
    eprintln!("   Model: {}", config.oracle.llm.model);
    eprintln!("   Topics: {}", config.interview.schedule.topics().join(", "));
    eprintln!("   Completion: {:?}", config.interview.policy);

    let llm = create_provider(&config.oracle.llm).context("Failed to create LLM provider")?;

    let sessions: Arc<dyn SessionStore> = match config.server.db_path {
        Some(ref path) => {
            eprintln!("   Sessions: {}", path.display());
            Arc::new(
                LibSqlBackend::new_local(path)
                    .await
                    .with_context(|| format!("Failed to open database at {}", path.display()))?,
            )
        }
        None => {
            eprintln!("   Sessions: in memory");
            Arc::new(MemoryStore::new())
        }
    };

    let store: Arc<dyn BlobStore> = match config.delivery.storage {
        StorageConfig::Local {
            ref dir,
            ref public_base_url,
        } => {
            eprintln!("   Documents: {} ({public_base_url})", dir.display());
            Arc::new(LocalBlobStore::new(dir.clone(), public_base_url.clone()))
        }
        StorageConfig::Gcs {
            ref bucket,
            ref token,
        } => {
            eprintln!("   Documents: gs://{bucket}");
            Arc::new(GcsBlobStore::new(bucket.clone(), token.clone()))
        }
    };
    let delivery = Arc::new(DocumentDelivery::new(
        store,
        config.delivery.title.clone(),
        config.delivery.format,
    ));

    let policy = build_policy(config.interview.policy, config.interview.marker_match);
    let controller = Arc::new(
        InterviewController::new(llm, sessions, delivery)
            .with_policy(policy)
            .with_schedule(config.interview.schedule.clone())
            .with_sampling(config.oracle.temperature, config.oracle.max_tokens),
    );

    if cli_mode {
        eprintln!("   Channel: cli\n");
        channels::run_channel(
            Arc::new(CliChannel::new()),
            controller,
            config.server.chunk_size,
        )
        .await?;
        return Ok(());
    }

    let mut app = channels::router(WebhookState {
        controller,
        chunk_size: config.server.chunk_size,
    });
    if let StorageConfig::Local { ref dir, .. } = config.delivery.storage {
        app = app.nest_service("/documents", ServeDir::new(dir));
    }
    let app = app.layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    eprintln!("   Webhook: http://{addr}/whatsapp\n");
    tracing::info!(addr = %addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("Shutting down");
        })
        .await
        .context("Server error")?;

    Ok(())
}
