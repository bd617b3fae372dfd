//! Piggy Backend Service
//!
//! Main entry point for the piggy crowdfunding backend.
//! This service provides:
//! - REST API for users, piggies and donations
//! - Ledger minting of piggies and donations on Solana
//! - Firebase authentication and email/SMS notifications

use anyhow::{Context, Result};
use piggy_backend::auth::{AuthMode, FirebaseAuth};
use piggy_backend::config::{AppConfig, LedgerFile, LogFormat, Properties};
use piggy_backend::database::{create_pool, run_migrations};
use piggy_backend::gcp::{Datastore, KeyStore, Kms, TokenSource, Uploader};
use piggy_backend::http::create_router;
use piggy_backend::ledger::LedgerClient;
use piggy_backend::notifications::{Mailer, Notifier, SmsSender};
use piggy_backend::services::{PiggyLedger, SolanaPiggyLedger};
use piggy_backend::AppState;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!(
            "piggy_backend={},sqlx=warn,tower_http=info",
            config.log_level
        )
        .into()
    });

    match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_current_span(false)
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables first
    dotenv::dotenv().ok();

    let config = AppConfig::from_env().map_err(|e| {
        eprintln!("Configuration error: {}", e);
        anyhow::anyhow!(e)
    })?;

    init_tracing(&config);

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║           Piggy Backend Service Starting                 ║");
    info!("╚══════════════════════════════════════════════════════════╝");
    info!("Profile: {}", config.profile);
    info!("Log level: {}", config.log_level);
    info!("HTTP port: {}", config.port);

    // =========================================================================
    // DATABASE SETUP
    // =========================================================================
    info!("Connecting to database...");

    let pool = create_pool(&config.database).await.map_err(|e| {
        error!("Failed to create database pool: {}", e);
        e
    })?;
    info!("Max connections: {}", config.database.max_connections);

    info!("Running database migrations...");
    run_migrations(&pool, None).await.map_err(|e| {
        error!("Database migration failed: {}", e);
        e
    })?;
    info!("✓ Database ready");

    // =========================================================================
    // CONFIGURATION FILES
    // =========================================================================
    let properties_path = config.properties_path();
    let properties = Properties::load(&properties_path)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("loading {}", properties_path.display()))?;
    info!("✓ Properties loaded from {}", properties_path.display());

    let ledger_file = LedgerFile::load(&config.ledger_config)
        .map_err(anyhow::Error::msg)
        .with_context(|| format!("loading {}", config.ledger_config.display()))?;
    info!("✓ Ledger accounts loaded from {}", config.ledger_config.display());

    // =========================================================================
    // CLIENTS
    // =========================================================================
    let shutdown = CancellationToken::new();
    let http = reqwest::Client::new();
    let tokens = Arc::new(TokenSource::new(
        http.clone(),
        config.google_access_token.clone(),
    ));
    if tokens.is_static() {
        info!("✓ Using static Google access token");
    } else {
        info!("✓ Using metadata server for Google access tokens");
    }

    let network = config.profile.network();
    let ledger_client = LedgerClient::connect(network, &ledger_file, config.seal)?;
    info!(
        "✓ Ledger client initialized ({} at {})",
        network,
        ledger_client.rpc_url()
    );

    let kms = Arc::new(Kms::new(
        http.clone(),
        tokens.clone(),
        properties.kms_key_name(),
    ));
    let keystore: Arc<dyn KeyStore> = Arc::new(Datastore::new(
        http.clone(),
        tokens.clone(),
        kms,
        properties.project_id.clone(),
        properties.datastore.kind.clone(),
    ));
    let ledger: Arc<dyn PiggyLedger> = Arc::new(SolanaPiggyLedger::new(
        Arc::new(ledger_client),
        keystore,
        shutdown.clone(),
    ));
    info!("✓ Piggy ledger service initialized");

    let uploader = Arc::new(Uploader::new(
        http.clone(),
        tokens.clone(),
        &properties.storage,
        config.profile,
    ));
    info!("✓ Uploader initialized (bucket {})", properties.storage.bucket);

    let project_id = config
        .firebase_project_id
        .clone()
        .unwrap_or_else(|| properties.project_id.clone());
    let firebase = Arc::new(FirebaseAuth::new(
        http.clone(),
        tokens.clone(),
        project_id,
        config.firebase_api_key.clone(),
    ));

    if config.sendgrid_api_key.is_empty() {
        warn!("SENDGRID_API_KEY not set, emails will fail");
    }
    let notifier = Arc::new(Notifier::new(
        firebase.clone(),
        Mailer::new(http.clone(), config.sendgrid_api_key.clone(), &properties.sender),
        SmsSender::new(http.clone(), config.twilio.clone()),
        properties.sender.clone(),
    ));
    info!("✓ Notifications initialized");

    let auth = if config.profile.is_dev() {
        warn!(
            "Dev profile: authentication disabled, requests act as {}",
            config.dev_user_id
        );
        AuthMode::Dev {
            user_id: config.dev_user_id.clone(),
        }
    } else {
        info!("✓ Firebase authentication for project {}", firebase.project_id());
        AuthMode::Firebase(firebase)
    };

    let state = AppState::new(pool, auth, ledger, uploader, notifier);
    let app = create_router(state);

    // =========================================================================
    // START SERVER
    // =========================================================================
    let addr: SocketAddr = format!("0.0.0.0:{}", config.port)
        .parse()
        .with_context(|| format!("invalid listen address for port {}", config.port))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    info!("╔══════════════════════════════════════════════════════════╗");
    info!("║           Piggy Backend Service Ready!                   ║");
    info!("╠══════════════════════════════════════════════════════════╣");
    info!("║  HTTP API:     {}                              ║", addr);
    info!("║  Profile:      {}                                       ║", config.profile);
    info!("║  Network:      {}                                   ║", network);
    info!("╚══════════════════════════════════════════════════════════╝");
    info!("Press Ctrl+C to shutdown gracefully");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await
        .context("HTTP server error")?;

    info!("Piggy backend service shutdown complete");
    Ok(())
}

/// Resolve on Ctrl-C and cancel in-flight ledger waits
async fn shutdown_signal(shutdown: CancellationToken) {
    shutdown_on(tokio::signal::ctrl_c(), shutdown).await
}

/// Wait for `signal`; a handler that cannot be installed never triggers shutdown
async fn shutdown_on<F>(signal: F, shutdown: CancellationToken)
where
    F: std::future::Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received, shutting down gracefully...");
    shutdown.cancel();
}
