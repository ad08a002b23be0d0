//! MedTrack - Main Entry Point
//! HTTP API + refill alert scanner + push delivery worker + maintenance

mod config;
mod telemetry;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use config::Settings;
use medtrack_api_http::{Argon2PasswordHasher, AppState, HttpServer, Ports};
use medtrack_core::application::worker::constants::DEFAULT_BACKOFF_FACTOR;
use medtrack_core::application::{
    shutdown_channel, AlertSettings, MaintenanceScheduler, PushWorker, RecoveryService,
    RefillAlertScanner, RefillAlertScheduler, RetryPolicy,
};
use medtrack_core::port::id_provider::UuidProvider;
use medtrack_core::port::time_provider::SystemTimeProvider;
use medtrack_core::port::PushGateway;
use medtrack_infra_push::FcmGateway;
use medtrack_infra_sqlite::{
    create_pool, run_migrations, SqliteAdherenceRepository, SqliteDeviceTokenRepository,
    SqliteMaintenance, SqliteMedicationRepository, SqlitePushDeliveryRepository,
    SqliteRefillRepository, SqliteSideEffectRepository, SqliteUserRepository,
};

const VERSION: &str = env!("CARGO_PKG_VERSION");
const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Configuration and logging
    let settings = Settings::new().context("Failed to load settings")?;
    settings.validate().context("Invalid settings")?;
    let _log_guard = telemetry::init_logging(&settings.logging)?;

    info!("MedTrack v{} starting...", VERSION);

    // 2. Database
    let database_url = settings.database_url();
    if let Some(dir) = settings.database_dir() {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create database directory {}", dir.display()))?;
    }
    info!(database_url = %database_url, "Initializing database...");

    let pool = create_pool(&database_url)
        .await
        .map_err(|e| anyhow::anyhow!("DB pool creation failed: {}", e))?;
    run_migrations(&pool)
        .await
        .map_err(|e| anyhow::anyhow!("Migration failed: {}", e))?;

    // 3. Adapters
    let time_provider = Arc::new(SystemTimeProvider);
    let id_provider = Arc::new(UuidProvider);

    let users = Arc::new(SqliteUserRepository::new(pool.clone()));
    let medications = Arc::new(SqliteMedicationRepository::new(pool.clone()));
    let adherence = Arc::new(SqliteAdherenceRepository::new(pool.clone()));
    let refills = Arc::new(SqliteRefillRepository::new(pool.clone()));
    let side_effects = Arc::new(SqliteSideEffectRepository::new(pool.clone()));
    let devices = Arc::new(SqliteDeviceTokenRepository::new(pool.clone()));
    let deliveries = Arc::new(SqlitePushDeliveryRepository::new(pool.clone()));
    let maintenance = Arc::new(SqliteMaintenance::new(pool.clone(), time_provider.clone()));

    if settings.push.server_key.is_empty() {
        warn!("push.server_key is empty; refill alerts will fail until it is configured");
    }
    let gateway: Arc<dyn PushGateway> = Arc::new(
        FcmGateway::new(settings.fcm())
            .map_err(|e| anyhow::anyhow!("FCM gateway setup failed: {}", e))?,
    );

    // 4. Crash recovery
    info!("Running crash recovery...");
    let recovery_service = Arc::new(RecoveryService::new(
        deliveries.clone(),
        time_provider.clone(),
        Some(settings.worker.recovery_window_ms),
    ));
    match recovery_service.recover_orphaned_deliveries().await {
        Ok(count) => info!(recovered_deliveries = count, "Crash recovery completed"),
        Err(e) => error!(error = ?e, "Crash recovery failed"),
    }

    let (shutdown_tx, shutdown_rx) = shutdown_channel();

    // 5. HTTP API
    let state = AppState::new(
        Ports {
            users,
            medications: medications.clone(),
            adherence,
            refills: refills.clone(),
            side_effects,
            devices: devices.clone(),
            hasher: Arc::new(Argon2PasswordHasher::default()),
            time: time_provider.clone(),
        },
        &settings.api(),
    );
    let server = HttpServer::bind(&settings.http(), state)
        .await
        .map_err(|e| anyhow::anyhow!("HTTP server bind failed: {}", e))?;
    let server_shutdown = shutdown_rx.clone();
    let server_handle = tokio::spawn(async move {
        if let Err(e) = server.run(server_shutdown).await {
            error!(error = ?e, "HTTP server failed");
        }
    });

    // 6. Push delivery worker
    info!("Starting push worker...");
    let retry_policy = Arc::new(RetryPolicy::new(
        time_provider.clone(),
        DEFAULT_BACKOFF_FACTOR,
    ));
    let worker = PushWorker::new(
        deliveries.clone(),
        devices.clone(),
        gateway,
        retry_policy,
        time_provider.clone(),
    )
    .with_batch_size(settings.worker.batch_size)
    .with_idle_sleep(Duration::from_millis(settings.worker.poll_interval_ms))
    // Also catches deliveries left in SENDING by a restart inside the window
    .with_recovery(
        recovery_service,
        Duration::from_millis(settings.worker.recovery_window_ms.max(1) as u64),
    );

    let worker_shutdown = shutdown_rx.clone();
    let worker_handle = tokio::spawn(async move {
        if let Err(e) = worker.run(worker_shutdown).await {
            error!(error = ?e, "Push worker failed");
        }
    });

    // 7. Refill alert scanner
    if settings.refill_alerts.enabled {
        info!("Starting refill alert scheduler...");
        let scanner = Arc::new(RefillAlertScanner::new(
            medications,
            refills,
            devices,
            deliveries,
            id_provider,
            time_provider.clone(),
            AlertSettings {
                threshold_days: settings.refill_alerts.threshold_days,
                max_attempts: settings.worker.max_attempts,
                retry_delay_ms: settings.worker.retry_delay_ms,
            },
        ));
        let scheduler = RefillAlertScheduler::new(
            scanner,
            Duration::from_secs(settings.refill_alerts.interval_hours.max(1) * 3600),
        );
        tokio::spawn(scheduler.run(shutdown_rx.clone()));
    } else {
        info!("Refill alerts disabled");
    }

    // 8. Maintenance
    info!("Starting maintenance scheduler...");
    let maintenance_scheduler = MaintenanceScheduler::new(
        maintenance,
        settings.maintenance_config(),
        settings.maintenance.interval_hours,
    );
    tokio::spawn(maintenance_scheduler.run(shutdown_rx));

    info!("System ready. Press Ctrl+C to shutdown");

    // 9. Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received. Exiting gracefully...");

    shutdown_tx.shutdown();
    let _ = tokio::time::timeout(SHUTDOWN_GRACE, server_handle).await;
    let _ = tokio::time::timeout(SHUTDOWN_GRACE, worker_handle).await;
    pool.close().await;
    telemetry::shutdown_telemetry();

    info!("Shutdown complete.");
    Ok(())
}
