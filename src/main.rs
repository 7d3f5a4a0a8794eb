use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use assessment_backend::{
    build_router,
    config::{get_config, init_config, StorageBackend},
    database::{
        pool::{create_pool, run_migrations},
        AssessmentStore, MemoryStore, PgStore,
    },
    AppState,
};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_config()?;
    let config = get_config()?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if config.json_logs {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }

    let store: Arc<dyn AssessmentStore> = match config.storage_backend {
        StorageBackend::Postgres => {
            let url = config.database_url.as_deref().ok_or_else(|| {
                anyhow::anyhow!("DATABASE_URL is required for the postgres backend")
            })?;
            let pool = create_pool(url).await?;
            run_migrations(&pool).await?;
            info!("Connected to PostgreSQL, migrations applied");
            Arc::new(PgStore::new(pool))
        }
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let app_state = AppState::new(store, Arc::new(config.clone()))?;

    {
        let state = app_state.clone();
        let interval = Duration::from_secs(config.sweep_interval_secs.max(1));
        tokio::spawn(async move {
            loop {
                match state.session_service.sweep(chrono::Utc::now()).await {
                    Ok(report) if report.timed_out > 0 || report.overdue_assignments > 0 => {
                        info!(
                            timed_out = report.timed_out,
                            failed = report.failed,
                            overdue_assignments = report.overdue_assignments,
                            "Deadline sweep"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => tracing::error!("Deadline sweeper error: {:?}", e),
                }
                tokio::time::sleep(interval).await;
            }
        });
    }

    let app = build_router(app_state);

    let addr: SocketAddr = config.server_address.parse()?;
    info!("Server listening on {}", addr);
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
