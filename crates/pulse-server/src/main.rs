use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use tracing::{error, info};

use pulse_server::scheduler::{self, Schedule};
use pulse_server::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise structured JSON logging. Level controlled via RUST_LOG.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("pulse=info".parse()?),
        )
        .json()
        .init();

    let cfg = pulse_core::config::Config::from_env().map_err(|e| anyhow::anyhow!(e))?;
    // Validate the schedule up front so a bad expression fails the boot,
    // not the first Saturday night.
    let schedule = Schedule::parse(&cfg.report_schedule).map_err(|e| anyhow::anyhow!(e))?;

    // Ensure the data directory exists before opening DuckDB.
    std::fs::create_dir_all(&cfg.data_dir)?;
    let db_path = format!("{}/pulse.db", cfg.data_dir);
    let db = pulse_duckdb::DuckDbBackend::open(&db_path, &cfg.duckdb_memory_limit)?;

    let state = Arc::new(AppState::new(db, cfg.clone()));

    // Catch up immediately on boot; the process may have been down over a
    // scheduled computation.
    match state.db.compute_report(Utc::now()).await {
        Ok(report_id) => info!(report_id = %report_id, "Startup report computed"),
        Err(e) => error!(error = %e, "Startup report computation failed"),
    }

    // Recurring weekly computation.
    {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            let handler_state = Arc::clone(&state);
            scheduler::run_recurring("compute-report", schedule, move || {
                let state = Arc::clone(&handler_state);
                async move {
                    let report_id = state.db.compute_report(Utc::now()).await?;
                    info!(report_id = %report_id, "Scheduled report computed");
                    Ok(())
                }
            })
            .await;
        });
    }

    // SIGHUP reloads the configuration snapshot (external reload trigger).
    #[cfg(unix)]
    {
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            let Ok(mut hangup) =
                tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())
            else {
                error!("Could not install SIGHUP handler; config reload disabled");
                return;
            };
            while hangup.recv().await.is_some() {
                match state.config.reload() {
                    Ok(()) => info!("Configuration reloaded"),
                    Err(e) => error!(error = %e, "Config reload failed — keeping current snapshot"),
                }
            }
        });
    }

    let addr = format!("0.0.0.0:{}", cfg.port);
    let app = pulse_server::app::build_app(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    // The bind has returned, so the socket is live: this log line is the
    // readiness signal.
    info!(port = cfg.port, mode = ?cfg.mode, "Pulse listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    Ok(())
}
