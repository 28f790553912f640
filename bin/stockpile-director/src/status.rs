//! Status and health HTTP surface
//!
//! Small axum server alongside the control loop: `/health` for liveness
//! probes, `/status` for a JSON counter snapshot, `/metrics` for
//! Prometheus scrapes.

use crate::stats::DirectorStats;
use anyhow::Result;
use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::IntoResponse,
    routing::get,
};
use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

/// Health check handler: ready once the first poll has landed
async fn health_handler(State(stats): State<Arc<DirectorStats>>) -> impl IntoResponse {
    if stats.snapshot().poll_success > 0 {
        (StatusCode::OK, "OK")
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, "WAITING")
    }
}

/// JSON snapshot of the director counters
async fn status_handler(State(stats): State<Arc<DirectorStats>>) -> impl IntoResponse {
    Json(stats.snapshot())
}

/// Prometheus metrics handler
async fn metrics_handler(State(stats): State<Arc<DirectorStats>>) -> impl IntoResponse {
    let s = stats.snapshot();
    let mut output = String::with_capacity(2048);

    let counters = [
        ("stockpile_cache_directives_success_total", "Cache directives executed", s.cache_success),
        ("stockpile_cache_directives_failure_total", "Cache directives that failed", s.cache_failure),
        ("stockpile_eject_directives_success_total", "Eject directives executed", s.eject_success),
        ("stockpile_eject_directives_failure_total", "Eject directives that failed", s.eject_failure),
        ("stockpile_rate_limited_cache_total", "Cache directives dropped by rate limiting", s.rate_limited_cache),
        ("stockpile_rate_limited_eject_total", "Eject directives dropped by rate limiting", s.rate_limited_eject),
        ("stockpile_dry_run_skipped_total", "Directives suppressed by dry-run mode", s.dry_run_skipped),
        ("stockpile_poll_success_total", "Successful snapshot polls", s.poll_success),
        ("stockpile_poll_failure_total", "Failed snapshot polls", s.poll_failure),
        ("stockpile_malformed_records_total", "Malformed records skipped", s.malformed_records),
        ("stockpile_strategy_errors_total", "Strategy evaluations that produced no directives", s.strategy_errors),
    ];
    for (name, help, value) in counters {
        writeln!(output, "# HELP {name} {help}").unwrap();
        writeln!(output, "# TYPE {name} counter").unwrap();
        writeln!(output, "{name} {value}").unwrap();
    }

    let gauges = [
        ("stockpile_eligible_nodes", "Non-provisioned nodes in the latest evaluation", s.eligible_nodes),
        ("stockpile_cached_nodes", "Eligible nodes currently holding a cached image", s.cached_nodes),
        ("stockpile_cache_target", "Cached-node count the strategy is steering toward", s.cache_target),
    ];
    for (name, help, value) in gauges {
        writeln!(output, "# HELP {name} {help}").unwrap();
        writeln!(output, "# TYPE {name} gauge").unwrap();
        writeln!(output, "{name} {value}").unwrap();
    }

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        output,
    )
}

/// Start the status HTTP server
pub async fn serve_status(listen: SocketAddr, stats: Arc<DirectorStats>) -> Result<()> {
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/status", get(status_handler))
        .route("/metrics", get(metrics_handler))
        .with_state(stats);

    info!("Starting status server on {listen}");
    let listener = TcpListener::bind(listen).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
