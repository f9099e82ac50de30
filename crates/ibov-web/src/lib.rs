//! # ibov web
//!
//! axum routers for the three IBOVESPA services. Each router is independent;
//! the binary serves exactly one of them per process.
//!
//! | Router | Routes |
//! |--------|--------|
//! | [`collector::router`] | `GET /`, `GET /test-connection` |
//! | [`trainer::router`] | `GET /`, `GET /train` |
//! | [`dashboard::router`] | `GET /`, `GET /api/forecast` |

pub mod collector;
pub mod dashboard;
pub mod error;
pub mod render;
pub mod trainer;

use std::net::SocketAddr;

use axum::Router;
use tracing::{info, warn};

pub use collector::CollectorState;
pub use dashboard::{DashboardConfig, DashboardSettings, DashboardState, DashboardView};
pub use error::WebError;
pub use trainer::TrainerState;

/// Bind `addr` and serve `router` until Ctrl-C.
pub async fn serve(router: Router, addr: SocketAddr) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "could not install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
