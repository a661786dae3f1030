//! HTTP surface for the Roster pipeline.
//!
//! ## Endpoints
//!
//! - `POST /api/command` - run one conversational command
//! - `GET /api/health` - liveness probe
//! - `GET /api/sessions/<id>/context` - current session context
//! - `DELETE /api/sessions/<id>/context` - forget the session context

mod routes;

use log::info;
use rocket::{Build, Rocket};
use roster_rs_config::ServerConfig;
use roster_rs_core::Orchestrator;
use std::sync::Arc;
use thiserror::Error;

pub use routes::{CommandBody, FileUpload, status_for};

/// Failures starting or running the HTTP server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("server error: {0}")]
    Rocket(#[from] Box<rocket::Error>),
}

/// Rocket instance with the API mounted and the orchestrator managed.
pub fn build(orchestrator: Arc<Orchestrator>, server: &ServerConfig) -> Rocket<Build> {
    let figment = rocket::Config::figment()
        .merge(("address", server.address.clone()))
        .merge(("port", server.port));
    rocket::custom(figment)
        .manage(orchestrator)
        .mount("/api", routes::routes())
}

/// Serve the API until shutdown.
pub async fn serve(orchestrator: Arc<Orchestrator>) -> Result<(), ServerError> {
    let server = orchestrator.config().server.clone();
    info!(
        "starting http server (address={}, port={})",
        server.address, server.port
    );
    build(orchestrator, &server)
        .launch()
        .await
        .map_err(Box::new)?;
    info!("http server stopped");
    Ok(())
}
