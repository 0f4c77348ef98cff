//! HTTP surface: public verification plus token-guarded administration.

mod admin;
mod error;
mod handlers;

pub use error::ApiError;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, State},
    http::{header::AUTHORIZATION, header::CONTENT_TYPE, Method, Request},
    middleware::{from_fn_with_state, Next},
    response::Response,
    routing::{get, post},
    Router,
};
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal::ctrl_c;
use tower_http::cors::CorsLayer;

use crate::error::Result;
use crate::pipeline::Issuer;

/// Largest accepted spreadsheet upload.
const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

pub struct AppState {
    pub issuer: Issuer,
    /// Bearer token for `/admin`; `None` leaves it open
    pub admin_token: Option<String>,
}

pub type SharedState = Arc<AppState>;

/// Runs `f` against the issuer on the blocking pool.
pub(crate) async fn blocking<T, F>(state: &SharedState, f: F) -> std::result::Result<T, ApiError>
where
    F: FnOnce(&Issuer) -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    Ok(tokio::task::spawn_blocking(move || f(&state.issuer)).await??)
}

async fn require_admin(
    State(state): State<SharedState>,
    req: Request<Body>,
    next: Next,
) -> std::result::Result<Response, ApiError> {
    if let Some(expected) = &state.admin_token {
        let presented = req
            .headers()
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim);
        if presented != Some(expected.as_str()) {
            warn!("Rejected admin request to {}", req.uri().path());
            return Err(ApiError::Unauthorized);
        }
    }
    Ok(next.run(req).await)
}

pub fn router(state: SharedState) -> Router {
    let admin = Router::new()
        .route(
            "/certificates",
            post(admin::issue_certificate).get(admin::list_certificates),
        )
        .route(
            "/certificates/:id",
            get(admin::get_certificate)
                .patch(admin::update_certificate)
                .delete(admin::delete_certificate),
        )
        .route("/certificates/:id/email", post(admin::email_certificate))
        .route("/certificates/:id/upload", post(admin::upload_certificate))
        .route("/certificates/:id/regenerate", post(admin::regenerate_certificate))
        .route("/batch/email", post(admin::batch_email))
        .route("/batch/upload", post(admin::batch_upload))
        .route("/batch/regenerate", post(admin::batch_regenerate))
        .route("/stats", get(admin::stats))
        .route("/students", get(admin::pending_students))
        .route("/students/import", post(admin::import_students))
        .route("/students/generate", post(admin::generate_pending))
        .route("/students/sample.csv", get(admin::sample_sheet))
        .route("/export/csv", get(admin::export_csv))
        .route("/export/zip", get(admin::export_zip))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .route_layer(from_fn_with_state(state.clone(), require_admin));

    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/", get(handlers::verify))
        .route("/verify", get(handlers::verify))
        .route("/verify/:id", get(handlers::verify_detail))
        .route("/verify/:id/", get(handlers::verify_detail))
        .route("/api/verify/:id", get(handlers::api_verify))
        .route("/api/verify/:id/", get(handlers::api_verify))
        .route("/download/:id", get(handlers::download))
        .route("/download/:id/", get(handlers::download))
        .route("/templates", get(handlers::templates))
        .route("/healthz", get(handlers::healthz))
        .nest("/admin", admin)
        .layer(cors)
        .with_state(state)
}

/// Serves until Ctrl+C or SIGTERM.
pub async fn serve(state: SharedState, port: u16) -> Result<()> {
    let app = router(state);

    let address = format!("0.0.0.0:{}", port);
    let listener = TcpListener::bind(&address).await?;
    info!("Server running on {}", address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shut down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
