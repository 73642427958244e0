//! JSON HTTP API over the current session.

mod error;
pub mod handlers;

pub use error::ApiError;

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::error::Result;
use crate::extraction::ExtractionGateway;
use crate::storage::{Session, SqliteStore};

/// Headroom on top of the image ceiling for multipart framing and for
/// uploads that will be downscaled.
const UPLOAD_HEADROOM: usize = 1024 * 1024;

/// Shared state passed to all handlers via axum's `State` extractor.
#[derive(Clone)]
pub struct AppState {
    pub session: Arc<Mutex<Session<SqliteStore>>>,
    pub gateway: Arc<dyn ExtractionGateway>,
}

impl AppState {
    pub fn new(session: Session<SqliteStore>, gateway: Arc<dyn ExtractionGateway>) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            gateway,
        }
    }

    /// Lock the session. Every mutation either completes or rolls back, so
    /// a panic in another handler cannot leave it half-updated.
    pub fn session(&self) -> MutexGuard<'_, Session<SqliteStore>> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Build the full router.
///
/// `max_upload_bytes` is the largest upload the extraction endpoints accept
/// before multipart overhead.
pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let uploads = Router::new()
        .route("/upload-pdf", post(handlers::upload_pdf))
        .route("/upload-image", post(handlers::upload_image))
        .route("/api/bill/extract", post(handlers::extract_bill))
        .layer(DefaultBodyLimit::max(
            max_upload_bytes.saturating_mul(2).saturating_add(UPLOAD_HEADROOM),
        ));

    let bill = Router::new()
        .route("/api/bill", get(handlers::get_bill))
        .route("/api/bill/split", get(handlers::get_split))
        .route("/api/bill/replace", post(handlers::replace_bill))
        .route("/api/bill/clear", post(handlers::clear_bill))
        .route("/api/bill/items", post(handlers::add_item))
        .route(
            "/api/bill/items/{index}",
            put(handlers::edit_item).delete(handlers::delete_item),
        )
        .route(
            "/api/bill/items/{index}/toggle",
            post(handlers::toggle_payment),
        )
        .route(
            "/api/bill/items/{index}/split",
            put(handlers::set_custom_split).delete(handlers::clear_custom_split),
        )
        .route("/api/bill/people", post(handlers::add_person))
        .route("/api/bill/people/{name}", delete(handlers::delete_person))
        .route("/api/bill/tax", put(handlers::set_tax))
        .route("/api/bill/split-tax", put(handlers::set_split_tax))
        .route("/api/history", get(handlers::list_history))
        .route("/api/history/{index}", delete(handlers::discard_history))
        .route(
            "/api/history/{index}/restore",
            post(handlers::restore_history),
        );

    Router::new()
        .route("/health", get(handlers::health))
        .merge(uploads)
        .merge(bill)
        .with_state(state)
        .layer(cors)
}

/// Serve `router` on `bind` until `shutdown` resolves.
pub async fn serve(
    router: Router,
    bind: &str,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Listening on http://{}", listener.local_addr()?);
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Server stopped");
    Ok(())
}
