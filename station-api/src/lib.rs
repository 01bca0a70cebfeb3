//! station-api library - JSON:API service over the station library
//!
//! Composes wire resources from flat store rows, pages collections by
//! offset or cursor and fans free-text queries out across resource kinds.

use std::sync::Arc;

use axum::Router;
use station_common::api::KeyTable;
use station_common::config::ApiConfig;
use tower_http::trace::TraceLayer;

pub mod aggregate;
pub mod api;
pub mod error;
pub mod fields;
pub mod flags;
pub mod pagination;
pub mod request;
pub mod search;
pub mod store;
pub mod views;

pub use error::{ApiError, ApiResult};
pub use store::{LibraryStore, SqliteStore};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Library store (read-only)
    pub store: Arc<dyn LibraryStore>,
    pub settings: Arc<ApiConfig>,
    /// Accepted API keys
    pub keys: Arc<KeyTable>,
}

impl AppState {
    pub fn new(store: Arc<dyn LibraryStore>, settings: ApiConfig, keys: KeyTable) -> Self {
        Self {
            store,
            settings: Arc::new(settings),
            keys: Arc::new(keys),
        }
    }

    /// Configured base path without a trailing slash ("" for the root)
    pub fn base_path(&self) -> &str {
        self.settings.base_path.trim_end_matches('/')
    }
}

/// Build application router
///
/// Health is public; every resource route resolves the caller's API key first.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::get;

    let resources = Router::new()
        .route("/album", get(api::albums::list_albums))
        .route("/album/:id", get(api::albums::get_album))
        .route("/album/:id/:rel", get(api::albums::get_album_related))
        .route(
            "/album/:id/relationships/:rel",
            get(api::albums::get_album_relationship),
        )
        .route("/label", get(api::labels::list_labels))
        .route("/label/:id", get(api::labels::get_label))
        .route("/review", get(api::reviews::list_reviews))
        .route("/review/:id", get(api::reviews::get_review))
        .route("/playlist", get(api::playlists::list_playlists))
        .route("/playlist/:id", get(api::playlists::get_playlist))
        .route("/search", get(api::search::search))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    let routes = resources.merge(api::health_routes());

    let base = state.base_path().to_string();
    let app = if base.is_empty() {
        Router::new().merge(routes)
    } else {
        Router::new().nest(&base, routes)
    };

    app.layer(TraceLayer::new_for_http()).with_state(state)
}
