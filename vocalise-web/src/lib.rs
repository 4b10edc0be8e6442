//! vocalise-web library interface
//!
//! Exposes the router and application state for integration testing.

pub mod api;
pub mod config;
pub mod error;
pub mod session;

pub use crate::error::{ApiError, ApiResult};

use std::sync::Arc;

use axum::{extract::DefaultBodyLimit, Router};
use chrono::{DateTime, Utc};
use tower_http::trace::TraceLayer;
use vocalise_core::{FeedbackEngine, FixedWindowSegmenter, ReferenceScorer, Scorer, Segmenter};

use crate::config::Settings;
use crate::session::SessionStore;

/// Slack on top of the configured upload limit so multipart framing
/// never trips the transport-level cap before our own size check does.
const BODY_LIMIT_SLACK: usize = 1024 * 1024;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub store: SessionStore,
    pub segmenter: Arc<dyn Segmenter>,
    pub scorer: Arc<dyn Scorer>,
    pub feedback: FeedbackEngine,
    /// Service startup timestamp for uptime tracking.
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// State with the default segmenter and scorer.
    pub fn new(settings: Settings) -> Self {
        Self::with_components(
            settings,
            Arc::new(FixedWindowSegmenter::new()),
            Arc::new(ReferenceScorer::new()),
        )
    }

    /// State with injected analysis components (tests swap these out).
    pub fn with_components(
        settings: Settings,
        segmenter: Arc<dyn Segmenter>,
        scorer: Arc<dyn Scorer>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            store: SessionStore::new(),
            segmenter,
            scorer,
            feedback: FeedbackEngine::new(),
            startup_time: Utc::now(),
        }
    }
}

/// Build application router.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.settings.max_upload_bytes as usize + BODY_LIMIT_SLACK;

    Router::new()
        .merge(api::upload_routes())
        .merge(api::analysis_routes())
        .merge(api::recording_routes())
        .merge(api::health_routes())
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
