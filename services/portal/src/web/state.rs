//! services/portal/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use horoscope_core::ports::{ProfileStore, SignContentStore};
use sqlx::PgPool;
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all
/// handlers. Each WebSocket connection builds its own auth gateway and
/// session controller on top of it.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub profiles: Arc<dyn ProfileStore>,
    pub signs: Arc<dyn SignContentStore>,
    pub config: Arc<Config>,
}
