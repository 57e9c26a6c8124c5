//! # Footprint
//!
//! A carbon footprint tracker, usable both as a standalone binary and as a library.
//!
//! Users group logged activities into scenarios. Each activity is converted
//! into kg CO₂e through the emission factor table, a built-in catalog, or an
//! optional remote estimator. XP, badges, challenges, and a social feed sit
//! on top of the logged data.
//!
//! ## Library Usage
//!
//! ```toml
//! [dependencies]
//! footprint = { version = "0.0.1", default-features = false }
//! ```
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use footprint::server::{AppState, create_router};
//! use footprint::store::{SqliteStore, Store};
//!
//! let store = SqliteStore::new("./data/footprint.db").unwrap();
//! store.initialize().unwrap();
//!
//! let state = Arc::new(AppState::local(Arc::new(store)));
//! let router = create_router(state);
//! // Serve with axum...
//! ```
//!
//! ## Feature Flags
//!
//! - `cli` (default): Builds the `footprint` binary. Disable with `default-features = false`.

pub mod assistant;
pub mod auth;
pub mod config;
pub mod emissions;
pub mod error;
pub mod gamification;
pub mod server;
pub mod store;
pub mod types;
