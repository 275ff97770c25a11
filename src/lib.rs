//! # CRM Insights
//!
//! CRM record core with customer health scoring, sales pipeline staging and
//! dashboard analytics, exposed as tools over the Model Context Protocol.
//!
//! ## Features
//!
//! - **Records**: leads, contacts, accounts, opportunities, cases,
//!   activities, quotes and tracked website sessions with field-level
//!   validation
//! - **Health scoring**: weighted activity, support, usage and relationship
//!   factors with risk and trend classification
//! - **Pipeline**: stage probabilities, stage advancement and per-stage
//!   weighted amounts
//! - **Analytics**: overview, conversion funnel, trend series and revenue
//!   forecast
//!
//! ## Architecture
//!
//! ```text
//! MCP Client → MCP Server (stdio) → Services → SQLite
//!                                       ↓
//!                          Sentiment API (optional, HTTP)
//! ```
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use crm_insights::{AppState, Config, McpServer};
//! use crm_insights::storage::SqliteStorage;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     let storage = SqliteStorage::new(&config.database).await?;
//!     let state = Arc::new(AppState::new(config, storage, None));
//!     McpServer::new(state).run().await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]

#[macro_use]
mod macros;

/// Dashboard analytics: overview, funnel, trends and forecast.
pub mod analytics;
/// Time source injected at the server edge.
pub mod clock;
/// Configuration loaded from the environment.
pub mod config;
/// Input validation and mapping onto records.
pub mod dto;
/// Error types and result aliases for the application.
pub mod error;
/// Customer health scoring.
pub mod health;
/// Sales stages, probabilities and pipeline grouping.
pub mod pipeline;
/// Optional sentiment enrichment for support cases.
pub mod sentiment;
/// MCP server implementation and request handling.
pub mod server;
/// Record services.
pub mod services;
/// SQLite storage layer for persistence.
pub mod storage;

pub use clock::{Clock, FixedClock, SystemClock};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use server::{AppState, McpServer, SharedState};
