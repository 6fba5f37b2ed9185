//! HTTP surface for topic-clusters.
//!
//! A thin axum layer over [`clusters_storage::TopicStore`], the update queue
//! and the scheduler's job registry.

pub mod error;
pub mod handlers;
pub mod server;

pub use error::ServiceError;
pub use handlers::AppState;
pub use server::{build_router, run_server_with_shutdown, serve_listener};
