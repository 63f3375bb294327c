//! HTTP server for scene branching.
//!
//! Exposes the [`BranchManager`](scene_engine::BranchManager) over a JSON
//! API. Errors come back as `{ "error": kind, "message": text }` with the
//! status code of their kind.

pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use config::{AppConfig, ServerConfig, ServicesConfig};
pub use error::{ServerError, ServerResult};
pub use server::SceneServer;
pub use state::AppState;
