//! HTTP API Layer
//!
//! REST endpoints over axum: accounts, medications, dose/refill/side-effect
//! logs and insights. JWT bearer auth on everything but register, login
//! and health.

pub mod auth;
pub mod error;
pub mod extract;
pub mod handler;
pub mod media;
pub mod middleware;
pub mod rate_limiter;
pub mod router;
pub mod server;
pub mod state;
pub mod types;

pub use auth::{Argon2PasswordHasher, AuthUser, TokenIssuer};
pub use error::{ApiError, ApiResult};
pub use router::build_router;
pub use server::{HttpServer, HttpServerConfig};
pub use state::{ApiSettings, AppState, Ports};
