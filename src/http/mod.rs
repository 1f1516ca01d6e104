//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, timeout, trace layers)
//!     → proxy handler buffers the body, strips hop-by-hop headers
//!     → hooks.rs pre_forward (sanitize fields, cookies, headers, target)
//!     → upstream via hyper-util client
//!     → hooks.rs post_receive (response header policy)
//!     → Send to client
//! ```

pub mod hooks;
pub mod request;
pub mod server;

pub use hooks::{post_receive, pre_forward, Upstream};
pub use request::X_REQUEST_ID;
pub use server::{HttpServer, ServerError};
