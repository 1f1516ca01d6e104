//! Header and cookie filtering.
//!
//! # Data Flow
//! ```text
//! inbound request headers:
//!     → cookies.rs (set → del → only over the Cookie header)
//!     → headers.rs (set → del → only)
//!     → headers.rs (optional value sanitization)
//!
//! outbound response headers:
//!     → headers.rs (set → del → only)
//! ```
//!
//! # Design Decisions
//! - Each stage consumes the previous stage's output snapshot and returns a new one
//! - Stage order is fixed regardless of which stages are configured
//! - Header names compare case-insensitively, cookie names case-sensitively

pub mod cookies;
pub mod headers;

pub use cookies::{Cookie, CookiePolicy};
pub use headers::{Direction, HeaderPolicy};
