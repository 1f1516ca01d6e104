//! Sanitization pipeline for query and form fields.
//!
//! # Data Flow
//! ```text
//! field name/value
//!     → rules.rs (resolve: exact rule → default rule → none)
//!     → fields.rs (dispatch on FieldType)
//!     → ladder.rs (ordered transform steps)
//!     → validate.rs (format predicates, safe file names)
//!     → re-encoded query string / form body
//! ```
//!
//! # Design Decisions
//! - Every step is a pure function of its input and the rule
//! - Unconfigured fields pass through unless a default rule exists (fail-open)
//! - Format violations blank the value; nothing here rejects a request

pub mod fields;
pub mod ladder;
pub mod rules;
pub mod validate;

pub use fields::{sanitize_body, sanitize_field, sanitize_form, sanitize_query, sanitize_value};
pub use rules::{FieldRule, RuleSet};
