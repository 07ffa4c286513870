//! API request and response bodies.
//!
//! These are kept apart from [`crate::db::models`] so the wire format can differ from the stored
//! record (for example, `file_id` on the wire versus `id` in the store).

pub mod claims;
pub mod config;
pub mod files;
