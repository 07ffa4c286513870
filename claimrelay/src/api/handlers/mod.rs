//! HTTP request handlers.
//!
//! - [`files`]: upload, streaming download, metadata and deletion of claim documents
//! - [`claims`]: per-claim listing and the extraction relay
//! - [`config`]: client-facing configuration
//!
//! Handlers take the shared [`crate::AppState`] and return [`crate::errors::Result`], so every
//! failure is rendered as `{"error": "..."}` with the matching status code.

pub mod claims;
pub mod config;
pub mod files;
