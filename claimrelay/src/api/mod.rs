//! HTTP surface of the relay.
//!
//! - **[`handlers`]**: Axum route handlers
//! - **[`models`]**: Request/response bodies
//!
//! # Routes
//!
//! - **Files** (`/files`, `/files/{id}`, `/files/{id}/metadata`): upload, stream, inspect, delete
//! - **Claims** (`/claims/{claim_id}/files`, `/claims/{claim_id}/process`): list a claim's
//!   documents and relay them to the extraction API
//! - **Config** (`/config`): settings the browser client needs
//!
//! All routes are documented with `utoipa`; the rendered docs are served at `/docs`.

pub mod handlers;
pub mod models;
