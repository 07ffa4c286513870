//! Blob store layer for claim attachments.
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (API request handlers)
//! └──────┬──────┘
//!        │  Arc<dyn BlobStore>
//!        ↓
//! ┌─────────────┐
//! │ Blob store  │  (db::handlers - postgres or local backend)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │ PostgreSQL  │  stored_files + stored_file_chunks
//! └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`handlers`]: The [`handlers::BlobStore`] trait and its backends
//! - [`models`]: Stored file records
//! - [`errors`]: Store-specific error types
//!
//! # Migrations
//!
//! The postgres backend runs the migrations in `migrations/` when it connects.
//! The [`crate::migrator`] function provides access to the migrator:
//!
//! ```ignore
//! claimrelay::migrator().run(&pool).await?;
//! ```

pub mod errors;
pub mod handlers;
pub mod models;
