//! Storage backends.

pub mod blob_store;

pub use blob_store::{BlobStore, BlobWriter, ByteStream, create_blob_store};
