//! Records persisted by the blob store.

pub mod stored_files;
