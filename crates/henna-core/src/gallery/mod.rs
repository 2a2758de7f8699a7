//! Gallery folders: content-hash index and folder processing.

mod hash_index;
mod processor;

pub use hash_index::{HashIndex, HashRecord};
pub use processor::{gallery_folders, FolderProcessor, FolderSummary, ProgressCallback};
