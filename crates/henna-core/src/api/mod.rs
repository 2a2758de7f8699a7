//! API implementation submodules.
//!
//! Each submodule contains `impl GalleryApi` blocks that extend the public
//! API with domain-specific methods. The struct definition remains in
//! `lib.rs`.

mod builder;
mod folders;
mod manifests;

pub use builder::GalleryApiBuilder;
