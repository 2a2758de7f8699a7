//! Migration of gallery manifests to the current schema.

mod migrator;

pub use migrator::{
    find_manifests, Confirm, GalleryHealth, MigrationOutcome, MigrationReport, MigrationStage,
    Migrator,
};
