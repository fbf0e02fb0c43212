//! Business services layered over the storage backends.

pub mod importer;

pub use importer::{BatchImporter, BatchItem, BatchOutcome};
