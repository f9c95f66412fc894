//! Core ETL abstractions
//!
//! This module provides the trait definitions for the collaborators the
//! pipeline sequences: an uploader that pushes files to an object store, an
//! extractor that splits a source file into chunks, and a loader that writes
//! chunks into a warehouse table.

mod extract;
mod load;
mod pipeline;
mod upload;

pub use extract::Extractor;
pub use load::Loader;
pub use pipeline::{Pipeline, RunSummary};
pub use upload::{Uploader, object_name};
