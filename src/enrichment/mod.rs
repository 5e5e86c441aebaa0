//! Enrichment producers: path-metadata derivation, embedding generation,
//! and thumbnail/preview upload.

pub mod artifacts;
pub mod embedding;
pub mod path_metadata;
