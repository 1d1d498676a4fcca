//! Manifest parsing, entity extraction, and identity for composegraph.
//!
//! This crate defines the schema layer: YAML compose manifest parsing
//! (`ComposeFile`), normalized per-service records (`NormalizedManifest`,
//! `ServiceRecord`) produced by the lenient entity extractor, and the
//! deterministic identity scheme (`IdentityScheme`) that names every graph
//! entity derived from a manifest.

pub mod identity;
pub mod manifest;
pub mod normalize;
pub mod types;

pub use identity::{sanitize, IdentityScheme, IdentityScope};
pub use manifest::{
    parse_manifest_file, parse_manifest_str, ComposeFile, ManifestError, RejectedService,
};
pub use normalize::{
    FieldWarning, ImageRef, NormalizedManifest, PortMapping, ServiceRecord, VolumeMount,
};
pub use types::EntityId;
