//! Manifest schema for update payloads.
//!
//! The manifest is the `chromeos_update_engine.DeltaArchiveManifest` protobuf
//! message. This crate reproduces the subset of that schema a full-image
//! payload needs, with the upstream field numbers, and wraps encoding so the
//! same manifest always serializes to the same bytes.
//!
//! # Key Types
//!
//! - [`DeltaArchiveManifest`]: Top-level manifest message
//! - [`PartitionUpdate`]: Per-partition operations and resulting image info
//! - [`InstallOperation`]: One unit of work writing blob data to extents
//! - [`Sha256Digest`]: 32-byte SHA-256 hash with hex formatting

pub mod codec;
pub mod digest;
pub mod error;
pub mod schema;

pub use codec::{decode_manifest, encode_manifest, validate_manifest};
pub use digest::Sha256Digest;
pub use error::ManifestError;
pub use schema::{
    install_operation, DeltaArchiveManifest, Extent, InstallOperation, PartitionInfo,
    PartitionUpdate,
};
