//! Update payload builder.
//!
//! Assembles raw partition images into a single unsigned full-image payload
//! (`CrAU` container) that an A/B update engine can apply.
//!
//! # Layout
//!
//! - **Header**: magic, major version, manifest size, metadata signature size
//! - **Manifest**: protobuf `DeltaArchiveManifest`, one `REPLACE` operation
//!   per partition
//! - **Blob region**: partition images padded to the block size, concatenated
//!   in registration order
//!
//! # Architecture
//!
//! - **partition**: reads, pads, and hashes one image into a manifest fragment
//! - **ManifestAccumulator**: ordered manifest plus the blob-region cursor
//! - **PayloadHeader**: fixed-size preamble encoding
//! - **PayloadBuilder**: registration and the build sequence
//! - **PayloadReader**: parses a finished payload for inspection

pub mod config;
pub mod error;
pub mod header;
pub mod manifest;
pub mod partition;
pub mod reader;
pub mod sources;
pub mod writer;

pub use config::{PartitionEntry, PayloadConfig};
pub use error::{PayloadError, PayloadResult};
pub use header::{PayloadHeader, HEADER_LEN, PAYLOAD_MAGIC, PAYLOAD_VERSION};
pub use manifest::ManifestAccumulator;
pub use partition::{PartitionSpec, ProcessedPartition, BLOCK_SIZE};
pub use reader::PayloadReader;
pub use sources::{discover_images, parse_partition_list};
pub use writer::{AssembledPayload, PartitionSummary, PayloadBuilder, PayloadSummary};
