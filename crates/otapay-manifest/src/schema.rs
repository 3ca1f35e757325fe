//! `chromeos_update_engine` protobuf messages.
//!
//! Hand-written prost definitions mirroring `update_metadata.proto` (proto2).
//! Only the fields a full-image payload touches are declared; unknown fields
//! in decoded manifests are skipped by prost. Tag numbers must never change.

/// A contiguous range of blocks in a partition.
#[derive(Clone, PartialEq, prost::Message)]
pub struct Extent {
    #[prost(uint64, optional, tag = "1")]
    pub start_block: Option<u64>,
    #[prost(uint64, optional, tag = "2")]
    pub num_blocks: Option<u64>,
}

/// Size and hash of a partition image.
#[derive(Clone, PartialEq, prost::Message)]
pub struct PartitionInfo {
    #[prost(uint64, optional, tag = "1")]
    pub size: Option<u64>,
    #[prost(bytes = "vec", optional, tag = "2")]
    pub hash: Option<Vec<u8>>,
}

/// One operation producing part of a partition's new contents.
///
/// `data_offset` and `data_length` address the payload's blob region, which
/// starts right after the manifest (and metadata signature, when present).
#[derive(Clone, PartialEq, prost::Message)]
pub struct InstallOperation {
    #[prost(enumeration = "install_operation::Type", required, tag = "1")]
    pub r#type: i32,
    #[prost(uint64, optional, tag = "2")]
    pub data_offset: Option<u64>,
    #[prost(uint64, optional, tag = "3")]
    pub data_length: Option<u64>,
    #[prost(message, repeated, tag = "4")]
    pub src_extents: Vec<Extent>,
    #[prost(uint64, optional, tag = "5")]
    pub src_length: Option<u64>,
    #[prost(message, repeated, tag = "6")]
    pub dst_extents: Vec<Extent>,
    #[prost(uint64, optional, tag = "7")]
    pub dst_length: Option<u64>,
    #[prost(bytes = "vec", optional, tag = "8")]
    pub data_sha256_hash: Option<Vec<u8>>,
    #[prost(bytes = "vec", optional, tag = "9")]
    pub src_sha256_hash: Option<Vec<u8>>,
}

pub mod install_operation {
    /// Operation kinds known to the update engine. Only `Replace` is produced
    /// by the builder; the rest exist so foreign manifests decode cleanly.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, prost::Enumeration)]
    #[repr(i32)]
    pub enum Type {
        Replace = 0,
        ReplaceBz = 1,
        SourceCopy = 4,
        SourceBsdiff = 5,
        Zero = 6,
        Discard = 7,
        ReplaceXz = 8,
        Puffdiff = 9,
        BrotliBsdiff = 10,
        Zucchini = 11,
        Lz4diffBsdiff = 12,
        Lz4diffPuffdiff = 13,
    }
}

/// All operations for one partition plus the expected resulting image.
#[derive(Clone, PartialEq, prost::Message)]
pub struct PartitionUpdate {
    #[prost(string, required, tag = "1")]
    pub partition_name: String,
    #[prost(message, optional, tag = "7")]
    pub new_partition_info: Option<PartitionInfo>,
    #[prost(message, repeated, tag = "8")]
    pub operations: Vec<InstallOperation>,
}

/// Top-level payload manifest.
#[derive(Clone, PartialEq, prost::Message)]
pub struct DeltaArchiveManifest {
    #[prost(uint32, optional, tag = "3")]
    pub block_size: Option<u32>,
    #[prost(uint64, optional, tag = "4")]
    pub signatures_offset: Option<u64>,
    #[prost(uint64, optional, tag = "5")]
    pub signatures_size: Option<u64>,
    #[prost(uint32, optional, tag = "12")]
    pub minor_version: Option<u32>,
    #[prost(message, repeated, tag = "13")]
    pub partitions: Vec<PartitionUpdate>,
}

impl DeltaArchiveManifest {
    /// Manifest for a full (non-delta) payload: minor version 0, no partitions.
    pub fn full() -> Self {
        Self {
            minor_version: Some(0),
            ..Default::default()
        }
    }

    /// Look up a partition by name.
    pub fn partition(&self, name: &str) -> Option<&PartitionUpdate> {
        self.partitions.iter().find(|p| p.partition_name == name)
    }

    /// Sum of all operation data lengths, i.e. the expected blob region size.
    pub fn blob_region_len(&self) -> u64 {
        self.partitions
            .iter()
            .flat_map(|p| p.operations.iter())
            .map(|op| op.data_length.unwrap_or(0))
            .sum()
    }
}

#[cfg(test)]
mod tests {
    use super::install_operation::Type;
    use super::*;

    #[test]
    fn full_manifest_defaults() {
        let m = DeltaArchiveManifest::full();
        assert_eq!(m.minor_version, Some(0));
        assert!(m.partitions.is_empty());
        assert_eq!(m.block_size, None);
        assert_eq!(m.blob_region_len(), 0);
    }

    #[test]
    fn operation_type_accessors() {
        let mut op = InstallOperation::default();
        assert_eq!(op.r#type(), Type::Replace);
        op.set_type(Type::Zero);
        assert_eq!(op.r#type, 6);
        assert_eq!(op.r#type(), Type::Zero);
    }

    #[test]
    fn partition_lookup() {
        let mut m = DeltaArchiveManifest::full();
        m.partitions.push(PartitionUpdate {
            partition_name: "boot".into(),
            ..Default::default()
        });
        assert!(m.partition("boot").is_some());
        assert!(m.partition("vendor").is_none());
    }

    #[test]
    fn blob_region_len_sums_operations() {
        let op = |len| InstallOperation {
            data_length: Some(len),
            ..Default::default()
        };
        let m = DeltaArchiveManifest {
            partitions: vec![
                PartitionUpdate {
                    partition_name: "a".into(),
                    operations: vec![op(4096)],
                    ..Default::default()
                },
                PartitionUpdate {
                    partition_name: "b".into(),
                    operations: vec![op(8192), op(4096)],
                    ..Default::default()
                },
            ],
            ..DeltaArchiveManifest::full()
        };
        assert_eq!(m.blob_region_len(), 16384);
    }
}
