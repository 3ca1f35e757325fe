use std::path::{Path, PathBuf};

use otapay_manifest::install_operation::Type;
use otapay_manifest::{Extent, InstallOperation, PartitionInfo, PartitionUpdate, Sha256Digest};
use tracing::{debug, info};

use crate::error::{PayloadError, PayloadResult};

/// Alignment granularity of partition data. Fixed by the payload format.
pub const BLOCK_SIZE: u64 = 4096;

/// Characters that are forbidden anywhere in a partition name.
const FORBIDDEN_CHARS: &[char] = &[' ', '\t', '\n', '\r', ':', ',', '/', '\\'];

/// A registered partition: its name in the manifest and its source image.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PartitionSpec {
    pub name: String,
    pub source: PathBuf,
}

impl PartitionSpec {
    /// Create a spec after validating the partition name.
    pub fn new(name: impl Into<String>, source: impl Into<PathBuf>) -> PayloadResult<Self> {
        let name = name.into();
        validate_partition_name(&name)?;
        Ok(Self {
            name,
            source: source.into(),
        })
    }
}

/// Validate a partition name.
///
/// Names end up in the manifest and in `name:path` lists on the command
/// line, so separators and whitespace are rejected along with empty names.
pub fn validate_partition_name(name: &str) -> PayloadResult<()> {
    if name.is_empty() {
        return Err(PayloadError::InvalidSpecification(
            "partition name must not be empty".into(),
        ));
    }
    if let Some(ch) = name.chars().find(|c| FORBIDDEN_CHARS.contains(c)) {
        return Err(PayloadError::InvalidSpecification(format!(
            "partition name {name:?} contains forbidden character {ch:?}"
        )));
    }
    Ok(())
}

/// Output of processing one partition image.
#[derive(Clone, Debug)]
pub struct ProcessedPartition {
    pub update: PartitionUpdate,
    /// Image bytes padded to a whole number of blocks.
    pub blob: Vec<u8>,
    pub digest: Sha256Digest,
    /// Image size before padding.
    pub size: u64,
    /// Offset of the byte following this blob in the blob region.
    pub next_offset: u64,
}

/// Pad `data` with zeros up to the next multiple of [`BLOCK_SIZE`].
///
/// Returns the number of bytes appended.
pub fn pad_to_block(data: &mut Vec<u8>) -> usize {
    let rem = data.len() % BLOCK_SIZE as usize;
    if rem == 0 {
        return 0;
    }
    let padding = BLOCK_SIZE as usize - rem;
    data.resize(data.len() + padding, 0);
    padding
}

/// Number of blocks covering `size` bytes, rounding up.
pub fn block_count(size: u64) -> u64 {
    size.div_ceil(BLOCK_SIZE)
}

/// Turn raw image bytes into a manifest fragment and its padded blob.
///
/// `offset` is where the blob will start in the blob region. The partition
/// hash covers the padded bytes while the recorded size is the unpadded one.
pub fn process_image(name: &str, mut data: Vec<u8>, offset: u64) -> ProcessedPartition {
    let size = data.len() as u64;
    let padding = pad_to_block(&mut data);
    if padding > 0 {
        debug!(partition = name, size, padding, "padded image to block boundary");
    }

    let digest = Sha256Digest::of(&data);
    let length = data.len() as u64;

    let mut operation = InstallOperation {
        data_offset: Some(offset),
        data_length: Some(length),
        dst_extents: vec![Extent {
            start_block: Some(0),
            num_blocks: Some(block_count(size)),
        }],
        data_sha256_hash: Some(digest.to_vec()),
        ..Default::default()
    };
    operation.set_type(Type::Replace);

    let update = PartitionUpdate {
        partition_name: name.to_string(),
        new_partition_info: Some(PartitionInfo {
            size: Some(size),
            hash: Some(digest.to_vec()),
        }),
        operations: vec![operation],
    };

    ProcessedPartition {
        update,
        blob: data,
        digest,
        size,
        next_offset: offset + length,
    }
}

/// Read a partition image from disk and process it.
pub fn process_partition(spec: &PartitionSpec, offset: u64) -> PayloadResult<ProcessedPartition> {
    let data = read_image(&spec.name, &spec.source)?;
    let processed = process_image(&spec.name, data, offset);
    info!(
        partition = %spec.name,
        source = %spec.source.display(),
        offset,
        length = processed.blob.len(),
        hash = %processed.digest.short_hex(),
        "processed partition"
    );
    Ok(processed)
}

fn read_image(name: &str, path: &Path) -> PayloadResult<Vec<u8>> {
    std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            PayloadError::InputNotFound {
                partition: name.to_string(),
                path: path.to_path_buf(),
            }
        } else {
            PayloadError::ReadFailure {
                partition: name.to_string(),
                path: path.to_path_buf(),
                source: e,
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn aligned_image_is_unchanged() {
        let data: Vec<u8> = (0..8192u32).map(|i| (i % 251) as u8).collect();
        let p = process_image("system", data.clone(), 0);
        assert_eq!(p.blob, data);
        assert_eq!(p.size, 8192);
        assert_eq!(p.update.operations[0].data_length, Some(8192));
        assert_eq!(p.next_offset, 8192);
    }

    #[test]
    fn unaligned_image_is_zero_padded() {
        let p = process_image("boot", vec![0xAA; 5000], 0);
        assert_eq!(p.blob.len(), 8192);
        assert!(p.blob[..5000].iter().all(|&b| b == 0xAA));
        assert!(p.blob[5000..].iter().all(|&b| b == 0));
        assert_eq!(p.size, 5000);
    }

    #[test]
    fn hash_covers_padded_bytes() {
        let p = process_image("boot", vec![7; 100], 0);
        assert_eq!(p.digest, Sha256Digest::of(&p.blob));
        assert_ne!(p.digest, Sha256Digest::of(&[7; 100]));

        let info = p.update.new_partition_info.as_ref().unwrap();
        assert_eq!(info.size, Some(100));
        assert_eq!(info.hash.as_deref(), Some(&p.digest.as_bytes()[..]));
        assert_eq!(
            p.update.operations[0].data_sha256_hash.as_deref(),
            Some(&p.digest.as_bytes()[..])
        );
    }

    #[test]
    fn single_replace_operation_with_one_extent() {
        let p = process_image("vendor", vec![1; 4097], 12288);
        assert_eq!(p.update.partition_name, "vendor");
        assert_eq!(p.update.operations.len(), 1);

        let op = &p.update.operations[0];
        assert_eq!(op.r#type(), Type::Replace);
        assert_eq!(op.data_offset, Some(12288));
        assert_eq!(op.data_length, Some(8192));
        assert_eq!(
            op.dst_extents,
            vec![Extent {
                start_block: Some(0),
                num_blocks: Some(2)
            }]
        );
        assert_eq!(p.next_offset, 12288 + 8192);
    }

    #[test]
    fn empty_image() {
        let p = process_image("misc", Vec::new(), 0);
        assert!(p.blob.is_empty());
        assert_eq!(p.update.operations[0].dst_extents[0].num_blocks, Some(0));
        assert_eq!(p.next_offset, 0);
    }

    #[test]
    fn block_count_rounds_up() {
        assert_eq!(block_count(0), 0);
        assert_eq!(block_count(1), 1);
        assert_eq!(block_count(4096), 1);
        assert_eq!(block_count(4097), 2);
    }

    #[test]
    fn name_validation() {
        assert!(validate_partition_name("boot").is_ok());
        assert!(validate_partition_name("vendor_boot").is_ok());
        assert!(validate_partition_name("system_a").is_ok());
        assert!(validate_partition_name("").is_err());
        assert!(validate_partition_name("bad name").is_err());
        assert!(validate_partition_name("boot:img").is_err());
        assert!(validate_partition_name("a,b").is_err());
        assert!(validate_partition_name("dir/boot").is_err());
    }

    #[test]
    fn spec_rejects_invalid_name() {
        let err = PartitionSpec::new("", "boot.img").unwrap_err();
        assert!(matches!(err, PayloadError::InvalidSpecification(_)));
    }

    #[test]
    fn missing_file_is_input_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let spec = PartitionSpec::new("boot", dir.path().join("nope.img")).unwrap();
        let err = process_partition(&spec, 0).unwrap_err();
        assert!(matches!(err, PayloadError::InputNotFound { ref partition, .. } if partition == "boot"));
    }

    #[test]
    fn directory_is_read_failure() {
        let dir = tempfile::tempdir().unwrap();
        let spec = PartitionSpec::new("boot", dir.path()).unwrap();
        let err = process_partition(&spec, 0).unwrap_err();
        assert!(matches!(err, PayloadError::ReadFailure { .. }));
    }

    #[test]
    fn reads_image_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("boot.img");
        std::fs::write(&path, vec![3u8; 10]).unwrap();
        let spec = PartitionSpec::new("boot", &path).unwrap();
        let p = process_partition(&spec, 4096).unwrap();
        assert_eq!(p.size, 10);
        assert_eq!(p.blob.len(), 4096);
        assert_eq!(p.update.operations[0].data_offset, Some(4096));
    }

    proptest! {
        #[test]
        fn padding_aligns_and_appends_zeros(len in 0usize..20_000, fill in any::<u8>()) {
            let p = process_image("p", vec![fill; len], 0);
            prop_assert_eq!(p.blob.len() % BLOCK_SIZE as usize, 0);
            let rem = len % BLOCK_SIZE as usize;
            let expected_pad = if rem == 0 { 0 } else { BLOCK_SIZE as usize - rem };
            prop_assert_eq!(p.blob.len() - len, expected_pad);
            prop_assert!(p.blob[len..].iter().all(|&b| b == 0));
            prop_assert_eq!(p.update.operations[0].data_length, Some(p.blob.len() as u64));
            prop_assert_eq!(p.digest, Sha256Digest::of(&p.blob));
        }
    }
}
