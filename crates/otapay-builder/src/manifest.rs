use otapay_manifest::{encode_manifest, DeltaArchiveManifest, PartitionUpdate};

use crate::error::{PayloadError, PayloadResult};

/// Ordered manifest under construction plus the blob-region write cursor.
///
/// Each appended partition must have been built against the current
/// [`running_offset`](Self::running_offset); appending advances the cursor by
/// the blob length so the next partition starts right after it.
#[derive(Clone, Debug)]
pub struct ManifestAccumulator {
    manifest: DeltaArchiveManifest,
    running_offset: u64,
}

impl ManifestAccumulator {
    /// Empty full-payload manifest with the cursor at 0.
    pub fn new() -> Self {
        Self {
            manifest: DeltaArchiveManifest::full(),
            running_offset: 0,
        }
    }

    /// Offset the next blob will be written at.
    pub fn running_offset(&self) -> u64 {
        self.running_offset
    }

    /// Number of partitions accumulated so far.
    pub fn len(&self) -> usize {
        self.manifest.partitions.len()
    }

    /// Returns true if no partition has been appended.
    pub fn is_empty(&self) -> bool {
        self.manifest.partitions.is_empty()
    }

    /// Append a partition whose single blob is `blob_len` bytes long.
    ///
    /// Rejects an update whose operations do not tile exactly
    /// `[running_offset, running_offset + blob_len)`.
    pub fn append(&mut self, update: PartitionUpdate, blob_len: u64) -> PayloadResult<()> {
        let mut cursor = self.running_offset;
        for op in &update.operations {
            let offset = op.data_offset.unwrap_or(0);
            if offset != cursor {
                return Err(PayloadError::EncodingFailure(format!(
                    "partition {} data offset {offset} does not match blob cursor {cursor}",
                    update.partition_name
                )));
            }
            cursor += op.data_length.unwrap_or(0);
        }
        if cursor - self.running_offset != blob_len {
            return Err(PayloadError::EncodingFailure(format!(
                "partition {} operations cover {} bytes but blob is {blob_len} bytes",
                update.partition_name,
                cursor - self.running_offset
            )));
        }

        self.manifest.partitions.push(update);
        self.running_offset = cursor;
        Ok(())
    }

    /// The manifest accumulated so far.
    pub fn manifest(&self) -> &DeltaArchiveManifest {
        &self.manifest
    }

    /// Serialize the manifest to its wire form.
    pub fn encode(&self) -> PayloadResult<Vec<u8>> {
        encode_manifest(&self.manifest).map_err(|e| PayloadError::EncodingFailure(e.to_string()))
    }

    /// Consume the accumulator, returning the manifest.
    pub fn into_manifest(self) -> DeltaArchiveManifest {
        self.manifest
    }
}

impl Default for ManifestAccumulator {
    fn default() -> Self {
        Self::new()
    }
}
