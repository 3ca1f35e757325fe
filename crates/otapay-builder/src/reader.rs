use std::path::Path;

use otapay_manifest::{decode_manifest, DeltaArchiveManifest, InstallOperation};

use crate::error::{PayloadError, PayloadResult};
use crate::header::{PayloadHeader, HEADER_LEN};

/// Upper bound on the manifest section, matching the update engine's limit.
pub const MANIFEST_MAX_SIZE: u64 = 4 * 1024 * 1024;

/// Parses a payload for inspection: header, manifest, and blob slices.
///
/// No hashes or signatures are checked.
#[derive(Debug)]
pub struct PayloadReader {
    data: Vec<u8>,
    header: PayloadHeader,
    manifest: DeltaArchiveManifest,
}

impl PayloadReader {
    /// Open from raw bytes.
    pub fn from_bytes(data: Vec<u8>) -> PayloadResult<Self> {
        let header = PayloadHeader::parse(&data)?;
        if header.manifest_size > MANIFEST_MAX_SIZE {
            return Err(PayloadError::Truncated(format!(
                "manifest size {} exceeds limit {MANIFEST_MAX_SIZE}",
                header.manifest_size
            )));
        }
        if header.blob_offset() > data.len() as u64 {
            return Err(PayloadError::Truncated(format!(
                "metadata needs {} bytes, payload has {}",
                header.blob_offset(),
                data.len()
            )));
        }

        let manifest_end = HEADER_LEN + header.manifest_size as usize;
        let manifest = decode_manifest(&data[HEADER_LEN..manifest_end])
            .map_err(PayloadError::ManifestDecode)?;

        Ok(Self {
            data,
            header,
            manifest,
        })
    }

    /// Open from disk.
    pub fn open(path: &Path) -> PayloadResult<Self> {
        Self::from_bytes(std::fs::read(path)?)
    }

    pub fn header(&self) -> &PayloadHeader {
        &self.header
    }

    pub fn manifest(&self) -> &DeltaArchiveManifest {
        &self.manifest
    }

    /// Everything after the manifest and metadata signature.
    pub fn blob_region(&self) -> &[u8] {
        &self.data[self.header.blob_offset() as usize..]
    }

    /// The data slice an operation points at.
    pub fn operation_data(&self, op: &InstallOperation) -> PayloadResult<&[u8]> {
        let region = self.blob_region();
        let start = op.data_offset.unwrap_or(0);
        let end = start
            .checked_add(op.data_length.unwrap_or(0))
            .filter(|&end| end <= region.len() as u64)
            .ok_or_else(|| {
                PayloadError::Truncated(format!(
                    "operation data at {start}+{} extends beyond blob region of {} bytes",
                    op.data_length.unwrap_or(0),
                    region.len()
                ))
            })?;
        Ok(&region[start as usize..end as usize])
    }

    /// Concatenated operation data for a partition, or `None` if the
    /// manifest does not list it.
    pub fn partition_blob(&self, name: &str) -> PayloadResult<Option<Vec<u8>>> {
        let Some(partition) = self.manifest.partition(name) else {
            return Ok(None);
        };
        let mut blob = Vec::new();
        for op in &partition.operations {
            blob.extend_from_slice(self.operation_data(op)?);
        }
        Ok(Some(blob))
    }
}
