use crate::error::{PayloadError, PayloadResult};

/// Magic tag opening every payload.
pub const PAYLOAD_MAGIC: &[u8; 4] = b"CrAU";

/// Major payload version written by this builder.
pub const PAYLOAD_VERSION: u64 = 2;

/// Encoded header size: magic + version + manifest size + signature size.
pub const HEADER_LEN: usize = 4 + 8 + 8 + 4;

/// Fixed-size preamble of a payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PayloadHeader {
    pub version: u64,
    pub manifest_size: u64,
    pub metadata_signature_size: u32,
}

impl PayloadHeader {
    /// Header for an unsigned payload whose manifest is `manifest_size` bytes.
    pub fn unsigned(manifest_size: u64) -> Self {
        Self {
            version: PAYLOAD_VERSION,
            manifest_size,
            metadata_signature_size: 0,
        }
    }

    /// Render the header, all integers big-endian.
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..4].copy_from_slice(PAYLOAD_MAGIC);
        buf[4..12].copy_from_slice(&self.version.to_be_bytes());
        buf[12..20].copy_from_slice(&self.manifest_size.to_be_bytes());
        buf[20..24].copy_from_slice(&self.metadata_signature_size.to_be_bytes());
        buf
    }

    /// Parse and validate a header from the start of `data`.
    pub fn parse(data: &[u8]) -> PayloadResult<Self> {
        if data.len() < HEADER_LEN {
            return Err(PayloadError::Truncated(format!(
                "header needs {HEADER_LEN} bytes, got {}",
                data.len()
            )));
        }
        if &data[0..4] != PAYLOAD_MAGIC {
            return Err(PayloadError::InvalidMagic {
                expected: String::from_utf8_lossy(PAYLOAD_MAGIC).into(),
                actual: String::from_utf8_lossy(&data[0..4]).into(),
            });
        }

        let mut word = [0u8; 8];
        word.copy_from_slice(&data[4..12]);
        let version = u64::from_be_bytes(word);
        if version != PAYLOAD_VERSION {
            return Err(PayloadError::UnsupportedVersion(version));
        }
        word.copy_from_slice(&data[12..20]);
        let manifest_size = u64::from_be_bytes(word);

        let mut half = [0u8; 4];
        half.copy_from_slice(&data[20..24]);

        Ok(Self {
            version,
            manifest_size,
            metadata_signature_size: u32::from_be_bytes(half),
        })
    }

    /// Offset of the first blob byte from the start of the payload.
    pub fn blob_offset(&self) -> u64 {
        HEADER_LEN as u64 + self.manifest_size + u64::from(self.metadata_signature_size)
    }
}
