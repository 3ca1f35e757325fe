use prost::Message;

use crate::error::ManifestError;
use crate::schema::{install_operation, DeltaArchiveManifest};

/// Check a manifest against the constraints of the wire schema.
///
/// prost will happily encode values the update engine rejects (an empty
/// required name, an enum value with no variant), so these are caught here.
pub fn validate_manifest(manifest: &DeltaArchiveManifest) -> Result<(), ManifestError> {
    for partition in &manifest.partitions {
        if partition.partition_name.is_empty() {
            return Err(ManifestError::Schema {
                field: "partition_name",
                reason: "must not be empty".into(),
            });
        }

        for op in &partition.operations {
            if install_operation::Type::try_from(op.r#type).is_err() {
                return Err(ManifestError::Schema {
                    field: "type",
                    reason: format!(
                        "unknown operation type {} in partition {}",
                        op.r#type, partition.partition_name
                    ),
                });
            }
            if let Some(hash) = &op.data_sha256_hash {
                check_digest_len("data_sha256_hash", hash)?;
            }
        }

        if let Some(hash) = partition
            .new_partition_info
            .as_ref()
            .and_then(|info| info.hash.as_ref())
        {
            check_digest_len("new_partition_info.hash", hash)?;
        }
    }
    Ok(())
}

fn check_digest_len(field: &'static str, hash: &[u8]) -> Result<(), ManifestError> {
    if hash.len() != 32 {
        return Err(ManifestError::Schema {
            field,
            reason: format!("expected 32-byte SHA-256, got {} bytes", hash.len()),
        });
    }
    Ok(())
}

/// Serialize a manifest to its protobuf wire form.
///
/// Fields are emitted in tag order and repeated fields in sequence order, so
/// equal manifests always produce equal bytes.
pub fn encode_manifest(manifest: &DeltaArchiveManifest) -> Result<Vec<u8>, ManifestError> {
    validate_manifest(manifest)?;
    Ok(manifest.encode_to_vec())
}

/// Parse a manifest from its protobuf wire form.
pub fn decode_manifest(bytes: &[u8]) -> Result<DeltaArchiveManifest, ManifestError> {
    Ok(DeltaArchiveManifest::decode(bytes)?)
}
