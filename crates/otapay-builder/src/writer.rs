use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::error::{PayloadError, PayloadResult};
use crate::header::{PayloadHeader, HEADER_LEN};
use crate::manifest::ManifestAccumulator;
use crate::partition::{process_partition, PartitionSpec};

/// Per-partition line of a build summary.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PartitionSummary {
    pub name: String,
    /// Image size before padding.
    pub size: u64,
    /// Offset of the blob within the blob region.
    pub offset: u64,
    /// Padded blob length.
    pub length: u64,
    /// Hex SHA-256 of the padded blob.
    pub hash: String,
}

/// Result of building a payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PayloadSummary {
    pub manifest_size: u64,
    pub blob_region_size: u64,
    pub total_size: u64,
    pub partitions: Vec<PartitionSummary>,
}

/// A fully computed payload held in memory, ready to be written.
///
/// Every offset in the manifest is final by the time this exists; writing
/// only streams the sections out in order.
#[derive(Clone, Debug)]
pub struct AssembledPayload {
    header: PayloadHeader,
    manifest: Vec<u8>,
    blobs: Vec<Vec<u8>>,
    summary: PayloadSummary,
}

impl AssembledPayload {
    /// Stream header, manifest, then each blob to `sink`.
    ///
    /// `dest` only labels errors.
    pub fn write_to<W: Write>(&self, sink: &mut W, dest: &Path) -> PayloadResult<()> {
        let fail = |phase: &'static str, partition: Option<&str>| {
            let partition = partition.map(str::to_string);
            move |source: std::io::Error| PayloadError::WriteFailure {
                phase,
                partition,
                path: dest.to_path_buf(),
                source,
            }
        };

        sink.write_all(&self.header.to_bytes()).map_err(fail("header", None))?;
        debug!(len = HEADER_LEN, "wrote header");
        sink.write_all(&self.manifest).map_err(fail("manifest", None))?;
        debug!(len = self.manifest.len(), "wrote manifest");
        for (blob, partition) in self.blobs.iter().zip(&self.summary.partitions) {
            sink.write_all(blob).map_err(fail("blob", Some(&partition.name)))?;
            debug!(partition = %partition.name, len = blob.len(), "wrote blob");
        }
        sink.flush().map_err(fail("payload", None))?;
        Ok(())
    }

    /// Concatenate all sections into one buffer.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.summary.total_size as usize);
        out.extend_from_slice(&self.header.to_bytes());
        out.extend_from_slice(&self.manifest);
        for blob in &self.blobs {
            out.extend_from_slice(blob);
        }
        out
    }

    pub fn header(&self) -> &PayloadHeader {
        &self.header
    }

    pub fn summary(&self) -> &PayloadSummary {
        &self.summary
    }
}

/// Builds an unsigned full-image payload from partition images.
///
/// Partitions are laid out in registration order. A name may be registered
/// only once; a second registration is rejected rather than replacing the
/// first, so the layout never depends on which call came last.
pub struct PayloadBuilder {
    output: PathBuf,
    partitions: Vec<PartitionSpec>,
    seen: HashSet<String>,
}

impl PayloadBuilder {
    /// Create a new builder writing to `output`.
    pub fn new(output: &Path) -> Self {
        Self {
            output: output.to_path_buf(),
            partitions: Vec::new(),
            seen: HashSet::new(),
        }
    }

    /// Register a partition image. Fails if the image does not exist.
    pub fn add_partition(
        &mut self,
        name: impl Into<String>,
        image: impl Into<PathBuf>,
    ) -> PayloadResult<()> {
        self.add_spec(PartitionSpec::new(name, image)?)
    }

    /// Register an already validated partition spec.
    pub fn add_spec(&mut self, spec: PartitionSpec) -> PayloadResult<()> {
        if self.seen.contains(&spec.name) {
            return Err(PayloadError::InvalidSpecification(format!(
                "partition {} registered more than once",
                spec.name
            )));
        }
        if let Err(e) = std::fs::metadata(&spec.source) {
            return Err(if e.kind() == std::io::ErrorKind::NotFound {
                PayloadError::InputNotFound {
                    partition: spec.name,
                    path: spec.source,
                }
            } else {
                PayloadError::ReadFailure {
                    partition: spec.name,
                    path: spec.source,
                    source: e,
                }
            });
        }
        debug!(partition = %spec.name, source = %spec.source.display(), "registered partition");
        self.seen.insert(spec.name.clone());
        self.partitions.push(spec);
        Ok(())
    }

    /// Output path of the payload.
    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Registered partitions, in layout order.
    pub fn partitions(&self) -> &[PartitionSpec] {
        &self.partitions
    }

    /// Number of registered partitions.
    pub fn len(&self) -> usize {
        self.partitions.len()
    }

    /// Returns true if no partition is registered.
    pub fn is_empty(&self) -> bool {
        self.partitions.is_empty()
    }

    /// Build the payload and write it to the output path.
    ///
    /// The payload is written to a temporary file in the output directory
    /// and renamed into place once complete, so a failed build never leaves
    /// a truncated payload behind or disturbs an existing file.
    pub fn build(self) -> PayloadResult<PayloadSummary> {
        let payload = self.assemble()?;

        let dir = match self.output.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut tmp = tempfile::Builder::new()
            .prefix(".otapay-")
            .suffix(".tmp")
            .tempfile_in(&dir)
            .map_err(|source| PayloadError::WriteFailure {
                phase: "temporary file",
                partition: None,
                path: self.output.clone(),
                source,
            })?;

        payload.write_to(tmp.as_file_mut(), &self.output)?;
        tmp.as_file()
            .sync_all()
            .map_err(|source| PayloadError::WriteFailure {
                phase: "payload",
                partition: None,
                path: self.output.clone(),
                source,
            })?;
        tmp.persist(&self.output)
            .map_err(|e| PayloadError::WriteFailure {
                phase: "final rename",
                partition: None,
                path: self.output.clone(),
                source: e.error,
            })?;

        info!(
            output = %self.output.display(),
            partitions = payload.summary.partitions.len(),
            size = payload.summary.total_size,
            "payload created"
        );
        Ok(payload.summary)
    }

    /// Build the payload in memory (no output file).
    pub fn build_to_bytes(self) -> PayloadResult<(Vec<u8>, PayloadSummary)> {
        let payload = self.assemble()?;
        Ok((payload.to_bytes(), payload.summary))
    }

    /// Process every partition, then encode the manifest and header.
    pub fn assemble(&self) -> PayloadResult<AssembledPayload> {
        if self.partitions.is_empty() {
            return Err(PayloadError::InvalidSpecification(
                "no partitions registered".into(),
            ));
        }

        let mut acc = ManifestAccumulator::new();
        let mut blobs = Vec::with_capacity(self.partitions.len());
        let mut partitions = Vec::with_capacity(self.partitions.len());

        for spec in &self.partitions {
            let offset = acc.running_offset();
            let processed = process_partition(spec, offset)?;
            let length = processed.blob.len() as u64;
            acc.append(processed.update, length)?;

            partitions.push(PartitionSummary {
                name: spec.name.clone(),
                size: processed.size,
                offset,
                length,
                hash: processed.digest.to_hex(),
            });
            blobs.push(processed.blob);
        }

        let manifest = acc.encode()?;
        let header = PayloadHeader::unsigned(manifest.len() as u64);
        let blob_region_size = acc.running_offset();

        let summary = PayloadSummary {
            manifest_size: manifest.len() as u64,
            blob_region_size,
            total_size: header.blob_offset() + blob_region_size,
            partitions,
        };

        Ok(AssembledPayload {
            header,
            manifest,
            blobs,
            summary,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_name_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("boot.img");
        std::fs::write(&img, b"boot").unwrap();

        let mut builder = PayloadBuilder::new(&dir.path().join("payload.bin"));
        builder.add_partition("boot", &img).unwrap();
        let err = builder.add_partition("boot", &img).unwrap_err();
        assert!(matches!(err, PayloadError::InvalidSpecification(_)));
        assert_eq!(builder.len(), 1);
    }

    #[test]
    fn missing_image_rejected_at_registration() {
        let dir = tempfile::tempdir().unwrap();
        let mut builder = PayloadBuilder::new(&dir.path().join("payload.bin"));
        let err = builder
            .add_partition("boot", dir.path().join("missing.img"))
            .unwrap_err();
        assert!(matches!(err, PayloadError::InputNotFound { .. }));
        assert!(builder.is_empty());
    }

    #[test]
    fn empty_builder_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("payload.bin");
        let err = PayloadBuilder::new(&out).build().unwrap_err();
        assert!(matches!(err, PayloadError::InvalidSpecification(_)));
        assert!(!out.exists());
    }

    #[test]
    fn write_to_reports_failing_phase() {
        struct Full;
        impl Write for Full {
            fn write(&mut self, _: &[u8]) -> std::io::Result<usize> {
                Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"))
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("boot.img");
        std::fs::write(&img, b"boot").unwrap();
        let mut builder = PayloadBuilder::new(&dir.path().join("payload.bin"));
        builder.add_partition("boot", &img).unwrap();

        let payload = builder.assemble().unwrap();
        let err = payload.write_to(&mut Full, Path::new("payload.bin")).unwrap_err();
        assert!(matches!(err, PayloadError::WriteFailure { phase: "header", .. }));
    }

    #[test]
    fn blob_write_failure_names_partition() {
        struct FailAfter(usize);
        impl Write for FailAfter {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                if self.0 == 0 {
                    return Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full"));
                }
                let n = buf.len().min(self.0);
                self.0 -= n;
                Ok(n)
            }
            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let mut builder = PayloadBuilder::new(&dir.path().join("payload.bin"));
        for name in ["boot", "system"] {
            let img = dir.path().join(format!("{name}.img"));
            std::fs::write(&img, vec![1u8; 4096]).unwrap();
            builder.add_partition(name, &img).unwrap();
        }

        let payload = builder.assemble().unwrap();
        let accepted = HEADER_LEN + payload.header().manifest_size as usize + 4096;
        let err = payload
            .write_to(&mut FailAfter(accepted), Path::new("payload.bin"))
            .unwrap_err();
        match &err {
            PayloadError::WriteFailure { phase, partition, .. } => {
                assert_eq!(*phase, "blob");
                assert_eq!(partition.as_deref(), Some("system"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(err.to_string().contains("partition system"));
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_image_path_is_read_failure() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("boot.img");
        std::fs::write(&file, b"boot").unwrap();

        let mut builder = PayloadBuilder::new(&dir.path().join("payload.bin"));
        // A path through a regular file fails with something other than NotFound.
        let err = builder.add_partition("boot", file.join("child.img")).unwrap_err();
        assert!(matches!(err, PayloadError::ReadFailure { ref partition, .. } if partition == "boot"));
        assert!(builder.is_empty());
    }

    #[test]
    fn summary_totals() {
        let dir = tempfile::tempdir().unwrap();
        let img = dir.path().join("boot.img");
        std::fs::write(&img, vec![1u8; 5000]).unwrap();
        let mut builder = PayloadBuilder::new(&dir.path().join("payload.bin"));
        builder.add_partition("boot", &img).unwrap();

        let payload = builder.assemble().unwrap();
        let summary = payload.summary();
        assert_eq!(summary.blob_region_size, 8192);
        assert_eq!(
            summary.total_size,
            HEADER_LEN as u64 + summary.manifest_size + 8192
        );
        assert_eq!(payload.to_bytes().len() as u64, summary.total_size);
        assert_eq!(payload.header().manifest_size, summary.manifest_size);
    }
}
