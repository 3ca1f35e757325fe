use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PayloadError, PayloadResult};
use crate::writer::PayloadBuilder;

/// One partition listed in a payload config file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionEntry {
    pub name: String,
    pub image: PathBuf,
}

/// Payload build configuration, usually loaded from TOML.
///
/// ```toml
/// output = "payload.bin"
///
/// [[partitions]]
/// name = "boot"
/// image = "images/boot.img"
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayloadConfig {
    pub output: Option<PathBuf>,
    /// Extension (without the dot) recognised as a partition image when
    /// scanning a directory.
    pub image_extension: String,
    /// Partitions in payload layout order.
    pub partitions: Vec<PartitionEntry>,
}

impl Default for PayloadConfig {
    fn default() -> Self {
        Self {
            output: None,
            image_extension: "img".into(),
            partitions: Vec::new(),
        }
    }
}

impl PayloadConfig {
    /// Parse a config from TOML text. Paths are left as written.
    pub fn from_toml_str(text: &str) -> PayloadResult<Self> {
        toml::from_str(text).map_err(|e| PayloadError::Config(e.to_string()))
    }

    /// Load a config file, resolving relative paths against its directory.
    pub fn load(path: &Path) -> PayloadResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| PayloadError::Config(format!("{}: {e}", path.display())))?;
        let mut config = Self::from_toml_str(&text)?;
        if let Some(base) = path.parent() {
            config.resolve_relative_to(base);
        }
        Ok(config)
    }

    /// Rebase relative output and image paths onto `base`.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        if let Some(output) = &mut self.output {
            if output.is_relative() {
                *output = base.join(&*output);
            }
        }
        for entry in &mut self.partitions {
            if entry.image.is_relative() {
                entry.image = base.join(&entry.image);
            }
        }
    }

    /// Register every configured partition with `builder`, in file order.
    pub fn register(&self, builder: &mut PayloadBuilder) -> PayloadResult<()> {
        for entry in &self.partitions {
            builder.add_partition(entry.name.clone(), entry.image.clone())?;
        }
        Ok(())
    }
}
