use std::{fs, path::Path};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::convert::{
    ArmatureOptions, AxisConversion, BoneHeadSource, DEFAULT_CONNECT_COSINE,
    DEFAULT_EMPTY_DISPLAY_SIZE, DEFAULT_LEAF_BONE_LENGTH,
};

/// Persisted import settings used by the CLI and library callers.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ImportSettings {
    /// Source-to-host axis convention. glTF is Y-up; most DCC hosts are Z-up.
    pub axis_conversion: AxisConversion,
    /// Remove nodes that end up with no mesh, armature or children.
    pub prune_empty: bool,
    /// Cosine above which a child bone is connected to its parent's tail.
    pub connect_cosine_threshold: f32,
    pub leaf_bone_length: f32,
    pub bone_head_source: BoneHeadSource,
    pub empty_display_size: f32,
}

impl Default for ImportSettings {
    fn default() -> Self {
        Self {
            axis_conversion: AxisConversion::YUpToZUp,
            prune_empty: true,
            connect_cosine_threshold: DEFAULT_CONNECT_COSINE,
            leaf_bone_length: DEFAULT_LEAF_BONE_LENGTH,
            bone_head_source: BoneHeadSource::NodeWorld,
            empty_display_size: DEFAULT_EMPTY_DISPLAY_SIZE,
        }
    }
}

impl ImportSettings {
    pub fn armature_options(&self) -> ArmatureOptions {
        ArmatureOptions {
            connect_cosine_threshold: self.connect_cosine_threshold,
            leaf_bone_length: self.leaf_bone_length,
            head_source: self.bone_head_source,
            remap: self.axis_conversion.remap(),
        }
    }
}

/// Save import settings to a JSON file.
pub fn save_import_settings(path: &Path, settings: &ImportSettings) -> Result<()> {
    let content = serde_json::to_string_pretty(settings)
        .context("failed to serialize import settings as JSON")?;
    fs::write(path, content)
        .with_context(|| format!("failed to save import settings: {}", path.display()))?;
    Ok(())
}

/// Load import settings from a JSON file. Missing fields take their defaults.
pub fn load_import_settings(path: &Path) -> Result<ImportSettings> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to load import settings: {}", path.display()))?;
    let settings: ImportSettings =
        serde_json::from_str(&content).context("failed to parse import settings JSON")?;
    Ok(settings)
}
