use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::records::GenerationStatus;
use crate::themes::ColorTheme;

pub const MANIFEST_SCHEMA_VERSION: u64 = 1;

/// One grid cell of an exported session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub position: usize,
    pub label: String,
    pub style_id: u32,
    pub style_name: String,
    pub status: GenerationStatus,
    pub selected: bool,
    pub high_res: bool,
    pub file: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportManifest {
    pub schema_version: u64,
    pub session_id: String,
    pub phase: String,
    pub theme: ColorTheme,
    pub exported_at: String,
    pub entries: Vec<ManifestEntry>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

pub fn write_manifest(path: &Path, manifest: &ExportManifest) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, serde_json::to_string_pretty(manifest)?)?;
    Ok(())
}

pub fn read_manifest(path: &Path) -> anyhow::Result<ExportManifest> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{read_manifest, write_manifest, ExportManifest, ManifestEntry};
    use crate::records::GenerationStatus;
    use crate::themes::ThemePalette;

    #[test]
    fn manifest_writes_lowercase_status_and_reads_back() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("out").join("manifest.json");
        let manifest = ExportManifest {
            schema_version: super::MANIFEST_SCHEMA_VERSION,
            session_id: "session-1".to_string(),
            phase: "done".to_string(),
            theme: ThemePalette::reference().get(1)?.clone(),
            exported_at: "2026-10-18T00:00:00+00:00".to_string(),
            entries: vec![ManifestEntry {
                position: 0,
                label: "01".to_string(),
                style_id: 1,
                style_name: "Monoline Drawing".to_string(),
                status: GenerationStatus::Completed,
                selected: true,
                high_res: true,
                file: Some("01.png".to_string()),
                error: None,
            }],
            warnings: Vec::new(),
        };
        write_manifest(&path, &manifest)?;

        let raw: Value = serde_json::from_str(&std::fs::read_to_string(&path)?)?;
        assert_eq!(raw["entries"][0]["status"], json!("completed"));
        assert_eq!(raw["theme"]["ink_hex"], json!("#046307"));
        assert_eq!(read_manifest(&path)?, manifest);
        Ok(())
    }
}
