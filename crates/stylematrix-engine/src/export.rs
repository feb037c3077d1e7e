use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use stylematrix_contracts::catalogue::{cell_label, StyleCatalogue};
use stylematrix_contracts::now_utc_iso;
use stylematrix_contracts::records::SessionSnapshot;
use stylematrix_contracts::runs::manifest::{
    write_manifest, ExportManifest, ManifestEntry, MANIFEST_SCHEMA_VERSION,
};
use stylematrix_contracts::themes::ThemePalette;

use crate::reference::{decode_data_uri, extension_for_mime};

pub const MANIFEST_FILE_NAME: &str = "manifest.json";

#[derive(Debug, Clone, PartialEq)]
pub struct ExportReport {
    pub manifest_path: PathBuf,
    pub files: Vec<PathBuf>,
    pub manifest: ExportManifest,
}

/// Writes one `NN.<ext>` file per record with an image plus `manifest.json`.
///
/// `NN` is the one-based catalogue position. The high-res render wins over the
/// preview. Handles that are not decodable data URIs are listed with a warning
/// instead of failing the export.
pub fn export_snapshot(
    snapshot: &SessionSnapshot,
    catalogue: &StyleCatalogue,
    palette: &ThemePalette,
    session_id: &str,
    out_dir: &Path,
) -> Result<ExportReport> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create export dir {}", out_dir.display()))?;
    let theme = palette.get(snapshot.theme_index)?.clone();

    let mut files = Vec::new();
    let mut entries = Vec::with_capacity(snapshot.records.len());
    let mut warnings = Vec::new();
    for record in &snapshot.records {
        let style = catalogue.get(record.style_id)?;
        let position = catalogue.position(record.style_id)?;
        let label = cell_label(position);

        let mut file = None;
        if let Some(image) = record.best_image() {
            match decode_data_uri(image.as_str()) {
                Ok((mime_type, bytes)) => {
                    let name = format!("{label}.{}", extension_for_mime(&mime_type));
                    let path = out_dir.join(&name);
                    fs::write(&path, bytes)
                        .with_context(|| format!("failed to write {}", path.display()))?;
                    files.push(path);
                    file = Some(name);
                }
                Err(err) => warnings.push(format!("style {} ({label}): {err:#}", style.id)),
            }
        }

        entries.push(ManifestEntry {
            position,
            label,
            style_id: style.id,
            style_name: style.name.clone(),
            status: record.status,
            selected: record.selected,
            high_res: file.is_some() && record.is_upgraded(),
            file,
            error: record.error.clone(),
        });
    }

    let manifest = ExportManifest {
        schema_version: MANIFEST_SCHEMA_VERSION,
        session_id: session_id.to_string(),
        phase: snapshot.phase.as_str().to_string(),
        theme,
        exported_at: now_utc_iso(),
        entries,
        warnings,
    };
    let manifest_path = out_dir.join(MANIFEST_FILE_NAME);
    write_manifest(&manifest_path, &manifest)
        .with_context(|| format!("failed to write {}", manifest_path.display()))?;

    Ok(ExportReport {
        manifest_path,
        files,
        manifest,
    })
}

#[cfg(test)]
mod tests {
    use stylematrix_contracts::phase::ApplicationPhase;
    use stylematrix_contracts::records::{
        GenerationStatus, ImageHandle, SessionSnapshot, VariationRecord,
    };
    use stylematrix_contracts::runs::manifest::read_manifest;
    use stylematrix_contracts::themes::ThemePalette;

    use super::export_snapshot;
    use crate::testing::abc_catalogue;

    fn record(style_id: u32, status: GenerationStatus) -> VariationRecord {
        VariationRecord {
            status,
            ..VariationRecord::pending(style_id)
        }
    }

    #[test]
    fn export_prefers_high_res_and_lists_every_record() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let out = temp.path().join("grid");

        let mut upgraded = record(1, GenerationStatus::Completed);
        upgraded.preview_image = ImageHandle::new("data:image/png;base64,cHJldmlldw==");
        upgraded.high_res_image = Some(ImageHandle::new("data:image/jpeg;base64,aGlnaA=="));
        upgraded.selected = true;
        let mut failed = record(2, GenerationStatus::Error);
        failed.error = Some("quota exceeded".to_string());
        let mut preview = record(3, GenerationStatus::Completed);
        preview.preview_image = ImageHandle::new("data:image/png;base64,cHJldmlldw==");

        let snapshot = SessionSnapshot {
            phase: ApplicationPhase::Done,
            theme_index: 1,
            records: vec![upgraded, failed, preview],
        };
        let report = export_snapshot(
            &snapshot,
            &abc_catalogue(),
            &ThemePalette::reference(),
            "session-7",
            &out,
        )?;

        assert_eq!(std::fs::read(out.join("01.jpg"))?, b"high");
        assert_eq!(std::fs::read(out.join("03.png"))?, b"preview");
        assert!(!out.join("02.png").exists());
        assert_eq!(report.files.len(), 2);

        let manifest = read_manifest(&report.manifest_path)?;
        assert_eq!(manifest.session_id, "session-7");
        assert_eq!(manifest.phase, "done");
        assert_eq!(manifest.theme, ThemePalette::reference().get(1)?.clone());
        let labels: Vec<&str> = manifest.entries.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["01", "02", "03"]);
        assert!(manifest.entries[0].high_res);
        assert_eq!(manifest.entries[0].file.as_deref(), Some("01.jpg"));
        assert_eq!(manifest.entries[1].file, None);
        assert_eq!(manifest.entries[1].error.as_deref(), Some("quota exceeded"));
        assert!(!manifest.entries[2].high_res);
        assert!(manifest.warnings.is_empty());
        Ok(())
    }

    #[test]
    fn export_warns_on_undecodable_handles() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let mut odd = record(2, GenerationStatus::Completed);
        odd.preview_image = ImageHandle::new("https://cdn.example/2.png");
        let snapshot = SessionSnapshot {
            phase: ApplicationPhase::Reviewing,
            theme_index: 0,
            records: vec![odd],
        };

        let report = export_snapshot(
            &snapshot,
            &abc_catalogue(),
            &ThemePalette::reference(),
            "s",
            temp.path(),
        )?;
        assert!(report.files.is_empty());
        assert_eq!(report.manifest.entries[0].position, 1);
        assert_eq!(report.manifest.entries[0].file, None);
        assert_eq!(report.manifest.warnings.len(), 1);
        assert!(report.manifest.warnings[0].starts_with("style 2 (02)"));
        Ok(())
    }

    #[test]
    fn export_rejects_unknown_theme() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let snapshot = SessionSnapshot {
            phase: ApplicationPhase::Initial,
            theme_index: 17,
            records: Vec::new(),
        };
        let result = export_snapshot(
            &snapshot,
            &abc_catalogue(),
            &ThemePalette::reference(),
            "s",
            temp.path(),
        );
        assert!(result.is_err());
        Ok(())
    }
}
