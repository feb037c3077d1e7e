use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::errors::SessionError;
use crate::phase::{ApplicationPhase, Stage};

/// Opaque reference to a rendered image (a data URI for the Gemini client).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ImageHandle(String);

impl ImageHandle {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Pending,
    Processing,
    Completed,
    Error,
    Upgrading,
}

impl GenerationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Error => "error",
            Self::Upgrading => "upgrading",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariationRecord {
    pub style_id: u32,
    pub preview_image: ImageHandle,
    pub high_res_image: Option<ImageHandle>,
    pub status: GenerationStatus,
    pub selected: bool,
    pub error: Option<String>,
}

impl VariationRecord {
    pub fn pending(style_id: u32) -> Self {
        Self {
            style_id,
            preview_image: ImageHandle::default(),
            high_res_image: None,
            status: GenerationStatus::Pending,
            selected: false,
            error: None,
        }
    }

    /// High-res render when present, otherwise the preview if one was produced.
    pub fn best_image(&self) -> Option<&ImageHandle> {
        self.high_res_image
            .as_ref()
            .or_else(|| (!self.preview_image.is_empty()).then_some(&self.preview_image))
    }

    pub fn is_upgraded(&self) -> bool {
        self.high_res_image.is_some()
    }
}

/// Per-style generation state, kept in catalogue order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordStore {
    records: IndexMap<u32, VariationRecord>,
}

impl RecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// One pending record per id. Later duplicates of an id are ignored.
    pub fn from_ids(ids: &[u32]) -> Self {
        let mut records = IndexMap::with_capacity(ids.len());
        for id in ids {
            records
                .entry(*id)
                .or_insert_with(|| VariationRecord::pending(*id));
        }
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn get(&self, style_id: u32) -> Result<&VariationRecord, SessionError> {
        self.records
            .get(&style_id)
            .ok_or(SessionError::NotFound { id: style_id })
    }

    fn get_mut(&mut self, style_id: u32) -> Result<&mut VariationRecord, SessionError> {
        self.records
            .get_mut(&style_id)
            .ok_or(SessionError::NotFound { id: style_id })
    }

    pub fn iter(&self) -> impl Iterator<Item = &VariationRecord> {
        self.records.values()
    }

    pub fn mark_in_flight(&mut self, style_id: u32, stage: Stage) -> Result<(), SessionError> {
        let record = self.get_mut(style_id)?;
        record.status = stage.in_flight_status();
        Ok(())
    }

    pub fn complete(
        &mut self,
        style_id: u32,
        stage: Stage,
        image: ImageHandle,
    ) -> Result<(), SessionError> {
        let record = self.get_mut(style_id)?;
        match stage {
            Stage::Preview => record.preview_image = image,
            Stage::Upgrade => record.high_res_image = Some(image),
        }
        record.status = GenerationStatus::Completed;
        record.error = None;
        Ok(())
    }

    /// Marks the record failed. A failed upgrade keeps its preview but is no
    /// longer selected.
    pub fn fail(
        &mut self,
        style_id: u32,
        stage: Stage,
        message: impl Into<String>,
    ) -> Result<(), SessionError> {
        let record = self.get_mut(style_id)?;
        record.status = GenerationStatus::Error;
        record.error = Some(message.into());
        if stage == Stage::Upgrade {
            record.selected = false;
        }
        Ok(())
    }

    /// Sets the upgrade intent on a completed record.
    pub fn set_selected(
        &mut self,
        style_id: u32,
        selected: bool,
        phase: ApplicationPhase,
    ) -> Result<(), SessionError> {
        let record = self.get_mut(style_id)?;
        if record.status != GenerationStatus::Completed {
            return Err(SessionError::invalid_transition(
                phase,
                format!(
                    "select style {style_id} with status {}",
                    record.status.as_str()
                ),
            ));
        }
        record.selected = selected;
        Ok(())
    }

    /// Selected, completed ids in catalogue order.
    pub fn selected_ids(&self) -> Vec<u32> {
        self.records
            .values()
            .filter(|record| record.selected && record.status == GenerationStatus::Completed)
            .map(|record| record.style_id)
            .collect()
    }

    pub fn snapshot(&self) -> Vec<VariationRecord> {
        self.records.values().cloned().collect()
    }
}

/// Read-only copy of a session handed to consumers (review UI, export).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub phase: ApplicationPhase,
    pub theme_index: usize,
    pub records: Vec<VariationRecord>,
}

impl SessionSnapshot {
    pub fn record(&self, style_id: u32) -> Option<&VariationRecord> {
        self.records
            .iter()
            .find(|record| record.style_id == style_id)
    }

    pub fn count(&self, status: GenerationStatus) -> usize {
        self.records
            .iter()
            .filter(|record| record.status == status)
            .count()
    }

    pub fn upgraded_count(&self) -> usize {
        self.records
            .iter()
            .filter(|record| record.is_upgraded())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::{GenerationStatus, ImageHandle, RecordStore, VariationRecord};
    use crate::errors::SessionError;
    use crate::phase::{ApplicationPhase, Stage};

    #[test]
    fn store_keeps_insertion_order_and_one_record_per_id() {
        let store = RecordStore::from_ids(&[3, 1, 3, 2]);
        let ids: Vec<u32> = store.iter().map(|record| record.style_id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert!(store
            .iter()
            .all(|record| record.status == GenerationStatus::Pending));
    }

    #[test]
    fn preview_and_upgrade_write_different_slots() -> anyhow::Result<()> {
        let mut store = RecordStore::from_ids(&[1]);
        store.mark_in_flight(1, Stage::Preview)?;
        assert_eq!(store.get(1)?.status, GenerationStatus::Processing);
        store.complete(1, Stage::Preview, ImageHandle::new("data:preview"))?;
        store.mark_in_flight(1, Stage::Upgrade)?;
        assert_eq!(store.get(1)?.status, GenerationStatus::Upgrading);
        store.complete(1, Stage::Upgrade, ImageHandle::new("data:4k"))?;

        let record = store.get(1)?;
        assert_eq!(record.preview_image.as_str(), "data:preview");
        assert_eq!(
            record.best_image().map(ImageHandle::as_str),
            Some("data:4k")
        );
        assert_eq!(record.status, GenerationStatus::Completed);
        Ok(())
    }

    #[test]
    fn only_completed_records_can_be_selected() -> anyhow::Result<()> {
        let mut store = RecordStore::from_ids(&[1, 2]);
        store.complete(1, Stage::Preview, ImageHandle::new("a"))?;
        store.fail(2, Stage::Preview, "no image")?;

        store.set_selected(1, true, ApplicationPhase::Reviewing)?;
        let err = store
            .set_selected(2, true, ApplicationPhase::Reviewing)
            .err();
        assert!(matches!(err, Some(SessionError::InvalidTransition { .. })));
        assert_eq!(store.selected_ids(), vec![1]);
        assert_eq!(store.get(2)?.error.as_deref(), Some("no image"));
        Ok(())
    }

    #[test]
    fn failed_upgrade_clears_selection_and_keeps_preview() -> anyhow::Result<()> {
        let mut store = RecordStore::from_ids(&[1]);
        store.complete(1, Stage::Preview, ImageHandle::new("a"))?;
        store.set_selected(1, true, ApplicationPhase::Reviewing)?;
        store.fail(1, Stage::Upgrade, "timeout")?;

        let record = store.get(1)?;
        assert_eq!(record.status, GenerationStatus::Error);
        assert!(!record.selected);
        assert!(record.high_res_image.is_none());
        assert_eq!(record.preview_image.as_str(), "a");
        Ok(())
    }

    #[test]
    fn pending_record_has_no_image() {
        let record = VariationRecord::pending(9);
        assert!(record.best_image().is_none());
        assert!(!record.is_upgraded());
    }

    #[test]
    fn unknown_id_is_not_found() {
        let mut store = RecordStore::new();
        assert_eq!(
            store.mark_in_flight(4, Stage::Preview).err(),
            Some(SessionError::NotFound { id: 4 })
        );
    }
}
