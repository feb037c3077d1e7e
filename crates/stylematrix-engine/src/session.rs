use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{json, Map, Value};
use stylematrix_contracts::catalogue::StyleCatalogue;
use stylematrix_contracts::errors::SessionError;
use stylematrix_contracts::events::EventWriter;
use stylematrix_contracts::phase::{ApplicationPhase, Stage};
use stylematrix_contracts::queue::JobQueue;
use stylematrix_contracts::records::{
    GenerationStatus, RecordStore, SessionSnapshot, VariationRecord,
};
use stylematrix_contracts::themes::{ColorTheme, ThemePalette};

use crate::client::RenderClient;
use crate::config::SessionConfig;
use crate::export::{export_snapshot, ExportReport};
use crate::reference::ReferenceImage;
use crate::runner::{SequentialJobRunner, StepOutcome};

pub type ProgressObserver = Arc<dyn Fn(&ProgressUpdate) + Send + Sync>;

/// Per-job notification sent to the progress observer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressUpdate {
    pub stage: Stage,
    pub style_id: u32,
    pub style_name: String,
    /// Zero-based position in the active queue.
    pub index: usize,
    pub total: usize,
    pub status: GenerationStatus,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub stage: Option<Stage>,
    pub processed: usize,
    pub total: usize,
    pub complete: bool,
}

impl Progress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.processed as f64 / self.total as f64 * 100.0).min(100.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every job ran; the session moved to the stage's finished phase.
    Exhausted { stage: Stage, processed: usize },
    /// The session was reset or restarted mid-drain.
    Halted { stage: Stage, processed: usize },
}

#[derive(Debug)]
pub(crate) struct ActiveQueue {
    pub(crate) stage: Stage,
    pub(crate) jobs: JobQueue,
}

#[derive(Debug)]
pub(crate) struct SessionState {
    pub(crate) phase: ApplicationPhase,
    pub(crate) theme_index: usize,
    pub(crate) reference: Option<Arc<ReferenceImage>>,
    pub(crate) records: RecordStore,
    pub(crate) queue: Option<ActiveQueue>,
    pub(crate) remote_calls: u64,
    epoch: u64,
    draining: bool,
    last_finished: Option<(Stage, usize)>,
}

impl SessionState {
    pub(crate) fn is_current(&self, stage: Stage, epoch: u64) -> bool {
        self.epoch == epoch && self.phase == stage.running_phase()
    }

    pub(crate) fn advance_queue(&mut self) {
        if let Some(active) = self.queue.as_mut() {
            active.jobs.advance();
        }
    }

    pub(crate) fn finish_stage(&mut self, stage: Stage) {
        let total = self.queue.take().map(|active| active.jobs.len()).unwrap_or(0);
        self.last_finished = Some((stage, total));
        self.phase = stage.finished_phase();
    }

    fn start_stage(&mut self, stage: Stage, ids: Vec<u32>) -> usize {
        let total = ids.len();
        self.queue = Some(ActiveQueue {
            stage,
            jobs: JobQueue::new(ids),
        });
        self.phase = stage.running_phase();
        self.epoch += 1;
        total
    }
}

pub(crate) struct Shared {
    state: Mutex<SessionState>,
    pub(crate) client: Arc<dyn RenderClient>,
    pub(crate) catalogue: Arc<StyleCatalogue>,
    palette: Arc<ThemePalette>,
    events: EventWriter,
    observer: Mutex<Option<ProgressObserver>>,
}

impl Shared {
    pub(crate) fn lock_state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Event-log failures never interrupt a session; they are reported on stderr.
    pub(crate) fn record_event(&self, event_type: &str, payload: Value) {
        let payload = match payload {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        if let Err(err) = self.events.emit(event_type, payload) {
            eprintln!("stylematrix: failed to write {event_type} event: {err:#}");
        }
    }

    pub(crate) fn notify(&self, update: &ProgressUpdate) {
        let observer = self
            .observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        if let Some(observer) = observer {
            observer(update);
        }
    }
}

/// Owns the session phase, the record store and the active queue.
///
/// Cloning yields another handle to the same session, so a reset can be issued
/// from one thread while another is blocked inside [`StageController::drain`].
#[derive(Clone)]
pub struct StageController {
    shared: Arc<Shared>,
}

impl StageController {
    pub fn new(
        config: &SessionConfig,
        client: Arc<dyn RenderClient>,
        catalogue: StyleCatalogue,
        palette: ThemePalette,
        events: EventWriter,
    ) -> Result<Self, SessionError> {
        let theme = palette.get(config.theme_index)?.name.clone();
        let controller = Self {
            shared: Arc::new(Shared {
                state: Mutex::new(SessionState {
                    phase: ApplicationPhase::Initial,
                    theme_index: config.theme_index,
                    reference: None,
                    records: RecordStore::new(),
                    queue: None,
                    remote_calls: 0,
                    epoch: 0,
                    draining: false,
                    last_finished: None,
                }),
                client,
                catalogue: Arc::new(catalogue),
                palette: Arc::new(palette),
                events,
                observer: Mutex::new(None),
            }),
        };
        controller.shared.record_event(
            "session_started",
            json!({
                "client": controller.shared.client.name(),
                "model": config.model,
                "theme": theme,
                "styles": controller.shared.catalogue.count(),
            }),
        );
        Ok(controller)
    }

    pub fn set_progress_observer(&self, observer: ProgressObserver) {
        *self
            .shared
            .observer
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(observer);
    }

    pub fn session_id(&self) -> &str {
        self.shared.events.session_id()
    }

    pub fn client_name(&self) -> &str {
        self.shared.client.name()
    }

    pub fn catalogue(&self) -> &StyleCatalogue {
        &self.shared.catalogue
    }

    pub fn palette(&self) -> &ThemePalette {
        &self.shared.palette
    }

    pub fn phase(&self) -> ApplicationPhase {
        self.shared.lock_state().phase
    }

    pub fn theme_index(&self) -> usize {
        self.shared.lock_state().theme_index
    }

    pub fn theme(&self) -> Result<ColorTheme, SessionError> {
        let index = self.theme_index();
        self.shared.palette.get(index).cloned()
    }

    pub fn remote_calls(&self) -> u64 {
        self.shared.lock_state().remote_calls
    }

    /// Changes the theme before a run starts.
    pub fn set_theme(&self, index: usize) -> Result<(), SessionError> {
        let theme = self.shared.palette.get(index)?.name.clone();
        let mut state = self.shared.lock_state();
        if !matches!(
            state.phase,
            ApplicationPhase::Initial | ApplicationPhase::ImageLoaded
        ) {
            return Err(SessionError::invalid_transition(state.phase, "change theme"));
        }
        state.theme_index = index;
        drop(state);
        self.shared
            .record_event("theme_changed", json!({ "index": index, "theme": theme }));
        Ok(())
    }

    /// `Initial -> ImageLoaded`; in `ImageLoaded` the image is replaced.
    pub fn load_image(&self, image: ReferenceImage) -> Result<(), SessionError> {
        let mut state = self.shared.lock_state();
        if !matches!(
            state.phase,
            ApplicationPhase::Initial | ApplicationPhase::ImageLoaded
        ) {
            return Err(SessionError::invalid_transition(
                state.phase,
                "load a reference image",
            ));
        }
        let payload = json!({
            "mime_type": image.mime_type(),
            "fingerprint": image.fingerprint(),
        });
        state.reference = Some(Arc::new(image));
        state.phase = ApplicationPhase::ImageLoaded;
        drop(state);
        self.shared.record_event("image_loaded", payload);
        Ok(())
    }

    /// `ImageLoaded -> RunningStage1` with one pending record per style.
    pub fn begin_previews(&self) -> Result<usize, SessionError> {
        let mut state = self.shared.lock_state();
        match state.phase {
            ApplicationPhase::ImageLoaded => {}
            ApplicationPhase::Initial => {
                return Err(SessionError::invalid_transition(
                    state.phase,
                    "start previews without a reference image",
                ))
            }
            phase => return Err(SessionError::invalid_transition(phase, "start previews")),
        }
        let ids = self.shared.catalogue.ids();
        state.records = RecordStore::from_ids(&ids);
        state.last_finished = None;
        let total = state.start_stage(Stage::Preview, ids);
        drop(state);
        self.record_stage_started(Stage::Preview, total);
        Ok(total)
    }

    /// `Reviewing -> RunningStage2` over the selected ids in catalogue order.
    pub fn begin_upgrades(&self) -> Result<usize, SessionError> {
        let mut state = self.shared.lock_state();
        if state.phase != ApplicationPhase::Reviewing {
            return Err(SessionError::invalid_transition(
                state.phase,
                "start upgrades",
            ));
        }
        let selected = state.records.selected_ids();
        if selected.is_empty() {
            return Err(SessionError::invalid_transition(
                state.phase,
                "start upgrades with an empty selection",
            ));
        }
        let total = state.start_stage(Stage::Upgrade, selected);
        drop(state);
        self.record_stage_started(Stage::Upgrade, total);
        Ok(total)
    }

    fn record_stage_started(&self, stage: Stage, total: usize) {
        self.shared.record_event(
            "stage_started",
            json!({
                "stage": stage.as_str(),
                "tier": stage.tier().as_str(),
                "total": total,
            }),
        );
    }

    /// Flips the upgrade intent of a completed record while reviewing.
    pub fn toggle_selected(&self, style_id: u32) -> Result<bool, SessionError> {
        self.update_selection(style_id, |current| !current)
    }

    pub fn set_selected(&self, style_id: u32, selected: bool) -> Result<bool, SessionError> {
        self.update_selection(style_id, |_| selected)
    }

    fn update_selection(
        &self,
        style_id: u32,
        next: impl FnOnce(bool) -> bool,
    ) -> Result<bool, SessionError> {
        let mut state = self.shared.lock_state();
        let phase = state.phase;
        if phase != ApplicationPhase::Reviewing {
            return Err(SessionError::invalid_transition(
                phase,
                format!("select style {style_id}"),
            ));
        }
        let selected = next(state.records.get(style_id)?.selected);
        state.records.set_selected(style_id, selected, phase)?;
        let count = state.records.selected_ids().len();
        drop(state);
        self.shared.record_event(
            "selection_changed",
            json!({ "style_id": style_id, "selected": selected, "selected_count": count }),
        );
        Ok(selected)
    }

    pub fn selected_ids(&self) -> Vec<u32> {
        self.shared.lock_state().records.selected_ids()
    }

    /// Runs the active queue to completion, one remote call at a time.
    ///
    /// Returns once the queue is exhausted (and the phase has advanced) or once
    /// the session has been reset or restarted from another handle.
    pub fn drain(&self) -> Result<DrainOutcome, SessionError> {
        let (stage, epoch) = {
            let mut state = self.shared.lock_state();
            let Some(stage) = state.phase.running_stage() else {
                return Err(SessionError::invalid_transition(state.phase, "drain a queue"));
            };
            if state.draining {
                return Err(SessionError::invalid_transition(
                    state.phase,
                    "drain while another drain is in flight",
                ));
            }
            state.draining = true;
            (stage, state.epoch)
        };
        let _guard = DrainGuard {
            shared: &self.shared,
        };

        let runner = SequentialJobRunner::new(&self.shared, stage, epoch);
        let mut processed = 0;
        loop {
            match runner.step() {
                StepOutcome::Advanced => processed += 1,
                StepOutcome::Exhausted => {
                    return Ok(DrainOutcome::Exhausted { stage, processed })
                }
                StepOutcome::Halted => {
                    self.shared.record_event(
                        "stage_halted",
                        json!({ "stage": stage.as_str(), "processed": processed }),
                    );
                    return Ok(DrainOutcome::Halted { stage, processed });
                }
            }
        }
    }

    pub fn run_previews(&self) -> Result<DrainOutcome, SessionError> {
        self.begin_previews()?;
        self.drain()
    }

    pub fn run_upgrades(&self) -> Result<DrainOutcome, SessionError> {
        self.begin_upgrades()?;
        self.drain()
    }

    /// Back to `Initial` from any phase, discarding image, records and queue.
    pub fn reset(&self) {
        let mut state = self.shared.lock_state();
        let previous = state.phase;
        state.phase = ApplicationPhase::Initial;
        state.reference = None;
        state.records.clear();
        state.queue = None;
        state.last_finished = None;
        state.epoch += 1;
        drop(state);
        self.shared
            .record_event("session_reset", json!({ "from_phase": previous.as_str() }));
    }

    pub fn progress(&self) -> Progress {
        let state = self.shared.lock_state();
        match (state.queue.as_ref(), state.last_finished) {
            (Some(active), _) => Progress {
                stage: Some(active.stage),
                processed: active.jobs.cursor(),
                total: active.jobs.len(),
                complete: false,
            },
            (None, Some((stage, total))) => Progress {
                stage: Some(stage),
                processed: total,
                total,
                complete: true,
            },
            (None, None) => Progress {
                stage: None,
                processed: 0,
                total: 0,
                complete: false,
            },
        }
    }

    pub fn record(&self, style_id: u32) -> Result<VariationRecord, SessionError> {
        self.shared.lock_state().records.get(style_id).cloned()
    }

    #[cfg(test)]
    pub(crate) fn shared(&self) -> &Shared {
        &self.shared
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.shared.lock_state();
        SessionSnapshot {
            phase: state.phase,
            theme_index: state.theme_index,
            records: state.records.snapshot(),
        }
    }

    /// Exports the current snapshot to `out_dir`.
    pub fn export(&self, out_dir: &Path) -> anyhow::Result<ExportReport> {
        let report = export_snapshot(
            &self.snapshot(),
            &self.shared.catalogue,
            &self.shared.palette,
            self.session_id(),
            out_dir,
        )?;
        self.shared.record_event(
            "export_written",
            json!({
                "dir": out_dir.display().to_string(),
                "files": report.files.len(),
                "warnings": report.manifest.warnings.len(),
            }),
        );
        Ok(report)
    }
}

struct DrainGuard<'a> {
    shared: &'a Shared,
}

impl Drop for DrainGuard<'_> {
    fn drop(&mut self) {
        self.shared.lock_state().draining = false;
    }
}
