use serde_json::json;
use stylematrix_contracts::errors::GenerationFailed;
use stylematrix_contracts::phase::Stage;
use stylematrix_contracts::records::{GenerationStatus, ImageHandle, RecordStore};

use crate::client::RenderRequest;
use crate::session::{ProgressUpdate, Shared};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StepOutcome {
    /// One job ran (or was skipped) and the cursor moved forward.
    Advanced,
    /// The queue was already empty; the phase has moved to the stage's end.
    Exhausted,
    /// The session moved on (reset or a new stage); nothing was written.
    Halted,
}

struct ClaimedJob {
    style_id: u32,
    style_name: String,
    index: usize,
    total: usize,
    request: RenderRequest,
}

enum Claim {
    Job(ClaimedJob),
    Skipped,
    Exhausted,
    Halted,
}

/// Drains the active queue one job at a time.
///
/// The session lock is held while claiming a job and while applying its
/// result, never across the remote call. Both sides check that the phase and
/// epoch the runner was started for are still current.
pub(crate) struct SequentialJobRunner<'a> {
    shared: &'a Shared,
    stage: Stage,
    epoch: u64,
}

impl<'a> SequentialJobRunner<'a> {
    pub(crate) fn new(shared: &'a Shared, stage: Stage, epoch: u64) -> Self {
        Self {
            shared,
            stage,
            epoch,
        }
    }

    pub(crate) fn step(&self) -> StepOutcome {
        let job = match self.claim_next() {
            Claim::Job(job) => job,
            Claim::Skipped => return StepOutcome::Advanced,
            Claim::Exhausted => return StepOutcome::Exhausted,
            Claim::Halted => return StepOutcome::Halted,
        };

        self.shared.record_event(
            "job_started",
            json!({
                "stage": self.stage.as_str(),
                "style_id": job.style_id,
                "index": job.index,
                "total": job.total,
                "tier": job.request.tier.as_str(),
            }),
        );
        self.shared.notify(&ProgressUpdate {
            stage: self.stage,
            style_id: job.style_id,
            style_name: job.style_name.clone(),
            index: job.index,
            total: job.total,
            status: self.stage.in_flight_status(),
            error: None,
        });

        let result = self.shared.client.render(&job.request);
        self.apply(job, result)
    }

    fn claim_next(&self) -> Claim {
        let mut state = self.shared.lock_state();
        if !state.is_current(self.stage, self.epoch) {
            return Claim::Halted;
        }
        let (current, index, total) = match state.queue.as_ref() {
            Some(active) => (active.jobs.current(), active.jobs.cursor(), active.jobs.len()),
            None => return Claim::Halted,
        };
        let Some(style_id) = current else {
            state.finish_stage(self.stage);
            drop(state);
            self.shared.record_event(
                "stage_finished",
                json!({
                    "stage": self.stage.as_str(),
                    "phase": self.stage.finished_phase().as_str(),
                    "total": total,
                }),
            );
            return Claim::Exhausted;
        };

        let style = match self.shared.catalogue.get(style_id) {
            Ok(style) => style,
            Err(err) => {
                let message =
                    fail_record(&mut state.records, style_id, self.stage, err.to_string());
                state.advance_queue();
                drop(state);
                let label = format!("style {style_id}");
                self.report_failure(style_id, label, index, total, message);
                return Claim::Skipped;
            }
        };
        let Some(reference) = state.reference.clone() else {
            return Claim::Halted;
        };
        if let Err(err) = state.records.mark_in_flight(style_id, self.stage) {
            let message = err.to_string();
            state.advance_queue();
            drop(state);
            self.report_failure(style_id, style.name.clone(), index, total, message);
            return Claim::Skipped;
        }
        state.remote_calls += 1;

        Claim::Job(ClaimedJob {
            style_id,
            style_name: style.name.clone(),
            index,
            total,
            request: RenderRequest {
                reference,
                style_prompt: style.prompt.clone(),
                theme_index: state.theme_index,
                tier: self.stage.tier(),
            },
        })
    }

    fn apply(&self, job: ClaimedJob, result: Result<ImageHandle, GenerationFailed>) -> StepOutcome {
        let mut state = self.shared.lock_state();
        if !state.is_current(self.stage, self.epoch) {
            drop(state);
            self.shared.record_event(
                "job_discarded",
                json!({
                    "stage": self.stage.as_str(),
                    "style_id": job.style_id,
                    "succeeded": result.is_ok(),
                }),
            );
            return StepOutcome::Halted;
        }

        let outcome = match result {
            Ok(image) => state
                .records
                .complete(job.style_id, self.stage, image)
                .map_err(|err| err.to_string()),
            Err(failed) => Err(fail_record(
                &mut state.records,
                job.style_id,
                self.stage,
                failed.message,
            )),
        };
        state.advance_queue();
        drop(state);

        match outcome {
            Ok(()) => {
                self.shared.record_event(
                    "job_completed",
                    json!({
                        "stage": self.stage.as_str(),
                        "style_id": job.style_id,
                        "index": job.index,
                        "total": job.total,
                    }),
                );
                self.shared.notify(&ProgressUpdate {
                    stage: self.stage,
                    style_id: job.style_id,
                    style_name: job.style_name,
                    index: job.index,
                    total: job.total,
                    status: GenerationStatus::Completed,
                    error: None,
                });
            }
            Err(message) => {
                self.report_failure(job.style_id, job.style_name, job.index, job.total, message)
            }
        }
        StepOutcome::Advanced
    }

    fn report_failure(
        &self,
        style_id: u32,
        style_name: String,
        index: usize,
        total: usize,
        message: String,
    ) {
        self.shared.record_event(
            "job_failed",
            json!({
                "stage": self.stage.as_str(),
                "style_id": style_id,
                "index": index,
                "total": total,
                "error": message,
            }),
        );
        self.shared.notify(&ProgressUpdate {
            stage: self.stage,
            style_id,
            style_name,
            index,
            total,
            status: GenerationStatus::Error,
            error: Some(message),
        });
    }
}

/// Marks the record failed; a missing record is appended to the message.
fn fail_record(records: &mut RecordStore, style_id: u32, stage: Stage, message: String) -> String {
    match records.fail(style_id, stage, message.clone()) {
        Ok(()) => message,
        Err(missing) => {
            let missing = missing.to_string();
            if missing == message {
                message
            } else {
                format!("{message} ({missing})")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use stylematrix_contracts::events::EventWriter;
    use stylematrix_contracts::phase::{ApplicationPhase, RenderTier, Stage};
    use stylematrix_contracts::queue::JobQueue;
    use stylematrix_contracts::records::{GenerationStatus, RecordStore};

    use crate::session::{ActiveQueue, DrainOutcome, ProgressUpdate};
    use crate::testing::{controller_with, reference_image, ScriptedClient};

    #[test]
    fn unknown_ids_in_the_queue_fail_and_are_skipped() -> anyhow::Result<()> {
        let client = ScriptedClient::new();
        let session = controller_with(client.clone(), EventWriter::disabled("s1"))?;
        let updates: Arc<Mutex<Vec<ProgressUpdate>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&updates);
        session.set_progress_observer(Arc::new(move |update| {
            if let Ok(mut sink) = sink.lock() {
                sink.push(update.clone());
            }
        }));
        session.load_image(reference_image()?)?;
        session.begin_previews()?;
        {
            let mut state = session.shared().lock_state();
            state.records = RecordStore::from_ids(&[1, 99, 2]);
            state.queue = Some(ActiveQueue {
                stage: Stage::Preview,
                jobs: JobQueue::new(vec![1, 99, 3]),
            });
        }

        let outcome = session.drain()?;
        assert_eq!(
            outcome,
            DrainOutcome::Exhausted {
                stage: Stage::Preview,
                processed: 3
            }
        );
        assert_eq!(session.phase(), ApplicationPhase::Reviewing);
        assert_eq!(
            client.calls(),
            vec![("a".to_string(), RenderTier::OneK)]
        );

        let unknown = session.record(99)?;
        assert_eq!(unknown.status, GenerationStatus::Error);
        assert_eq!(
            unknown.error.as_deref(),
            Some("style 99 is not in the catalogue")
        );
        assert_eq!(session.record(2)?.status, GenerationStatus::Pending);

        let updates = updates.lock().map(|seen| seen.clone()).unwrap_or_default();
        let skipped: Vec<(u32, &str, Option<&str>)> = updates
            .iter()
            .filter(|update| update.status == GenerationStatus::Error)
            .map(|update| {
                (
                    update.style_id,
                    update.style_name.as_str(),
                    update.error.as_deref(),
                )
            })
            .collect();
        assert_eq!(
            skipped,
            vec![
                (99, "style 99", Some("style 99 is not in the catalogue")),
                (3, "C", Some("style 3 is not in the catalogue")),
            ]
        );
        Ok(())
    }

    #[test]
    fn failure_on_a_missing_record_keeps_both_messages() -> anyhow::Result<()> {
        let client = ScriptedClient::failing(&["b"]);
        let session = controller_with(client.clone(), EventWriter::disabled("s1"))?;
        let errors: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        session.set_progress_observer(Arc::new(move |update| {
            if let (Some(error), Ok(mut sink)) = (update.error.as_ref(), sink.lock()) {
                sink.push(error.clone());
            }
        }));
        let handle = session.clone();
        client.set_hook(Box::new(move |request| {
            if request.style_prompt == "b" {
                handle.shared().lock_state().records = RecordStore::from_ids(&[1, 3]);
            }
        }));
        session.load_image(reference_image()?)?;

        session.run_previews()?;
        let errors = errors.lock().map(|seen| seen.clone()).unwrap_or_default();
        assert_eq!(
            errors,
            vec!["scripted failure for b (style 2 is not in the catalogue)".to_string()]
        );
        assert_eq!(session.phase(), ApplicationPhase::Reviewing);
        Ok(())
    }
}
