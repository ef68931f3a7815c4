//! Debate orchestration logic.
//!
//! Walks the format's running order slot by slot, announcing each stage and
//! handing every turn to the [`TurnExecutor`].

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::DebateSettings;
use crate::context::ContextLimits;
use crate::controller::RunSignals;
use crate::debate_format::{DebateFormat, Speaker, Stage};
use crate::error::DebateError;
use crate::events::{DebateEvent, EndReason, EventSink};
use crate::participant::Roster;
use crate::transcript::Transcript;
use crate::turn::{TurnExecutor, TurnOutcome};

/// What is being debated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Motion {
    pub topic: String,
    pub pro_position: String,
    pub con_position: String,
}

impl Motion {
    /// Trimmed motion; every field must be non-blank.
    pub fn new(
        topic: impl AsRef<str>,
        pro_position: impl AsRef<str>,
        con_position: impl AsRef<str>,
    ) -> Result<Self, DebateError> {
        let field = |value: &str, name: &'static str| {
            let value = value.trim();
            if value.is_empty() {
                Err(DebateError::InvalidMotion { field: name })
            } else {
                Ok(value.to_string())
            }
        };

        Ok(Self {
            topic: field(topic.as_ref(), "topic")?,
            pro_position: field(pro_position.as_ref(), "pro position")?,
            con_position: field(con_position.as_ref(), "con position")?,
        })
    }
}

/// Drives one debate from the first opening statement to `run_end`.
pub struct DebateOrchestrator {
    motion: Motion,
    roster: Arc<Roster>,
    format: Box<dyn DebateFormat>,
    settings: DebateSettings,
    signals: Arc<RunSignals>,
    events: EventSink,
}

impl DebateOrchestrator {
    pub fn new(
        motion: Motion,
        roster: Arc<Roster>,
        format: Box<dyn DebateFormat>,
        settings: DebateSettings,
        signals: Arc<RunSignals>,
        events: EventSink,
    ) -> Self {
        Self {
            motion,
            roster,
            format,
            settings,
            signals,
            events,
        }
    }

    /// Run the full debate and hand back its transcript.
    ///
    /// Emits `run_end` last unless an error is returned.
    pub async fn run(self) -> Result<Transcript, DebateError> {
        let slots = self.format.slots();
        info!(
            topic = %self.motion.topic,
            format = self.format.display_name(),
            slots = slots.len(),
            "debate started"
        );

        let executor = TurnExecutor {
            motion: &self.motion,
            signals: &self.signals,
            events: &self.events,
            limits: ContextLimits {
                max_history: self.settings.max_history,
                max_words: self.settings.max_words,
            },
            length_ceiling: self.settings.length_ceiling(),
            settle: self.settings.turn_settle(),
        };

        let mut transcript = Transcript::new();
        let mut announced: Option<Stage> = None;

        for slot in slots {
            if self.signals.is_stopped() {
                info!(turns = transcript.len(), "stop requested; ending debate");
                break;
            }

            // Announced by the turn itself, so a skipped slot opens no stage.
            let slot_stage = slot.phase.stage();
            let banner = (announced != Some(slot_stage)).then(|| self.banner(slot_stage));

            let outcome = match slot.speaker {
                Speaker::Debater { side, index } => {
                    let debater = self.roster.debater(side, index).ok_or_else(|| {
                        DebateError::InvalidLineup(format!(
                            "format '{}' names {} speaker #{} which the lineup lacks",
                            self.format.name(),
                            side.display_name(),
                            index + 1
                        ))
                    })?;
                    executor
                        .debater_turn(&mut transcript, debater, slot.phase, banner)
                        .await
                }
                Speaker::Judge => {
                    executor
                        .judge_turn(&mut transcript, self.roster.judge(), banner)
                        .await
                }
            };
            if outcome == TurnOutcome::Completed && announced != Some(slot_stage) {
                info!(stage = slot_stage.title(), "stage started");
                announced = Some(slot_stage);
            }
        }

        let reason = if self.signals.is_stopped() {
            EndReason::Stopped
        } else {
            EndReason::Completed
        };
        info!(
            turns = transcript.len(),
            ?reason,
            elapsed_secs = self.signals.elapsed().as_secs(),
            "debate ended"
        );
        self.events.emit(DebateEvent::RunEnd {
            total_turns: transcript.len(),
            reason,
        });

        Ok(transcript)
    }

    fn banner(&self, stage: Stage) -> DebateEvent {
        DebateEvent::PhaseChange {
            stage,
            title: stage.title().to_string(),
            description: self.format.stage_description(stage),
        }
    }
}
