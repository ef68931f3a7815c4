//! Running a single turn end to end.

use std::time::Duration;

use futures_util::StreamExt;
use tracing::{debug, info, warn};

use crate::adapter::PromptMessage;
use crate::context::{self, ContextLimits};
use crate::controller::RunSignals;
use crate::debate_format::Phase;
use crate::error::AdapterError;
use crate::events::{DebateEvent, EventSink};
use crate::orchestrator::Motion;
use crate::participant::{Debater, Judge, Side, SpeakerRole};
use crate::transcript::{Transcript, TranscriptEntry};

/// Longest slice of an error message quoted in a fallback notice.
const FALLBACK_DETAIL_CHARS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnOutcome {
    Completed,
    /// The run was stopped or out of time when the gate opened.
    Skipped,
}

/// Runs turns for one debate. Borrowed by the scheduler for the run's lifetime.
pub struct TurnExecutor<'a> {
    pub motion: &'a Motion,
    pub signals: &'a RunSignals,
    pub events: &'a EventSink,
    pub limits: ContextLimits,
    /// Characters after which a stream stops being consumed.
    pub length_ceiling: usize,
    pub settle: Duration,
}

impl TurnExecutor<'_> {
    /// One debater's turn: gate, announce, stream, record.
    ///
    /// `banner` is a pending stage announcement, emitted only if the turn runs.
    pub async fn debater_turn(
        &self,
        transcript: &mut Transcript,
        debater: &Debater,
        phase: Phase,
        banner: Option<DebateEvent>,
    ) -> TurnOutcome {
        self.signals.gate().wait_and_close().await;

        if self.signals.is_stopped() || self.signals.budget_exceeded() {
            self.skip(&debater.id, phase);
            return TurnOutcome::Skipped;
        }
        self.events.emit_opt(banner);

        info!(speaker = %debater.id, %phase, "turn started");
        self.events.emit(DebateEvent::SpeakerAnnounce {
            speaker_id: debater.id.clone(),
            name: debater.name.clone(),
            side: debater.side,
            role: debater.role,
            phase,
        });

        let messages =
            context::build_turn_messages(self.motion, transcript, debater, phase, self.limits);

        let mut text = String::new();
        if let Err(e) = self.consume_stream(debater, &messages, &mut text).await {
            if text.is_empty() {
                warn!(speaker = %debater.id, error = %e, "turn source failed; using fallback");
                text = fallback_notice(&debater.name, &e);
                self.events.emit(DebateEvent::TokenFragment {
                    speaker_id: debater.id.clone(),
                    fragment: text.clone(),
                });
            } else {
                warn!(
                    speaker = %debater.id,
                    error = %e,
                    chars = text.chars().count(),
                    "turn source failed mid-stream; keeping partial text"
                );
            }
        }

        self.finish(
            transcript,
            TranscriptEntry {
                speaker_id: debater.id.clone(),
                name: debater.name.clone(),
                side: debater.side,
                role: debater.role,
                phase,
                text,
                voice: debater.voice.clone(),
            },
        )
        .await;

        TurnOutcome::Completed
    }

    /// The judge's evaluation of the whole transcript. Runs through the same gate.
    ///
    /// Only a stop request skips it; an exhausted time budget still gets a verdict.
    /// The verdict goes out as `judge_result` ahead of the judge's `turn_complete`.
    pub async fn judge_turn(
        &self,
        transcript: &mut Transcript,
        judge: &Judge,
        banner: Option<DebateEvent>,
    ) -> TurnOutcome {
        self.signals.gate().wait_and_close().await;

        if self.signals.is_stopped() {
            self.skip(Judge::ID, Phase::Judge);
            return TurnOutcome::Skipped;
        }
        self.events.emit_opt(banner);

        info!(turns = transcript.len(), "judge evaluation started");
        self.events.emit(DebateEvent::SpeakerAnnounce {
            speaker_id: Judge::ID.to_string(),
            name: judge.name.clone(),
            side: Side::Neutral,
            role: SpeakerRole::Judge,
            phase: Phase::Judge,
        });

        let messages = context::build_judge_messages(self.motion, transcript);
        let content = match judge.source.complete(&messages).await {
            Ok(content) => content,
            Err(e) => {
                warn!(error = %e, "judge evaluation failed; using fallback");
                fallback_notice(&judge.name, &e)
            }
        };

        let voice = judge.voice.clone();
        self.events.emit(DebateEvent::JudgeResult {
            content: content.clone(),
            voice: voice.clone(),
        });
        self.finish(
            transcript,
            TranscriptEntry {
                speaker_id: Judge::ID.to_string(),
                name: judge.name.clone(),
                side: Side::Neutral,
                role: SpeakerRole::Judge,
                phase: Phase::Judge,
                text: content,
                voice,
            },
        )
        .await;

        TurnOutcome::Completed
    }

    /// Pull fragments into `text` until the stream ends or the ceiling is passed.
    async fn consume_stream(
        &self,
        debater: &Debater,
        messages: &[PromptMessage],
        text: &mut String,
    ) -> Result<(), AdapterError> {
        let mut stream = debater.source.stream(messages).await?;
        let mut chars = 0usize;

        while let Some(fragment) = stream.next().await {
            let fragment = fragment?;
            if fragment.is_empty() {
                continue;
            }

            chars += fragment.chars().count();
            text.push_str(&fragment);
            self.events.emit(DebateEvent::TokenFragment {
                speaker_id: debater.id.clone(),
                fragment,
            });

            if chars > self.length_ceiling {
                debug!(speaker = %debater.id, chars, ceiling = self.length_ceiling, "length ceiling reached");
                break;
            }
        }

        Ok(())
    }

    async fn finish(&self, transcript: &mut Transcript, entry: TranscriptEntry) {
        info!(
            speaker = %entry.speaker_id,
            phase = %entry.phase,
            chars = entry.text.chars().count(),
            "turn complete"
        );
        let event = DebateEvent::TurnComplete {
            speaker_id: entry.speaker_id.clone(),
            name: entry.name.clone(),
            phase: entry.phase,
            text: entry.text.clone(),
            voice: entry.voice.clone(),
        };
        transcript.append(entry);
        self.events.emit(event);

        if !self.settle.is_zero() {
            tokio::time::sleep(self.settle).await;
        }
    }

    fn skip(&self, speaker_id: &str, phase: Phase) {
        info!(
            speaker = %speaker_id,
            %phase,
            stopped = self.signals.is_stopped(),
            "slot skipped"
        );
        // Nothing was emitted, so nobody will reopen the gate for this slot.
        self.signals.gate().open();
    }
}

fn fallback_notice(name: &str, error: &AdapterError) -> String {
    let detail: String = error.to_string().chars().take(FALLBACK_DETAIL_CHARS).collect();
    format!("({} ran into a technical problem: {})", name, detail)
}
