//! Events emitted while a debate runs.
//!
//! Events are immutable values and the unit of broadcast. Each one renders as a
//! server-sent-events frame so any transport can forward it unchanged.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::debate_format::{Phase, Stage};
use crate::participant::{Side, SpeakerRole};

/// Why a run ended without error.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    Completed,
    Stopped,
}

/// Events emitted during a debate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum DebateEvent {
    /// A new stage is starting.
    PhaseChange {
        stage: Stage,
        title: String,
        description: String,
    },
    /// A speaker is about to speak.
    SpeakerAnnounce {
        speaker_id: String,
        name: String,
        side: Side,
        role: SpeakerRole,
        phase: Phase,
    },
    /// A piece of the current turn's text.
    TokenFragment { speaker_id: String, fragment: String },
    /// A speaker has finished; `text` is exactly what was recorded in the transcript.
    TurnComplete {
        speaker_id: String,
        name: String,
        phase: Phase,
        text: String,
        voice: String,
    },
    /// The judge's evaluation.
    JudgeResult { content: String, voice: String },
    /// The debate has concluded.
    RunEnd {
        total_turns: usize,
        reason: EndReason,
    },
    /// The run failed.
    Error { message: String },
}

impl DebateEvent {
    /// Wire name, used as the SSE `event:` field.
    pub fn name(&self) -> &'static str {
        match self {
            DebateEvent::PhaseChange { .. } => "phase_change",
            DebateEvent::SpeakerAnnounce { .. } => "speaker_announce",
            DebateEvent::TokenFragment { .. } => "token_fragment",
            DebateEvent::TurnComplete { .. } => "turn_complete",
            DebateEvent::JudgeResult { .. } => "judge_result",
            DebateEvent::RunEnd { .. } => "run_end",
            DebateEvent::Error { .. } => "error",
        }
    }

    /// Nothing follows a terminal event.
    pub fn is_terminal(&self) -> bool {
        matches!(self, DebateEvent::RunEnd { .. } | DebateEvent::Error { .. })
    }

    /// The event payload as JSON, without the tag.
    pub fn data(&self) -> serde_json::Value {
        serde_json::to_value(self)
            .ok()
            .and_then(|mut value| value.get_mut("data").map(serde_json::Value::take))
            .unwrap_or(serde_json::Value::Null)
    }

    pub fn to_sse_frame(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.name(), self.data())
    }
}

/// Frame sent to an idle subscriber so the connection does not look dead.
pub const HEARTBEAT_FRAME: &str = "event: ping\ndata: {}\n\n";

/// Where the scheduler writes its events, in order.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: mpsc::UnboundedSender<DebateEvent>,
}

impl EventSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<DebateEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Emit an event. Dropped silently once nobody is reading.
    pub fn emit(&self, event: DebateEvent) {
        let _ = self.tx.send(event);
    }

    pub fn emit_opt(&self, event: Option<DebateEvent>) {
        if let Some(event) = event {
            self.emit(event);
        }
    }
}
