//! DebateStream Core Library
//!
//! Schedules a four-debater team debate and a judge's verdict, and streams
//! every token to live subscribers at a pace set from outside.

pub mod adapter;
pub mod broadcast;
pub mod config;
pub mod context;
pub mod controller;
pub mod debate_format;
pub mod error;
pub mod events;
pub mod gate;
pub mod orchestrator;
pub mod participant;
pub mod transcript;
pub mod turn;

pub use adapter::{FragmentStream, OpenAiTurnSource, PromptMessage, PromptRole, TurnSource};
pub use broadcast::{EventBroadcaster, StreamItem, Subscription};
pub use config::{Config, DebateSettings, StreamSettings, default_config};
pub use controller::{RunController, RunStatus, StatusReport};
pub use debate_format::{CollegiateDebateFormat, DebateFormat, Phase, Slot, Speaker, Stage};
pub use error::{AdapterError, DebateError};
pub use events::{DebateEvent, EndReason};
pub use gate::PacingGate;
pub use orchestrator::{DebateOrchestrator, Motion};
pub use participant::{Debater, Judge, Roster, Side, SpeakerRole};
pub use transcript::{Transcript, TranscriptEntry};
