//! Debate format definitions and trait.
//!
//! A format turns the lineup into a fixed running order of slots. Each slot
//! names who speaks and in which phase; the scheduler walks the list without
//! branching on what was said.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::participant::Side;

/// What a speaker is asked to do in a turn.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Opening,
    CrossExamQuestion,
    CrossExamAnswer,
    Summary,
    Free,
    Closing,
    Judge,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Opening => "opening",
            Phase::CrossExamQuestion => "cross_exam_question",
            Phase::CrossExamAnswer => "cross_exam_answer",
            Phase::Summary => "summary",
            Phase::Free => "free",
            Phase::Closing => "closing",
            Phase::Judge => "judge",
        }
    }

    /// The segment of the debate this phase belongs to.
    pub fn stage(&self) -> Stage {
        match self {
            Phase::Opening => Stage::Opening,
            Phase::CrossExamQuestion | Phase::CrossExamAnswer => Stage::CrossExam,
            Phase::Summary => Stage::Summary,
            Phase::Free => Stage::Free,
            Phase::Closing => Stage::Closing,
            Phase::Judge => Stage::Judge,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named segment of the running order, announced with `phase_change`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Opening,
    CrossExam,
    Summary,
    Free,
    Closing,
    Judge,
}

impl Stage {
    pub fn title(&self) -> &'static str {
        match self {
            Stage::Opening => "Opening Statements",
            Stage::CrossExam => "Cross-Examination",
            Stage::Summary => "Cross-Examination Summary",
            Stage::Free => "Free Debate",
            Stage::Closing => "Closing Statements",
            Stage::Judge => "Judge's Verdict",
        }
    }
}

/// Who holds the floor in a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    /// Index into that side's lineup (0 = first speaker).
    Debater { side: Side, index: usize },
    Judge,
}

impl Speaker {
    pub fn pro(index: usize) -> Self {
        Speaker::Debater {
            side: Side::Pro,
            index,
        }
    }

    pub fn con(index: usize) -> Self {
        Speaker::Debater {
            side: Side::Con,
            index,
        }
    }
}

/// One precomputed (speaker, phase) position in the running order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub speaker: Speaker,
    pub phase: Phase,
}

impl Slot {
    pub fn new(speaker: Speaker, phase: Phase) -> Self {
        Self { speaker, phase }
    }
}

/// Number of debaters on each side.
pub const DEBATERS_PER_SIDE: usize = 2;

/// Trait for defining debate formats.
pub trait DebateFormat: Send + Sync {
    /// Returns the name of this debate format.
    fn name(&self) -> &str;

    /// Returns the display name for the format.
    fn display_name(&self) -> &str;

    /// The complete running order, ending with the judge.
    fn slots(&self) -> Vec<Slot>;

    /// One line describing a stage, shown with its announcement.
    fn stage_description(&self, stage: Stage) -> String;
}

/// Collegiate team format: two speakers per side.
///
/// - Opening: both first speakers
/// - Cross-examination: four crossed question/answer pairs
/// - Cross-examination summary: both first speakers
/// - Free debate: sides alternate for the configured number of rounds
/// - Closing: second speakers, con before pro
/// - Judge evaluation
#[derive(Debug, Clone)]
pub struct CollegiateDebateFormat {
    free_rounds: u32,
}

impl CollegiateDebateFormat {
    pub fn new(free_rounds: u32) -> Self {
        Self { free_rounds }
    }
}

impl Default for CollegiateDebateFormat {
    fn default() -> Self {
        Self::new(6)
    }
}

impl DebateFormat for CollegiateDebateFormat {
    fn name(&self) -> &str {
        "collegiate"
    }

    fn display_name(&self) -> &str {
        "Collegiate Team Debate (2 vs 2)"
    }

    fn slots(&self) -> Vec<Slot> {
        let mut slots = Vec::new();
        let last = DEBATERS_PER_SIDE - 1;

        slots.push(Slot::new(Speaker::pro(0), Phase::Opening));
        slots.push(Slot::new(Speaker::con(0), Phase::Opening));

        // (asker, responder)
        let cross_exam = [
            (Speaker::pro(1), Speaker::con(0)),
            (Speaker::con(1), Speaker::pro(0)),
            (Speaker::pro(0), Speaker::con(1)),
            (Speaker::con(0), Speaker::pro(1)),
        ];
        for (asker, responder) in cross_exam {
            slots.push(Slot::new(asker, Phase::CrossExamQuestion));
            slots.push(Slot::new(responder, Phase::CrossExamAnswer));
        }

        slots.push(Slot::new(Speaker::pro(0), Phase::Summary));
        slots.push(Slot::new(Speaker::con(0), Phase::Summary));

        for round in 0..self.free_rounds as usize {
            let index = round % DEBATERS_PER_SIDE;
            slots.push(Slot::new(Speaker::pro(index), Phase::Free));
            slots.push(Slot::new(Speaker::con(index), Phase::Free));
        }

        // Con closes first.
        slots.push(Slot::new(Speaker::con(last), Phase::Closing));
        slots.push(Slot::new(Speaker::pro(last), Phase::Closing));

        slots.push(Slot::new(Speaker::Judge, Phase::Judge));

        slots
    }

    fn stage_description(&self, stage: Stage) -> String {
        match stage {
            Stage::Opening => {
                "Both first speakers state their side's case and build its framework.".to_string()
            }
            Stage::CrossExam => "The sides cross-examine each other in crossed pairs.".to_string(),
            Stage::Summary => {
                "Both first speakers sum up what the cross-examination established.".to_string()
            }
            Stage::Free => format!(
                "The sides speak in alternation for {} rounds.",
                self.free_rounds
            ),
            Stage::Closing => "The second speakers close for their sides.".to_string(),
            Stage::Judge => "The judge evaluates the debate and announces a winner.".to_string(),
        }
    }
}

/// Get a debate format by name with the given number of free-debate rounds.
pub fn get_format(name: &str, free_rounds: u32) -> Option<Box<dyn DebateFormat>> {
    match name.to_lowercase().as_str() {
        "collegiate" => Some(Box::new(CollegiateDebateFormat::new(free_rounds))),
        _ => None,
    }
}

/// List all available debate format names.
pub fn available_formats() -> Vec<&'static str> {
    vec!["collegiate"]
}
