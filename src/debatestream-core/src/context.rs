//! Instruction payloads for each turn.
//!
//! Everything here is a pure function of the motion, the transcript so far and
//! the acting speaker.

use crate::adapter::PromptMessage;
use crate::debate_format::Phase;
use crate::orchestrator::Motion;
use crate::participant::{Debater, Side};
use crate::transcript::{Transcript, TranscriptEntry};

/// Bounds applied while building a payload.
#[derive(Debug, Clone, Copy)]
pub struct ContextLimits {
    /// Most recent transcript entries included.
    pub max_history: usize,
    /// Word budget stated in the rules.
    pub max_words: usize,
}

/// Rhetorical instructions for a phase.
pub fn phase_directive(phase: Phase) -> &'static str {
    match phase {
        Phase::Opening => {
            "This is the OPENING STATEMENT. You must:
1. Define the key terms of the motion first and claim the definitions that favor your side
2. Put forward two or three core contentions and build a complete framework
3. Open with a striking example or figure to capture attention
4. Sound confident and commanding"
        }
        Phase::CrossExamQuestion => {
            "This is CROSS-EXAMINATION and you are asking. You must:
1. Begin with \"May I ask the opposition\" and pose a sharp, closed question
2. Aim at the weakest link in the opposition's chain of reasoning
3. Lay a trap: whichever way they answer, the answer should serve your side
4. Ask only one or two tightly linked questions and keep pressing"
        }
        Phase::CrossExamAnswer => {
            "This is CROSS-EXAMINATION and you are answering the question just put to you. You must:
1. Answer the question directly; evasion costs points with the judges
2. Then counter at once: \"But what I would rather the opposition notice is...\"
3. Turn their question into evidence for your own side
4. Stay calm and do not let them set the rhythm"
        }
        Phase::Summary => {
            "This is the CROSS-EXAMINATION SUMMARY. You must:
1. Sum up what your side won during cross-examination and name the key breakthroughs
2. Point out the logical gaps the opposition exposed or the questions they dodged
3. Turn the scattered exchanges into a systematic conclusion that reinforces your case
4. Speak steadily and persuasively, like a progress report to the judges"
        }
        Phase::Free => {
            "This is FREE DEBATE. You must:
1. Go straight at the previous opposing speaker and rebut point by point; none of their points may stand
2. After rebutting, pull the fight back onto your ground with a fresh line of attack
3. Build pressure: \"The opposition has still not answered our point that...\"
4. Keep it short, fast and aggressive; this is the climax of the debate
5. Echo your teammate's earlier points where it helps to show teamwork"
        }
        Phase::Closing => {
            "This is the CLOSING STATEMENT. You must:
1. Map the key battlegrounds of the debate and name what the opposition never answered
2. Restate your side's two or three strongest contentions
3. Rise to the level of values, from specific arguments to the deeper judgment at stake
4. End with force: one crisp sentence that closes the debate"
        }
        Phase::Judge => "You are judging the debate.",
    }
}

/// The closing instruction line of a turn's payload.
pub fn phase_instruction(phase: Phase) -> &'static str {
    match phase {
        Phase::Opening => "Deliver your opening statement.",
        Phase::CrossExamQuestion => "Question your opponent.",
        Phase::CrossExamAnswer => "Answer the question your opponent just asked.",
        Phase::Summary => "Summarize the cross-examination.",
        Phase::Free => "Make your free-debate speech.",
        Phase::Closing => "Deliver your closing statement.",
        Phase::Judge => "Deliver your verdict.",
    }
}

/// System framing for one debater in one phase.
pub fn system_prompt(motion: &Motion, debater: &Debater, phase: Phase, max_words: usize) -> String {
    let side = debater.side.display_name();
    let position = match debater.side {
        Side::Con => &motion.con_position,
        _ => &motion.pro_position,
    };

    format!(
        r#"You are "{name}", competing in a championship-level university debate. You are the {side} {role}.

MOTION: {topic}
YOUR POSITION ({side}): {position}
YOUR STYLE: {personality}

{directive}

DEBATE RULES:
- Keep every speech under {max_words} words
- Address the other side as "the opposition" and your teammate by their speaking position
- Respond to what the opposition has actually said; never talk past them
- Structure your argument: claim, then support (facts, data, theory), then conclusion
- Use rhetorical questions, analogies and reductio to strengthen your case
- Speak like a live debater on stage, not like an essay

IMPORTANT: Output only the words you say. No role labels, no stage directions, no prefixes, no markdown."#,
        name = debater.name,
        side = side,
        role = debater.role.display_name(),
        topic = motion.topic,
        position = position,
        personality = debater.personality,
        directive = phase_directive(phase),
        max_words = max_words,
    )
}

/// "[Name (Con First Speaker)]"
pub fn attribution(entry: &TranscriptEntry) -> String {
    format!(
        "[{} ({} {})]",
        entry.name,
        entry.side.display_name(),
        entry.role.display_name()
    )
}

/// Full payload for a debater's turn: system framing, recent history, instruction.
pub fn build_turn_messages(
    motion: &Motion,
    transcript: &Transcript,
    debater: &Debater,
    phase: Phase,
    limits: ContextLimits,
) -> Vec<PromptMessage> {
    let recent = transcript.recent(limits.max_history);
    let mut messages = Vec::with_capacity(recent.len() + 2);

    messages.push(PromptMessage::system(system_prompt(
        motion,
        debater,
        phase,
        limits.max_words,
    )));

    for entry in recent {
        if entry.speaker_id == debater.id {
            messages.push(PromptMessage::assistant(entry.text.clone()));
        } else {
            messages.push(PromptMessage::user(format!(
                "{} {}",
                attribution(entry),
                entry.text
            )));
        }
    }

    messages.push(PromptMessage::user(phase_instruction(phase)));
    messages
}

const JUDGE_SYSTEM_PROMPT: &str =
    "You are a fair and authoritative debate judge. Evaluate both sides objectively.";

/// Payload for the judge: the whole transcript plus the scoring rubric.
pub fn build_judge_messages(motion: &Motion, transcript: &Transcript) -> Vec<PromptMessage> {
    let mut record = String::new();
    for entry in transcript.entries() {
        record.push_str(&format!(
            "\n{} - {}\n{}\n",
            attribution(entry),
            entry.phase,
            entry.text
        ));
    }

    let prompt = format!(
        r#"You are a veteran debate judge. Judge the following debate from its record.

MOTION: {topic}
PRO POSITION: {pro}
CON POSITION: {con}

FULL DEBATE RECORD:
{record}

Format your judgment as follows:

## Remarks on each debater
(two or three sentences per debater)

## Scores (out of 100)

| Dimension | Pro | Con |
|------|------|------|
| Persuasiveness of arguments (25) | ? | ? |
| Logical rigor (25) | ? | ? |
| Effectiveness of rebuttal (25) | ? | ? |
| Delivery (25) | ? | ? |
| **Total** | **?** | **?** |

## Final verdict
(announce the winning side and why, in one or two sentences)"#,
        topic = motion.topic,
        pro = motion.pro_position,
        con = motion.con_position,
        record = record,
    );

    vec![
        PromptMessage::system(JUDGE_SYSTEM_PROMPT),
        PromptMessage::user(prompt),
    ]
}
