//! The append-only record of a debate.

use serde::{Deserialize, Serialize};

use crate::debate_format::Phase;
use crate::participant::{Side, SpeakerRole};

/// One completed turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub speaker_id: String,
    pub name: String,
    pub side: Side,
    pub role: SpeakerRole,
    pub phase: Phase,
    pub text: String,
    pub voice: String,
}

/// Turns in speaking order. Entries can be appended but never edited or removed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    /// The last `n` entries, or all of them if there are fewer.
    pub fn recent(&self, n: usize) -> &[TranscriptEntry] {
        let start = self.entries.len().saturating_sub(n);
        &self.entries[start..]
    }

    pub fn last(&self) -> Option<&TranscriptEntry> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(n: usize) -> TranscriptEntry {
        TranscriptEntry {
            speaker_id: format!("s{n}"),
            name: format!("Speaker {n}"),
            side: Side::Pro,
            role: SpeakerRole::First,
            phase: Phase::Free,
            text: format!("turn {n}"),
            voice: String::new(),
        }
    }

    #[test]
    fn test_recent_is_bounded() {
        let mut transcript = Transcript::new();
        for n in 0..5 {
            transcript.append(entry(n));
        }

        let recent = transcript.recent(3);
        assert_eq!(recent.len(), 3);
        assert_eq!(recent[0].text, "turn 2");
        assert_eq!(recent[2].text, "turn 4");
        assert_eq!(transcript.recent(50).len(), 5);
        assert!(transcript.recent(0).is_empty());
    }

    #[test]
    fn test_serializes_as_plain_list() {
        let mut transcript = Transcript::new();
        transcript.append(entry(1));
        let json = serde_json::to_value(&transcript).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["phase"], "free");
        assert_eq!(json[0]["side"], "pro");
    }
}
