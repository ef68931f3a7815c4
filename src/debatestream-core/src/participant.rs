//! Debater and judge definitions.
//!
//! Represents the four debaters and the judge, each bound to a turn source.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::adapter::{OpenAiTurnSource, TurnSource};
use crate::config::Config;
use crate::error::DebateError;

/// Which side of the motion a speaker argues.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Arguing in favor of the motion.
    Pro,
    /// Arguing against the motion.
    Con,
    /// The judge.
    Neutral,
}

impl Side {
    pub fn display_name(&self) -> &str {
        match self {
            Side::Pro => "Pro",
            Side::Con => "Con",
            Side::Neutral => "Neutral",
        }
    }
}

/// Speaking position within a side.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SpeakerRole {
    First,
    Second,
    Judge,
}

impl SpeakerRole {
    pub fn display_name(&self) -> &str {
        match self {
            SpeakerRole::First => "First Speaker",
            SpeakerRole::Second => "Second Speaker",
            SpeakerRole::Judge => "Judge",
        }
    }
}

/// A debater, fixed for the lifetime of a run.
#[derive(Clone)]
pub struct Debater {
    pub id: String,
    pub name: String,
    pub side: Side,
    pub role: SpeakerRole,
    /// Style directive folded into every system prompt.
    pub personality: String,
    /// Voice identifier handed to the speech renderer downstream.
    pub voice: String,
    pub source: Arc<dyn TurnSource>,
}

impl Debater {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        side: Side,
        role: SpeakerRole,
        source: Arc<dyn TurnSource>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            side,
            role,
            personality: String::new(),
            voice: String::new(),
            source,
        }
    }

    pub fn with_personality(mut self, personality: impl Into<String>) -> Self {
        self.personality = personality.into();
        self
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }

    /// "Name (Pro First Speaker)".
    pub fn display_name_with_role(&self) -> String {
        format!(
            "{} ({} {})",
            self.name,
            self.side.display_name(),
            self.role.display_name()
        )
    }
}

impl fmt::Debug for Debater {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Debater")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("side", &self.side)
            .field("role", &self.role)
            .field("voice", &self.voice)
            .field("model", &self.source.model_name())
            .finish()
    }
}

/// The judge evaluating the finished debate.
#[derive(Clone)]
pub struct Judge {
    pub name: String,
    pub voice: String,
    pub source: Arc<dyn TurnSource>,
}

impl Judge {
    pub const ID: &'static str = "judge";

    pub fn new(name: impl Into<String>, source: Arc<dyn TurnSource>) -> Self {
        Self {
            name: name.into(),
            voice: String::new(),
            source,
        }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = voice.into();
        self
    }
}

impl fmt::Debug for Judge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Judge")
            .field("name", &self.name)
            .field("voice", &self.voice)
            .field("model", &self.source.model_name())
            .finish()
    }
}

/// Everyone who speaks in a run: two debaters per side plus the judge.
#[derive(Debug, Clone)]
pub struct Roster {
    pro: [Debater; 2],
    con: [Debater; 2],
    judge: Judge,
}

impl Roster {
    /// Split debaters by side, each side ordered first speaker then second.
    pub fn new(debaters: Vec<Debater>, judge: Judge) -> Result<Self, DebateError> {
        let mut ids: Vec<&str> = debaters.iter().map(|d| d.id.as_str()).collect();
        ids.sort_unstable();
        if ids.windows(2).any(|pair| pair[0] == pair[1]) {
            return Err(DebateError::InvalidLineup(
                "debater ids must be unique".to_string(),
            ));
        }
        if ids.contains(&Judge::ID) {
            return Err(DebateError::InvalidLineup(format!(
                "debater id '{}' is reserved for the judge",
                Judge::ID
            )));
        }

        let (mut pro, rest): (Vec<_>, Vec<_>) =
            debaters.into_iter().partition(|d| d.side == Side::Pro);
        let (mut con, neutral): (Vec<_>, Vec<_>) =
            rest.into_iter().partition(|d| d.side == Side::Con);

        if let Some(d) = neutral.first() {
            return Err(DebateError::InvalidLineup(format!(
                "debater '{}' must argue pro or con",
                d.id
            )));
        }

        pro.sort_by_key(|d| d.role);
        con.sort_by_key(|d| d.role);

        Ok(Self {
            pro: into_pair(pro, Side::Pro)?,
            con: into_pair(con, Side::Con)?,
            judge,
        })
    }

    /// Build the configured lineup with an OpenAI-compatible source per speaker.
    pub fn from_config(config: &Config) -> Result<Self, DebateError> {
        config.validate()?;

        let mut debaters = Vec::with_capacity(config.debaters.len());
        for d in &config.debaters {
            let provider = config.provider(&d.provider)?;
            let source = Arc::new(OpenAiTurnSource::from_provider(provider)?);
            debaters.push(
                Debater::new(d.id.clone(), d.name.clone(), d.side, d.role, source)
                    .with_personality(d.personality.clone())
                    .with_voice(d.voice.clone()),
            );
        }

        let judge_provider = config.provider(&config.judge.provider)?;
        let judge_source = OpenAiTurnSource::from_provider(judge_provider)?
            .with_temperature(config.judge.temperature);
        let judge = Judge::new(config.judge.name.clone(), Arc::new(judge_source))
            .with_voice(config.judge.voice.clone());

        Self::new(debaters, judge)
    }

    /// Pro debaters, first speaker then second.
    pub fn pro(&self) -> &[Debater; 2] {
        &self.pro
    }

    /// Con debaters, first speaker then second.
    pub fn con(&self) -> &[Debater; 2] {
        &self.con
    }

    pub fn judge(&self) -> &Judge {
        &self.judge
    }

    /// The debater at `index` on `side`, as named by a format slot.
    pub fn debater(&self, side: Side, index: usize) -> Option<&Debater> {
        match side {
            Side::Pro => self.pro.get(index),
            Side::Con => self.con.get(index),
            Side::Neutral => None,
        }
    }

    /// All four debaters: pro first, then con.
    pub fn debaters(&self) -> impl Iterator<Item = &Debater> {
        self.pro.iter().chain(self.con.iter())
    }
}

fn into_pair(debaters: Vec<Debater>, side: Side) -> Result<[Debater; 2], DebateError> {
    let roles: Vec<SpeakerRole> = debaters.iter().map(|d| d.role).collect();
    if roles != [SpeakerRole::First, SpeakerRole::Second] {
        return Err(DebateError::InvalidLineup(format!(
            "{} side needs exactly one first and one second speaker, got {:?}",
            side.display_name(),
            roles
        )));
    }
    debaters.try_into().map_err(|_: Vec<Debater>| {
        DebateError::InvalidLineup(format!("{} side needs two debaters", side.display_name()))
    })
}
