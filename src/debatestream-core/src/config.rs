//! Configuration module for loading TOML config files.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::DebateError;
use crate::participant::{Side, SpeakerRole};

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub debate: DebateSettings,
    #[serde(default)]
    pub stream: StreamSettings,
    /// OpenAI-compatible endpoints, referenced by name from debaters and the judge.
    pub providers: BTreeMap<String, ProviderConfig>,
    pub debaters: Vec<DebaterConfig>,
    pub judge: JudgeConfig,
}

/// Limits and pacing of a single run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DebateSettings {
    pub format: String,
    /// Most recent transcript entries shown to a debater.
    pub max_history: usize,
    /// Word budget per turn; the hard ceiling is twice this, in characters.
    pub max_words: usize,
    pub free_rounds: u32,
    /// Wall-clock budget for the debate; 0 disables it.
    pub time_limit_secs: u64,
    /// Pause after each turn so subscribers can drain.
    pub turn_settle_ms: u64,
}

impl Default for DebateSettings {
    fn default() -> Self {
        Self {
            format: "collegiate".to_string(),
            max_history: 20,
            max_words: 200,
            free_rounds: 6,
            time_limit_secs: 5 * 60,
            turn_settle_ms: 300,
        }
    }
}

impl DebateSettings {
    pub fn time_limit(&self) -> Option<Duration> {
        (self.time_limit_secs > 0).then(|| Duration::from_secs(self.time_limit_secs))
    }

    pub fn turn_settle(&self) -> Duration {
        Duration::from_millis(self.turn_settle_ms)
    }

    /// Character count after which a streamed turn stops being consumed.
    pub fn length_ceiling(&self) -> usize {
        self.max_words * 2
    }
}

/// Subscriber queue sizing and idle heartbeats.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSettings {
    pub heartbeat_secs: u64,
    pub subscriber_capacity: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            heartbeat_secs: 300,
            subscriber_capacity: 1024,
        }
    }
}

impl StreamSettings {
    pub fn heartbeat(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs)
    }
}

/// One OpenAI-compatible endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub base_url: String,
    /// Name of the environment variable holding the API key.
    pub api_key_env: String,
    pub model: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub retries: u32,
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_temperature() -> f32 {
    0.7
}

fn default_judge_temperature() -> f32 {
    0.3
}

/// A debater entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DebaterConfig {
    pub id: String,
    pub name: String,
    pub side: Side,
    pub role: SpeakerRole,
    pub provider: String,
    #[serde(default)]
    pub personality: String,
    #[serde(default)]
    pub voice: String,
}

/// The judge entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JudgeConfig {
    #[serde(default = "default_judge_name")]
    pub name: String,
    pub provider: String,
    #[serde(default)]
    pub voice: String,
    #[serde(default = "default_judge_temperature")]
    pub temperature: f32,
}

fn default_judge_name() -> String {
    "AI Judge".to_string()
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, DebateError> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| DebateError::ConfigError(format!("Failed to read config: {}", e)))?;

        Self::from_str(&content)
    }

    /// Load configuration from string content.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(content: &str) -> Result<Self, DebateError> {
        toml::from_str(content)
            .map_err(|e| DebateError::ConfigError(format!("Failed to parse config: {}", e)))
    }

    /// Look up a provider by name.
    pub fn provider(&self, name: &str) -> Result<&ProviderConfig, DebateError> {
        self.providers
            .get(name)
            .ok_or_else(|| DebateError::ConfigError(format!("Unknown provider '{}'", name)))
    }

    /// Check the lineup and limits before anything is built from them.
    pub fn validate(&self) -> Result<(), DebateError> {
        if self.debate.max_words == 0 {
            return Err(DebateError::ConfigError("max_words must be positive".to_string()));
        }
        if self.debate.max_history == 0 {
            return Err(DebateError::ConfigError("max_history must be positive".to_string()));
        }
        if self.stream.subscriber_capacity == 0 {
            return Err(DebateError::ConfigError(
                "subscriber_capacity must be positive".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for d in &self.debaters {
            if !seen.insert(d.id.as_str()) {
                return Err(DebateError::InvalidLineup(format!(
                    "duplicate debater id '{}'",
                    d.id
                )));
            }
            self.provider(&d.provider)?;
        }
        self.provider(&self.judge.provider)?;

        for side in [Side::Pro, Side::Con] {
            let mut roles: Vec<SpeakerRole> = self
                .debaters
                .iter()
                .filter(|d| d.side == side)
                .map(|d| d.role)
                .collect();
            roles.sort();
            if roles != [SpeakerRole::First, SpeakerRole::Second] {
                return Err(DebateError::InvalidLineup(format!(
                    "{} side needs exactly one first and one second speaker",
                    side.display_name()
                )));
            }
        }

        if self.debaters.len() != 4 {
            return Err(DebateError::InvalidLineup(format!(
                "expected 4 debaters, got {}",
                self.debaters.len()
            )));
        }

        Ok(())
    }
}

/// Default configuration embedded in the binary.
pub fn default_config() -> Config {
    let mut providers = BTreeMap::new();
    providers.insert(
        "qwen".to_string(),
        provider(
            "https://dashscope.aliyuncs.com/compatible-mode/v1",
            "QWEN_API_KEY",
            "qwen-plus",
        ),
    );
    providers.insert(
        "qwen_max".to_string(),
        provider(
            "https://dashscope.aliyuncs.com/compatible-mode/v1",
            "QWEN_API_KEY",
            "qwen-max",
        ),
    );
    providers.insert(
        "doubao".to_string(),
        provider(
            "https://ark.cn-beijing.volces.com/api/v3",
            "DOUBAO_API_KEY",
            "doubao-1.5-pro-32k-250115",
        ),
    );
    providers.insert(
        "kimi".to_string(),
        provider(
            "https://api.moonshot.cn/v1",
            "KIMI_API_KEY",
            "kimi-k2-turbo-preview",
        ),
    );
    providers.insert(
        "deepseek".to_string(),
        provider("https://api.deepseek.com", "DEEPSEEK_API_KEY", "deepseek-chat"),
    );

    Config {
        debate: DebateSettings::default(),
        stream: StreamSettings::default(),
        providers,
        debaters: vec![
            DebaterConfig {
                id: "pro_1".to_string(),
                name: "Qwen the Architect".to_string(),
                side: Side::Pro,
                role: SpeakerRole::First,
                provider: "qwen".to_string(),
                personality: PRO_FIRST_PERSONALITY.to_string(),
                voice: "zh-CN-YunxiNeural".to_string(),
            },
            DebaterConfig {
                id: "pro_2".to_string(),
                name: "Doubao the Storyteller".to_string(),
                side: Side::Pro,
                role: SpeakerRole::Second,
                provider: "doubao".to_string(),
                personality: PRO_SECOND_PERSONALITY.to_string(),
                voice: "zh-CN-XiaoyiNeural".to_string(),
            },
            DebaterConfig {
                id: "con_1".to_string(),
                name: "Kimi the Blade".to_string(),
                side: Side::Con,
                role: SpeakerRole::First,
                provider: "kimi".to_string(),
                personality: CON_FIRST_PERSONALITY.to_string(),
                voice: "zh-CN-YunjianNeural".to_string(),
            },
            DebaterConfig {
                id: "con_2".to_string(),
                name: "DeepSeek the Philosopher".to_string(),
                side: Side::Con,
                role: SpeakerRole::Second,
                provider: "deepseek".to_string(),
                personality: CON_SECOND_PERSONALITY.to_string(),
                voice: "zh-CN-XiaoxiaoNeural".to_string(),
            },
        ],
        judge: JudgeConfig {
            name: default_judge_name(),
            provider: "qwen_max".to_string(),
            voice: "zh-CN-YunyangNeural".to_string(),
            temperature: default_judge_temperature(),
        },
    }
}

fn provider(base_url: &str, api_key_env: &str, model: &str) -> ProviderConfig {
    ProviderConfig {
        base_url: base_url.to_string(),
        api_key_env: api_key_env.to_string(),
        model: model.to_string(),
        timeout_secs: default_timeout_secs(),
        temperature: default_temperature(),
        max_tokens: None,
        retries: 0,
    }
}

const PRO_FIRST_PERSONALITY: &str = "You build the case. You seize the right to define the motion's key terms in your \
first sentences and lay out a tight syllogistic framework. You speak with force and structure: \
\"Our first contention is...\", \"Let us return to the heart of the question.\" You lean on \
sociology, economics and authoritative data.";

const PRO_SECOND_PERSONALITY: &str = "You are the attacker. You turn abstract questions into vivid analogies and real cases \
the audience can feel. In cross-examination you chain questions that walk the opponent into a \
prepared trap. Your language has rhythm: parallelism, rhetorical questions, and \"I would like \
the opposition to answer one simple question.\"";

const CON_FIRST_PERSONALITY: &str = "You are the rebutter. Fast and aggressive, you seize on every logical gap in the \
other side's case and do not let go. Your favorite tool is reductio ad absurdum: \"By the \
opposition's logic, wouldn't it follow that...\". In free debate you dominate, breaking the \
opponent's rhythm with short, hard rebuttals.";

const CON_SECOND_PERSONALITY: &str = "You are the thinker. Calm and orderly, you dismantle the motion's core concepts \
from their philosophical and social foundations and open new angles: \"Let us look at this \
from a different side.\" In closing you lift the whole exchange to the level of values and \
persuade the judges with gentle firmness.";
