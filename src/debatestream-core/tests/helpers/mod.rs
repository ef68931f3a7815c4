//! Stub turn sources and run helpers shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use debatestream_core::{
    AdapterError, DebateEvent, DebateSettings, Debater, FragmentStream, Judge, PromptMessage,
    Roster, RunController, Side, SpeakerRole, StreamSettings, Subscription, TurnSource,
};
use futures_util::StreamExt;
use futures_util::stream;
use tokio::sync::mpsc;

/// Answers every call with the same text, as a single fragment.
pub struct Fixed(pub &'static str);

#[async_trait]
impl TurnSource for Fixed {
    async fn complete(&self, _: &[PromptMessage]) -> Result<String, AdapterError> {
        Ok(self.0.to_string())
    }

    async fn stream(&self, _: &[PromptMessage]) -> Result<FragmentStream, AdapterError> {
        Ok(stream::iter(vec![Ok(self.0.to_string())]).boxed())
    }

    fn model_name(&self) -> &str {
        "fixed"
    }
}

/// Fails every call.
pub struct AlwaysFails;

#[async_trait]
impl TurnSource for AlwaysFails {
    async fn complete(&self, _: &[PromptMessage]) -> Result<String, AdapterError> {
        Err(AdapterError::Other("service unavailable".to_string()))
    }

    async fn stream(&self, _: &[PromptMessage]) -> Result<FragmentStream, AdapterError> {
        Err(AdapterError::Other("service unavailable".to_string()))
    }

    fn model_name(&self) -> &str {
        "always-fails"
    }
}

/// Replies "turn <n>" in two fragments and records every payload it receives.
#[derive(Default)]
pub struct Recording {
    calls: AtomicUsize,
    pub payloads: Mutex<Vec<Vec<PromptMessage>>>,
}

#[async_trait]
impl TurnSource for Recording {
    async fn complete(&self, _: &[PromptMessage]) -> Result<String, AdapterError> {
        Ok("verdict".to_string())
    }

    async fn stream(&self, messages: &[PromptMessage]) -> Result<FragmentStream, AdapterError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst);
        self.payloads.lock().unwrap().push(messages.to_vec());
        Ok(stream::iter(vec![Ok("turn ".to_string()), Ok(n.to_string())]).boxed())
    }

    fn model_name(&self) -> &str {
        "recording"
    }
}

/// The first stream is fed by the test through a channel; later ones answer "OK".
pub struct Remote {
    first: Mutex<Option<mpsc::UnboundedReceiver<Result<String, AdapterError>>>>,
}

impl Remote {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedSender<Result<String, AdapterError>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                first: Mutex::new(Some(rx)),
            }),
            tx,
        )
    }
}

#[async_trait]
impl TurnSource for Remote {
    async fn complete(&self, _: &[PromptMessage]) -> Result<String, AdapterError> {
        Ok("OK".to_string())
    }

    async fn stream(&self, _: &[PromptMessage]) -> Result<FragmentStream, AdapterError> {
        let first = self.first.lock().unwrap().take();
        match first {
            Some(rx) => Ok(stream::unfold(rx, |mut rx| async move {
                rx.recv().await.map(|item| (item, rx))
            })
            .boxed()),
            None => Ok(stream::iter(vec![Ok("OK".to_string())]).boxed()),
        }
    }

    fn model_name(&self) -> &str {
        "remote"
    }
}

/// Takes `delay` to produce its only fragment.
pub struct Slow {
    pub delay: Duration,
}

#[async_trait]
impl TurnSource for Slow {
    async fn complete(&self, _: &[PromptMessage]) -> Result<String, AdapterError> {
        Ok("slow verdict".to_string())
    }

    async fn stream(&self, _: &[PromptMessage]) -> Result<FragmentStream, AdapterError> {
        let delay = self.delay;
        Ok(stream::once(async move {
            tokio::time::sleep(delay).await;
            Ok("slow".to_string())
        })
        .boxed())
    }

    fn model_name(&self) -> &str {
        "slow"
    }
}

pub fn roster(source: Arc<dyn TurnSource>) -> Roster {
    let debater = |id: &str, side, role| {
        Debater::new(id, format!("Debater {id}"), side, role, Arc::clone(&source))
            .with_voice(format!("voice-{id}"))
    };
    Roster::new(
        vec![
            debater("pro_1", Side::Pro, SpeakerRole::First),
            debater("pro_2", Side::Pro, SpeakerRole::Second),
            debater("con_1", Side::Con, SpeakerRole::First),
            debater("con_2", Side::Con, SpeakerRole::Second),
        ],
        Judge::new("Judge", Arc::clone(&source)).with_voice("voice-judge"),
    )
    .expect("valid roster")
}

pub fn settings(free_rounds: u32) -> DebateSettings {
    DebateSettings {
        free_rounds,
        time_limit_secs: 0,
        turn_settle_ms: 0,
        ..DebateSettings::default()
    }
}

pub fn controller(source: Arc<dyn TurnSource>, free_rounds: u32) -> RunController {
    RunController::new(roster(source), settings(free_rounds), &StreamSettings::default())
}

/// Read until the subscription ends. With `advance`, reopen the gate after each
/// turn the way a player would once the turn's audio finished.
pub async fn run_to_end(
    controller: &RunController,
    subscription: &mut Subscription,
    advance: bool,
) -> Vec<DebateEvent> {
    let mut events = Vec::new();
    while let Some(event) = tokio::time::timeout(Duration::from_secs(10), subscription.next_event())
        .await
        .expect("run stalled")
    {
        if advance && matches!(event, DebateEvent::TurnComplete { .. }) {
            controller.advance();
        }
        events.push(event);
    }
    events
}

pub fn count(events: &[DebateEvent], name: &str) -> usize {
    events.iter().filter(|e| e.name() == name).count()
}

pub fn completed_texts(events: &[DebateEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            DebateEvent::TurnComplete { text, .. } => Some(text.clone()),
            _ => None,
        })
        .collect()
}
