//! End-to-end runs through `RunController` with stub turn sources.

mod helpers;

use std::sync::Arc;
use std::time::Duration;

use debatestream_core::{
    DebateError, DebateEvent, EndReason, PromptRole, RunController, RunStatus, StreamSettings,
};

use helpers::{
    AlwaysFails, Fixed, Recording, Remote, Slow, completed_texts, controller, count, roster,
    run_to_end, settings,
};

const TOPIC: &str = "Should cities ban private cars downtown?";
const PRO: &str = "Cities should ban private cars downtown";
const CON: &str = "Cities should not ban private cars downtown";

async fn next_named(
    subscription: &mut debatestream_core::Subscription,
    name: &str,
) -> DebateEvent {
    loop {
        let event = tokio::time::timeout(Duration::from_secs(10), subscription.next_event())
            .await
            .expect("run stalled")
            .expect("subscription ended early");
        if event.name() == name {
            return event;
        }
    }
}

#[tokio::test]
async fn test_full_run_with_one_free_round() {
    let controller = controller(Arc::new(Fixed("OK")), 1);
    let mut subscription = controller.subscribe();
    controller.start(TOPIC, PRO, CON).unwrap();

    let events = run_to_end(&controller, &mut subscription, true).await;

    assert_eq!(count(&events, "turn_complete"), 17);
    assert_eq!(count(&events, "speaker_announce"), 17);
    assert_eq!(count(&events, "phase_change"), 6);
    assert_eq!(count(&events, "judge_result"), 1);
    assert!(completed_texts(&events).iter().all(|t| t == "OK"));
    match events.last() {
        Some(DebateEvent::RunEnd {
            total_turns,
            reason,
        }) => {
            assert_eq!(*total_turns, 17);
            assert_eq!(*reason, EndReason::Completed);
        }
        other => panic!("expected run_end last, got {other:?}"),
    }

    controller.wait().await;
    assert_eq!(controller.status().status, RunStatus::Finished);
    let transcript = controller.transcript().expect("transcript after run");
    assert_eq!(transcript.len(), 17);
    assert_eq!(transcript.last().map(|e| e.speaker_id.as_str()), Some("judge"));
}

#[tokio::test]
async fn test_fragments_belong_to_the_announced_turn() {
    let controller = controller(Arc::new(Recording::default()), 2);
    let mut subscription = controller.subscribe();
    controller.start(TOPIC, PRO, CON).unwrap();

    let events = run_to_end(&controller, &mut subscription, true).await;

    let mut open_turn: Option<String> = None;
    for event in &events {
        match event {
            DebateEvent::SpeakerAnnounce { speaker_id, .. } => {
                assert!(open_turn.is_none(), "announce inside an open turn");
                open_turn = Some(speaker_id.clone());
            }
            DebateEvent::TokenFragment { speaker_id, .. } => {
                assert_eq!(open_turn.as_ref(), Some(speaker_id));
            }
            DebateEvent::TurnComplete { speaker_id, .. } => {
                assert_eq!(open_turn.take().as_ref(), Some(speaker_id));
            }
            _ => {}
        }
    }
    assert!(open_turn.is_none());
}

#[tokio::test]
async fn test_stop_mid_stream_finishes_current_turn_only() {
    let (remote, tx) = Remote::new();
    let controller = controller(remote, 1);
    let mut subscription = controller.subscribe();
    controller.start(TOPIC, PRO, CON).unwrap();

    tx.send(Ok("partial ".to_string())).unwrap();
    next_named(&mut subscription, "token_fragment").await;

    assert!(controller.stop());
    assert_eq!(controller.status().status, RunStatus::Finished);
    tx.send(Ok("rest".to_string())).unwrap();
    drop(tx);

    let rest = run_to_end(&controller, &mut subscription, true).await;
    let names: Vec<&str> = rest.iter().map(|e| e.name()).collect();
    assert_eq!(names, vec!["token_fragment", "turn_complete", "run_end"]);
    assert_eq!(completed_texts(&rest), vec!["partial rest".to_string()]);
    assert!(matches!(
        rest.last(),
        Some(DebateEvent::RunEnd {
            total_turns: 1,
            reason: EndReason::Stopped
        })
    ));
    assert!(!controller.stop());
}

#[tokio::test]
async fn test_subscribers_see_identical_frames() {
    let controller = controller(Arc::new(Fixed("OK")), 1);
    let mut pacer = controller.subscribe();
    let mut watcher = controller.subscribe();
    assert_eq!(controller.status().subscribers, 2);

    let watching = {
        let controller = controller.clone();
        tokio::spawn(async move { run_to_end(&controller, &mut watcher, false).await })
    };
    controller.start(TOPIC, PRO, CON).unwrap();

    let paced = run_to_end(&controller, &mut pacer, true).await;
    let watched = watching.await.unwrap();

    let frames = |events: &[DebateEvent]| -> Vec<String> {
        events.iter().map(|e| e.to_sse_frame()).collect()
    };
    assert_eq!(frames(&paced), frames(&watched));
    assert_eq!(controller.status().subscribers, 0);
}

#[tokio::test]
async fn test_failing_source_still_completes_every_turn() {
    let controller = controller(Arc::new(AlwaysFails), 1);
    let mut subscription = controller.subscribe();
    controller.start(TOPIC, PRO, CON).unwrap();

    let events = run_to_end(&controller, &mut subscription, true).await;

    let texts = completed_texts(&events);
    assert_eq!(texts.len(), 17);
    assert!(texts.iter().all(|t| t.contains("technical problem")));
    assert_eq!(count(&events, "error"), 0);
    assert!(matches!(
        events.last(),
        Some(DebateEvent::RunEnd {
            total_turns: 17,
            reason: EndReason::Completed
        })
    ));
}

#[tokio::test]
async fn test_gate_holds_next_turn_until_advanced() {
    let controller = controller(Arc::new(Fixed("OK")), 1);
    let mut subscription = controller.subscribe();
    controller.start(TOPIC, PRO, CON).unwrap();

    next_named(&mut subscription, "turn_complete").await;
    assert!(
        tokio::time::timeout(Duration::from_millis(200), subscription.next_event())
            .await
            .is_err(),
        "second turn started without advance"
    );

    for _ in 0..3 {
        assert!(controller.advance());
    }
    next_named(&mut subscription, "turn_complete").await;
    assert!(
        tokio::time::timeout(Duration::from_millis(200), subscription.next_event())
            .await
            .is_err(),
        "repeated advance released more than one turn"
    );

    controller.stop();
    let rest = run_to_end(&controller, &mut subscription, false).await;
    assert!(matches!(
        rest.as_slice(),
        [DebateEvent::RunEnd {
            total_turns: 2,
            reason: EndReason::Stopped
        }]
    ));
}

#[tokio::test]
async fn test_stop_between_turns_opens_no_new_stage() {
    let controller = controller(Arc::new(Fixed("OK")), 1);
    let mut subscription = controller.subscribe();
    controller.start(TOPIC, PRO, CON).unwrap();

    next_named(&mut subscription, "turn_complete").await;
    controller.advance();
    next_named(&mut subscription, "turn_complete").await;
    // Both opening statements are done; the worker waits to enter cross-examination.
    tokio::task::yield_now().await;
    controller.stop();

    let rest = run_to_end(&controller, &mut subscription, false).await;
    let names: Vec<&str> = rest.iter().map(|e| e.name()).collect();
    assert_eq!(names, vec!["run_end"]);

    controller.wait().await;
    assert_eq!(controller.transcript().map(|t| t.len()), Some(2));
}

#[tokio::test]
async fn test_second_start_is_rejected_while_running() {
    let controller = controller(Arc::new(Fixed("OK")), 1);
    let mut subscription = controller.subscribe();
    controller.start(TOPIC, PRO, CON).unwrap();

    assert!(matches!(
        controller.start("Another topic", "Yes", "No"),
        Err(DebateError::AlreadyRunning)
    ));

    next_named(&mut subscription, "turn_complete").await;
    controller.stop();
    // The worker has not yet observed the stop.
    assert!(matches!(
        controller.start("Another topic", "Yes", "No"),
        Err(DebateError::AlreadyRunning)
    ));

    controller.wait().await;
    let mut second = controller.subscribe();
    controller.start("Another topic", "Yes", "No").unwrap();
    assert_eq!(controller.status().topic.as_deref(), Some("Another topic"));
    next_named(&mut second, "turn_complete").await;
    controller.stop();
    controller.wait().await;
}

#[tokio::test]
async fn test_blank_motion_is_rejected() {
    let controller = controller(Arc::new(Fixed("OK")), 1);

    assert!(matches!(
        controller.start("  ", PRO, CON),
        Err(DebateError::InvalidMotion { field: "topic" })
    ));
    assert!(matches!(
        controller.start(TOPIC, PRO, ""),
        Err(DebateError::InvalidMotion {
            field: "con position"
        })
    ));

    let status = controller.status();
    assert_eq!(status.status, RunStatus::Idle);
    assert_eq!(status.topic, None);
    assert!(!controller.advance());
    assert!(!controller.stop());
}

#[tokio::test]
async fn test_unknown_format_is_rejected() {
    let mut settings = settings(1);
    settings.format = "oxford".to_string();
    let controller = RunController::new(
        roster(Arc::new(Fixed("OK"))),
        settings,
        &StreamSettings::default(),
    );

    match controller.start(TOPIC, PRO, CON) {
        Err(DebateError::UnknownFormat(message)) => assert!(message.contains("collegiate")),
        other => panic!("expected unknown format, got {other:?}"),
    }
    assert_eq!(controller.status().status, RunStatus::Idle);
}

#[tokio::test]
async fn test_each_turn_sees_the_previous_turn_verbatim() {
    let recording = Arc::new(Recording::default());
    let controller = controller(recording.clone(), 1);
    let mut subscription = controller.subscribe();
    controller.start(TOPIC, PRO, CON).unwrap();
    run_to_end(&controller, &mut subscription, true).await;
    controller.wait().await;

    let transcript = controller.transcript().unwrap();
    let entries = transcript.entries();
    let payloads = recording.payloads.lock().unwrap();
    assert_eq!(payloads.len(), 16);

    for k in 1..payloads.len() {
        let (previous, current) = (&entries[k - 1], &entries[k]);
        let messages = &payloads[k];
        let echoed = &messages[messages.len() - 2];

        if previous.speaker_id == current.speaker_id {
            assert_eq!(echoed.role, PromptRole::Assistant);
            assert_eq!(echoed.content, previous.text);
        } else {
            assert_eq!(echoed.role, PromptRole::User);
            assert!(echoed.content.starts_with(&format!("[{}", previous.name)));
            assert!(echoed.content.ends_with(&previous.text));
        }
    }
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_budget_skips_to_the_judge() {
    let mut settings = settings(2);
    settings.time_limit_secs = 1;
    let controller = RunController::new(
        roster(Arc::new(Slow {
            delay: Duration::from_secs(2),
        })),
        settings,
        &StreamSettings::default(),
    );
    let mut subscription = controller.subscribe();
    controller.start(TOPIC, PRO, CON).unwrap();

    let events = run_to_end(&controller, &mut subscription, true).await;

    assert_eq!(
        completed_texts(&events),
        vec!["slow".to_string(), "slow verdict".to_string()]
    );
    assert_eq!(count(&events, "judge_result"), 1);
    let stages: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            DebateEvent::PhaseChange { title, .. } => Some(title.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(stages.len(), 2, "skipped stages were announced: {stages:?}");
    assert!(matches!(
        events.last(),
        Some(DebateEvent::RunEnd {
            total_turns: 2,
            reason: EndReason::Completed
        })
    ));
    assert_eq!(controller.status().elapsed, "0:02");
}
