//! End-to-end meeting runs through the registry with in-process gateways.

use async_trait::async_trait;
use roundtable::agents::{default_profiles, AgentProfile, AgentProfileStore, MODERATOR_ID};
use roundtable::completion::{CompletionGateway, GenerationError};
use roundtable::config::IdleAction;
use roundtable::events::{EventKind, MeetingEvent};
use roundtable::export::ExportFormat;
use roundtable::meeting::{
    ControlCommand, EngineSettings, EntryKind, MeetingConfig, MeetingError, MeetingRegistry,
    MeetingStatus, Phase, SessionHandle, StartedMeeting, TranscriptEntry, STOP_REASON,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tokio_util::sync::CancellationToken;

/// Answers "<id> #<n>", counting calls per gateway.
#[derive(Default)]
struct Scripted {
    calls: AtomicUsize,
}

#[async_trait]
impl CompletionGateway for Scripted {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn generate(
        &self,
        _prompt: &str,
        agent: &AgentProfile,
        _cancel: &CancellationToken,
    ) -> Result<String, GenerationError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("{} #{}", agent.id, n))
    }
}

/// Always fails for one participant.
struct FailsFor(&'static str);

#[async_trait]
impl CompletionGateway for FailsFor {
    fn name(&self) -> &'static str {
        "fails-for"
    }

    async fn generate(
        &self,
        _prompt: &str,
        agent: &AgentProfile,
        _cancel: &CancellationToken,
    ) -> Result<String, GenerationError> {
        if agent.id == self.0 {
            Err(GenerationError::Provider("model overloaded".to_string()))
        } else {
            Ok(format!("{} speaking", agent.id))
        }
    }
}

/// Blocks calls whose prompt contains `trigger` until opened; blocked calls
/// only return when cancelled. The default trigger blocks everything.
#[derive(Default)]
struct Gated {
    trigger: &'static str,
    open: AtomicBool,
    entered: Notify,
}

impl Gated {
    fn on(trigger: &'static str) -> Self {
        Self {
            trigger,
            ..Self::default()
        }
    }
}

#[async_trait]
impl CompletionGateway for Gated {
    fn name(&self) -> &'static str {
        "gated"
    }

    async fn generate(
        &self,
        prompt: &str,
        agent: &AgentProfile,
        cancel: &CancellationToken,
    ) -> Result<String, GenerationError> {
        if !prompt.contains(self.trigger) {
            return Ok(format!("{} speaking", agent.id));
        }
        if self.open.load(Ordering::SeqCst) {
            return Ok(format!("{} after resume", agent.id));
        }
        self.entered.notify_one();
        cancel.cancelled().await;
        Err(GenerationError::Cancelled)
    }
}

fn settings(announce_opening: bool) -> EngineSettings {
    let mut settings = EngineSettings::default();
    settings.announce_opening = announce_opening;
    settings.max_attempts = 2;
    settings.retry_backoff = Duration::from_millis(1);
    settings.generation_timeout = Duration::from_secs(5);
    settings
}

fn registry(gateway: Arc<dyn CompletionGateway>, settings: EngineSettings) -> MeetingRegistry {
    MeetingRegistry::new(
        Arc::new(AgentProfileStore::new(default_profiles())),
        gateway,
        Arc::new(settings),
    )
}

async fn start(
    registry: &MeetingRegistry,
    config: MeetingConfig,
) -> (StartedMeeting, SessionHandle) {
    let started = registry.start(config).await.unwrap();
    let handle = registry.get(started.session_id).await.unwrap();
    (started, handle)
}

/// Collect events until the terminal one.
async fn until_terminal(rx: &mut broadcast::Receiver<MeetingEvent>) -> Vec<MeetingEvent> {
    let collect = async {
        let mut events = Vec::new();
        loop {
            let event = rx.recv().await.unwrap();
            let terminal = event.kind.is_terminal();
            events.push(event);
            if terminal {
                return events;
            }
        }
    };
    tokio::time::timeout(Duration::from_secs(10), collect)
        .await
        .expect("meeting did not finish in time")
}

async fn run_to_end(handle: &SessionHandle) -> Vec<MeetingEvent> {
    let (snapshot, mut rx) = handle.subscribe().await;
    if snapshot.status.is_terminal() {
        return Vec::new();
    }
    until_terminal(&mut rx).await
}

fn shape(entries: &[TranscriptEntry]) -> Vec<(String, EntryKind, Phase, Option<u32>)> {
    entries
        .iter()
        .map(|e| (e.speaker.clone(), e.kind, e.phase, e.round))
        .collect()
}

fn count(entries: &[TranscriptEntry], kind: EntryKind) -> usize {
    entries.iter().filter(|e| e.kind == kind).count()
}

#[tokio::test]
async fn test_q3_launch_plan_follows_agenda() {
    let registry = registry(Arc::new(Scripted::default()), settings(false));
    let (_, handle) = start(
        &registry,
        MeetingConfig::new("Q3 launch plan", 2, ["marketing", "finance"]),
    )
    .await;
    run_to_end(&handle).await;

    let snapshot = handle.snapshot().await;
    assert_eq!(snapshot.status, MeetingStatus::Completed);

    let m = "marketing";
    let f = "finance";
    let md = MODERATOR_ID;
    let intro = (EntryKind::Introduction, Phase::Introduction);
    let contribution = (EntryKind::Contribution, Phase::Discussion);
    let framing = (EntryKind::Framing, Phase::Discussion);
    let expected = vec![
        (m, intro, None),
        (f, intro, None),
        (md, framing, Some(0)),
        (m, contribution, Some(0)),
        (f, contribution, Some(0)),
        (md, framing, Some(1)),
        (m, contribution, Some(1)),
        (f, contribution, Some(1)),
        (md, (EntryKind::Summary, Phase::Conclusion), None),
    ];
    let expected: Vec<(String, EntryKind, Phase, Option<u32>)> = expected
        .into_iter()
        .map(|(speaker, (kind, phase), round)| (speaker.to_string(), kind, phase, round))
        .collect();
    assert_eq!(shape(&snapshot.transcript), expected);

    let sequences: Vec<u64> = snapshot.transcript.iter().map(|e| e.sequence).collect();
    assert_eq!(sequences, (1..=9).collect::<Vec<u64>>());
    assert_eq!(snapshot.summary.as_deref(), Some("moderator #7"));
}

#[tokio::test]
async fn test_opening_statement_precedes_introductions() {
    let registry = registry(Arc::new(Scripted::default()), settings(true));
    let (_, handle) = start(
        &registry,
        MeetingConfig::new("Q3 launch plan", 1, ["marketing", "finance"]),
    )
    .await;
    run_to_end(&handle).await;

    let transcript = handle.snapshot().await.transcript;
    assert_eq!(transcript[0].kind, EntryKind::Opening);
    assert_eq!(transcript[0].speaker, MODERATOR_ID);
    assert!(transcript[0].text.contains("Q3 launch plan"));
    assert_eq!(transcript[1].kind, EntryKind::Introduction);
}

#[tokio::test]
async fn test_turn_counts_match_roster_and_rounds() {
    let registry = registry(Arc::new(Scripted::default()), settings(true));
    let (_, handle) = start(
        &registry,
        MeetingConfig::new("Hiring plan", 2, ["gm", "hr", "finance"]),
    )
    .await;
    run_to_end(&handle).await;

    let snapshot = handle.snapshot().await;
    assert_eq!(snapshot.status, MeetingStatus::Completed);
    let transcript = snapshot.transcript;
    assert_eq!(count(&transcript, EntryKind::Introduction), 3);
    assert_eq!(count(&transcript, EntryKind::Contribution), 3 * 2);
    assert_eq!(count(&transcript, EntryKind::Summary), 1);
    assert_eq!(count(&transcript, EntryKind::Framing), 2);

    let phases: Vec<Phase> = transcript.iter().map(|e| e.phase).collect();
    assert!(phases.windows(2).all(|pair| pair[0] <= pair[1]));
}

#[tokio::test]
async fn test_failing_participant_gets_placeholder_and_meeting_continues() {
    let registry = registry(Arc::new(FailsFor("finance")), settings(false));
    let (_, handle) = start(
        &registry,
        MeetingConfig::new("Budget review", 2, ["gm", "finance"]),
    )
    .await;
    run_to_end(&handle).await;

    let snapshot = handle.snapshot().await;
    assert_eq!(snapshot.status, MeetingStatus::Completed);
    assert_eq!(snapshot.failed_turns.len(), 3);

    let transcript = &snapshot.transcript;
    let placeholders: Vec<&TranscriptEntry> = transcript
        .iter()
        .filter(|e| e.kind == EntryKind::Placeholder)
        .collect();
    assert_eq!(placeholders.len(), 3);
    assert!(placeholders.iter().all(|e| e.speaker == "finance"));
    assert!(placeholders[0].text.contains("Frank"));
    assert!(placeholders[0].text.contains("model overloaded"));

    // The next round still runs after a failed turn.
    let round0_gap = transcript
        .iter()
        .position(|e| e.kind == EntryKind::Placeholder && e.round == Some(0))
        .unwrap();
    let later = &transcript[round0_gap + 1..];
    assert!(later
        .iter()
        .any(|e| e.speaker == "gm" && e.kind == EntryKind::Contribution && e.round == Some(1)));
    assert_eq!(count(transcript, EntryKind::Summary), 1);
}

#[tokio::test]
async fn test_pause_during_generation_appends_nothing_until_resume() {
    let gateway = Arc::new(Gated::on("discussion round 2"));
    let registry = registry(gateway.clone(), settings(false));
    let (started, handle) = start(
        &registry,
        MeetingConfig::new("Pricing", 2, ["gm"]),
    )
    .await;

    tokio::time::timeout(Duration::from_secs(5), gateway.entered.notified())
        .await
        .expect("second discussion round never started");

    let ack = handle
        .control(&started.control_token, ControlCommand::Pause)
        .await
        .unwrap();
    assert_eq!(ack.status, MeetingStatus::Paused);

    let paused = handle.snapshot().await;
    assert_eq!(paused.status, MeetingStatus::Paused);
    assert_eq!(paused.phase, Some(Phase::Discussion));
    assert_eq!(paused.round, Some(1));
    let kinds: Vec<EntryKind> = paused.transcript.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![
            EntryKind::Introduction,
            EntryKind::Framing,
            EntryKind::Contribution,
            EntryKind::Framing,
        ]
    );

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(handle.snapshot().await.transcript, paused.transcript);

    gateway.open.store(true, Ordering::SeqCst);
    let (_, mut rx) = handle.subscribe().await;
    handle
        .control(&started.control_token, ControlCommand::Resume)
        .await
        .unwrap();
    until_terminal(&mut rx).await;

    let done = handle.snapshot().await;
    assert_eq!(done.status, MeetingStatus::Completed);
    assert_eq!(done.transcript[..4], paused.transcript[..]);
    let resumed = &done.transcript[4];
    assert_eq!(resumed.speaker, "gm");
    assert_eq!(resumed.kind, EntryKind::Contribution);
    assert_eq!(resumed.round, Some(1));
    assert_eq!(resumed.text, "gm after resume");
    assert!(done.failed_turns.is_empty());
}

#[tokio::test]
async fn test_idle_timeout_does_not_pause_progressing_meeting() {
    let mut settings = settings(false);
    settings.idle_timeout = Some(Duration::from_millis(150));
    settings.idle_action = IdleAction::Pause;
    settings.turn_delay = Duration::from_millis(40);
    let registry = registry(Arc::new(Scripted::default()), settings);
    let (_, handle) = start(
        &registry,
        MeetingConfig::new("Hiring plan", 3, ["gm", "finance", "hr"]),
    )
    .await;
    let events = run_to_end(&handle).await;

    assert!(!events
        .iter()
        .any(|e| matches!(e.kind, EventKind::SessionPaused)));
    let snapshot = handle.snapshot().await;
    assert_eq!(snapshot.status, MeetingStatus::Completed);
    assert!(snapshot.failed_turns.is_empty());
    assert_eq!(count(&snapshot.transcript, EntryKind::Contribution), 9);
}

#[tokio::test]
async fn test_wake_does_not_shorten_turn_delay() {
    let mut settings = settings(false);
    settings.turn_delay = Duration::from_millis(60);
    let registry = registry(Arc::new(Scripted::default()), settings);
    let began = tokio::time::Instant::now();
    let (_, handle) = start(&registry, MeetingConfig::new("Pricing", 1, ["gm"])).await;

    let waker = {
        let handle = handle.clone();
        tokio::spawn(async move {
            loop {
                handle.wake();
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
    };
    run_to_end(&handle).await;
    waker.abort();

    // Introduction, contribution and summary: two pauses between three turns.
    assert!(began.elapsed() >= Duration::from_millis(120));
    assert_eq!(handle.snapshot().await.status, MeetingStatus::Completed);
}

#[tokio::test]
async fn test_late_observer_sees_every_entry_exactly_once() {
    let mut settings = settings(true);
    settings.turn_delay = Duration::from_millis(10);
    let registry = registry(Arc::new(Scripted::default()), settings);
    let (_, handle) = start(
        &registry,
        MeetingConfig::new("Roadmap", 2, ["gm", "rnd", "marketing"]),
    )
    .await;

    tokio::time::sleep(Duration::from_millis(25)).await;
    let (snapshot, mut rx) = handle.subscribe().await;
    let events = if snapshot.status.is_terminal() {
        Vec::new()
    } else {
        until_terminal(&mut rx).await
    };

    if let Some(first) = events.first() {
        assert_eq!(first.sequence, snapshot.last_sequence + 1);
    }
    for pair in events.windows(2) {
        assert_eq!(pair[1].sequence, pair[0].sequence + 1);
    }

    let mut seen = snapshot.transcript.clone();
    seen.extend(events.into_iter().filter_map(|e| match e.kind {
        EventKind::EntryAppended { entry } => Some(entry),
        _ => None,
    }));
    assert_eq!(seen, handle.snapshot().await.transcript);
}

#[tokio::test]
async fn test_export_is_stable_after_completion() {
    let registry = registry(Arc::new(Scripted::default()), settings(true));
    let (_, handle) = start(
        &registry,
        MeetingConfig::new("Q3 launch plan", 1, ["marketing", "finance"]),
    )
    .await;
    run_to_end(&handle).await;

    let first = handle.export(ExportFormat::Markdown).await;
    let second = handle.export(ExportFormat::Markdown).await;
    assert_eq!(first, second);
    assert!(first.starts_with("# Meeting: Q3 launch plan"));
    assert!(first.contains("## Conclusion"));

    let json: serde_json::Value =
        serde_json::from_str(&handle.export(ExportFormat::Json).await).unwrap();
    assert_eq!(json["status"], "completed");
    assert_eq!(json["topic"], "Q3 launch plan");
    assert_eq!(json["phases"].as_array().map(Vec::len), Some(3));
}

#[tokio::test]
async fn test_stop_fails_the_meeting() {
    let gateway = Arc::new(Gated::default());
    let registry = registry(gateway.clone(), settings(false));
    let (started, handle) = start(
        &registry,
        MeetingConfig::new("Pricing", 3, ["gm", "bm"]),
    )
    .await;
    let (_, mut rx) = handle.subscribe().await;

    handle
        .control(&started.control_token, ControlCommand::Stop)
        .await
        .unwrap();
    let events = until_terminal(&mut rx).await;

    assert!(matches!(
        events.last().map(|e| &e.kind),
        Some(EventKind::SessionFailed { reason }) if reason == STOP_REASON
    ));
    let snapshot = handle.snapshot().await;
    assert_eq!(snapshot.status, MeetingStatus::Failed);
    assert!(snapshot.transcript.is_empty());
    assert!(snapshot.ended_at.is_some());
}

#[tokio::test]
async fn test_control_with_wrong_token_is_rejected() {
    let gateway = Arc::new(Gated::default());
    let registry = registry(gateway, settings(false));
    let (_, handle) = start(&registry, MeetingConfig::new("Pricing", 1, ["gm"])).await;

    let err = handle
        .control("someone-else", ControlCommand::Pause)
        .await
        .unwrap_err();
    assert_eq!(err, MeetingError::NotInitiator);
    assert_eq!(handle.snapshot().await.status, MeetingStatus::Active);
}

#[tokio::test]
async fn test_conclude_skips_to_summary() {
    let gateway = Arc::new(Gated::default());
    let registry = registry(gateway.clone(), settings(false));
    let (started, handle) = start(
        &registry,
        MeetingConfig::new("Pricing", 3, ["gm", "bm"]),
    )
    .await;
    tokio::time::timeout(Duration::from_secs(5), gateway.entered.notified())
        .await
        .expect("first turn never started");

    gateway.open.store(true, Ordering::SeqCst);
    let (_, mut rx) = handle.subscribe().await;
    let ack = handle
        .control(&started.control_token, ControlCommand::Conclude)
        .await
        .unwrap();
    assert_eq!(ack.phase, Some(Phase::Conclusion));
    until_terminal(&mut rx).await;

    let transcript = handle.snapshot().await.transcript;
    assert_eq!(transcript.len(), 1);
    assert_eq!(transcript[0].kind, EntryKind::Summary);
}
