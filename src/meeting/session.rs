//! A single meeting: its state machine, transcript and event stream, owned together.
//!
//! Everything here runs under the session's lock. Every state change publishes
//! its events before the lock is released, so observers and snapshots always
//! agree on the order of things.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{broadcast, Mutex, MutexGuard, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::agents::{AgentProfile, MODERATOR_ID};
use crate::completion::GenerationError;
use crate::config::IdleAction;
use crate::events::{EventBroadcaster, EventKind, MeetingEvent};
use crate::export::{ExportFormat, TranscriptDocument};
use crate::prompt::{PromptComposer, PromptContext, PromptStage};

use super::error::{MeetingError, MeetingResult};
use super::moderator::Moderator;
use super::settings::EngineSettings;
use super::setup::MeetingConfig;
use super::state_machine::{MeetingState, Transition};
use super::status::{MeetingStatus, Phase, Turn};
use super::transcript::{EntryDraft, EntryKind, Transcript, TranscriptEntry};

/// Initiator commands accepted by a running session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ControlCommand {
    Pause,
    Resume,
    Stop,
    Skip,
    Conclude,
}

impl ControlCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pause => "pause",
            Self::Resume => "resume",
            Self::Stop => "stop",
            Self::Skip => "skip",
            Self::Conclude => "conclude",
        }
    }
}

pub const STOP_REASON: &str = "stopped by initiator";

/// Everything an observer needs to render a session from scratch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub config: MeetingConfig,
    pub participants: Vec<AgentProfile>,
    pub status: MeetingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    /// 0-based discussion round of the current turn.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub round: Option<u32>,
    /// Speaker of the current turn, `moderator` during the conclusion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speaker: Option<String>,
    pub transcript: Vec<TranscriptEntry>,
    /// Sequence of the last event this snapshot reflects.
    pub last_sequence: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub failed_turns: Vec<Turn>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

/// One line in a session listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub topic: String,
    pub status: MeetingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    pub entries: usize,
    pub observers: usize,
    pub created_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ended_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlAck {
    pub session_id: Uuid,
    pub command: ControlCommand,
    pub status: MeetingStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
}

/// Work handed to the runner for one turn.
#[derive(Debug, Clone)]
pub struct TurnPlan {
    pub turn: Turn,
    /// Session epoch the plan was made in; a result from an older epoch is dropped.
    pub epoch: u64,
    pub cancel: CancellationToken,
    pub agent: AgentProfile,
    pub prompt: String,
}

/// What the runner should do next.
#[derive(Debug)]
pub enum RunnerStep {
    Generate(TurnPlan),
    /// Nothing runnable; wait for a wake-up or the idle deadline.
    Wait(Option<Duration>),
    Finished,
}

pub struct MeetingSession {
    id: Uuid,
    config: MeetingConfig,
    roster: Vec<AgentProfile>,
    moderator: Moderator,
    moderator_profile: AgentProfile,
    composer: PromptComposer,
    guidance: Option<String>,
    language: Option<String>,
    state: MeetingState,
    transcript: Transcript,
    summary: Option<String>,
    failed_turns: Vec<Turn>,
    events: EventBroadcaster,
    control_token: String,
    epoch: u64,
    cancel: CancellationToken,
    created_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
    ended: Option<Instant>,
    last_activity: Instant,
}

impl MeetingSession {
    /// Build a session for a validated config and resolved roster.
    pub fn new(
        id: Uuid,
        config: MeetingConfig,
        roster: Vec<AgentProfile>,
        settings: &EngineSettings,
    ) -> Self {
        let scenario = config
            .scenario
            .as_deref()
            .and_then(|name| settings.scenario(name));
        let moderator = settings.moderator_for(scenario);
        let guidance = scenario
            .map(|s| s.guidance.clone())
            .filter(|g| !g.trim().is_empty());
        let language = config
            .language
            .clone()
            .or_else(|| settings.default_language.clone());

        Self {
            id,
            state: MeetingState::new(roster.len(), config.rounds),
            moderator_profile: moderator.profile(),
            moderator,
            composer: settings.composer.clone(),
            guidance,
            language,
            config,
            roster,
            transcript: Transcript::new(),
            summary: None,
            failed_turns: Vec::new(),
            events: EventBroadcaster::new(id, settings.event_capacity),
            control_token: Uuid::new_v4().to_string(),
            epoch: 0,
            cancel: CancellationToken::new(),
            created_at: Utc::now(),
            ended_at: None,
            ended: None,
            last_activity: Instant::now(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn control_token(&self) -> &str {
        &self.control_token
    }

    pub fn status(&self) -> MeetingStatus {
        self.state.status()
    }

    pub fn is_ended(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn observer_count(&self) -> usize {
        self.events.observer_count()
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Time since the session reached a terminal state.
    pub fn ended_for(&self) -> Option<Duration> {
        self.ended.map(|at| at.elapsed())
    }

    /// Publish `session_started` and enter the introduction.
    pub fn start(&mut self) -> MeetingResult<()> {
        self.events.publish(EventKind::SessionStarted {
            config: self.config.clone(),
        });
        let transitions = self.state.begin()?;
        self.apply(transitions);
        info!(
            "Meeting {} started: \"{}\" with {} participant(s), {} round(s)",
            self.id,
            self.config.topic,
            self.roster.len(),
            self.config.rounds
        );
        Ok(())
    }

    /// Decide the runner's next step. Applies the idle policy first.
    pub fn next_step(&mut self, idle_timeout: Option<Duration>, idle_action: IdleAction) -> RunnerStep {
        self.apply_idle_policy(idle_timeout, idle_action);
        if self.is_ended() {
            return RunnerStep::Finished;
        }

        match self.next_turn() {
            Ok(Some(plan)) => RunnerStep::Generate(plan),
            Ok(None) => RunnerStep::Wait(
                idle_timeout.map(|timeout| timeout.saturating_sub(self.last_activity.elapsed())),
            ),
            Err(err) => {
                self.fail_internal(&err);
                RunnerStep::Finished
            }
        }
    }

    /// Plan the turn the runner may execute now, if any.
    pub fn next_turn(&self) -> MeetingResult<Option<TurnPlan>> {
        let Some(turn) = self.state.runnable_turn() else {
            return Ok(None);
        };

        let agent = self.agent_for(turn)?;
        let focus = turn
            .round()
            .map(|round| self.moderator.round_focus(round, &self.config.topic))
            .unwrap_or_default();
        let stage = match turn {
            Turn::Introduce { .. } => PromptStage::Introduction,
            Turn::Discuss { round, .. } => PromptStage::Discussion {
                round,
                focus: &focus,
            },
            Turn::Summarize => PromptStage::Conclusion,
        };

        let prompt = self.composer.compose(&PromptContext {
            agent,
            topic: &self.config.topic,
            stage,
            guidance: self.guidance.as_deref(),
            language: self.language.as_deref(),
            transcript: self.transcript.entries(),
        });

        Ok(Some(TurnPlan {
            turn,
            epoch: self.epoch,
            cancel: self.cancel.clone(),
            agent: agent.clone(),
            prompt,
        }))
    }

    /// Record the outcome of a planned turn and advance.
    ///
    /// Returns `false` when the result is stale: the session moved on (pause,
    /// skip, stop) after the plan was made. Stale results are dropped unseen.
    pub fn commit(
        &mut self,
        turn: Turn,
        epoch: u64,
        outcome: Result<String, GenerationError>,
    ) -> MeetingResult<bool> {
        if epoch != self.epoch || self.state.runnable_turn() != Some(turn) {
            debug!(
                "Meeting {} dropping stale result for {:?} (epoch {} vs {})",
                self.id, turn, epoch, self.epoch
            );
            return Ok(false);
        }

        let agent = self.agent_for(turn)?.clone();
        let (kind, text) = match outcome {
            Ok(text) => {
                let kind = match turn {
                    Turn::Introduce { .. } => EntryKind::Introduction,
                    Turn::Discuss { .. } => EntryKind::Contribution,
                    Turn::Summarize => {
                        self.summary = Some(text.clone());
                        EntryKind::Summary
                    }
                };
                (kind, text)
            }
            Err(err) => {
                let failure = MeetingError::GenerationFailure(format!("{}: {}", agent.id, err));
                warn!("Meeting {} turn {:?}: {}", self.id, turn, failure);
                self.failed_turns.push(turn);
                let text = format!("[{} was unable to contribute: {}]", agent.name, err);
                (EntryKind::Placeholder, text)
            }
        };
        let draft = match turn {
            Turn::Summarize => self.moderator.summary_draft(text, kind),
            _ => entry_draft(&agent, turn, kind, text),
        };
        self.append(draft);
        self.last_activity = Instant::now();

        match self.state.advance(turn) {
            Ok(transitions) => {
                self.apply(transitions);
                Ok(true)
            }
            Err(err @ MeetingError::Internal(_)) => {
                self.fail_internal(&err);
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    pub fn authorize(&self, token: &str) -> MeetingResult<()> {
        if token == self.control_token {
            Ok(())
        } else {
            Err(MeetingError::NotInitiator)
        }
    }

    /// Record initiator activity without changing anything else.
    pub fn heartbeat(&mut self, token: &str) -> MeetingResult<()> {
        self.authorize(token)?;
        self.last_activity = Instant::now();
        Ok(())
    }

    pub fn control(&mut self, token: &str, command: ControlCommand) -> MeetingResult<ControlAck> {
        self.authorize(token)?;
        self.last_activity = Instant::now();

        let transitions = match command {
            ControlCommand::Pause => {
                let transitions = self.state.pause()?;
                self.interrupt();
                transitions
            }
            ControlCommand::Resume => self.state.resume()?,
            ControlCommand::Stop => {
                let transitions = self.state.abort(STOP_REASON)?;
                self.interrupt();
                transitions
            }
            ControlCommand::Skip => {
                let (turn, transitions) = self.state.skip()?;
                self.interrupt();
                info!("Meeting {} skipped turn {:?}", self.id, turn);
                transitions
            }
            ControlCommand::Conclude => {
                let transitions = self.state.conclude()?;
                self.interrupt();
                transitions
            }
        };
        self.apply(transitions);

        info!("Meeting {} {} -> {}", self.id, command.as_str(), self.status().as_str());
        Ok(ControlAck {
            session_id: self.id,
            command,
            status: self.status(),
            phase: self.state.phase(),
        })
    }

    /// Pause or abort a session that has seen neither initiator activity nor a
    /// committed turn for `timeout`. A session already paused that stays idle
    /// is aborted. Returns whether anything changed.
    pub fn apply_idle_policy(&mut self, timeout: Option<Duration>, action: IdleAction) -> bool {
        let Some(timeout) = timeout else {
            return false;
        };
        if self.is_ended() || self.last_activity.elapsed() < timeout {
            return false;
        }

        let result = if self.state.is_paused() || action == IdleAction::Abort {
            self.state.abort(format!("idle for {}s", timeout.as_secs()))
        } else {
            self.state.pause()
        };

        match result {
            Ok(transitions) => {
                warn!(
                    "Meeting {} idle for {:?}, now {}",
                    self.id,
                    timeout,
                    if self.state.is_terminal() { "aborted" } else { "paused" }
                );
                self.interrupt();
                self.last_activity = Instant::now();
                self.apply(transitions);
                true
            }
            Err(err) => {
                debug!("Meeting {} idle policy not applied: {}", self.id, err);
                false
            }
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let turn = self.state.current_turn();
        SessionSnapshot {
            session_id: self.id,
            config: self.config.clone(),
            participants: self.roster.clone(),
            status: self.status(),
            phase: self.state.phase(),
            round: turn.and_then(|t| t.round()),
            speaker: turn.and_then(|t| self.speaker_id(t)),
            transcript: self.transcript.entries().to_vec(),
            last_sequence: self.events.last_sequence(),
            summary: self.summary.clone(),
            failed_turns: self.failed_turns.clone(),
            failure_reason: self.state.failure_reason().map(str::to_string),
            created_at: self.created_at,
            ended_at: self.ended_at,
        }
    }

    /// A snapshot and a receiver that starts exactly after it.
    pub fn subscribe(&self) -> (SessionSnapshot, broadcast::Receiver<MeetingEvent>) {
        (self.snapshot(), self.events.subscribe())
    }

    pub fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.id,
            topic: self.config.topic.clone(),
            status: self.status(),
            phase: self.state.phase(),
            entries: self.transcript.len(),
            observers: self.observer_count(),
            created_at: self.created_at,
            ended_at: self.ended_at,
        }
    }

    pub fn document(&self) -> TranscriptDocument<'_> {
        TranscriptDocument {
            session_id: self.id,
            config: &self.config,
            participants: &self.roster,
            status: self.status(),
            summary: self.summary.as_deref(),
            failure_reason: self.state.failure_reason(),
            entries: self.transcript.entries(),
        }
    }

    pub fn export(&self, format: ExportFormat) -> String {
        self.document().render(format)
    }

    fn agent_for(&self, turn: Turn) -> MeetingResult<&AgentProfile> {
        match turn.speaker() {
            None => Ok(&self.moderator_profile),
            Some(index) => self.roster.get(index).ok_or_else(|| {
                MeetingError::Internal(format!(
                    "speaker index {index} out of range for roster of {}",
                    self.roster.len()
                ))
            }),
        }
    }

    fn speaker_id(&self, turn: Turn) -> Option<String> {
        match turn.speaker() {
            None => Some(MODERATOR_ID.to_string()),
            Some(index) => self.roster.get(index).map(|p| p.id.clone()),
        }
    }

    /// Invalidate the in-flight turn: cancel it and bump the epoch so a result
    /// that still arrives is dropped.
    fn interrupt(&mut self) {
        self.epoch += 1;
        self.cancel.cancel();
        self.cancel = CancellationToken::new();
    }

    fn fail_internal(&mut self, err: &MeetingError) {
        error!("Meeting {} failed: {}", self.id, err);
        if let Ok(transitions) = self.state.abort(err.to_string()) {
            self.interrupt();
            self.apply(transitions);
        }
    }

    fn append(&mut self, draft: EntryDraft) {
        let entry = self.transcript.append(draft).clone();
        debug!(
            "Meeting {} entry #{} {} by {}",
            self.id,
            entry.sequence,
            entry.kind.as_str(),
            entry.speaker
        );
        self.events.publish(EventKind::EntryAppended { entry });
    }

    /// Publish one event per transition, plus the moderator's scripted entries.
    fn apply(&mut self, transitions: Vec<Transition>) {
        for transition in transitions {
            match transition {
                Transition::PhaseEntered(phase) => {
                    self.events.publish(EventKind::PhaseChanged { phase });
                    if phase == Phase::Introduction && self.moderator.announces_opening() {
                        let draft = self.moderator.opening_draft(&self.config.topic, &self.roster);
                        self.append(draft);
                    }
                }
                Transition::TurnStarted(turn) => {
                    if let Turn::Discuss { round, speaker: 0 } = turn {
                        let draft = self.moderator.framing_draft(round, &self.config.topic);
                        self.append(draft);
                    }
                    let speaker = self.speaker_id(turn).unwrap_or_default();
                    self.events.publish(EventKind::TurnStarted {
                        speaker,
                        round: turn.round(),
                    });
                }
                Transition::Paused => {
                    self.events.publish(EventKind::SessionPaused);
                }
                Transition::Resumed => {
                    self.events.publish(EventKind::SessionResumed);
                }
                Transition::Completed => {
                    self.mark_ended();
                    info!(
                        "Meeting {} completed with {} entries ({} failed turn(s))",
                        self.id,
                        self.transcript.len(),
                        self.failed_turns.len()
                    );
                    self.events.publish(EventKind::SessionCompleted {
                        summary: self.summary.clone().unwrap_or_default(),
                    });
                }
                Transition::Failed(reason) => {
                    self.mark_ended();
                    self.events.publish(EventKind::SessionFailed { reason });
                }
            }
        }
    }

    fn mark_ended(&mut self) {
        self.ended_at = Some(Utc::now());
        self.ended = Some(Instant::now());
    }
}

fn entry_draft(agent: &AgentProfile, turn: Turn, kind: EntryKind, text: String) -> EntryDraft {
    EntryDraft {
        speaker: agent.id.clone(),
        speaker_name: agent.name.clone(),
        speaker_title: agent.title.clone(),
        phase: turn.phase(),
        round: turn.round(),
        kind,
        text,
    }
}

/// Shared, independently locked handle to one session.
#[derive(Clone)]
pub struct SessionHandle {
    id: Uuid,
    inner: Arc<Mutex<MeetingSession>>,
    wake: Arc<Notify>,
}

impl SessionHandle {
    pub fn new(session: MeetingSession) -> Self {
        Self {
            id: session.id(),
            inner: Arc::new(Mutex::new(session)),
            wake: Arc::new(Notify::new()),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub async fn lock(&self) -> MutexGuard<'_, MeetingSession> {
        self.inner.lock().await
    }

    /// Wake the runner. A wake-up sent while it is busy is kept for its next wait.
    pub fn wake(&self) {
        self.wake.notify_one();
    }

    pub(crate) async fn woken(&self) {
        self.wake.notified().await
    }

    pub async fn snapshot(&self) -> SessionSnapshot {
        self.lock().await.snapshot()
    }

    pub async fn subscribe(&self) -> (SessionSnapshot, broadcast::Receiver<MeetingEvent>) {
        self.lock().await.subscribe()
    }

    pub async fn summary(&self) -> SessionSummary {
        self.lock().await.summary()
    }

    pub async fn control(&self, token: &str, command: ControlCommand) -> MeetingResult<ControlAck> {
        let ack = self.lock().await.control(token, command)?;
        self.wake();
        Ok(ack)
    }

    pub async fn heartbeat(&self, token: &str) -> MeetingResult<()> {
        self.lock().await.heartbeat(token)
    }

    pub async fn page(&self, offset: usize, limit: usize) -> (Vec<TranscriptEntry>, usize) {
        let session = self.lock().await;
        let transcript = session.transcript();
        (transcript.page(offset, limit).to_vec(), transcript.len())
    }

    pub async fn export(&self, format: ExportFormat) -> String {
        self.lock().await.export(format)
    }
}
