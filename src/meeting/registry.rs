//! Live sessions by id.
//!
//! The map lock only guards insertion, lookup and removal; each session has
//! its own lock, so one meeting never waits on another.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::agents::AgentProfileStore;
use crate::completion::CompletionGateway;

use super::error::{MeetingError, MeetingResult};
use super::runner::run_session;
use super::session::{MeetingSession, SessionHandle, SessionSummary};
use super::settings::EngineSettings;
use super::setup::MeetingConfig;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartedMeeting {
    pub session_id: Uuid,
    /// Secret required for pause, resume, stop, skip and conclude.
    pub control_token: String,
}

pub struct MeetingRegistry {
    profiles: Arc<AgentProfileStore>,
    gateway: Arc<dyn CompletionGateway>,
    settings: Arc<EngineSettings>,
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
}

impl MeetingRegistry {
    pub fn new(
        profiles: Arc<AgentProfileStore>,
        gateway: Arc<dyn CompletionGateway>,
        settings: Arc<EngineSettings>,
    ) -> Self {
        Self {
            profiles,
            gateway,
            settings,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn profiles(&self) -> &AgentProfileStore {
        &self.profiles
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn gateway_name(&self) -> &'static str {
        self.gateway.name()
    }

    /// Validate `config`, create the session and spawn its runner.
    pub async fn start(&self, config: MeetingConfig) -> MeetingResult<StartedMeeting> {
        let scenarios = self.settings.scenario_names();
        let roster = config.validate(&self.profiles, self.settings.max_rounds, &scenarios)?;

        let session_id = Uuid::new_v4();
        let mut session = MeetingSession::new(session_id, config, roster, &self.settings);
        session.start()?;
        let control_token = session.control_token().to_string();

        let handle = SessionHandle::new(session);
        self.sessions.write().await.insert(session_id, handle.clone());

        tokio::spawn(run_session(
            handle,
            Arc::clone(&self.gateway),
            Arc::clone(&self.settings),
        ));

        Ok(StartedMeeting {
            session_id,
            control_token,
        })
    }

    pub async fn get(&self, session_id: Uuid) -> MeetingResult<SessionHandle> {
        self.sessions
            .read()
            .await
            .get(&session_id)
            .cloned()
            .ok_or(MeetingError::SessionNotFound(session_id))
    }

    /// Summaries of every retained session, oldest first.
    pub async fn list(&self) -> Vec<SessionSummary> {
        let handles: Vec<SessionHandle> = self.sessions.read().await.values().cloned().collect();

        let mut summaries = Vec::with_capacity(handles.len());
        for handle in handles {
            summaries.push(handle.summary().await);
        }
        summaries.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.session_id.cmp(&b.session_id))
        });
        summaries
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Drop sessions that ended more than the retention period ago and have
    /// no observers left. Returns how many were removed.
    pub async fn sweep(&self) -> usize {
        let handles: Vec<SessionHandle> = self.sessions.read().await.values().cloned().collect();

        let mut expired = Vec::new();
        for handle in handles {
            let session = handle.lock().await;
            let past_retention = session
                .ended_for()
                .is_some_and(|elapsed| elapsed >= self.settings.retention);
            if past_retention && session.observer_count() == 0 {
                expired.push(handle.id());
            }
        }

        if expired.is_empty() {
            return 0;
        }

        let mut sessions = self.sessions.write().await;
        for id in &expired {
            sessions.remove(id);
            debug!("Released meeting {}", id);
        }
        info!("Released {} ended meeting(s)", expired.len());
        expired.len()
    }
}
