//! Meeting agenda state machine.
//!
//! `Created → Introduction → Discussion(round, speaker) → Conclusion → Completed`,
//! with `paused` as an overlay on any non-terminal stage and `Failed` reachable
//! from anywhere. Every operation is a pure function of the current state and
//! returns the transitions it produced; the session turns each transition into
//! exactly one published event.

use super::error::{MeetingError, MeetingResult};
use super::status::{MeetingStatus, Phase, Stage, Turn};

/// A single observable state change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    PhaseEntered(Phase),
    TurnStarted(Turn),
    Completed,
    Paused,
    Resumed,
    Failed(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingState {
    stage: Stage,
    paused: bool,
    roster_len: usize,
    rounds: u32,
}

impl MeetingState {
    pub fn new(roster_len: usize, rounds: u32) -> Self {
        Self {
            stage: Stage::Created,
            paused: false,
            roster_len,
            rounds,
        }
    }

    pub fn stage(&self) -> &Stage {
        &self.stage
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn phase(&self) -> Option<Phase> {
        self.stage.phase()
    }

    pub fn status(&self) -> MeetingStatus {
        match self.stage {
            Stage::Completed => MeetingStatus::Completed,
            Stage::Failed { .. } => MeetingStatus::Failed,
            _ if self.paused => MeetingStatus::Paused,
            _ => MeetingStatus::Active,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status().is_terminal()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.stage {
            Stage::Failed { reason } => Some(reason),
            _ => None,
        }
    }

    /// The turn waiting to be generated, regardless of the paused flag.
    pub fn current_turn(&self) -> Option<Turn> {
        match self.stage {
            Stage::Introduction { speaker } => Some(Turn::Introduce { speaker }),
            Stage::Discussion { round, speaker } => Some(Turn::Discuss { round, speaker }),
            Stage::Conclusion => Some(Turn::Summarize),
            Stage::Created | Stage::Completed | Stage::Failed { .. } => None,
        }
    }

    /// The turn the runner may execute now.
    pub fn runnable_turn(&self) -> Option<Turn> {
        if self.paused {
            None
        } else {
            self.current_turn()
        }
    }

    /// `Created → Introduction(0)`.
    pub fn begin(&mut self) -> MeetingResult<Vec<Transition>> {
        if self.stage != Stage::Created {
            return Err(self.reject("start"));
        }
        if self.roster_len == 0 || self.rounds == 0 {
            return Err(MeetingError::Internal(format!(
                "cannot begin with roster of {} and {} rounds",
                self.roster_len, self.rounds
            )));
        }

        self.stage = Stage::Introduction { speaker: 0 };
        Ok(vec![
            Transition::PhaseEntered(Phase::Introduction),
            Transition::TurnStarted(Turn::Introduce { speaker: 0 }),
        ])
    }

    /// Move past `completed`, which must be the current turn.
    ///
    /// A second call for the same turn is rejected, so a duplicated
    /// completion can never produce two transitions.
    pub fn advance(&mut self, completed: Turn) -> MeetingResult<Vec<Transition>> {
        if self.paused || self.is_terminal() {
            return Err(self.reject("advance"));
        }
        if self.current_turn() != Some(completed) {
            return Err(MeetingError::invalid_transition(
                format!("complete turn {completed:?}"),
                self.stage.describe(),
            ));
        }

        match self.stage {
            Stage::Introduction { speaker } => {
                self.check_speaker(speaker)?;
                if speaker + 1 < self.roster_len {
                    let next = Turn::Introduce {
                        speaker: speaker + 1,
                    };
                    self.stage = Stage::Introduction {
                        speaker: speaker + 1,
                    };
                    Ok(vec![Transition::TurnStarted(next)])
                } else {
                    self.stage = Stage::Discussion {
                        round: 0,
                        speaker: 0,
                    };
                    Ok(vec![
                        Transition::PhaseEntered(Phase::Discussion),
                        Transition::TurnStarted(Turn::Discuss {
                            round: 0,
                            speaker: 0,
                        }),
                    ])
                }
            }
            Stage::Discussion { round, speaker } => {
                self.check_speaker(speaker)?;
                if round >= self.rounds {
                    return Err(MeetingError::Internal(format!(
                        "round {round} out of range for {} rounds",
                        self.rounds
                    )));
                }

                let (mut next_round, mut next_speaker) = (round, speaker + 1);
                if next_speaker == self.roster_len {
                    next_speaker = 0;
                    next_round += 1;
                }

                if next_round == self.rounds {
                    Ok(self.enter_conclusion())
                } else {
                    self.stage = Stage::Discussion {
                        round: next_round,
                        speaker: next_speaker,
                    };
                    Ok(vec![Transition::TurnStarted(Turn::Discuss {
                        round: next_round,
                        speaker: next_speaker,
                    })])
                }
            }
            Stage::Conclusion => {
                self.stage = Stage::Completed;
                Ok(vec![Transition::Completed])
            }
            Stage::Created | Stage::Completed | Stage::Failed { .. } => Err(self.reject("advance")),
        }
    }

    /// Skip the current turn without a contribution. The closing summary cannot be skipped.
    pub fn skip(&mut self) -> MeetingResult<(Turn, Vec<Transition>)> {
        match self.runnable_turn() {
            Some(Turn::Summarize) | None => Err(self.reject("skip turn")),
            Some(turn) => {
                let transitions = self.advance(turn)?;
                Ok((turn, transitions))
            }
        }
    }

    /// Wrap up early: jump from introductions or discussion straight to the summary.
    pub fn conclude(&mut self) -> MeetingResult<Vec<Transition>> {
        match self.stage {
            Stage::Introduction { .. } | Stage::Discussion { .. } if !self.paused => {
                Ok(self.enter_conclusion())
            }
            _ => Err(self.reject("conclude")),
        }
    }

    pub fn pause(&mut self) -> MeetingResult<Vec<Transition>> {
        if self.paused || self.is_terminal() {
            return Err(self.reject("pause"));
        }
        self.paused = true;
        Ok(vec![Transition::Paused])
    }

    pub fn resume(&mut self) -> MeetingResult<Vec<Transition>> {
        if !self.paused || self.is_terminal() {
            return Err(self.reject("resume"));
        }
        self.paused = false;
        Ok(vec![Transition::Resumed])
    }

    /// Force `Failed`. Terminal; a second abort is rejected.
    pub fn abort(&mut self, reason: impl Into<String>) -> MeetingResult<Vec<Transition>> {
        if self.is_terminal() {
            return Err(self.reject("abort"));
        }
        let reason = reason.into();
        self.stage = Stage::Failed {
            reason: reason.clone(),
        };
        self.paused = false;
        Ok(vec![Transition::Failed(reason)])
    }

    fn enter_conclusion(&mut self) -> Vec<Transition> {
        self.stage = Stage::Conclusion;
        vec![
            Transition::PhaseEntered(Phase::Conclusion),
            Transition::TurnStarted(Turn::Summarize),
        ]
    }

    fn check_speaker(&self, speaker: usize) -> MeetingResult<()> {
        if speaker >= self.roster_len {
            return Err(MeetingError::Internal(format!(
                "speaker index {speaker} out of range for roster of {}",
                self.roster_len
            )));
        }
        Ok(())
    }

    fn reject(&self, command: &str) -> MeetingError {
        let state = if self.paused {
            format!("paused in {}", self.stage.describe())
        } else {
            self.stage.describe()
        };
        MeetingError::invalid_transition(command, state)
    }
}
