use thiserror::Error;

/// High-level phases a room can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomPhase {
    /// Lobby: players join, the host configures and starts the match.
    Waiting,
    /// A match is running and is in one of the round sub-phases.
    InProgress(RoundPhase),
    /// Final standings are known; terminal.
    Finished,
}

/// Fine-grained phase of the current round while the match is running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// The question at `index` is open for answers.
    Question {
        /// Zero-based question index.
        index: usize,
    },
    /// The question at `index` has been settled and its results are displayed.
    Results {
        /// Zero-based question index.
        index: usize,
    },
}

/// Events that can be applied to the room state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoomEvent {
    /// Host starts the match; the first question opens.
    Start,
    /// Every present player answered or the question timer elapsed.
    CloseQuestion,
    /// Results were shown; the following question opens.
    NextQuestion,
    /// Results of the last question were shown; the match ends.
    Finish,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The phase the state machine was in when the invalid event was received.
    pub from: RoomPhase,
    /// The event that cannot be applied from this phase.
    pub event: RoomEvent,
}

/// Identifies one open question (or results display) of one room.
///
/// Timers and early-completion triggers carry the ticket of the phase they were
/// scheduled for; once the phase moved on the ticket no longer matches and the
/// trigger becomes a no-op. This is what makes every question settle once.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RoundTicket {
    /// Question the trigger belongs to.
    pub question_index: usize,
    /// State machine version at scheduling time.
    pub version: usize,
}

/// Room lifecycle: `Waiting → InProgress(Question ⇄ Results) → Finished`.
#[derive(Debug, Clone)]
pub struct RoomStateMachine {
    phase: RoomPhase,
    version: usize,
}

impl Default for RoomStateMachine {
    fn default() -> Self {
        Self {
            phase: RoomPhase::Waiting,
            version: 0,
        }
    }
}

impl RoomStateMachine {
    /// Create a new state machine initialised in the waiting state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inspect the current phase.
    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    /// Number of transitions applied so far.
    pub fn version(&self) -> usize {
        self.version
    }

    /// Ticket for the current round phase, if a match is running.
    pub fn ticket(&self) -> Option<RoundTicket> {
        match self.phase {
            RoomPhase::InProgress(RoundPhase::Question { index })
            | RoomPhase::InProgress(RoundPhase::Results { index }) => Some(RoundTicket {
                question_index: index,
                version: self.version,
            }),
            _ => None,
        }
    }

    /// Whether `ticket` still designates the current phase.
    pub fn is_current(&self, ticket: RoundTicket) -> bool {
        self.ticket() == Some(ticket)
    }

    /// Apply `event`, returning the new phase.
    ///
    /// `total_questions` bounds `NextQuestion`; advancing past the last question
    /// must go through `Finish`.
    pub fn apply(
        &mut self,
        event: RoomEvent,
        total_questions: usize,
    ) -> Result<RoomPhase, InvalidTransition> {
        let next = self.compute_transition(event, total_questions)?;
        self.phase = next;
        self.version += 1;
        Ok(next)
    }

    /// Compute a transition from an event if the transition is valid.
    fn compute_transition(
        &self,
        event: RoomEvent,
        total_questions: usize,
    ) -> Result<RoomPhase, InvalidTransition> {
        let next = match (self.phase, event) {
            (RoomPhase::Waiting, RoomEvent::Start) if total_questions > 0 => {
                RoomPhase::InProgress(RoundPhase::Question { index: 0 })
            }
            (RoomPhase::InProgress(RoundPhase::Question { index }), RoomEvent::CloseQuestion) => {
                RoomPhase::InProgress(RoundPhase::Results { index })
            }
            (RoomPhase::InProgress(RoundPhase::Results { index }), RoomEvent::NextQuestion)
                if index + 1 < total_questions =>
            {
                RoomPhase::InProgress(RoundPhase::Question { index: index + 1 })
            }
            (RoomPhase::InProgress(RoundPhase::Results { index }), RoomEvent::Finish)
                if index + 1 >= total_questions =>
            {
                RoomPhase::Finished
            }
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(sm: &mut RoomStateMachine, event: RoomEvent, total: usize) -> RoomPhase {
        sm.apply(event, total).unwrap()
    }

    #[test]
    fn initial_state_is_waiting() {
        let sm = RoomStateMachine::new();
        assert_eq!(sm.phase(), RoomPhase::Waiting);
        assert_eq!(sm.ticket(), None);
    }

    #[test]
    fn full_happy_path_through_two_questions() {
        let mut sm = RoomStateMachine::new();

        assert_eq!(
            apply(&mut sm, RoomEvent::Start, 2),
            RoomPhase::InProgress(RoundPhase::Question { index: 0 })
        );
        assert_eq!(
            apply(&mut sm, RoomEvent::CloseQuestion, 2),
            RoomPhase::InProgress(RoundPhase::Results { index: 0 })
        );
        assert_eq!(
            apply(&mut sm, RoomEvent::NextQuestion, 2),
            RoomPhase::InProgress(RoundPhase::Question { index: 1 })
        );
        assert_eq!(
            apply(&mut sm, RoomEvent::CloseQuestion, 2),
            RoomPhase::InProgress(RoundPhase::Results { index: 1 })
        );
        assert_eq!(apply(&mut sm, RoomEvent::Finish, 2), RoomPhase::Finished);
        assert_eq!(sm.version(), 5);
    }

    #[test]
    fn cannot_skip_from_waiting_to_finished() {
        let mut sm = RoomStateMachine::new();
        let err = sm.apply(RoomEvent::Finish, 3).unwrap_err();
        assert_eq!(err.from, RoomPhase::Waiting);
        assert_eq!(err.event, RoomEvent::Finish);
    }

    #[test]
    fn start_requires_questions() {
        let mut sm = RoomStateMachine::new();
        assert!(sm.apply(RoomEvent::Start, 0).is_err());
        assert_eq!(sm.phase(), RoomPhase::Waiting);
    }

    #[test]
    fn next_question_is_refused_after_the_last_question() {
        let mut sm = RoomStateMachine::new();
        apply(&mut sm, RoomEvent::Start, 1);
        apply(&mut sm, RoomEvent::CloseQuestion, 1);
        assert!(sm.apply(RoomEvent::NextQuestion, 1).is_err());
        assert_eq!(apply(&mut sm, RoomEvent::Finish, 1), RoomPhase::Finished);
    }

    #[test]
    fn finish_is_refused_while_questions_remain() {
        let mut sm = RoomStateMachine::new();
        apply(&mut sm, RoomEvent::Start, 3);
        apply(&mut sm, RoomEvent::CloseQuestion, 3);
        assert!(sm.apply(RoomEvent::Finish, 3).is_err());
    }

    #[test]
    fn closing_twice_is_rejected() {
        let mut sm = RoomStateMachine::new();
        apply(&mut sm, RoomEvent::Start, 2);
        apply(&mut sm, RoomEvent::CloseQuestion, 2);
        assert!(sm.apply(RoomEvent::CloseQuestion, 2).is_err());
    }

    #[test]
    fn tickets_expire_after_a_transition() {
        let mut sm = RoomStateMachine::new();
        apply(&mut sm, RoomEvent::Start, 2);
        let ticket = sm.ticket().unwrap();
        assert!(sm.is_current(ticket));

        apply(&mut sm, RoomEvent::CloseQuestion, 2);
        assert!(!sm.is_current(ticket));
        assert_eq!(sm.ticket().unwrap().question_index, 0);
    }

    #[test]
    fn finished_is_terminal() {
        let mut sm = RoomStateMachine::new();
        apply(&mut sm, RoomEvent::Start, 1);
        apply(&mut sm, RoomEvent::CloseQuestion, 1);
        apply(&mut sm, RoomEvent::Finish, 1);
        for event in [
            RoomEvent::Start,
            RoomEvent::CloseQuestion,
            RoomEvent::NextQuestion,
            RoomEvent::Finish,
        ] {
            assert!(sm.apply(event, 1).is_err());
        }
    }
}
