//! The room aggregate.
//!
//! A [`Room`] never performs I/O: every operation validates its preconditions,
//! mutates the room and returns the messages to fan out together with the
//! audience they are meant for. Timers and persistence live in the services.

use std::{
    collections::BTreeMap,
    time::{Duration, SystemTime},
};

use indexmap::IndexMap;
use thiserror::Error;
use tokio::time::Instant;
use uuid::Uuid;

use crate::{
    dao::models::AnswerValue,
    dto::{
        format_system_time,
        phase::VisibleRoomStatus,
        room::{
            LeaderboardEntry, PlayerQuestionResult, PlayerSummary, QuestionPrompt, QuizSummary,
            RoomSettingsSummary, RoomSnapshot, RoomSummary,
        },
        ws::{
            AnswerSubmittedEvent, ChatEvent, HostChangedEvent, NewQuestionEvent, PlayerJoinedEvent,
            PlayerLeftEvent, QuestionResultsEvent, QuizFinishedEvent, RoomJoinedEvent,
            ServerMessage,
        },
    },
    state::{
        connections::UserProfile,
        quiz::{Quiz, RoomSettings},
        scoring::{normalize_answer, option_letter, settle_question},
        state_machine::{
            InvalidTransition, RoomEvent, RoomPhase, RoomStateMachine, RoundPhase, RoundTicket,
        },
    },
};

/// Minimum number of players required to start a match.
pub const MIN_PLAYERS_TO_START: usize = 2;

/// A submitted answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    /// Raw value as sent by the client.
    pub value: AnswerValue,
    /// Seconds taken, clamped to the question window.
    pub time_spent: f64,
    /// Wall clock time of the submission.
    pub submitted_at: SystemTime,
}

/// Room-scoped view of a player.
#[derive(Debug, Clone)]
pub struct Player {
    /// Profile snapshot taken at join time; level and xp are display only.
    pub profile: UserProfile,
    /// Connection the player plays from.
    pub connection_id: Uuid,
    /// Wall clock join time.
    pub joined_at: SystemTime,
    /// Answers of this player, mirrored from the room-wide log.
    pub answers: BTreeMap<usize, Answer>,
    /// Number of questions answered correctly.
    pub correct_answers: u32,
}

impl Player {
    fn new(profile: UserProfile, connection_id: Uuid, joined_at: SystemTime) -> Self {
        Self {
            profile,
            connection_id,
            joined_at,
            answers: BTreeMap::new(),
            correct_answers: 0,
        }
    }
}

/// Who should receive an outbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    /// Every player currently in the room.
    Room,
    /// Every player except the given one.
    AllExcept(String),
    /// A single player.
    Player(String),
}

/// A message produced by a room operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Outbound {
    /// Recipients.
    pub audience: Audience,
    /// Frame to deliver.
    pub message: ServerMessage,
}

impl Outbound {
    fn room(message: ServerMessage) -> Self {
        Self {
            audience: Audience::Room,
            message,
        }
    }
}

/// Rejections of client actions against a room.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RoomError {
    #[error("the quiz has already started")]
    AlreadyStarted,
    #[error("the quiz has already finished")]
    AlreadyFinished,
    #[error("you are already in this room")]
    AlreadyMember,
    #[error("room is full ({max} players)")]
    RoomFull { max: usize },
    #[error("you are not in this room")]
    NotMember,
    #[error("only the host can start the quiz")]
    NotHost,
    #[error("at least {required} players are needed to start (currently {present})")]
    NotEnoughPlayers { present: usize, required: usize },
    #[error("the selected quiz has no questions")]
    NoQuestions,
    #[error("the quiz is not in progress")]
    NotInProgress,
    #[error("question {} is closed", .question_index + 1)]
    QuestionClosed { question_index: usize },
    #[error("you already answered question {}", .question_index + 1)]
    AlreadyAnswered { question_index: usize },
    #[error("chat message must not be empty")]
    EmptyMessage,
    #[error(transparent)]
    Transition(#[from] InvalidTransition),
}

/// Messages of an operation that does not drive the round flow.
pub type Broadcast = Vec<Outbound>;

/// Result of opening a question.
#[derive(Debug)]
pub struct RoundOpened {
    /// `new_question` broadcast.
    pub outbound: Vec<Outbound>,
    /// Ticket of the open question.
    pub ticket: RoundTicket,
    /// Answer window.
    pub time_limit: Duration,
}

/// Result of an accepted answer.
#[derive(Debug)]
pub struct AnswerAccepted {
    /// `answer_submitted` broadcast.
    pub outbound: Vec<Outbound>,
    /// Set when every present player has now answered the open question.
    pub completed_round: Option<RoundTicket>,
}

/// Result of a player leaving.
#[derive(Debug)]
pub struct PlayerDeparted {
    /// Membership and host change broadcasts.
    pub outbound: Vec<Outbound>,
    /// Removed player.
    pub player: Player,
    /// Whether the room became empty and must be deleted.
    pub dissolved: bool,
    /// Set when the departure means every remaining player has answered.
    pub completed_round: Option<RoundTicket>,
}

/// Result of settling the open question.
#[derive(Debug)]
pub struct QuestionClosed {
    /// `question_results` broadcast.
    pub outbound: Vec<Outbound>,
    /// Ticket of the results phase that follows.
    pub ticket: RoundTicket,
}

/// Final placement of one player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Standing {
    /// 1-based rank.
    pub rank: usize,
    /// Player identity.
    pub player_id: String,
    /// Final room score.
    pub score: u32,
}

/// Result of the match ending.
#[derive(Debug)]
pub struct MatchFinished {
    /// `quiz_finished` broadcast.
    pub outbound: Vec<Outbound>,
    /// Ranking used for rewards.
    pub standings: Vec<Standing>,
}

/// What happened when a results phase elapsed.
#[derive(Debug)]
pub enum Advanced {
    /// The next question opened.
    NextRound(RoundOpened),
    /// The last question was played.
    Finished(MatchFinished),
}

/// One multiplayer match instance.
#[derive(Debug)]
pub struct Room {
    id: String,
    host_id: String,
    settings: RoomSettings,
    machine: RoomStateMachine,
    quiz: Quiz,
    current_question_index: usize,
    question_started_at: Option<Instant>,
    started_at: Option<Instant>,
    players: IndexMap<String, Player>,
    answers_by_question: BTreeMap<usize, IndexMap<String, Answer>>,
    scores: IndexMap<String, u32>,
    created_at: SystemTime,
}

impl Room {
    /// Build a waiting room with `host` as its only player.
    ///
    /// The quiz is truncated to `settings.question_count` questions.
    pub fn new(
        id: String,
        host: UserProfile,
        host_connection: Uuid,
        quiz: Quiz,
        settings: RoomSettings,
        now: SystemTime,
    ) -> Self {
        let host_id = host.id.clone();
        let mut players = IndexMap::new();
        players.insert(host_id.clone(), Player::new(host, host_connection, now));
        let mut scores = IndexMap::new();
        scores.insert(host_id.clone(), 0);
        Self {
            id,
            host_id,
            settings,
            machine: RoomStateMachine::new(),
            quiz: quiz.truncated(settings.question_count),
            current_question_index: 0,
            question_started_at: None,
            started_at: None,
            players,
            answers_by_question: BTreeMap::new(),
            scores,
            created_at: now,
        }
    }

    /// Room code.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current host.
    pub fn host_id(&self) -> &str {
        &self.host_id
    }

    /// Settings fixed at creation.
    pub fn settings(&self) -> RoomSettings {
        self.settings
    }

    /// Quiz, already truncated to the question count.
    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    /// Lifecycle phase.
    pub fn phase(&self) -> RoomPhase {
        self.machine.phase()
    }

    /// Public status (`waiting`, `in_progress`, `finished`).
    pub fn status(&self) -> VisibleRoomStatus {
        VisibleRoomStatus::from(&self.machine.phase())
    }

    /// Index of the open or last settled question.
    pub fn current_question_index(&self) -> usize {
        self.current_question_index
    }

    /// Present players in join order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Present player by id.
    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.get(player_id)
    }

    /// Number of present players.
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Whether every player left.
    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Score of a player, including players who left.
    pub fn score(&self, player_id: &str) -> Option<u32> {
        self.scores.get(player_id).copied()
    }

    /// All scores, in join order.
    pub fn scores(&self) -> &IndexMap<String, u32> {
        &self.scores
    }

    /// Answers recorded for question `index`.
    pub fn answers_for(&self, index: usize) -> Option<&IndexMap<String, Answer>> {
        self.answers_by_question.get(&index)
    }

    /// Creation time.
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Connection ids targeted by `audience`.
    pub fn recipients(&self, audience: &Audience) -> Vec<Uuid> {
        match audience {
            Audience::Room => self.players.values().map(|p| p.connection_id).collect(),
            Audience::AllExcept(excluded) => self
                .players
                .values()
                .filter(|p| &p.profile.id != excluded)
                .map(|p| p.connection_id)
                .collect(),
            Audience::Player(id) => self
                .players
                .get(id)
                .map(|p| vec![p.connection_id])
                .unwrap_or_default(),
        }
    }

    /// Add a player to a waiting room.
    pub fn join(
        &mut self,
        profile: UserProfile,
        connection_id: Uuid,
        now: SystemTime,
    ) -> Result<Broadcast, RoomError> {
        match self.machine.phase() {
            RoomPhase::Waiting => {}
            RoomPhase::InProgress(_) => return Err(RoomError::AlreadyStarted),
            RoomPhase::Finished => return Err(RoomError::AlreadyFinished),
        }
        if self.players.contains_key(&profile.id) {
            return Err(RoomError::AlreadyMember);
        }
        if self.players.len() >= self.settings.max_players {
            return Err(RoomError::RoomFull {
                max: self.settings.max_players,
            });
        }

        let player_id = profile.id.clone();
        self.players
            .insert(player_id.clone(), Player::new(profile, connection_id, now));
        self.scores.entry(player_id.clone()).or_insert(0);

        let players = self.player_summaries();
        let player = players
            .iter()
            .find(|summary| summary.id == player_id)
            .cloned()
            .ok_or(RoomError::NotMember)?;
        Ok(vec![
            Outbound {
                audience: Audience::Player(player_id.clone()),
                message: ServerMessage::RoomJoined(RoomJoinedEvent {
                    room: self.snapshot(),
                }),
            },
            Outbound {
                audience: Audience::AllExcept(player_id),
                message: ServerMessage::PlayerJoined(PlayerJoinedEvent {
                    player,
                    player_count: players.len(),
                    players,
                }),
            },
        ])
    }

    /// Remove a player, in any phase.
    ///
    /// The host role moves to the earliest remaining joiner. The removed
    /// player's score and answers stay recorded.
    pub fn leave(&mut self, player_id: &str) -> Result<PlayerDeparted, RoomError> {
        let player = self
            .players
            .shift_remove(player_id)
            .ok_or(RoomError::NotMember)?;

        if self.players.is_empty() {
            return Ok(PlayerDeparted {
                outbound: Vec::new(),
                player,
                dissolved: true,
                completed_round: None,
            });
        }

        let mut outbound = Vec::new();
        if self.host_id == player_id {
            if let Some(next_host) = self.players.values().next() {
                self.host_id = next_host.profile.id.clone();
                outbound.push(Outbound::room(ServerMessage::HostChanged(
                    HostChangedEvent {
                        new_host_id: next_host.profile.id.clone(),
                        new_host_name: next_host.profile.name.clone(),
                    },
                )));
            }
        }

        let players = self.player_summaries();
        outbound.push(Outbound::room(ServerMessage::PlayerLeft(PlayerLeftEvent {
            player_id: player.profile.id.clone(),
            player_name: player.profile.name.clone(),
            player_count: players.len(),
            players,
        })));

        Ok(PlayerDeparted {
            outbound,
            player,
            dissolved: false,
            completed_round: self.all_answered(),
        })
    }

    /// Whether `player_id` may start the match right now.
    pub fn can_start(&self, player_id: &str) -> Result<(), RoomError> {
        if !self.players.contains_key(player_id) {
            return Err(RoomError::NotMember);
        }
        if self.host_id != player_id {
            return Err(RoomError::NotHost);
        }
        match self.machine.phase() {
            RoomPhase::Waiting => {}
            RoomPhase::InProgress(_) => return Err(RoomError::AlreadyStarted),
            RoomPhase::Finished => return Err(RoomError::AlreadyFinished),
        }
        if self.players.len() < MIN_PLAYERS_TO_START {
            return Err(RoomError::NotEnoughPlayers {
                present: self.players.len(),
                required: MIN_PLAYERS_TO_START,
            });
        }
        if self.quiz.is_empty() {
            return Err(RoomError::NoQuestions);
        }
        Ok(())
    }

    /// Start the match and open the first question.
    pub fn start(&mut self, player_id: &str, now: Instant) -> Result<RoundOpened, RoomError> {
        self.can_start(player_id)?;
        self.machine.apply(RoomEvent::Start, self.quiz.len())?;

        self.scores = self.players.keys().map(|id| (id.clone(), 0)).collect();
        self.answers_by_question.clear();
        for player in self.players.values_mut() {
            player.answers.clear();
            player.correct_answers = 0;
        }
        self.current_question_index = 0;
        self.started_at = Some(now);
        self.open_round(now)
    }

    fn open_round(&mut self, now: Instant) -> Result<RoundOpened, RoomError> {
        let index = self.current_question_index;
        let ticket = self.machine.ticket().ok_or(RoomError::NotInProgress)?;
        let question = self
            .quiz
            .questions
            .get(index)
            .ok_or(RoomError::NotInProgress)?;
        self.question_started_at = Some(now);

        let time_limit = self.settings.time_per_question;
        let prompt = QuestionPrompt {
            question: question.text.clone(),
            options: question.options.clone(),
            question_number: index + 1,
            total_questions: self.quiz.len(),
        };
        Ok(RoundOpened {
            outbound: vec![Outbound::room(ServerMessage::NewQuestion(
                NewQuestionEvent {
                    question_index: index,
                    question: prompt,
                    time_limit: time_limit.as_secs(),
                },
            ))],
            ticket,
            time_limit,
        })
    }

    /// Record `player_id`'s answer to the open question.
    ///
    /// The reported time is clamped to the answer window; when absent, the
    /// time elapsed since the question opened is used.
    pub fn submit_answer(
        &mut self,
        player_id: &str,
        value: AnswerValue,
        reported_time: Option<f64>,
        now: Instant,
        wall_clock: SystemTime,
    ) -> Result<AnswerAccepted, RoomError> {
        if !self.players.contains_key(player_id) {
            return Err(RoomError::NotMember);
        }
        let index = match self.machine.phase() {
            RoomPhase::InProgress(RoundPhase::Question { index }) => index,
            RoomPhase::InProgress(RoundPhase::Results { index }) => {
                return Err(RoomError::QuestionClosed {
                    question_index: index,
                });
            }
            RoomPhase::Waiting | RoomPhase::Finished => return Err(RoomError::NotInProgress),
        };
        if self
            .answers_by_question
            .get(&index)
            .is_some_and(|answers| answers.contains_key(player_id))
        {
            return Err(RoomError::AlreadyAnswered {
                question_index: index,
            });
        }

        let limit = self.settings.time_per_question.as_secs_f64();
        let measured = self
            .question_started_at
            .map(|started| now.saturating_duration_since(started).as_secs_f64())
            .unwrap_or(limit);
        let time_spent = reported_time
            .filter(|t| t.is_finite())
            .unwrap_or(measured)
            .clamp(0.0, limit);
        let answer = Answer {
            value,
            time_spent,
            submitted_at: wall_clock,
        };

        self.answers_by_question
            .entry(index)
            .or_default()
            .insert(player_id.to_owned(), answer.clone());
        let player = self
            .players
            .get_mut(player_id)
            .ok_or(RoomError::NotMember)?;
        player.answers.insert(index, answer);
        let player_name = player.profile.name.clone();

        let answered_count = self.answered_count(index);
        Ok(AnswerAccepted {
            outbound: vec![Outbound::room(ServerMessage::AnswerSubmitted(
                AnswerSubmittedEvent {
                    player_id: player_id.to_owned(),
                    player_name,
                    answered_count,
                    total_players: self.players.len(),
                },
            ))],
            completed_round: self.all_answered(),
        })
    }

    fn answered_count(&self, index: usize) -> usize {
        self.answers_by_question
            .get(&index)
            .map(|answers| {
                self.players
                    .keys()
                    .filter(|id| answers.contains_key(*id))
                    .count()
            })
            .unwrap_or(0)
    }

    /// Ticket of the open question when every present player has answered it.
    fn all_answered(&self) -> Option<RoundTicket> {
        let RoomPhase::InProgress(RoundPhase::Question { index }) = self.machine.phase() else {
            return None;
        };
        if !self.players.is_empty() && self.answered_count(index) == self.players.len() {
            self.machine.ticket()
        } else {
            None
        }
    }

    /// Settle the question designated by `ticket`.
    ///
    /// Returns `None` when the ticket is stale: the question was already
    /// closed by the other trigger, or the room moved on.
    pub fn close_question(&mut self, ticket: RoundTicket) -> Option<QuestionClosed> {
        if !self.machine.is_current(ticket) {
            return None;
        }
        let RoomPhase::InProgress(RoundPhase::Question { index }) = self.machine.phase() else {
            return None;
        };
        self.machine
            .apply(RoomEvent::CloseQuestion, self.quiz.len())
            .ok()?;
        self.question_started_at = None;

        let question = self.quiz.questions.get(index)?;
        let empty = IndexMap::new();
        let answers = self.answers_by_question.get(&index).unwrap_or(&empty);
        let outcomes = settle_question(
            question,
            self.settings.time_per_question,
            self.players.keys().map(String::as_str),
            answers,
        );

        let mut results = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            let total_score = {
                let score = self.scores.entry(outcome.player_id.clone()).or_insert(0);
                *score += outcome.points;
                *score
            };
            let Some(player) = self.players.get_mut(&outcome.player_id) else {
                continue;
            };
            if outcome.is_correct {
                player.correct_answers += 1;
            }
            results.push(PlayerQuestionResult {
                player_id: outcome.player_id,
                player_name: player.profile.name.clone(),
                answer: outcome.answer,
                time_spent: outcome.time_spent,
                is_correct: outcome.is_correct,
                points: outcome.points,
                total_score,
            });
        }

        let correct_answer = normalize_answer(&question.correct_answer, &question.options);
        let event = QuestionResultsEvent {
            question_index: index,
            correct_answer,
            correct_letter: correct_answer.map(option_letter),
            explanation: question.explanation.clone(),
            results,
            leaderboard: self.leaderboard(),
        };
        Some(QuestionClosed {
            outbound: vec![Outbound::room(ServerMessage::QuestionResults(event))],
            ticket: self.machine.ticket()?,
        })
    }

    /// Leave the results phase designated by `ticket`: open the next question
    /// or finish the match.
    pub fn advance(&mut self, ticket: RoundTicket, now: Instant) -> Option<Advanced> {
        if !self.machine.is_current(ticket) {
            return None;
        }
        let RoomPhase::InProgress(RoundPhase::Results { index }) = self.machine.phase() else {
            return None;
        };

        if index + 1 < self.quiz.len() {
            self.machine
                .apply(RoomEvent::NextQuestion, self.quiz.len())
                .ok()?;
            self.current_question_index = index + 1;
            return self.open_round(now).ok().map(Advanced::NextRound);
        }

        self.machine
            .apply(RoomEvent::Finish, self.quiz.len())
            .ok()?;
        let leaderboard = self.leaderboard();
        let standings = leaderboard
            .iter()
            .map(|entry| Standing {
                rank: entry.rank,
                player_id: entry.player_id.clone(),
                score: entry.score,
            })
            .collect();
        let duration = self
            .started_at
            .map(|started| now.saturating_duration_since(started).as_secs())
            .unwrap_or_default();
        Some(Advanced::Finished(MatchFinished {
            outbound: vec![Outbound::room(ServerMessage::QuizFinished(
                QuizFinishedEvent {
                    leaderboard,
                    total_questions: self.quiz.len(),
                    duration,
                },
            ))],
            standings,
        }))
    }

    /// Relay a chat line from a member.
    pub fn chat(
        &self,
        player_id: &str,
        message: &str,
        now: SystemTime,
    ) -> Result<Broadcast, RoomError> {
        let player = self.players.get(player_id).ok_or(RoomError::NotMember)?;
        let message = message.trim();
        if message.is_empty() {
            return Err(RoomError::EmptyMessage);
        }
        Ok(vec![Outbound::room(ServerMessage::ChatMessage(ChatEvent {
            player_id: player_id.to_owned(),
            player_name: player.profile.name.clone(),
            message: message.to_owned(),
            timestamp: format_system_time(now),
        }))])
    }

    /// Present players ranked by score, ties broken by join order.
    pub fn leaderboard(&self) -> Vec<LeaderboardEntry> {
        let mut ranked: Vec<&Player> = self.players.values().collect();
        // stable sort keeps join order among equal scores
        ranked.sort_by_key(|player| std::cmp::Reverse(self.score_of(&player.profile.id)));
        ranked
            .into_iter()
            .enumerate()
            .map(|(position, player)| LeaderboardEntry {
                rank: position + 1,
                player_id: player.profile.id.clone(),
                player_name: player.profile.name.clone(),
                score: self.score_of(&player.profile.id),
                correct_answers: player.correct_answers,
            })
            .collect()
    }

    fn score_of(&self, player_id: &str) -> u32 {
        self.scores.get(player_id).copied().unwrap_or(0)
    }

    fn player_summaries(&self) -> Vec<PlayerSummary> {
        self.players
            .values()
            .map(|player| PlayerSummary {
                id: player.profile.id.clone(),
                name: player.profile.name.clone(),
                level: player.profile.level,
                xp: player.profile.xp,
                is_host: player.profile.id == self.host_id,
                score: self.score_of(&player.profile.id),
                joined_at: format_system_time(player.joined_at),
            })
            .collect()
    }

    /// Full state as sent on create/join and by the status endpoint.
    pub fn snapshot(&self) -> RoomSnapshot {
        let players = self.player_summaries();
        RoomSnapshot {
            id: self.id.clone(),
            host_id: self.host_id.clone(),
            status: self.status(),
            settings: RoomSettingsSummary {
                max_players: self.settings.max_players,
                time_per_question: self.settings.time_per_question.as_secs(),
                question_count: self.settings.question_count,
            },
            quiz: QuizSummary {
                id: self.quiz.id.clone(),
                title: self.quiz.title.clone(),
                total_questions: self.quiz.len(),
            },
            player_count: players.len(),
            players,
            current_question_index: self.current_question_index,
            created_at: format_system_time(self.created_at),
        }
    }

    /// Listing entry.
    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id.clone(),
            host_name: self
                .players
                .get(&self.host_id)
                .map(|host| host.profile.name.clone())
                .unwrap_or_default(),
            quiz_title: self.quiz.title.clone(),
            total_questions: self.quiz.len(),
            player_count: self.players.len(),
            max_players: self.settings.max_players,
            created_at: format_system_time(self.created_at),
        }
    }
}
