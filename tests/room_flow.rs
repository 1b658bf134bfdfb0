//! Match flow driven through the orchestrator with a paused clock.

use std::{sync::Arc, time::Duration};

use quiz_arena_back::{
    config::{AppConfig, RoomDefaults, RoundTimings},
    dao::{
        arena_store::memory::MemoryArenaStore,
        models::{AnswerValue, MultiplayerStatsEntity, QuestionEntity, QuizEntity, UserProfileEntity},
    },
    dto::{
        phase::VisibleRoomStatus,
        ws::{ClientMessage, QuestionResultsEvent, QuizFinishedEvent, ServerMessage},
    },
    error::ServiceError,
    services::{
        gateway::{self, JwtVerifier, sign_token},
        public_service, room_service,
    },
    state::{AppState, SharedState, connections::ClientSession},
};
use tokio::{sync::mpsc::UnboundedReceiver, time::sleep};

const SECRET: &str = "integration-secret";

struct Harness {
    state: SharedState,
    store: MemoryArenaStore,
}

struct Client {
    session: ClientSession,
    rx: UnboundedReceiver<ServerMessage>,
}

impl Client {
    async fn send(&self, harness: &Harness, frame: &str) {
        let message = ClientMessage::from_json_str(frame).unwrap();
        room_service::handle_client_message(&harness.state, &self.session, message).await;
    }

    fn drain(&mut self) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(message) = self.rx.try_recv() {
            messages.push(message);
        }
        messages
    }
}

fn quiz(id: &str, questions: usize) -> QuizEntity {
    QuizEntity {
        id: id.into(),
        title: format!("Quiz {id}"),
        questions: (0..questions)
            .map(|i| QuestionEntity {
                question: format!("Question {}", i + 1),
                options: vec!["Alpha".into(), "Bravo".into(), "Charlie".into()],
                correct_answer: AnswerValue::Text("B".into()),
                explanation: Some("Bravo it is".into()),
            })
            .collect(),
    }
}

fn user(id: &str) -> UserProfileEntity {
    UserProfileEntity {
        id: id.into(),
        name: format!("Player {id}"),
        level: 1,
        xp: 0,
        badges: Vec::new(),
        multiplayer_stats: MultiplayerStatsEntity::default(),
    }
}

async fn harness() -> Harness {
    let config = AppConfig::new(
        RoomDefaults {
            max_players: 3,
            time_per_question: Duration::from_secs(30),
            question_count: 10,
        },
        RoundTimings {
            all_answered_grace: Duration::from_secs(1),
            results_display: Duration::from_secs(4),
            cleanup_delay: Duration::from_secs(300),
        },
    );
    let state = AppState::new(config, Arc::new(JwtVerifier::new(SECRET)));
    let store = MemoryArenaStore::new();
    store.insert_quiz(quiz("one", 1));
    store.insert_quiz(quiz("three", 3));
    store.insert_quiz(quiz("empty", 0));
    for id in ["u1", "u2", "u3", "u4", "u5"] {
        store.insert_profile(user(id));
    }
    state.install_arena_store(Arc::new(store.clone())).await;
    Harness { state, store }
}

async fn connect(harness: &Harness, user_id: &str) -> Client {
    let token = sign_token(SECRET, user_id, Duration::from_secs(3600)).unwrap();
    let profile = gateway::authenticate(&harness.state, &token).await.unwrap();
    let (session, rx) = harness.state.connections().register(profile);
    Client { session, rx }
}

/// Host `u1` creates a room on `quiz_id`; returns the room code.
async fn create_room(harness: &Harness, host: &mut Client, quiz_id: &str) -> String {
    host.send(
        harness,
        &format!(r#"{{"event":"create_room","data":{{"quizId":"{quiz_id}"}}}}"#),
    )
    .await;
    match host.drain().pop() {
        Some(ServerMessage::RoomCreated(event)) => event.room_id,
        other => panic!("expected room_created, got {other:?}"),
    }
}

async fn join(harness: &Harness, client: &Client, code: &str) {
    client
        .send(
            harness,
            &format!(r#"{{"event":"join_room","data":{{"roomId":"{code}"}}}}"#),
        )
        .await;
}

fn results(messages: &[ServerMessage]) -> Vec<&QuestionResultsEvent> {
    messages
        .iter()
        .filter_map(|message| match message {
            ServerMessage::QuestionResults(event) => Some(event),
            _ => None,
        })
        .collect()
}

fn finished(messages: &[ServerMessage]) -> Option<&QuizFinishedEvent> {
    messages.iter().find_map(|message| match message {
        ServerMessage::QuizFinished(event) => Some(event),
        _ => None,
    })
}

fn errors(messages: &[ServerMessage]) -> Vec<&str> {
    messages
        .iter()
        .filter_map(|message| match message {
            ServerMessage::Error(event) => Some(event.message.as_str()),
            _ => None,
        })
        .collect()
}

#[tokio::test(start_paused = true)]
async fn both_players_answering_closes_the_round_before_the_timer() {
    let harness = harness().await;
    let mut host = connect(&harness, "u1").await;
    let mut guest = connect(&harness, "u2").await;
    let code = create_room(&harness, &mut host, "one").await;
    join(&harness, &guest, &code).await;

    host.send(&harness, r#"{"event":"start_quiz","data":{}}"#).await;
    host.send(
        &harness,
        r#"{"event":"submit_answer","data":{"answer":"B","timeSpent":5}}"#,
    )
    .await;
    guest
        .send(
            &harness,
            r#"{"event":"submit_answer","data":{"answer":0,"timeSpent":30}}"#,
        )
        .await;

    // grace delay only, far below the 30 s question window
    sleep(Duration::from_millis(1500)).await;
    let host_messages = host.drain();
    let round = results(&host_messages);
    assert_eq!(round.len(), 1);
    assert_eq!(round[0].correct_answer, Some(1));
    assert_eq!(round[0].results[0].player_id, "u1");
    assert!(round[0].results[0].is_correct);
    assert_eq!(round[0].results[0].points, 917);
    assert!(!round[0].results[1].is_correct);
    assert_eq!(round[0].results[1].points, 0);
    assert_eq!(results(&guest.drain()).len(), 1);

    sleep(Duration::from_secs(5)).await;
    let final_board = host.drain();
    let finished = finished(&final_board).expect("quiz_finished");
    assert_eq!(finished.leaderboard[0].player_id, "u1");
    assert_eq!(finished.leaderboard[0].score, 917);
    assert_eq!(finished.total_questions, 1);

    // settlement runs in the background
    sleep(Duration::from_millis(10)).await;
    let winner = harness.store.profile("u1").unwrap();
    assert_eq!(winner.xp, 100);
    assert_eq!(winner.multiplayer_stats.wins, 1);
    assert_eq!(winner.badges, vec!["multiplayer_champion"]);
    let runner_up = harness.store.profile("u2").unwrap();
    assert_eq!(runner_up.xp, 75);
    assert_eq!(runner_up.multiplayer_stats.games_played, 1);
    assert_eq!(runner_up.multiplayer_stats.wins, 0);

    let stats = public_service::multiplayer_stats(&harness.state, "u1")
        .await
        .unwrap();
    assert_eq!(stats.win_rate, 100.0);
}

#[tokio::test(start_paused = true)]
async fn silent_player_is_scored_zero_and_match_still_finishes() {
    let harness = harness().await;
    let mut host = connect(&harness, "u1").await;
    let guest = connect(&harness, "u2").await;
    let code = create_room(&harness, &mut host, "three").await;
    join(&harness, &guest, &code).await;
    host.send(&harness, r#"{"event":"start_quiz","data":{}}"#).await;

    let answer = r#"{"event":"submit_answer","data":{"answer":"b"}}"#;
    host.send(&harness, answer).await;
    guest.send(&harness, answer).await;

    // question 2 opens 1 s (grace) + 4 s (results) later
    sleep(Duration::from_secs(6)).await;
    host.send(&harness, answer).await;

    // guest stays silent: the 30 s timer closes question 2
    sleep(Duration::from_secs(40)).await;
    host.send(&harness, answer).await;
    guest.send(&harness, answer).await;
    sleep(Duration::from_secs(10)).await;

    let messages = host.drain();
    let rounds = results(&messages);
    assert_eq!(rounds.len(), 3);
    assert_eq!(
        rounds.iter().map(|r| r.question_index).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
    let silent = rounds[1]
        .results
        .iter()
        .find(|result| result.player_id == "u2")
        .unwrap();
    assert!(!silent.is_correct);
    assert_eq!(silent.points, 0);
    assert_eq!(silent.answer, None);
    // server-measured: answered 1 s after question 2 opened
    let quick = rounds[1]
        .results
        .iter()
        .find(|result| result.player_id == "u1")
        .unwrap();
    assert_eq!(quick.points, 983);

    let finished = finished(&messages).expect("quiz_finished");
    assert_eq!(finished.leaderboard[0].player_id, "u1");
    assert_eq!(finished.leaderboard[0].correct_answers, 3);
    assert_eq!(finished.leaderboard[1].correct_answers, 2);

    let status = public_service::room_status(&harness.state, &code)
        .await
        .unwrap();
    assert_eq!(status.status, VisibleRoomStatus::Finished);
}

#[tokio::test(start_paused = true)]
async fn duplicate_answer_is_rejected_for_the_sender_only() {
    let harness = harness().await;
    let mut host = connect(&harness, "u1").await;
    let mut guest = connect(&harness, "u2").await;
    let third = connect(&harness, "u3").await;
    let code = create_room(&harness, &mut host, "one").await;
    join(&harness, &guest, &code).await;
    join(&harness, &third, &code).await;
    host.send(&harness, r#"{"event":"start_quiz","data":{}}"#).await;
    host.drain();
    guest.drain();

    guest
        .send(
            &harness,
            r#"{"event":"submit_answer","data":{"answer":"B","timeSpent":2}}"#,
        )
        .await;
    guest
        .send(
            &harness,
            r#"{"event":"submit_answer","data":{"answer":"A","timeSpent":1}}"#,
        )
        .await;

    let guest_messages = guest.drain();
    assert_eq!(errors(&guest_messages), vec!["you already answered question 1"]);
    assert!(errors(&host.drain()).is_empty());

    sleep(Duration::from_secs(31)).await;
    let round = host.drain();
    let round = results(&round);
    let guest_result = round[0]
        .results
        .iter()
        .find(|result| result.player_id == "u2")
        .unwrap();
    assert_eq!(guest_result.answer, Some(AnswerValue::Text("B".into())));
    assert_eq!(guest_result.points, 967);
}

#[tokio::test(start_paused = true)]
async fn host_leaving_waiting_room_hands_over_to_earliest_joiner() {
    let harness = harness().await;
    let mut host = connect(&harness, "u1").await;
    let mut second = connect(&harness, "u2").await;
    let third = connect(&harness, "u3").await;
    let code = create_room(&harness, &mut host, "three").await;
    join(&harness, &second, &code).await;
    join(&harness, &third, &code).await;
    second.drain();

    host.send(&harness, r#"{"event":"leave_room","data":{}}"#).await;
    assert!(matches!(
        host.drain().last(),
        Some(ServerMessage::LeftRoom(event)) if event.room_id == code
    ));

    let messages = second.drain();
    assert!(matches!(
        &messages[0],
        ServerMessage::HostChanged(event) if event.new_host_id == "u2"
    ));
    assert!(matches!(
        &messages[1],
        ServerMessage::PlayerLeft(event) if event.player_id == "u1" && event.player_count == 2
    ));

    let status = public_service::room_status(&harness.state, &code)
        .await
        .unwrap();
    assert_eq!(status.status, VisibleRoomStatus::Waiting);
    assert_eq!(status.host_id, "u2");
    let ids: Vec<_> = status.players.iter().map(|p| p.id.as_str()).collect();
    assert_eq!(ids, vec!["u2", "u3"]);

    // the new host can start
    second.send(&harness, r#"{"event":"start_quiz","data":{}}"#).await;
    assert!(matches!(
        second.drain().first(),
        Some(ServerMessage::NewQuestion(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn last_player_leaving_a_running_room_removes_it() {
    let harness = harness().await;
    let mut host = connect(&harness, "u1").await;
    let mut guest = connect(&harness, "u2").await;
    let code = create_room(&harness, &mut host, "three").await;
    join(&harness, &guest, &code).await;
    host.send(&harness, r#"{"event":"start_quiz","data":{}}"#).await;
    host.drain();

    // a disconnect counts as leaving
    room_service::handle_disconnect(&harness.state, &guest.session).await;
    host.send(&harness, r#"{"event":"leave_room","data":{}}"#).await;

    assert!(harness.state.rooms().get(&code).is_none());
    assert!(harness.state.rooms().is_empty());
    assert!(matches!(
        public_service::room_status(&harness.state, &code).await,
        Err(ServiceError::NotFound(_))
    ));

    assert!(matches!(
        host.drain().last(),
        Some(ServerMessage::LeftRoom(event)) if event.room_id == code
    ));

    sleep(Duration::from_secs(120)).await;
    let late = host.drain();
    assert!(late.is_empty(), "unexpected messages after leaving: {late:?}");
    assert!(guest.drain().iter().all(|message| !matches!(
        message,
        ServerMessage::QuestionResults(_) | ServerMessage::NewQuestion(_)
    )));
}

#[tokio::test(start_paused = true)]
async fn leaving_mid_round_completes_it_for_the_others() {
    let harness = harness().await;
    let mut host = connect(&harness, "u1").await;
    let guest = connect(&harness, "u2").await;
    let third = connect(&harness, "u3").await;
    let code = create_room(&harness, &mut host, "one").await;
    join(&harness, &guest, &code).await;
    join(&harness, &third, &code).await;
    host.send(&harness, r#"{"event":"start_quiz","data":{}}"#).await;

    let answer = r#"{"event":"submit_answer","data":{"answer":"Bravo","timeSpent":3}}"#;
    host.send(&harness, answer).await;
    guest.send(&harness, answer).await;
    room_service::handle_disconnect(&harness.state, &third.session).await;

    sleep(Duration::from_secs(2)).await;
    let messages = host.drain();
    let round = results(&messages);
    assert_eq!(round.len(), 1);
    assert_eq!(round[0].results.len(), 2);
    assert!(round[0].results.iter().all(|result| result.points == 950));
}

#[tokio::test(start_paused = true)]
async fn rejected_actions_report_errors_to_the_requester() {
    let harness = harness().await;
    let mut host = connect(&harness, "u1").await;
    let mut guest = connect(&harness, "u2").await;
    let mut third = connect(&harness, "u3").await;
    let mut fourth = connect(&harness, "u4").await;

    host.send(
        &harness,
        r#"{"event":"create_room","data":{"quizId":"missing"}}"#,
    )
    .await;
    assert_eq!(errors(&host.drain()), vec!["not found: quiz missing"]);

    host.send(
        &harness,
        r#"{"event":"create_room","data":{"quizId":"one","settings":{"maxPlayers":2}}}"#,
    )
    .await;
    let code = match host.drain().pop() {
        Some(ServerMessage::RoomCreated(event)) => event.room_id,
        other => panic!("expected room_created, got {other:?}"),
    };

    host.send(&harness, r#"{"event":"start_quiz","data":{}}"#).await;
    assert_eq!(
        errors(&host.drain()),
        vec!["at least 2 players are needed to start (currently 1)"]
    );

    // codes are case-insensitive
    join(&harness, &guest, &code.to_lowercase()).await;
    assert!(matches!(
        guest.drain().first(),
        Some(ServerMessage::RoomJoined(_))
    ));

    join(&harness, &third, &code).await;
    assert_eq!(errors(&third.drain()), vec!["room is full (2 players)"]);

    guest.send(&harness, r#"{"event":"start_quiz","data":{}}"#).await;
    assert_eq!(
        errors(&guest.drain()),
        vec!["only the host can start the quiz"]
    );

    join(&harness, &fourth, "ZZZZZZ").await;
    assert_eq!(errors(&fourth.drain()), vec!["not found: room ZZZZZZ"]);

    fourth
        .send(&harness, r#"{"event":"chat_message","data":{"message":"hi"}}"#)
        .await;
    assert_eq!(errors(&fourth.drain()), vec!["you are not in a room"]);

    host.send(&harness, r#"{"event":"create_room","data":{"quizId":"one"}}"#)
        .await;
    assert_eq!(
        errors(&host.drain()),
        vec![format!("you are already in room {code}; leave it first")]
    );

    host.send(&harness, r#"{"event":"start_quiz","data":{}}"#).await;
    host.drain();
    join(&harness, &third, &code).await;
    assert_eq!(errors(&third.drain()), vec!["the quiz has already started"]);
}

#[tokio::test(start_paused = true)]
async fn chat_is_broadcast_to_the_whole_room() {
    let harness = harness().await;
    let mut host = connect(&harness, "u1").await;
    let mut guest = connect(&harness, "u2").await;
    let code = create_room(&harness, &mut host, "one").await;
    join(&harness, &guest, &code).await;
    host.drain();
    guest.drain();

    guest
        .send(
            &harness,
            r#"{"event":"chat_message","data":{"message":"  good luck  "}}"#,
        )
        .await;
    for client in [&mut host, &mut guest] {
        match client.drain().as_slice() {
            [ServerMessage::ChatMessage(event)] => {
                assert_eq!(event.player_id, "u2");
                assert_eq!(event.message, "good luck");
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}

#[tokio::test(start_paused = true)]
async fn waiting_rooms_are_listed_oldest_first() {
    let harness = harness().await;
    let mut first = connect(&harness, "u1").await;
    let mut second = connect(&harness, "u2").await;
    let first_code = create_room(&harness, &mut first, "one").await;
    sleep(Duration::from_secs(1)).await;
    let second_code = create_room(&harness, &mut second, "three").await;

    let listed = public_service::list_waiting_rooms(&harness.state).await;
    let codes: Vec<_> = listed.rooms.iter().map(|room| room.id.clone()).collect();
    assert_eq!(codes.len(), 2);
    assert!(codes.contains(&first_code) && codes.contains(&second_code));
    assert_eq!(listed.rooms[0].max_players, 3);
}

#[tokio::test(start_paused = true)]
async fn finished_rooms_are_removed_after_the_cleanup_delay() {
    let harness = harness().await;
    let mut host = connect(&harness, "u1").await;
    let guest = connect(&harness, "u2").await;
    let code = create_room(&harness, &mut host, "one").await;
    join(&harness, &guest, &code).await;
    host.send(&harness, r#"{"event":"start_quiz","data":{}}"#).await;

    sleep(Duration::from_secs(40)).await;
    assert!(finished(&host.drain()).is_some());
    assert!(harness.state.rooms().get(&code).is_some());

    sleep(Duration::from_secs(300)).await;
    assert!(harness.state.rooms().get(&code).is_none());
    assert_eq!(harness.state.connections().room_of(host.session.id), None);

    // nobody answered: both rank on join order, zero points
    let profile = harness.store.profile("u1").unwrap();
    assert_eq!(profile.multiplayer_stats.wins, 1);
}

#[tokio::test(start_paused = true)]
async fn degraded_mode_refuses_new_rooms_and_logins() {
    let harness = harness().await;
    let mut host = connect(&harness, "u1").await;
    harness.state.clear_arena_store().await;

    host.send(&harness, r#"{"event":"create_room","data":{"quizId":"one"}}"#)
        .await;
    assert_eq!(
        errors(&host.drain()),
        vec!["storage unavailable (degraded mode)"]
    );

    let token = sign_token(SECRET, "u2", Duration::from_secs(60)).unwrap();
    assert!(matches!(
        gateway::authenticate(&harness.state, &token).await,
        Err(ServiceError::Degraded)
    ));
}

#[tokio::test]
async fn unknown_users_and_bad_tokens_are_refused() {
    let harness = harness().await;
    let stranger = sign_token(SECRET, "nobody", Duration::from_secs(60)).unwrap();
    assert!(matches!(
        gateway::authenticate(&harness.state, &stranger).await,
        Err(ServiceError::Unauthorized(_))
    ));
    assert!(matches!(
        gateway::authenticate(&harness.state, "not-a-jwt").await,
        Err(ServiceError::Unauthorized(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn concurrent_joins_never_overfill_a_room() {
    let harness = harness().await;
    let mut host = connect(&harness, "u1").await;
    let guest = connect(&harness, "u2").await;
    let code = create_room(&harness, &mut host, "one").await;
    join(&harness, &guest, &code).await;

    // one seat left out of three
    let mut racers = vec![
        connect(&harness, "u3").await,
        connect(&harness, "u4").await,
        connect(&harness, "u5").await,
    ];
    tokio::join!(
        join(&harness, &racers[0], &code),
        join(&harness, &racers[1], &code),
        join(&harness, &racers[2], &code),
    );

    let mut admitted = 0;
    let mut refused = 0;
    for racer in racers.iter_mut() {
        let messages = racer.drain();
        if messages
            .iter()
            .any(|message| matches!(message, ServerMessage::RoomJoined(_)))
        {
            admitted += 1;
        } else {
            assert_eq!(errors(&messages), vec!["room is full (3 players)"]);
            refused += 1;
        }
    }
    assert_eq!((admitted, refused), (1, 2));

    let status = public_service::room_status(&harness.state, &code)
        .await
        .unwrap();
    assert_eq!(status.player_count, 3);
}
