//! Question flow orchestration.
//!
//! Every handler locks the room it touches, calls the pure room operation and
//! fans out the resulting messages before releasing the lock, so all members
//! observe the same sequence. Round timers are plain tokio tasks holding a weak
//! reference to the room and the ticket of the phase they were armed for.

use std::{
    sync::{Arc, Weak},
    time::{Duration, SystemTime},
};

use futures::future::BoxFuture;
use tokio::{
    task::JoinHandle,
    time::{Instant, sleep},
};
use tracing::{debug, info, warn};
use validator::Validate;

use crate::{
    dto::{
        phase::VisibleRoomStatus,
        validation::{normalize_room_code, validate_room_code},
        ws::{
            ChatMessageRequest, ClientMessage, CreateRoomRequest, JoinRoomRequest, LeftRoomEvent,
            RoomCreatedEvent, ServerMessage, SubmitAnswerRequest,
        },
    },
    error::ServiceError,
    services::settlement_service,
    state::{
        SharedState,
        connections::ClientSession,
        quiz::Quiz,
        registry::{RoomHandle, RoomSlot},
        room::{Advanced, Outbound, Room, RoomError},
        state_machine::RoundTicket,
    },
};

/// Dispatch one client frame. Rejections are reported to the sender only.
pub async fn handle_client_message(
    state: &SharedState,
    session: &ClientSession,
    message: ClientMessage,
) {
    let event = message.name();
    let result = match message {
        ClientMessage::CreateRoom(request) => create_room(state, session, request).await,
        ClientMessage::JoinRoom(request) => join_room(state, session, request).await,
        ClientMessage::StartQuiz {} => start_quiz(state, session).await,
        ClientMessage::SubmitAnswer(request) => submit_answer(state, session, request).await,
        ClientMessage::LeaveRoom {} => leave_room(state, session).await,
        ClientMessage::ChatMessage(request) => send_chat(state, session, request).await,
    };

    if let Err(err) = result {
        warn!(
            connection = %session.id,
            player = %session.user.id,
            event,
            error = %err,
            "client action rejected"
        );
        session.send(ServerMessage::error(err.to_string()));
    }
}

/// A dropped connection leaves its room.
pub async fn handle_disconnect(state: &SharedState, session: &ClientSession) {
    if let Err(err) = leave_current_room(state, session).await {
        warn!(connection = %session.id, error = %err, "failed to leave room on disconnect");
    }
    state.connections().unregister(session.id);
}

/// Create a room around a stored quiz with the caller as host.
pub async fn create_room(
    state: &SharedState,
    session: &ClientSession,
    request: CreateRoomRequest,
) -> Result<(), ServiceError> {
    request.validate()?;
    ensure_not_in_active_room(state, session).await?;

    let store = state.arena_store().await.ok_or(ServiceError::Degraded)?;
    let quiz = store
        .find_quiz(request.quiz_id.clone())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("quiz {}", request.quiz_id)))?;
    let settings = state.config().resolve_settings(&request.settings);

    let handle = state.rooms().create(|code| {
        Room::new(
            code,
            session.user.clone(),
            session.id,
            Quiz::from(quiz),
            settings,
            SystemTime::now(),
        )
    });
    state
        .connections()
        .set_room(session.id, Some(handle.code().to_owned()));

    let slot = handle.lock().await;
    info!(
        room = %handle.code(),
        host = %session.user.id,
        quiz = %slot.room.quiz().id,
        questions = slot.room.quiz().len(),
        "room created"
    );
    session.send(ServerMessage::RoomCreated(RoomCreatedEvent {
        room_id: handle.code().to_owned(),
        room: slot.room.snapshot(),
    }));
    Ok(())
}

/// Join a waiting room by code.
pub async fn join_room(
    state: &SharedState,
    session: &ClientSession,
    request: JoinRoomRequest,
) -> Result<(), ServiceError> {
    let code = normalize_room_code(&request.room_id);
    validate_room_code(&code).map_err(|err| {
        ServiceError::InvalidInput(
            err.message
                .map(|message| message.to_string())
                .unwrap_or_else(|| "invalid room code".into()),
        )
    })?;
    ensure_not_in_active_room(state, session).await?;

    let handle = find_room(state, &code)?;
    let mut slot = handle.lock().await;
    if slot.dissolved {
        return Err(ServiceError::NotFound(format!("room {code}")));
    }
    let outbound = slot
        .room
        .join(session.user.clone(), session.id, SystemTime::now())?;
    state.connections().set_room(session.id, Some(code.clone()));
    info!(
        room = %code,
        player = %session.user.id,
        players = slot.room.player_count(),
        "player joined"
    );
    deliver(state, &slot.room, outbound);
    Ok(())
}

/// Host only: start the match and arm the first question timer.
pub async fn start_quiz(state: &SharedState, session: &ClientSession) -> Result<(), ServiceError> {
    let handle = current_room(state, session)?;
    let mut slot = handle.lock().await;
    let opened = slot.room.start(&session.user.id, Instant::now())?;
    info!(
        room = %handle.code(),
        players = slot.room.player_count(),
        questions = slot.room.quiz().len(),
        "match started"
    );
    deliver(state, &slot.room, opened.outbound);
    arm_question_timer(state, &handle, &mut slot, opened.ticket, opened.time_limit);
    Ok(())
}

/// Record an answer to the open question.
pub async fn submit_answer(
    state: &SharedState,
    session: &ClientSession,
    request: SubmitAnswerRequest,
) -> Result<(), ServiceError> {
    request.validate()?;
    let handle = current_room(state, session)?;
    let mut slot = handle.lock().await;
    let accepted = slot.room.submit_answer(
        &session.user.id,
        request.answer,
        request.time_spent,
        Instant::now(),
        SystemTime::now(),
    )?;
    debug!(
        room = %handle.code(),
        player = %session.user.id,
        question = slot.room.current_question_index(),
        "answer recorded"
    );
    deliver(state, &slot.room, accepted.outbound);
    if let Some(ticket) = accepted.completed_round {
        close_early(state, &handle, &mut slot, ticket);
    }
    Ok(())
}

/// Explicit `leave_room`.
pub async fn leave_room(state: &SharedState, session: &ClientSession) -> Result<(), ServiceError> {
    let code = leave_current_room(state, session)
        .await?
        .ok_or_else(|| ServiceError::Precondition("you are not in a room".into()))?;
    session.send(ServerMessage::LeftRoom(LeftRoomEvent { room_id: code }));
    Ok(())
}

/// Relay a chat line to the caller's room.
pub async fn send_chat(
    state: &SharedState,
    session: &ClientSession,
    request: ChatMessageRequest,
) -> Result<(), ServiceError> {
    request.validate()?;
    let handle = current_room(state, session)?;
    let slot = handle.lock().await;
    let outbound = slot
        .room
        .chat(&session.user.id, &request.message, SystemTime::now())?;
    deliver(state, &slot.room, outbound);
    Ok(())
}

/// Remove the caller from its room, if any, returning the room code.
async fn leave_current_room(
    state: &SharedState,
    session: &ClientSession,
) -> Result<Option<String>, ServiceError> {
    let Some(code) = state.connections().room_of(session.id) else {
        return Ok(None);
    };
    state.connections().set_room(session.id, None);
    let Some(handle) = state.rooms().get(&code) else {
        return Ok(Some(code));
    };

    let mut slot = handle.lock().await;
    let departed = match slot.room.leave(&session.user.id) {
        Ok(departed) => departed,
        Err(RoomError::NotMember) => return Ok(Some(code)),
        Err(err) => return Err(err.into()),
    };
    info!(
        room = %code,
        player = %departed.player.profile.id,
        remaining = slot.room.player_count(),
        "player left"
    );

    if departed.dissolved {
        slot.dissolved = true;
        slot.cancel_round_timer();
        drop(slot);
        state.rooms().remove_handle(&handle);
        info!(room = %code, "room dissolved; no players left");
        return Ok(Some(code));
    }

    deliver(state, &slot.room, departed.outbound);
    if let Some(ticket) = departed.completed_round {
        close_early(state, &handle, &mut slot, ticket);
    }
    Ok(Some(code))
}

/// Reject create/join while the caller plays in another room. A membership in
/// a finished or vanished room is dropped silently.
async fn ensure_not_in_active_room(
    state: &SharedState,
    session: &ClientSession,
) -> Result<(), ServiceError> {
    let Some(code) = state.connections().room_of(session.id) else {
        return Ok(());
    };
    if let Some(handle) = state.rooms().get(&code) {
        let slot = handle.lock().await;
        let active = !slot.dissolved
            && slot.room.status() != VisibleRoomStatus::Finished
            && slot.room.player(&session.user.id).is_some();
        drop(slot);
        if active {
            return Err(ServiceError::Precondition(format!(
                "you are already in room {code}; leave it first"
            )));
        }
    }
    leave_current_room(state, session).await?;
    Ok(())
}

fn find_room(state: &SharedState, code: &str) -> Result<Arc<RoomHandle>, ServiceError> {
    state
        .rooms()
        .get(code)
        .ok_or_else(|| ServiceError::NotFound(format!("room {code}")))
}

fn current_room(
    state: &SharedState,
    session: &ClientSession,
) -> Result<Arc<RoomHandle>, ServiceError> {
    let code = state
        .connections()
        .room_of(session.id)
        .ok_or_else(|| ServiceError::Precondition("you are not in a room".into()))?;
    find_room(state, &code)
}

/// Push `outbound` to the room members it targets.
fn deliver(state: &SharedState, room: &Room, outbound: Vec<Outbound>) {
    for Outbound { audience, message } in outbound {
        for connection in room.recipients(&audience) {
            state.connections().send(connection, message.clone());
        }
    }
}

fn spawn_round_task<F>(
    state: &SharedState,
    handle: &Arc<RoomHandle>,
    delay: Duration,
    task: F,
) -> JoinHandle<()>
where
    F: FnOnce(SharedState, Arc<RoomHandle>) -> BoxFuture<'static, ()> + Send + 'static,
{
    let weak: Weak<RoomHandle> = Arc::downgrade(handle);
    let state = state.clone();
    tokio::spawn(async move {
        sleep(delay).await;
        if let Some(handle) = weak.upgrade() {
            task(state, handle).await;
        }
    })
}

fn arm_question_timer(
    state: &SharedState,
    handle: &Arc<RoomHandle>,
    slot: &mut RoomSlot,
    ticket: RoundTicket,
    time_limit: Duration,
) {
    let timer = spawn_round_task(state, handle, time_limit, move |state, handle| {
        close_round(state, handle, ticket, true)
    });
    slot.set_round_timer(timer);
}

/// Every present player answered: drop the question timer and close after the grace delay.
fn close_early(
    state: &SharedState,
    handle: &Arc<RoomHandle>,
    slot: &mut RoomSlot,
    ticket: RoundTicket,
) {
    slot.cancel_round_timer();
    debug!(
        room = %handle.code(),
        question = ticket.question_index,
        "every player answered; closing early"
    );
    let grace = state.config().timings().all_answered_grace;
    spawn_round_task(state, handle, grace, move |state, handle| {
        close_round(state, handle, ticket, false)
    });
}

// Round tasks return boxed futures: they schedule each other.
fn close_round(
    state: SharedState,
    handle: Arc<RoomHandle>,
    ticket: RoundTicket,
    from_timer: bool,
) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        let mut slot = handle.lock().await;
        if slot.dissolved {
            return;
        }
        let Some(closed) = slot.room.close_question(ticket) else {
            debug!(
                room = %handle.code(),
                question = ticket.question_index,
                "question already closed"
            );
            return;
        };
        if from_timer {
            slot.detach_round_timer();
        }
        info!(
            room = %handle.code(),
            question = ticket.question_index,
            timed_out = from_timer,
            "question closed"
        );
        deliver(&state, &slot.room, closed.outbound);

        let next = closed.ticket;
        let results_delay = state.config().timings().results_display;
        let timer = spawn_round_task(&state, &handle, results_delay, move |state, handle| {
            advance_round(state, handle, next)
        });
        slot.set_round_timer(timer);
    })
}

fn advance_round(
    state: SharedState,
    handle: Arc<RoomHandle>,
    ticket: RoundTicket,
) -> BoxFuture<'static, ()> {
    Box::pin(async move {
        let mut slot = handle.lock().await;
        if slot.dissolved {
            return;
        }
        let Some(advanced) = slot.room.advance(ticket, Instant::now()) else {
            return;
        };
        slot.detach_round_timer();

        match advanced {
            Advanced::NextRound(opened) => {
                debug!(
                    room = %handle.code(),
                    question = opened.ticket.question_index,
                    "next question opened"
                );
                deliver(&state, &slot.room, opened.outbound);
                arm_question_timer(&state, &handle, &mut slot, opened.ticket, opened.time_limit);
            }
            Advanced::Finished(finished) => {
                info!(
                    room = %handle.code(),
                    winner = ?finished.standings.first().map(|standing| &standing.player_id),
                    "match finished"
                );
                deliver(&state, &slot.room, finished.outbound);

                let code = handle.code().to_owned();
                let standings = finished.standings;
                let settle_state = state.clone();
                tokio::spawn(async move {
                    settlement_service::settle_match(&settle_state, &code, &standings).await;
                });

                let cleanup = state.config().timings().cleanup_delay;
                spawn_round_task(&state, &handle, cleanup, |state, handle| {
                    Box::pin(async move { release_room(&state, &handle).await })
                });
            }
        }
    })
}

/// Unregister a finished room and detach its remaining members.
async fn release_room(state: &SharedState, handle: &Arc<RoomHandle>) {
    let mut slot = handle.lock().await;
    slot.dissolved = true;
    slot.cancel_round_timer();
    for player in slot.room.players() {
        if state.connections().room_of(player.connection_id).as_deref() == Some(handle.code()) {
            state.connections().set_room(player.connection_id, None);
        }
    }
    drop(slot);
    if state.rooms().remove_handle(handle) {
        info!(room = %handle.code(), "finished room removed");
    }
}
