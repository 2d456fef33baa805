use crate::board::{RollCount, RollSession};
use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::view::RollState;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

struct HandlerErr {
    code: &'static str,
    message: String,
    details: Option<serde_json::Value>,
}

impl HandlerErr {
    fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }

    fn new(code: &'static str, message: impl Into<String>) -> HandlerErr {
        HandlerErr {
            code,
            message: message.into(),
            details: None,
        }
    }
}

fn counts_json(counts: RollCount) -> serde_json::Value {
    json!({
        "presentCount": counts.present,
        "absentCount": counts.absent,
        "lateCount": counts.late
    })
}

fn require_loaded(state: &AppState) -> Result<(), HandlerErr> {
    if state.board.is_loaded() {
        Ok(())
    } else {
        Err(HandlerErr::new("not_loaded", "load the home board first"))
    }
}

fn roll_start(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    require_loaded(state)?;
    let session = RollSession {
        id: Uuid::new_v4().to_string(),
        started_at: Utc::now(),
    };
    let roll_id = session.id.clone();
    state.board.start_roll(session);
    Ok(json!({
        "rollId": roll_id,
        "counts": counts_json(state.board.counts())
    }))
}

fn roll_mark(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    require_loaded(state)?;
    if state.board.roll().is_none() {
        return Err(HandlerErr::new("no_active_roll", "start a roll first"));
    }
    let student_id = params
        .get("studentId")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| HandlerErr::new("bad_params", "missing studentId"))?;
    let raw_state = params
        .get("state")
        .and_then(|v| v.as_str())
        .ok_or_else(|| HandlerErr::new("bad_params", "missing state"))?;
    let roll_state = RollState::parse(raw_state).ok_or_else(|| HandlerErr {
        code: "bad_params",
        message: format!("unknown roll state: {}", raw_state),
        details: Some(json!({ "allowed": ["unmarked", "present", "absent", "late"] })),
    })?;
    let marked = state
        .board
        .mark(student_id, roll_state)
        .ok_or_else(|| HandlerErr::new("not_found", "student not found"))?;
    Ok(json!({
        "student": {
            "id": marked.id,
            "first_name": marked.first_name,
            "last_name": marked.last_name,
            "rollState": marked.roll_state.as_str()
        },
        "counts": counts_json(state.board.counts())
    }))
}

fn roll_counts(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    require_loaded(state)?;
    Ok(counts_json(state.board.counts()))
}

fn roll_complete(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    require_loaded(state)?;
    let session = state
        .board
        .roll()
        .cloned()
        .ok_or_else(|| HandlerErr::new("no_active_roll", "start a roll first"))?;
    let conn = state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))?;

    let student_states: Vec<serde_json::Value> = state
        .board
        .full()
        .iter()
        .map(|p| json!({ "id": p.id, "rollState": p.roll_state.as_str() }))
        .collect();
    let record = db::RollRecord {
        id: session.id.clone(),
        name: params
            .get("name")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        started_at: session.started_at.to_rfc3339(),
        completed_at: Utc::now().to_rfc3339(),
        student_states: json!(student_states),
    };
    db::insert_roll(conn, &record).map_err(|e| HandlerErr {
        code: "db_update_failed",
        message: e.to_string(),
        details: Some(json!({ "table": "rolls" })),
    })?;
    // The session ends only once the record is written; a failed save leaves
    // the roll active so completion can be retried.
    state.board.end_roll();
    Ok(json!({
        "rollId": record.id,
        "counts": counts_json(state.board.counts())
    }))
}

fn roll_exit(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    require_loaded(state)?;
    let discarded = state.board.end_roll().is_some();
    Ok(json!({ "discarded": discarded }))
}

fn rolls_list(state: &AppState) -> Result<serde_json::Value, HandlerErr> {
    let conn = state
        .db
        .as_ref()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace first"))?;
    let rolls = db::list_rolls(conn).map_err(|e| HandlerErr {
        code: "db_query_failed",
        message: e.to_string(),
        details: None,
    })?;
    let rows: Vec<serde_json::Value> = rolls
        .iter()
        .map(|r| {
            json!({
                "id": r.id,
                "name": r.name,
                "startedAt": r.started_at,
                "completedAt": r.completed_at,
                "studentStates": r.student_states
            })
        })
        .collect();
    Ok(json!({ "rolls": rows }))
}

fn respond(id: &str, result: Result<serde_json::Value, HandlerErr>) -> serde_json::Value {
    match result {
        Ok(value) => ok(id, value),
        Err(error) => error.response(id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "roll.start" => Some(respond(&req.id, roll_start(state))),
        "roll.mark" => Some(respond(&req.id, roll_mark(state, &req.params))),
        "roll.counts" => Some(respond(&req.id, roll_counts(state))),
        "roll.complete" => Some(respond(&req.id, roll_complete(state, &req.params))),
        "roll.exit" => Some(respond(&req.id, roll_exit(state))),
        "rolls.list" => Some(respond(&req.id, rolls_list(state))),
        _ => None,
    }
}
