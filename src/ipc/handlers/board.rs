use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::view::{Person, SortKey, StateFilter};
use serde_json::json;

/// Fixed key under which the full roster is snapshotted before a state
/// filter narrows the board (local-storage stand-in).
const SNAPSHOT_KEY: &str = "students";

fn students_json(list: &[Person]) -> Vec<serde_json::Value> {
    list.iter()
        .map(|s| {
            json!({
                "id": s.id,
                "first_name": s.first_name,
                "last_name": s.last_name,
                "rollState": s.roll_state.as_str()
            })
        })
        .collect()
}

fn view_result(state: &AppState) -> serde_json::Value {
    let board = &state.board;
    let opts = board.options();
    json!({
        "loadState": board.load_state().as_str(),
        "students": students_json(board.view()),
        "options": {
            "query": opts.query,
            "sortBy": opts.sort_key.map(|k| k.as_str()),
            "ascending": opts.sort_asc,
            "stateFilter": opts.state_filter.as_str()
        },
        "rollActive": board.roll().is_some()
    })
}

fn handle_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    state.board.begin_load();
    match db::list_students(conn) {
        Ok(students) => {
            // A fresh fetch supersedes any snapshot taken for a previous one.
            if let Err(e) = db::snapshot_clear(conn, SNAPSHOT_KEY) {
                state.board.load_failed();
                return err(&req.id, "db_update_failed", e.to_string(), None);
            }
            state.board.loaded(students);
            ok(&req.id, view_result(state))
        }
        Err(e) => {
            state.board.load_failed();
            err(
                &req.id,
                "load_failed",
                e.to_string(),
                Some(json!({ "loadState": state.board.load_state().as_str() })),
            )
        }
    }
}

fn handle_view(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(&req.id, view_result(state))
}

fn handle_search(state: &mut AppState, req: &Request) -> serde_json::Value {
    if !state.board.is_loaded() {
        return err(&req.id, "not_loaded", "load the home board first", None);
    }
    let Some(query) = req.params.get("query").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing query", None);
    };
    state.board.set_query(query.to_string());
    ok(&req.id, view_result(state))
}

fn handle_sort(state: &mut AppState, req: &Request) -> serde_json::Value {
    if !state.board.is_loaded() {
        return err(&req.id, "not_loaded", "load the home board first", None);
    }
    let Some(raw_key) = req.params.get("sortBy").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing sortBy", None);
    };
    let Some(key) = SortKey::parse(raw_key) else {
        return err(
            &req.id,
            "bad_params",
            "sortBy must be first_name or last_name",
            None,
        );
    };
    let ascending = req.params.get("ascending").and_then(|v| v.as_bool());
    state.board.set_sort(key, ascending);
    ok(&req.id, view_result(state))
}

fn restore_from_snapshot(state: &mut AppState, req: &Request) -> Result<(), serde_json::Value> {
    let Some(conn) = state.db.as_ref() else {
        return Ok(());
    };
    let snapshot = db::snapshot_get(conn, SNAPSHOT_KEY)
        .map_err(|e| err(&req.id, "db_query_failed", e.to_string(), None))?;
    if let Some(value) = snapshot {
        let mut students: Vec<Person> = serde_json::from_value(value).map_err(|e| {
            err(
                &req.id,
                "snapshot_invalid",
                e.to_string(),
                Some(json!({ "key": SNAPSHOT_KEY })),
            )
        })?;
        // Roll marks made since the snapshot live on the in-memory roster;
        // the snapshot only pins membership and order.
        let current: std::collections::HashMap<i64, _> = state
            .board
            .full()
            .iter()
            .map(|p| (p.id, p.roll_state))
            .collect();
        for s in &mut students {
            if let Some(marked) = current.get(&s.id) {
                s.roll_state = *marked;
            }
        }
        state.board.restore_full(students);
    }
    Ok(())
}

fn handle_filter(state: &mut AppState, req: &Request) -> serde_json::Value {
    if !state.board.is_loaded() {
        return err(&req.id, "not_loaded", "load the home board first", None);
    }
    let Some(raw_state) = req.params.get("state").and_then(|v| v.as_str()) else {
        return err(&req.id, "bad_params", "missing state", None);
    };
    let filter = StateFilter::parse(raw_state);

    match filter {
        StateFilter::All => {
            // Clearing the chip restores the last snapshotted full roster.
            if let Err(resp) = restore_from_snapshot(state, req) {
                return resp;
            }
        }
        _ => {
            // Snapshot the full roster before the first narrowing filter.
            if let Some(conn) = state.db.as_ref() {
                let full = json!(students_json(state.board.full()));
                match db::snapshot_get(conn, SNAPSHOT_KEY) {
                    Ok(None) => {
                        if let Err(e) = db::snapshot_set(conn, SNAPSHOT_KEY, &full) {
                            return err(&req.id, "db_update_failed", e.to_string(), None);
                        }
                    }
                    Ok(Some(_)) => {}
                    Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
                }
            }
        }
    }

    state.board.set_state_filter(filter);
    ok(&req.id, view_result(state))
}

fn handle_clear(state: &mut AppState, req: &Request) -> serde_json::Value {
    if !state.board.is_loaded() {
        return err(&req.id, "not_loaded", "load the home board first", None);
    }
    if let Err(resp) = restore_from_snapshot(state, req) {
        return resp;
    }
    state.board.clear_filters();
    ok(&req.id, view_result(state))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "homeboard.load" => Some(handle_load(state, req)),
        "homeboard.view" => Some(handle_view(state, req)),
        "homeboard.search" => Some(handle_search(state, req)),
        "homeboard.sort" => Some(handle_sort(state, req)),
        "homeboard.filter" => Some(handle_filter(state, req)),
        "homeboard.clear" => Some(handle_clear(state, req)),
        _ => None,
    }
}
