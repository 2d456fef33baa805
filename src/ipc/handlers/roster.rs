use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn get_required_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

fn handle_students_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(first_name) = get_required_str(&req.params, "firstName") else {
        return err(&req.id, "bad_params", "missing firstName", None);
    };
    let Some(last_name) = get_required_str(&req.params, "lastName") else {
        return err(&req.id, "bad_params", "missing lastName", None);
    };
    match db::insert_student(conn, &first_name, &last_name) {
        Ok(id) => ok(&req.id, json!({ "studentId": id })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    match db::list_students(conn) {
        Ok(students) => {
            let rows: Vec<serde_json::Value> = students
                .iter()
                .map(|s| {
                    json!({
                        "id": s.id,
                        "first_name": s.first_name,
                        "last_name": s.last_name
                    })
                })
                .collect();
            ok(&req.id, json!({ "students": rows }))
        }
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_students_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(student_id) = req.params.get("studentId").and_then(|v| v.as_i64()) else {
        return err(&req.id, "bad_params", "missing studentId", None);
    };
    match db::delete_student(conn, student_id) {
        Ok(true) => ok(&req.id, json!({ "deleted": true })),
        Ok(false) => err(&req.id, "not_found", "student not found", None),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.create" => Some(handle_students_create(state, req)),
        "students.list" => Some(handle_students_list(state, req)),
        "students.delete" => Some(handle_students_delete(state, req)),
        _ => None,
    }
}
