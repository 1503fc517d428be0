use super::{delimiter_param, opt_str_param, roster_text, str_param, typed_param, typed_params};
use crate::access::{self, students, students::NewStudent, students::Student, students::StudentPatch};
use crate::error::AppResult;
use crate::ipc::error::reply;
use crate::ipc::types::{AppState, Request};
use crate::roster;
use serde_json::{json, Value};

fn list(state: &AppState, params: &Value) -> AppResult<Value> {
    let conn = state.conn()?;
    let students = match opt_str_param(params, "classId") {
        Some(class_id) => students::list_by_class(conn, class_id)?,
        None => access::list_all::<Student>(conn)?,
    };
    Ok(json!({ "students": students }))
}

fn get(state: &AppState, params: &Value) -> AppResult<Value> {
    let id = str_param(params, "id")?;
    let student = access::get_by_id::<Student>(state.conn()?, id)?;
    Ok(json!({ "student": student }))
}

fn create(state: &AppState, params: &Value) -> AppResult<Value> {
    let new: NewStudent = typed_params(params)?;
    let id = students::create(state.conn()?, new)?;
    Ok(json!({ "studentId": id }))
}

fn update(state: &AppState, params: &Value) -> AppResult<Value> {
    let id = str_param(params, "id")?;
    let patch: StudentPatch = typed_param(params, "patch")?;
    let conn = state.conn()?;
    students::update(conn, id, patch)?;
    Ok(json!({ "student": access::require::<Student>(conn, id)? }))
}

fn delete(state: &AppState, params: &Value) -> AppResult<Value> {
    let id = str_param(params, "id")?;
    access::delete::<Student>(state.conn()?, id)?;
    Ok(json!({ "deleted": true }))
}

fn import(state: &AppState, params: &Value) -> AppResult<Value> {
    let text = roster_text(params)?;
    let delimiter = delimiter_param(params)?;
    let report = roster::import_students(state.conn()?, &text, delimiter)?;
    Ok(serde_json::to_value(report)?)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let outcome = match req.method.as_str() {
        "students.list" => list(state, &req.params),
        "students.get" => get(state, &req.params),
        "students.create" => create(state, &req.params),
        "students.update" => update(state, &req.params),
        "students.delete" => delete(state, &req.params),
        "students.import" => import(state, &req.params),
        _ => return None,
    };
    Some(reply(req, outcome))
}
