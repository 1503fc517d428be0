use super::{delimiter_param, roster_text, str_param, typed_param, typed_params};
use crate::access::{self, classes, classes::Class, classes::ClassPatch, classes::NewClass};
use crate::error::AppResult;
use crate::ipc::error::reply;
use crate::ipc::types::{AppState, Request};
use crate::roster;
use serde_json::{json, Value};

fn list(state: &AppState) -> AppResult<Value> {
    let classes = classes::list_with_counts(state.conn()?)?;
    Ok(json!({ "classes": classes }))
}

fn get(state: &AppState, params: &Value) -> AppResult<Value> {
    let id = str_param(params, "id")?;
    let class = access::get_by_id::<Class>(state.conn()?, id)?;
    Ok(json!({ "class": class }))
}

fn create(state: &AppState, params: &Value) -> AppResult<Value> {
    let new: NewClass = typed_params(params)?;
    let id = classes::create(state.conn()?, new)?;
    Ok(json!({ "classId": id }))
}

fn update(state: &AppState, params: &Value) -> AppResult<Value> {
    let id = str_param(params, "id")?;
    let patch: ClassPatch = typed_param(params, "patch")?;
    let conn = state.conn()?;
    classes::update(conn, id, patch)?;
    Ok(json!({ "class": access::require::<Class>(conn, id)? }))
}

fn delete(state: &AppState, params: &Value) -> AppResult<Value> {
    let id = str_param(params, "id")?;
    access::delete::<Class>(state.conn()?, id)?;
    Ok(json!({ "deleted": true }))
}

fn import_students(state: &AppState, params: &Value) -> AppResult<Value> {
    let class_id = str_param(params, "classId")?;
    let text = roster_text(params)?;
    let delimiter = delimiter_param(params)?;
    let report = roster::import_into_class(state.conn()?, class_id, &text, delimiter)?;
    Ok(serde_json::to_value(report)?)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let outcome = match req.method.as_str() {
        "classes.list" => list(state),
        "classes.get" => get(state, &req.params),
        "classes.create" => create(state, &req.params),
        "classes.update" => update(state, &req.params),
        "classes.delete" => delete(state, &req.params),
        "classes.importStudents" => import_students(state, &req.params),
        _ => return None,
    };
    Some(reply(req, outcome))
}
