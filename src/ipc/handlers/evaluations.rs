use super::{opt_str_param, str_param, typed_param};
use crate::access::{self, evaluations, evaluations::Evaluation, evaluations::EvaluationDraft};
use crate::error::AppResult;
use crate::ipc::error::reply;
use crate::ipc::types::{AppState, Request};
use crate::rubric;
use chrono::Utc;
use serde_json::{json, Value};

fn list(state: &AppState, params: &Value) -> AppResult<Value> {
    let evaluations = evaluations::list(
        state.conn()?,
        opt_str_param(params, "studentId"),
        opt_str_param(params, "periodId"),
    )?;
    Ok(json!({ "evaluations": evaluations }))
}

fn get(state: &AppState, params: &Value) -> AppResult<Value> {
    let id = str_param(params, "id")?;
    let evaluation = access::get_by_id::<Evaluation>(state.conn()?, id)?;
    Ok(json!({ "evaluation": evaluation }))
}

fn open(state: &AppState, params: &Value) -> AppResult<Value> {
    let opened = evaluations::open(
        state.conn()?,
        str_param(params, "studentId")?,
        str_param(params, "periodId")?,
    )?;
    Ok(serde_json::to_value(opened)?)
}

fn save(state: &AppState, params: &Value) -> AppResult<Value> {
    let draft: EvaluationDraft = typed_param(params, "evaluation")?;
    let author = state.session.as_ref().map(|s| s.user_id.as_str());
    let outcome = evaluations::save(state.conn()?, draft, author, Utc::now())?;
    Ok(serde_json::to_value(outcome)?)
}

fn delete(state: &AppState, params: &Value) -> AppResult<Value> {
    let id = str_param(params, "id")?;
    access::delete::<Evaluation>(state.conn()?, id)?;
    Ok(json!({ "deleted": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let outcome = match req.method.as_str() {
        "rubric.describe" => Ok(rubric::describe()),
        "evaluations.list" => list(state, &req.params),
        "evaluations.get" => get(state, &req.params),
        "evaluations.open" => open(state, &req.params),
        "evaluations.save" => save(state, &req.params),
        "evaluations.delete" => delete(state, &req.params),
        _ => return None,
    };
    Some(reply(req, outcome))
}
