use super::{str_param, typed_param};
use crate::access::{self, periods, periods::InternshipPeriod, periods::PeriodPatch};
use crate::error::AppResult;
use crate::ipc::error::reply;
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};

fn list(state: &AppState) -> AppResult<Value> {
    Ok(json!({ "periods": periods::list(state.conn()?)? }))
}

fn get(state: &AppState, params: &Value) -> AppResult<Value> {
    let id = str_param(params, "id")?;
    let period = access::get_by_id::<InternshipPeriod>(state.conn()?, id)?;
    Ok(json!({ "period": period }))
}

fn create(state: &AppState, params: &Value) -> AppResult<Value> {
    let id = periods::create(
        state.conn()?,
        str_param(params, "nom")?,
        str_param(params, "dateDebut")?,
        str_param(params, "dateFin")?,
    )?;
    Ok(json!({ "periodId": id }))
}

fn update(state: &AppState, params: &Value) -> AppResult<Value> {
    let id = str_param(params, "id")?;
    let patch: PeriodPatch = typed_param(params, "patch")?;
    let conn = state.conn()?;
    periods::update(conn, id, patch)?;
    Ok(json!({ "period": access::require::<InternshipPeriod>(conn, id)? }))
}

fn delete(state: &AppState, params: &Value) -> AppResult<Value> {
    let id = str_param(params, "id")?;
    access::delete::<InternshipPeriod>(state.conn()?, id)?;
    Ok(json!({ "deleted": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let outcome = match req.method.as_str() {
        "periods.list" => list(state),
        "periods.get" => get(state, &req.params),
        "periods.create" => create(state, &req.params),
        "periods.update" => update(state, &req.params),
        "periods.delete" => delete(state, &req.params),
        _ => return None,
    };
    Some(reply(req, outcome))
}
