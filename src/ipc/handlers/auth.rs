use super::str_param;
use crate::auth;
use crate::error::AppResult;
use crate::ipc::error::reply;
use crate::ipc::types::{AppState, Request};
use serde_json::{json, Value};
use tracing::info;

fn sign_in(state: &mut AppState, params: &Value) -> AppResult<Value> {
    let email = str_param(params, "email")?;
    let password = str_param(params, "password")?;
    let session = auth::sign_in(state.conn()?, email, password)?;
    info!(user = %session.user_id, role = session.role.as_wire(), "signed in");
    let result = json!({ "session": &session });
    state.session = Some(session);
    Ok(result)
}

fn sign_out(state: &mut AppState) -> AppResult<Value> {
    if let Some(s) = state.session.take() {
        info!(user = %s.user_id, "signed out");
    }
    Ok(json!({ "signedOut": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let outcome = match req.method.as_str() {
        "auth.signIn" => sign_in(state, &req.params),
        "auth.signOut" => sign_out(state),
        "auth.session" => Ok(json!({ "session": &state.session })),
        _ => return None,
    };
    Some(reply(req, outcome))
}
