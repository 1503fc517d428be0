use super::{str_param, typed_param, typed_params};
use crate::access::{self, users, users::Role, users::User, users::UserPatch};
use crate::auth;
use crate::error::{AppError, AppResult};
use crate::ipc::error::reply;
use crate::ipc::types::{AppState, Request};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NewUser {
    email: String,
    password: String,
    nom: String,
    prenom: String,
    #[serde(default)]
    role: Role,
}

fn list(state: &AppState, params: &Value) -> AppResult<Value> {
    let role = match params.get("role") {
        None | Some(Value::Null) => None,
        Some(_) => Some(typed_param::<Role>(params, "role")?),
    };
    let users = users::list(state.conn()?, role)?;
    Ok(json!({ "users": users }))
}

fn get(state: &AppState, params: &Value) -> AppResult<Value> {
    let id = str_param(params, "id")?;
    let user = access::get_by_id::<User>(state.conn()?, id)?;
    Ok(json!({ "user": user }))
}

/// Registers the account and writes its profile in one transaction. The
/// first account is always an administrator.
fn create(state: &AppState, params: &Value) -> AppResult<Value> {
    let mut new: NewUser = typed_params(params)?;
    new.nom = access::required_text("nom", &new.nom)?;
    new.prenom = access::required_text("prenom", &new.prenom)?;
    let conn = state.conn()?;
    if auth::account_count(conn)? == 0 {
        new.role = Role::Admin;
    }
    let tx = conn.unchecked_transaction()?;
    let uid = auth::register(&tx, &new.email, &new.password)?;
    let profile = users::create_profile(&tx, &uid, &new.email, &new.nom, &new.prenom, new.role)?;
    tx.commit()?;
    info!(user = %uid, role = new.role.as_wire(), "user created");
    Ok(json!({ "user": profile }))
}

fn update(state: &AppState, params: &Value) -> AppResult<Value> {
    let id = str_param(params, "id")?;
    let patch: UserPatch = typed_param(params, "patch")?;
    let conn = state.conn()?;
    users::update(conn, id, patch)?;
    Ok(json!({ "user": access::require::<User>(conn, id)? }))
}

fn delete(state: &AppState, params: &Value) -> AppResult<Value> {
    let id = str_param(params, "id")?;
    if state.session.as_ref().map(|s| s.user_id.as_str()) == Some(id) {
        return Err(AppError::Validation("cannot delete the signed-in user".into()));
    }
    let conn = state.conn()?;
    let tx = conn.unchecked_transaction()?;
    access::delete::<User>(&tx, id)?;
    auth::delete_account(&tx, id)?;
    tx.commit()?;
    Ok(json!({ "deleted": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let outcome = match req.method.as_str() {
        "users.list" => list(state, &req.params),
        "users.get" => get(state, &req.params),
        "users.create" => create(state, &req.params),
        "users.update" => update(state, &req.params),
        "users.delete" => delete(state, &req.params),
        _ => return None,
    };
    Some(reply(req, outcome))
}
