use crate::error::AppResult;
use crate::ipc::error::reply;
use crate::ipc::types::{AppState, Request};
use crate::stats;
use serde_json::Value;

fn overview(state: &AppState) -> AppResult<Value> {
    Ok(serde_json::to_value(stats::overview(state.conn()?)?)?)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "stats.overview" => Some(reply(req, overview(state))),
        _ => None,
    }
}
