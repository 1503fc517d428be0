use crate::error::{AppError, AppResult};
use crate::ipc::types::Request;
use serde_json::json;
use tracing::{debug, error};

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "message": message.into(),
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

pub fn fail(req: &Request, e: &AppError) -> serde_json::Value {
    if e.is_internal() {
        error!(method = %req.method, code = e.code(), error = %e, "request failed");
    } else {
        debug!(method = %req.method, code = e.code(), error = %e, "request rejected");
    }
    err(&req.id, e.code(), e.to_string(), e.details())
}

/// Turns a handler outcome into a response envelope.
pub fn reply(req: &Request, outcome: AppResult<serde_json::Value>) -> serde_json::Value {
    match outcome {
        Ok(v) => ok(&req.id, v),
        Err(e) => fail(req, &e),
    }
}
