pub mod auth;
pub mod classes;
pub mod core;
pub mod evaluations;
pub mod periods;
pub mod reports;
pub mod stats;
pub mod students;
pub mod users;

use crate::error::{AppError, AppResult};
use crate::roster;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::path::Path;

pub(crate) fn str_param<'a>(params: &'a Value, key: &str) -> AppResult<&'a str> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| AppError::BadParams(format!("missing params.{key}")))
}

pub(crate) fn opt_str_param<'a>(params: &'a Value, key: &str) -> Option<&'a str> {
    params.get(key).and_then(|v| v.as_str())
}

/// Decodes `params.<key>` into `T`; an absent key decodes from `{}`.
pub(crate) fn typed_param<T: DeserializeOwned>(params: &Value, key: &str) -> AppResult<T> {
    let v = params.get(key).cloned().unwrap_or_else(|| Value::Object(Default::default()));
    serde_json::from_value(v).map_err(|e| AppError::BadParams(format!("params.{key}: {e}")))
}

/// Decodes the whole params object into `T`.
pub(crate) fn typed_params<T: DeserializeOwned>(params: &Value) -> AppResult<T> {
    serde_json::from_value(params.clone()).map_err(|e| AppError::BadParams(e.to_string()))
}

/// Roster text from `params.content`, or read from `params.path`.
pub(crate) fn roster_text(params: &Value) -> AppResult<String> {
    if let Some(content) = opt_str_param(params, "content") {
        return Ok(content.to_string());
    }
    match opt_str_param(params, "path") {
        Some(p) => roster::load_file(Path::new(p)),
        None => Err(AppError::BadParams(
            "missing params.content or params.path".into(),
        )),
    }
}

pub(crate) fn delimiter_param(params: &Value) -> AppResult<Option<u8>> {
    match opt_str_param(params, "delimiter") {
        None => Ok(None),
        Some(d) if d.len() == 1 => Ok(Some(d.as_bytes()[0])),
        Some(d) => Err(AppError::BadParams(format!(
            "delimiter must be one ASCII character, got {d:?}"
        ))),
    }
}
