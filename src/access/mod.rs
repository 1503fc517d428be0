//! Typed per-collection access over the document store.

pub mod classes;
pub mod evaluations;
pub mod periods;
pub mod students;
pub mod timestamp;
pub mod users;

use crate::db;
use crate::error::{AppError, AppResult};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::warn;
use uuid::Uuid;

pub trait Record: Serialize + DeserializeOwned {
    const COLLECTION: &'static str;
    /// Set when `update` must stamp `updatedAt`.
    const TOUCH_UPDATED_AT: bool = false;
}

/// A record together with its document id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stored<T> {
    pub id: String,
    #[serde(flatten)]
    pub record: T,
}

fn decode<T: Record>(id: String, body: Value) -> AppResult<Stored<T>> {
    match serde_json::from_value::<T>(body) {
        Ok(record) => Ok(Stored { id, record }),
        Err(e) => {
            warn!(collection = T::COLLECTION, id = %id, error = %e, "document does not match its record shape");
            Err(AppError::Json(e))
        }
    }
}

pub fn list_all<T: Record>(conn: &Connection) -> AppResult<Vec<Stored<T>>> {
    db::doc_list(conn, T::COLLECTION)?
        .into_iter()
        .map(|(id, body)| decode(id, body))
        .collect()
}

/// Missing ids read as `None`, not as an error.
pub fn get_by_id<T: Record>(conn: &Connection, id: &str) -> AppResult<Option<Stored<T>>> {
    db::doc_get(conn, T::COLLECTION, id)?
        .map(|body| decode(id.to_string(), body))
        .transpose()
}

pub fn require<T: Record>(conn: &Connection, id: &str) -> AppResult<Stored<T>> {
    get_by_id(conn, id)?.ok_or_else(|| AppError::not_found(T::COLLECTION, id))
}

pub fn create<T: Record>(conn: &Connection, record: &T) -> AppResult<String> {
    let id = Uuid::new_v4().to_string();
    create_with_id(conn, &id, record)?;
    Ok(id)
}

pub fn create_with_id<T: Record>(conn: &Connection, id: &str, record: &T) -> AppResult<()> {
    let body = serde_json::to_value(record)?;
    db::doc_insert(conn, T::COLLECTION, id, &body)
}

/// Merges the fields `patch` serializes to. The merged document must still
/// decode as `T`, otherwise nothing is written.
pub fn update<T: Record, P: Serialize>(conn: &Connection, id: &str, patch: &P) -> AppResult<()> {
    let mut fields = match serde_json::to_value(patch)? {
        Value::Object(m) => m,
        _ => {
            return Err(AppError::Validation(
                "patch must be an object of fields".into(),
            ))
        }
    };
    if T::TOUCH_UPDATED_AT {
        fields.insert(
            "updatedAt".into(),
            serde_json::to_value(chrono::Utc::now())?,
        );
    }
    update_fields::<T>(conn, id, fields)
}

fn update_fields<T: Record>(conn: &Connection, id: &str, fields: Map<String, Value>) -> AppResult<()> {
    let tx = conn.unchecked_transaction()?;
    let merged = db::doc_merge(&tx, T::COLLECTION, id, &fields)?;
    serde_json::from_value::<T>(merged)?;
    tx.commit()?;
    Ok(())
}

pub fn replace<T: Record>(conn: &Connection, id: &str, record: &T) -> AppResult<()> {
    let body = serde_json::to_value(record)?;
    db::doc_replace(conn, T::COLLECTION, id, &body)
}

pub fn delete<T: Record>(conn: &Connection, id: &str) -> AppResult<()> {
    db::doc_delete(conn, T::COLLECTION, id)?;
    Ok(())
}

pub fn find_where<T: Record>(
    conn: &Connection,
    filters: &[(&str, &str)],
) -> AppResult<Vec<Stored<T>>> {
    db::doc_query_eq(conn, T::COLLECTION, filters)?
        .into_iter()
        .map(|(id, body)| decode(id, body))
        .collect()
}

pub fn count_where<T: Record>(conn: &Connection, filters: &[(&str, &str)]) -> AppResult<i64> {
    db::doc_count_eq(conn, T::COLLECTION, filters)
}

pub fn count_all<T: Record>(conn: &Connection) -> AppResult<i64> {
    count_where::<T>(conn, &[])
}

/// Trims a required text field and rejects it when empty.
pub fn required_text(field: &str, value: &str) -> AppResult<String> {
    let v = value.trim();
    if v.is_empty() {
        return Err(AppError::Validation(format!("{field} must not be empty")));
    }
    Ok(v.to_string())
}

/// Empty optional text reads as absent.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
