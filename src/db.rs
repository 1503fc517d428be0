use crate::error::{AppError, AppResult};
use rusqlite::{Connection, OptionalExtension};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, warn};

pub const DB_FILE_NAME: &str = "pfmp.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE_NAME);
    let conn = Connection::open(db_path)?;
    init_schema(&conn)?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> anyhow::Result<()> {
    // Every collection shares one table; `body` is the wire document and is not
    // validated by the store.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS documents(
            collection TEXT NOT NULL,
            id TEXT NOT NULL,
            body TEXT NOT NULL,
            PRIMARY KEY(collection, id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_documents_collection ON documents(collection)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS auth_accounts(
            uid TEXT PRIMARY KEY,
            email TEXT NOT NULL UNIQUE,
            salt TEXT NOT NULL,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    ensure_evaluation_pair_index(conn)?;
    Ok(())
}

fn ensure_evaluation_pair_index(conn: &Connection) -> anyhow::Result<()> {
    let exists: Option<String> = conn
        .query_row(
            "SELECT name FROM sqlite_master WHERE type = 'index' AND name = 'idx_evaluations_pair'",
            [],
            |r| r.get(0),
        )
        .optional()?;
    if exists.is_some() {
        return Ok(());
    }

    // Older workspaces may already hold duplicates for one (student, period)
    // pair; the unique index cannot be built over them.
    let duplicates: i64 = conn.query_row(
        "SELECT COUNT(*) FROM (
           SELECT 1 FROM documents
           WHERE collection = 'evaluations'
           GROUP BY json_extract(body, '$.eleveId'), json_extract(body, '$.periodeId')
           HAVING COUNT(*) > 1
         )",
        [],
        |r| r.get(0),
    )?;
    if duplicates > 0 {
        warn!(
            duplicates,
            "evaluations hold duplicate (student, period) pairs; uniqueness stays unenforced"
        );
        return Ok(());
    }

    conn.execute(
        "CREATE UNIQUE INDEX idx_evaluations_pair
         ON documents(json_extract(body, '$.eleveId'), json_extract(body, '$.periodeId'))
         WHERE collection = 'evaluations'",
        [],
    )?;
    Ok(())
}

fn parse_body(collection: &str, id: &str, text: &str) -> AppResult<Value> {
    serde_json::from_str(text).map_err(|e| {
        warn!(collection, id, error = %e, "stored document is not valid JSON");
        AppError::Json(e)
    })
}

pub fn doc_list(conn: &Connection, collection: &str) -> AppResult<Vec<(String, Value)>> {
    let mut stmt =
        conn.prepare("SELECT id, body FROM documents WHERE collection = ? ORDER BY rowid")?;
    let rows = stmt
        .query_map([collection], |r| {
            Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?))
        })?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter()
        .map(|(id, body)| {
            let v = parse_body(collection, &id, &body)?;
            Ok((id, v))
        })
        .collect()
}

pub fn doc_get(conn: &Connection, collection: &str, id: &str) -> AppResult<Option<Value>> {
    let body: Option<String> = conn
        .query_row(
            "SELECT body FROM documents WHERE collection = ? AND id = ?",
            (collection, id),
            |r| r.get(0),
        )
        .optional()?;
    body.map(|b| parse_body(collection, id, &b)).transpose()
}

pub fn doc_insert(conn: &Connection, collection: &str, id: &str, body: &Value) -> AppResult<()> {
    let text = serde_json::to_string(body)?;
    conn.execute(
        "INSERT INTO documents(collection, id, body) VALUES(?, ?, ?)",
        (collection, id, &text),
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            AppError::Conflict(format!("{collection} document conflicts with an existing one"))
        }
        other => AppError::Db(other),
    })?;
    debug!(collection, id, "document inserted");
    Ok(())
}

/// Overwrites the top-level fields present in `patch`; other fields are kept.
/// A null in `patch` removes the field.
pub fn doc_merge(
    conn: &Connection,
    collection: &'static str,
    id: &str,
    patch: &Map<String, Value>,
) -> AppResult<Value> {
    let Some(mut current) = doc_get(conn, collection, id)? else {
        return Err(AppError::not_found(collection, id));
    };
    let Some(obj) = current.as_object_mut() else {
        return Err(AppError::Validation(format!(
            "{collection} document {id} is not an object"
        )));
    };
    for (k, v) in patch {
        if v.is_null() {
            obj.remove(k);
        } else {
            obj.insert(k.clone(), v.clone());
        }
    }
    let text = serde_json::to_string(&current)?;
    conn.execute(
        "UPDATE documents SET body = ? WHERE collection = ? AND id = ?",
        (&text, collection, id),
    )?;
    debug!(collection, id, fields = patch.len(), "document merged");
    Ok(current)
}

/// Replaces the whole body; fields absent from `body` are dropped.
pub fn doc_replace(
    conn: &Connection,
    collection: &'static str,
    id: &str,
    body: &Value,
) -> AppResult<()> {
    let text = serde_json::to_string(body)?;
    let n = conn
        .execute(
            "UPDATE documents SET body = ? WHERE collection = ? AND id = ?",
            (&text, collection, id),
        )
        .map_err(|e| match e {
            rusqlite::Error::SqliteFailure(f, _)
                if f.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                AppError::Conflict(format!("{collection} document conflicts with an existing one"))
            }
            other => AppError::Db(other),
        })?;
    if n == 0 {
        return Err(AppError::not_found(collection, id));
    }
    debug!(collection, id, "document replaced");
    Ok(())
}

pub fn doc_delete(conn: &Connection, collection: &str, id: &str) -> AppResult<bool> {
    let n = conn.execute(
        "DELETE FROM documents WHERE collection = ? AND id = ?",
        (collection, id),
    )?;
    Ok(n > 0)
}

fn where_clause(filters: &[(&str, &str)]) -> String {
    let mut sql = String::from("collection = ?");
    for (field, _) in filters {
        sql.push_str(&format!(" AND json_extract(body, '$.{}') = ?", field));
    }
    sql
}

fn filter_params<'a>(collection: &'a str, filters: &'a [(&'a str, &'a str)]) -> Vec<&'a str> {
    let mut params = vec![collection];
    params.extend(filters.iter().map(|(_, v)| *v));
    params
}

/// Equality query on top-level string fields. Field names are code constants,
/// never caller input.
pub fn doc_query_eq(
    conn: &Connection,
    collection: &str,
    filters: &[(&str, &str)],
) -> AppResult<Vec<(String, Value)>> {
    let sql = format!(
        "SELECT id, body FROM documents WHERE {} ORDER BY rowid",
        where_clause(filters)
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(
            rusqlite::params_from_iter(filter_params(collection, filters)),
            |r| Ok((r.get::<_, String>(0)?, r.get::<_, String>(1)?)),
        )?
        .collect::<Result<Vec<_>, _>>()?;
    rows.into_iter()
        .map(|(id, body)| {
            let v = parse_body(collection, &id, &body)?;
            Ok((id, v))
        })
        .collect()
}

pub fn doc_count_eq(
    conn: &Connection,
    collection: &str,
    filters: &[(&str, &str)],
) -> AppResult<i64> {
    let sql = format!("SELECT COUNT(*) FROM documents WHERE {}", where_clause(filters));
    let n = conn.query_row(
        &sql,
        rusqlite::params_from_iter(filter_params(collection, filters)),
        |r| r.get(0),
    )?;
    Ok(n)
}

#[cfg(test)]
pub fn test_conn() -> Connection {
    let conn = Connection::open_in_memory().expect("open in-memory db");
    init_schema(&conn).expect("init schema");
    conn
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn merge_keeps_untouched_fields() {
        let conn = test_conn();
        doc_insert(&conn, "classes", "c1", &json!({ "nom": "2MTNE1", "annee": "2024" })).unwrap();
        let mut patch = Map::new();
        patch.insert("annee".into(), json!("2025"));
        let merged = doc_merge(&conn, "classes", "c1", &patch).unwrap();
        assert_eq!(merged, json!({ "nom": "2MTNE1", "annee": "2025" }));
    }

    #[test]
    fn merge_null_removes_the_field() {
        let conn = test_conn();
        doc_insert(&conn, "eleves", "s1", &json!({ "nom": "A", "email": "a@b.fr" })).unwrap();
        let mut patch = Map::new();
        patch.insert("email".into(), Value::Null);
        let merged = doc_merge(&conn, "eleves", "s1", &patch).unwrap();
        assert_eq!(merged, json!({ "nom": "A" }));
    }

    #[test]
    fn merge_on_missing_document_is_not_found() {
        let conn = test_conn();
        let err = doc_merge(&conn, "classes", "nope", &Map::new()).unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn delete_is_idempotent() {
        let conn = test_conn();
        doc_insert(&conn, "periodesStage", "p1", &json!({ "nom": "PFMP1" })).unwrap();
        assert!(doc_delete(&conn, "periodesStage", "p1").unwrap());
        assert!(!doc_delete(&conn, "periodesStage", "p1").unwrap());
    }

    #[test]
    fn query_eq_matches_all_filters_in_insert_order() {
        let conn = test_conn();
        doc_insert(&conn, "eleves", "a", &json!({ "classeId": "c1", "nom": "A" })).unwrap();
        doc_insert(&conn, "eleves", "b", &json!({ "classeId": "c2", "nom": "B" })).unwrap();
        doc_insert(&conn, "eleves", "c", &json!({ "classeId": "c1", "nom": "C" })).unwrap();
        let rows = doc_query_eq(&conn, "eleves", &[("classeId", "c1")]).unwrap();
        let ids: Vec<_> = rows.iter().map(|(id, _)| id.as_str()).collect();
        assert_eq!(ids, vec!["a", "c"]);
        assert_eq!(doc_count_eq(&conn, "eleves", &[("classeId", "c2")]).unwrap(), 1);
    }

    #[test]
    fn evaluation_pair_is_unique_in_store() {
        let conn = test_conn();
        let body = json!({ "eleveId": "s1", "periodeId": "p1" });
        doc_insert(&conn, "evaluations", "e1", &body).unwrap();
        let err = doc_insert(&conn, "evaluations", "e2", &body).unwrap_err();
        assert_eq!(err.code(), "conflict");
        // Other collections are not covered by the index.
        doc_insert(&conn, "eleves", "x1", &body).unwrap();
        doc_insert(&conn, "eleves", "x2", &body).unwrap();
    }
}
