//! Student roster import from CSV.
//!
//! Every check runs before the first write: a file with a missing column,
//! an empty required cell or an unknown class name imports nothing.

use crate::access::{self, classes::Class, students, students::NewStudent, students::Student};
use crate::error::{AppError, AppResult};
use chrono::Utc;
use rusqlite::Connection;
use serde::Serialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

pub const ROSTER_COLUMNS: [&str; 3] = ["nom", "prenom", "classe"];
pub const CLASS_ROSTER_COLUMNS: [&str; 3] = ["nom", "prenom", "dateNaissance"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    fn column(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    fn cell<'a>(&'a self, row: &'a [String], name: &str) -> &'a str {
        self.column(name)
            .and_then(|i| row.get(i))
            .map(String::as_str)
            .unwrap_or("")
    }

    fn optional_cell(&self, row: &[String], name: &str) -> Option<String> {
        access::optional_text(Some(self.cell(row, name).to_string()))
    }

    fn detected(&self) -> String {
        self.headers.join(", ")
    }
}

/// `;` when the text contains one, `,` otherwise.
pub fn detect_delimiter(text: &str) -> u8 {
    if text.contains(';') {
        b';'
    } else {
        b','
    }
}

pub fn read_table(text: &str, delimiter: Option<u8>) -> AppResult<Table> {
    let text = text.strip_prefix('\u{feff}').unwrap_or(text);
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter.unwrap_or_else(|| detect_delimiter(text)))
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(text.as_bytes());
    let headers = reader
        .headers()?
        .iter()
        .map(|h| h.to_string())
        .collect::<Vec<_>>();
    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        if record.iter().all(|c| c.is_empty()) {
            continue;
        }
        rows.push(record.iter().map(|c| c.to_string()).collect());
    }
    Ok(Table { headers, rows })
}

pub fn check_required(table: &Table, required: &[&str]) -> AppResult<()> {
    let missing = |column: &str| AppError::MissingColumn {
        column: column.to_string(),
        detected: table.detected(),
    };
    for col in required {
        if table.column(col).is_none() {
            return Err(missing(col));
        }
    }
    for row in &table.rows {
        for col in required {
            if table.cell(row, col).is_empty() {
                return Err(missing(col));
            }
        }
    }
    Ok(())
}

/// Reads an import file. Only CSV is accepted.
pub fn load_file(path: &Path) -> AppResult<String> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "csv" | "txt" => Ok(std::fs::read_to_string(path)?),
        "" => Err(AppError::UnsupportedFormat(path.display().to_string())),
        other => Err(AppError::UnsupportedFormat(format!(
            ".{other} (save the roster as .csv)"
        ))),
    }
}

/// Validates a roster whose `classe` column names existing classes and
/// returns the students it would create.
pub fn plan_import(conn: &Connection, table: &Table) -> AppResult<Vec<Student>> {
    check_required(table, &ROSTER_COLUMNS)?;

    let mut by_name: HashMap<String, String> = HashMap::new();
    for c in access::list_all::<Class>(conn)? {
        by_name.entry(c.record.name).or_insert(c.id);
    }
    let mut unknown: Vec<String> = Vec::new();
    for row in &table.rows {
        let name = table.cell(row, "classe");
        if !by_name.contains_key(name) && !unknown.iter().any(|u| u == name) {
            unknown.push(name.to_string());
        }
    }
    if !unknown.is_empty() {
        return Err(AppError::UnknownClass(unknown));
    }

    let now = Utc::now();
    table
        .rows
        .iter()
        .map(|row| {
            let class_id = by_name
                .get(table.cell(row, "classe"))
                .cloned()
                .unwrap_or_default();
            students::build(
                NewStudent {
                    nom: table.cell(row, "nom").to_string(),
                    prenom: table.cell(row, "prenom").to_string(),
                    classe_id: class_id,
                    email: table.optional_cell(row, "email"),
                    date_naissance: table.optional_cell(row, "dateNaissance"),
                },
                now,
            )
        })
        .collect()
}

/// Validates a roster for one class; every row goes to `class_id`.
pub fn plan_class_import(table: &Table, class_id: &str) -> AppResult<Vec<Student>> {
    check_required(table, &CLASS_ROSTER_COLUMNS)?;
    let now = Utc::now();
    table
        .rows
        .iter()
        .map(|row| {
            students::build(
                NewStudent {
                    nom: table.cell(row, "nom").to_string(),
                    prenom: table.cell(row, "prenom").to_string(),
                    classe_id: class_id.to_string(),
                    email: table.optional_cell(row, "email"),
                    date_naissance: table.optional_cell(row, "dateNaissance"),
                },
                now,
            )
        })
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub imported: usize,
    pub student_ids: Vec<String>,
}

/// Inserts planned students in one transaction.
pub fn commit(conn: &Connection, planned: Vec<Student>) -> AppResult<ImportReport> {
    let tx = conn.unchecked_transaction()?;
    let mut ids = Vec::with_capacity(planned.len());
    for s in &planned {
        ids.push(access::create(&tx, s)?);
    }
    tx.commit()?;
    info!(imported = ids.len(), "roster imported");
    Ok(ImportReport {
        imported: ids.len(),
        student_ids: ids,
    })
}

pub fn import_students(
    conn: &Connection,
    text: &str,
    delimiter: Option<u8>,
) -> AppResult<ImportReport> {
    let table = read_table(text, delimiter)?;
    let planned = plan_import(conn, &table)?;
    commit(conn, planned)
}

pub fn import_into_class(
    conn: &Connection,
    class_id: &str,
    text: &str,
    delimiter: Option<u8>,
) -> AppResult<ImportReport> {
    access::require::<Class>(conn, class_id)?;
    let table = read_table(text, delimiter)?;
    let planned = plan_class_import(&table, class_id)?;
    commit(conn, planned)
}
