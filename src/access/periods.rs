use super::{Record, Stored};
use crate::error::{AppError, AppResult};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

pub const COLLECTION: &str = "periodesStage";

/// Periods are global and may overlap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InternshipPeriod {
    #[serde(rename = "nom")]
    pub name: String,
    #[serde(rename = "dateDebut")]
    pub start_date: String,
    #[serde(rename = "dateFin")]
    pub end_date: String,
}

impl Record for InternshipPeriod {
    const COLLECTION: &'static str = COLLECTION;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeriodPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nom: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_debut: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_fin: Option<String>,
}

pub fn parse_iso_date(field: &str, value: &str) -> AppResult<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        AppError::Validation(format!("{field} must be an ISO date (YYYY-MM-DD), got {value:?}"))
    })
}

fn check_range(start: &str, end: &str) -> AppResult<()> {
    let s = parse_iso_date("dateDebut", start)?;
    let e = parse_iso_date("dateFin", end)?;
    if s > e {
        return Err(AppError::Validation(format!(
            "dateDebut {start} is after dateFin {end}"
        )));
    }
    Ok(())
}

pub fn create(conn: &Connection, name: &str, start: &str, end: &str) -> AppResult<String> {
    let period = InternshipPeriod {
        name: super::required_text("nom", name)?,
        start_date: start.trim().to_string(),
        end_date: end.trim().to_string(),
    };
    check_range(&period.start_date, &period.end_date)?;
    super::create(conn, &period)
}

pub fn update(conn: &Connection, id: &str, mut patch: PeriodPatch) -> AppResult<()> {
    let current = super::require::<InternshipPeriod>(conn, id)?;
    if let Some(v) = patch.nom.as_deref() {
        patch.nom = Some(super::required_text("nom", v)?);
    }
    patch.date_debut = patch.date_debut.map(|d| d.trim().to_string());
    patch.date_fin = patch.date_fin.map(|d| d.trim().to_string());
    let start = patch
        .date_debut
        .as_deref()
        .unwrap_or(&current.record.start_date);
    let end = patch.date_fin.as_deref().unwrap_or(&current.record.end_date);
    check_range(start, end)?;
    super::update::<InternshipPeriod, _>(conn, id, &patch)
}

pub fn list(conn: &Connection) -> AppResult<Vec<Stored<InternshipPeriod>>> {
    super::list_all::<InternshipPeriod>(conn)
}
