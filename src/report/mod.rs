//! Evaluation reports: a paginated PDF form and a flat XLSX sheet.
//!
//! Both renderers are pure functions of a [`ReportInput`]; nothing they
//! emit depends on the clock, so exporting twice yields identical bytes.

pub mod layout;
pub mod pdf;
pub mod xlsx;

use crate::access::{
    self,
    classes::Class,
    evaluations::{self, Evaluation},
    periods::InternshipPeriod,
    students::Student,
};
use crate::error::{AppError, AppResult};
use chrono::NaiveDate;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tracing::info;

pub use layout::PdfLayout;

pub const NO_EVALUATION_MESSAGE: &str =
    "Aucune évaluation trouvée pour cette combinaison élève/période.";
pub const UNASSIGNED_CLASS: &str = "Non assignée";

#[derive(Debug, Clone, PartialEq)]
pub struct ReportInput {
    pub student: Student,
    pub class: Option<Class>,
    pub period: InternshipPeriod,
    /// `None` renders a blank form.
    pub evaluation: Option<Evaluation>,
}

impl ReportInput {
    pub fn class_name(&self) -> &str {
        self.class
            .as_ref()
            .map(|c| c.name.as_str())
            .unwrap_or(UNASSIGNED_CLASS)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    Pdf,
    Xlsx,
}

impl Format {
    pub fn extension(self) -> &'static str {
        match self {
            Format::Pdf => "pdf",
            Format::Xlsx => "xlsx",
        }
    }
}

/// Loads the student, class, period and evaluation for one report. A
/// missing student or period is a precondition failure.
pub fn resolve(conn: &Connection, student_id: &str, period_id: &str) -> AppResult<ReportInput> {
    let student = access::get_by_id::<Student>(conn, student_id)?
        .ok_or_else(|| AppError::Precondition(format!("student {student_id} does not exist")))?
        .record;
    let period = access::get_by_id::<InternshipPeriod>(conn, period_id)?
        .ok_or_else(|| AppError::Precondition(format!("period {period_id} does not exist")))?
        .record;
    let class = access::get_by_id::<Class>(conn, &student.class_id)?.map(|c| c.record);
    let (evaluation, _) = evaluations::find_for_pair(conn, student_id, period_id)?;
    Ok(ReportInput {
        student,
        class,
        period,
        evaluation: evaluation.map(|e| e.record),
    })
}

fn path_safe(part: &str) -> String {
    part.chars()
        .map(|c| if matches!(c, '/' | '\\') { '-' } else { c })
        .collect()
}

/// `PFMP_<nom>_<prenom>_<periode>.<ext>`
pub fn file_name(student: &Student, period: &InternshipPeriod, format: Format) -> String {
    format!(
        "PFMP_{}_{}_{}.{}",
        path_safe(&student.last_name),
        path_safe(&student.first_name),
        path_safe(&period.name),
        format.extension()
    )
}

/// ISO date to `dd/mm/yyyy`; anything unparseable is returned as given.
pub fn format_date_fr(iso: &str) -> String {
    match NaiveDate::parse_from_str(iso.trim(), "%Y-%m-%d") {
        Ok(d) => d.format("%d/%m/%Y").to_string(),
        Err(_) => iso.to_string(),
    }
}

pub fn render(input: &ReportInput, format: Format, layout: PdfLayout) -> AppResult<Vec<u8>> {
    match format {
        Format::Pdf => Ok(pdf::render(input, layout)),
        Format::Xlsx => xlsx::render(input),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileNames {
    pub pdf: String,
    pub xlsx: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Preview {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub file_names: FileNames,
    pub rows: Vec<Vec<String>>,
}

pub fn preview(conn: &Connection, student_id: &str, period_id: &str) -> AppResult<Preview> {
    let input = resolve(conn, student_id, period_id)?;
    let found = input.evaluation.is_some();
    Ok(Preview {
        found,
        message: (!found).then(|| NO_EVALUATION_MESSAGE.to_string()),
        file_names: FileNames {
            pdf: file_name(&input.student, &input.period, Format::Pdf),
            xlsx: file_name(&input.student, &input.period, Format::Xlsx),
        },
        rows: xlsx::build_sheet(&input).text_rows(),
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportedFile {
    pub path: PathBuf,
    pub file_name: String,
    pub byte_count: usize,
    pub sha256: String,
}

pub fn export(
    conn: &Connection,
    student_id: &str,
    period_id: &str,
    format: Format,
    layout: PdfLayout,
    out_dir: &Path,
) -> AppResult<ExportedFile> {
    let input = resolve(conn, student_id, period_id)?;
    if input.evaluation.is_none() {
        return Err(AppError::NoEvaluation {
            student_id: student_id.to_string(),
            period_id: period_id.to_string(),
        });
    }
    let bytes = render(&input, format, layout)?;
    let file_name = file_name(&input.student, &input.period, format);
    std::fs::create_dir_all(out_dir)?;
    let path = out_dir.join(&file_name);
    std::fs::write(&path, &bytes)?;

    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let sha256 = format!("{:x}", hasher.finalize());
    info!(path = %path.display(), bytes = bytes.len(), "report exported");
    Ok(ExportedFile {
        path,
        file_name,
        byte_count: bytes.len(),
        sha256,
    })
}
