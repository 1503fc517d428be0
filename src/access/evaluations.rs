//! Evaluation records and the editor's lookup-or-create flow.
//!
//! One evaluation exists per (student, period). Saving without an id looks
//! the pair up inside a transaction and updates the existing record when
//! there is one; the unique pair index in the store turns a concurrent
//! duplicate insert into a `conflict` error.

use super::{
    classes::Class, periods::InternshipPeriod, students::Student, timestamp, Record, Stored,
};
use crate::error::{AppError, AppResult};
use crate::rubric::Competences;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

pub const COLLECTION: &str = "evaluations";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    #[serde(rename = "eleveId")]
    pub student_id: String,
    #[serde(rename = "periodeId")]
    pub period_id: String,
    #[serde(rename = "dateEvaluation", with = "timestamp")]
    pub evaluated_at: DateTime<Utc>,
    #[serde(default)]
    pub competences: Competences,
    #[serde(rename = "commentaireGeneral", default)]
    pub general_comment: String,
    #[serde(rename = "recommandations", default)]
    pub recommendations: String,
    #[serde(rename = "nomEntreprise", default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(rename = "domaineActivite", default, skip_serializing_if = "Option::is_none")]
    pub activity_domain: Option<String>,
    #[serde(rename = "nomTuteur", default, skip_serializing_if = "Option::is_none")]
    pub tutor_name: Option<String>,
    #[serde(rename = "createdBy", default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,
}

impl Record for Evaluation {
    const COLLECTION: &'static str = COLLECTION;
}

/// The editable form of an evaluation. `id` is `None` until the first save.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationDraft {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "eleveId", default)]
    pub student_id: String,
    #[serde(rename = "periodeId", default)]
    pub period_id: String,
    #[serde(
        rename = "dateEvaluation",
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub evaluated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub competences: Competences,
    #[serde(rename = "commentaireGeneral", default)]
    pub general_comment: String,
    #[serde(rename = "recommandations", default)]
    pub recommendations: String,
    #[serde(rename = "nomEntreprise", default, skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
    #[serde(rename = "domaineActivite", default, skip_serializing_if = "Option::is_none")]
    pub activity_domain: Option<String>,
    #[serde(rename = "nomTuteur", default, skip_serializing_if = "Option::is_none")]
    pub tutor_name: Option<String>,
}

impl EvaluationDraft {
    /// Every sub-competency unrated, all comments empty.
    pub fn blank(student_id: &str, period_id: &str) -> Self {
        Self {
            student_id: student_id.to_string(),
            period_id: period_id.to_string(),
            ..Default::default()
        }
    }

    fn into_record(self, now: DateTime<Utc>, created_by: Option<String>) -> Evaluation {
        Evaluation {
            student_id: self.student_id,
            period_id: self.period_id,
            evaluated_at: now,
            competences: self.competences,
            general_comment: self.general_comment,
            recommendations: self.recommendations,
            company_name: super::optional_text(self.company_name),
            activity_domain: super::optional_text(self.activity_domain),
            tutor_name: super::optional_text(self.tutor_name),
            created_by,
        }
    }
}

impl From<Stored<Evaluation>> for EvaluationDraft {
    fn from(s: Stored<Evaluation>) -> Self {
        let e = s.record;
        Self {
            id: Some(s.id),
            student_id: e.student_id,
            period_id: e.period_id,
            evaluated_at: Some(e.evaluated_at),
            competences: e.competences,
            general_comment: e.general_comment,
            recommendations: e.recommendations,
            company_name: e.company_name,
            activity_domain: e.activity_domain,
            tutor_name: e.tutor_name,
        }
    }
}

/// The first stored evaluation for the pair, plus how many exist in total.
pub fn find_for_pair(
    conn: &Connection,
    student_id: &str,
    period_id: &str,
) -> AppResult<(Option<Stored<Evaluation>>, usize)> {
    let matches =
        super::find_where::<Evaluation>(conn, &[("eleveId", student_id), ("periodeId", period_id)])?;
    let count = matches.len();
    if count > 1 {
        warn!(
            student_id,
            period_id,
            count,
            "several evaluations for one pair; using the oldest"
        );
    }
    Ok((matches.into_iter().next(), count))
}

pub fn list(
    conn: &Connection,
    student_id: Option<&str>,
    period_id: Option<&str>,
) -> AppResult<Vec<Stored<Evaluation>>> {
    let mut filters = Vec::new();
    if let Some(s) = student_id {
        filters.push(("eleveId", s));
    }
    if let Some(p) = period_id {
        filters.push(("periodeId", p));
    }
    super::find_where::<Evaluation>(conn, &filters)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OpenedEvaluation {
    pub evaluation: EvaluationDraft,
    pub is_new: bool,
    pub duplicate_count: usize,
    pub student: Stored<Student>,
    pub class: Option<Stored<Class>>,
    pub period: Stored<InternshipPeriod>,
}

/// Loads the pair's evaluation for editing, or a blank rubric when none exists.
pub fn open(conn: &Connection, student_id: &str, period_id: &str) -> AppResult<OpenedEvaluation> {
    let student = super::require::<Student>(conn, student_id)?;
    let period = super::require::<InternshipPeriod>(conn, period_id)?;
    let class = super::get_by_id::<Class>(conn, &student.record.class_id)?;
    let (existing, count) = find_for_pair(conn, student_id, period_id)?;
    let is_new = existing.is_none();
    let evaluation = match existing {
        Some(e) => EvaluationDraft::from(e),
        None => EvaluationDraft::blank(student_id, period_id),
    };
    Ok(OpenedEvaluation {
        evaluation,
        is_new,
        duplicate_count: count.saturating_sub(1),
        student,
        class,
        period,
    })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOutcome {
    pub evaluation_id: String,
    pub created: bool,
}

pub fn save(
    conn: &Connection,
    mut draft: EvaluationDraft,
    author: Option<&str>,
    now: DateTime<Utc>,
) -> AppResult<SaveOutcome> {
    draft.student_id = super::required_text("eleveId", &draft.student_id)?;
    draft.period_id = super::required_text("periodeId", &draft.period_id)?;

    let tx = conn.unchecked_transaction()?;
    let outcome = match draft.id.take() {
        Some(id) => {
            let current = super::require::<Evaluation>(&tx, &id)?;
            if current.record.student_id != draft.student_id
                || current.record.period_id != draft.period_id
            {
                return Err(AppError::Validation(format!(
                    "evaluation {id} belongs to another student/period pair"
                )));
            }
            let record = draft.into_record(now, current.record.created_by);
            super::replace(&tx, &id, &record)?;
            SaveOutcome {
                evaluation_id: id,
                created: false,
            }
        }
        None => {
            let (existing, _) = find_for_pair(&tx, &draft.student_id, &draft.period_id)?;
            match existing {
                Some(current) => {
                    let record = draft.into_record(now, current.record.created_by);
                    super::replace(&tx, &current.id, &record)?;
                    SaveOutcome {
                        evaluation_id: current.id,
                        created: false,
                    }
                }
                None => {
                    let id = Uuid::new_v4().to_string();
                    let record = draft.into_record(now, author.map(str::to_string));
                    super::create_with_id(&tx, &id, &record)?;
                    SaveOutcome {
                        evaluation_id: id,
                        created: true,
                    }
                }
            }
        }
    };
    tx.commit()?;
    info!(
        evaluation_id = %outcome.evaluation_id,
        created = outcome.created,
        "evaluation saved"
    );
    Ok(outcome)
}
