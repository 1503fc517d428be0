use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{collection} not found: {id}")]
    NotFound { collection: &'static str, id: String },
    #[error("{0}")]
    BadParams(String),
    #[error("{0}")]
    Validation(String),
    #[error("Colonne manquante ou vide : {column}. Colonnes détectées : {detected}")]
    MissingColumn { column: String, detected: String },
    #[error("Classe(s) inconnue(s) : {}", .0.join(", "))]
    UnknownClass(Vec<String>),
    #[error("unsupported import format: {0}")]
    UnsupportedFormat(String),
    #[error("cannot render report: {0}")]
    Precondition(String),
    #[error("no evaluation found for student {student_id} and period {period_id}")]
    NoEvaluation {
        student_id: String,
        period_id: String,
    },
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("sign in first")]
    Unauthorized,
    #[error("administrator role required")]
    Forbidden,
    #[error("invalid email or password")]
    BadCredentials,
    #[error("select a workspace first")]
    NoWorkspace,

    #[error(transparent)]
    Db(#[from] rusqlite::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
    #[error(transparent)]
    Zip(#[from] zip::result::ZipError),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl AppError {
    pub fn not_found(collection: &'static str, id: impl Into<String>) -> Self {
        AppError::NotFound {
            collection,
            id: id.into(),
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::BadParams(_) => "bad_params",
            Self::Validation(_) => "validation_failed",
            Self::MissingColumn { .. } => "missing_column",
            Self::UnknownClass(_) => "unknown_class",
            Self::UnsupportedFormat(_) => "unsupported_format",
            Self::Precondition(_) => "precondition_failed",
            Self::NoEvaluation { .. } => "no_evaluation",
            Self::Conflict(_) => "conflict",
            Self::Unauthorized => "unauthorized",
            Self::Forbidden => "forbidden",
            Self::BadCredentials => "bad_credentials",
            Self::NoWorkspace => "no_workspace",
            Self::Db(_) => "db_error",
            Self::Json(_) => "bad_document",
            Self::Csv(_) => "bad_csv",
            Self::Zip(_) | Self::Io(_) => "io_failed",
        }
    }

    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            Self::NotFound { collection, id } => Some(json!({ "collection": collection, "id": id })),
            Self::MissingColumn { column, detected } => {
                Some(json!({ "column": column, "detected": detected }))
            }
            Self::UnknownClass(names) => Some(json!({ "classes": names })),
            Self::NoEvaluation {
                student_id,
                period_id,
            } => Some(json!({ "studentId": student_id, "periodId": period_id })),
            _ => None,
        }
    }

    /// Infrastructure failures are logged at error level; the rest are caller mistakes.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Db(_) | Self::Json(_) | Self::Zip(_) | Self::Io(_)
        )
    }
}

pub type AppResult<T> = Result<T, AppError>;
