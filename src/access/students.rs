use super::{timestamp, Record, Stored};
use crate::error::AppResult;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

pub const COLLECTION: &str = "eleves";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    #[serde(rename = "nom")]
    pub last_name: String,
    #[serde(rename = "prenom")]
    pub first_name: String,
    #[serde(rename = "classeId")]
    pub class_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(
        rename = "dateNaissance",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub birth_date: Option<String>,
    #[serde(rename = "createdAt", with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

impl Record for Student {
    const COLLECTION: &'static str = COLLECTION;
}

impl Student {
    /// "Dupont Jean", the form used in report headers.
    pub fn display_name(&self) -> String {
        format!("{} {}", self.last_name, self.first_name)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewStudent {
    pub nom: String,
    pub prenom: String,
    pub classe_id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub date_naissance: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nom: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prenom: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub classe_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_naissance: Option<String>,
}

pub fn build(new: NewStudent, now: DateTime<Utc>) -> AppResult<Student> {
    Ok(Student {
        last_name: super::required_text("nom", &new.nom)?,
        first_name: super::required_text("prenom", &new.prenom)?,
        class_id: super::required_text("classeId", &new.classe_id)?,
        email: super::optional_text(new.email),
        birth_date: super::optional_text(new.date_naissance),
        created_at: now,
    })
}

pub fn create(conn: &Connection, new: NewStudent) -> AppResult<String> {
    let student = build(new, Utc::now())?;
    super::create(conn, &student)
}

/// Stored form of a patch; `Some(None)` clears an optional field.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StudentFields {
    #[serde(skip_serializing_if = "Option::is_none")]
    nom: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    prenom: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    classe_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date_naissance: Option<Option<String>>,
}

/// Required fields must stay non-empty; an empty optional field is removed.
pub fn update(conn: &Connection, id: &str, patch: StudentPatch) -> AppResult<()> {
    let required = |field: &str, value: Option<String>| -> AppResult<Option<String>> {
        value.map(|v| super::required_text(field, &v)).transpose()
    };
    let fields = StudentFields {
        nom: required("nom", patch.nom)?,
        prenom: required("prenom", patch.prenom)?,
        classe_id: required("classeId", patch.classe_id)?,
        email: patch.email.map(|v| super::optional_text(Some(v))),
        date_naissance: patch.date_naissance.map(|v| super::optional_text(Some(v))),
    };
    super::update::<Student, _>(conn, id, &fields)
}

pub fn list_by_class(conn: &Connection, class_id: &str) -> AppResult<Vec<Stored<Student>>> {
    super::find_where::<Student>(conn, &[("classeId", class_id)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access;
    use crate::db;

    fn dupont() -> NewStudent {
        NewStudent {
            nom: "Dupont".into(),
            prenom: "Jean".into(),
            classe_id: "c1".into(),
            email: Some("jean.dupont@example.org".into()),
            date_naissance: Some("2008-03-02".into()),
        }
    }

    #[test]
    fn get_after_create_equals_input_modulo_id_and_timestamp() {
        let conn = db::test_conn();
        let id = create(&conn, dupont()).unwrap();
        let got = access::get_by_id::<Student>(&conn, &id).unwrap().expect("student");
        let expected = build(dupont(), got.record.created_at).unwrap();
        assert_eq!(got.record, expected);
    }

    #[test]
    fn missing_student_reads_as_absent() {
        let conn = db::test_conn();
        assert!(access::get_by_id::<Student>(&conn, "nope").unwrap().is_none());
    }

    #[test]
    fn required_fields_are_checked_before_writing() {
        let conn = db::test_conn();
        let mut new = dupont();
        new.prenom = "  ".into();
        let err = create(&conn, new).unwrap_err();
        assert_eq!(err.code(), "validation_failed");
        assert_eq!(access::count_all::<Student>(&conn).unwrap(), 0);
    }

    #[test]
    fn empty_optional_fields_are_not_stored() {
        let conn = db::test_conn();
        let mut new = dupont();
        new.email = Some(String::new());
        let id = create(&conn, new).unwrap();
        let got = access::require::<Student>(&conn, &id).unwrap();
        assert_eq!(got.record.email, None);
    }

    #[test]
    fn patch_changes_only_given_fields() {
        let conn = db::test_conn();
        let id = create(&conn, dupont()).unwrap();
        update(
            &conn,
            &id,
            StudentPatch {
                classe_id: Some("c2".into()),
                ..Default::default()
            },
        )
        .unwrap();
        let got = access::require::<Student>(&conn, &id).unwrap();
        assert_eq!(got.record.class_id, "c2");
        assert_eq!(got.record.last_name, "Dupont");
        assert_eq!(list_by_class(&conn, "c2").unwrap().len(), 1);
        assert!(list_by_class(&conn, "c1").unwrap().is_empty());
    }

    #[test]
    fn clearing_optional_fields_removes_them() {
        let conn = db::test_conn();
        let id = create(&conn, dupont()).unwrap();
        update(
            &conn,
            &id,
            StudentPatch {
                email: Some("  ".into()),
                date_naissance: Some(" 2008-04-01 ".into()),
                ..Default::default()
            },
        )
        .unwrap();
        let got = access::require::<Student>(&conn, &id).unwrap();
        assert_eq!(got.record.email, None);
        assert_eq!(got.record.birth_date.as_deref(), Some("2008-04-01"));
        let body = db::doc_get(&conn, COLLECTION, &id).unwrap().unwrap();
        assert!(body.get("email").is_none());

        let err = update(
            &conn,
            &id,
            StudentPatch {
                nom: Some(String::new()),
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.code(), "validation_failed");
    }
}
