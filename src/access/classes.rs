use super::{students::Student, timestamp, Record, Stored};
use crate::error::AppResult;
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub const COLLECTION: &str = "classes";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Class {
    #[serde(rename = "nom")]
    pub name: String,
    #[serde(rename = "annee", default)]
    pub school_year: String,
    #[serde(rename = "professeurPrincipal", default)]
    pub homeroom_teacher: String,
    #[serde(rename = "createdAt", with = "timestamp")]
    pub created_at: DateTime<Utc>,
    /// Absent until the first update on documents written by older clients.
    #[serde(
        rename = "updatedAt",
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for Class {
    const COLLECTION: &'static str = COLLECTION;
    const TOUCH_UPDATED_AT: bool = true;
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewClass {
    pub nom: String,
    #[serde(default)]
    pub annee: String,
    #[serde(default)]
    pub professeur_principal: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nom: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annee: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub professeur_principal: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassSummary {
    #[serde(flatten)]
    pub class: Stored<Class>,
    pub effectif: usize,
}

pub fn create(conn: &Connection, new: NewClass) -> AppResult<String> {
    let now = Utc::now();
    let class = Class {
        name: super::required_text("nom", &new.nom)?,
        school_year: new.annee.trim().to_string(),
        homeroom_teacher: new.professeur_principal.trim().to_string(),
        created_at: now,
        updated_at: Some(now),
    };
    super::create(conn, &class)
}

pub fn update(conn: &Connection, id: &str, mut patch: ClassPatch) -> AppResult<()> {
    if let Some(nom) = patch.nom.as_deref() {
        patch.nom = Some(super::required_text("nom", nom)?);
    }
    super::update::<Class, _>(conn, id, &patch)
}

/// Every class with its current head count.
pub fn list_with_counts(conn: &Connection) -> AppResult<Vec<ClassSummary>> {
    let classes = super::list_all::<Class>(conn)?;
    let mut counts: HashMap<String, usize> = HashMap::new();
    for s in super::list_all::<Student>(conn)? {
        *counts.entry(s.record.class_id).or_default() += 1;
    }
    Ok(classes
        .into_iter()
        .map(|c| {
            let effectif = counts.get(&c.id).copied().unwrap_or(0);
            ClassSummary { class: c, effectif }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{self, students};
    use crate::db;

    #[test]
    fn get_after_create_returns_the_input_fields() {
        let conn = db::test_conn();
        let id = create(
            &conn,
            NewClass {
                nom: " 2MTNE1 ".into(),
                annee: "2023-2024".into(),
                professeur_principal: "M. Martin".into(),
            },
        )
        .unwrap();
        let got = access::require::<Class>(&conn, &id).unwrap();
        assert_eq!(got.id, id);
        assert_eq!(got.record.name, "2MTNE1");
        assert_eq!(got.record.school_year, "2023-2024");
        assert_eq!(got.record.homeroom_teacher, "M. Martin");
    }

    #[test]
    fn update_merges_and_touches_updated_at() {
        let conn = db::test_conn();
        let id = create(&conn, NewClass { nom: "1A".into(), ..Default::default() }).unwrap();
        let before = access::require::<Class>(&conn, &id).unwrap();
        update(
            &conn,
            &id,
            ClassPatch {
                annee: Some("2024".into()),
                ..Default::default()
            },
        )
        .unwrap();
        let after = access::require::<Class>(&conn, &id).unwrap();
        assert_eq!(after.record.name, "1A");
        assert_eq!(after.record.school_year, "2024");
        assert!(after.record.updated_at.is_some());
        assert!(after.record.updated_at >= before.record.updated_at);
        assert_eq!(after.record.created_at, before.record.created_at);
    }

    #[test]
    fn class_without_updated_at_still_lists() {
        let conn = db::test_conn();
        create(&conn, NewClass { nom: "1A".into(), ..Default::default() }).unwrap();
        db::doc_insert(
            &conn,
            COLLECTION,
            "older",
            &serde_json::json!({
                "nom": "2MTNE1",
                "annee": "2024",
                "professeurPrincipal": "",
                "createdAt": "2024-01-01T00:00:00Z"
            }),
        )
        .unwrap();

        let got = access::require::<Class>(&conn, "older").unwrap();
        assert_eq!(got.record.name, "2MTNE1");
        assert_eq!(got.record.updated_at, None);
        assert_eq!(list_with_counts(&conn).unwrap().len(), 2);

        update(&conn, "older", ClassPatch { annee: Some("2025".into()), ..Default::default() }).unwrap();
        let touched = access::require::<Class>(&conn, "older").unwrap();
        assert!(touched.record.updated_at.is_some());
    }

    #[test]
    fn update_of_unknown_class_is_not_found() {
        let conn = db::test_conn();
        let err = update(&conn, "missing", ClassPatch::default()).unwrap_err();
        assert_eq!(err.code(), "not_found");
    }

    #[test]
    fn counts_follow_students() {
        let conn = db::test_conn();
        let a = create(&conn, NewClass { nom: "A".into(), ..Default::default() }).unwrap();
        let b = create(&conn, NewClass { nom: "B".into(), ..Default::default() }).unwrap();
        for name in ["x", "y"] {
            students::create(
                &conn,
                students::NewStudent {
                    nom: name.into(),
                    prenom: "p".into(),
                    classe_id: a.clone(),
                    ..Default::default()
                },
            )
            .unwrap();
        }
        let rows = list_with_counts(&conn).unwrap();
        let count_of = |id: &str| rows.iter().find(|r| r.class.id == id).unwrap().effectif;
        assert_eq!(count_of(&a), 2);
        assert_eq!(count_of(&b), 0);
    }
}
