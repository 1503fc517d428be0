use super::{timestamp, Record, Stored};
use crate::error::{AppError, AppResult};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

pub const COLLECTION: &str = "users";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Role {
    #[serde(rename = "admin")]
    Admin,
    #[default]
    #[serde(rename = "professeur")]
    Teacher,
}

impl Role {
    pub fn as_wire(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Teacher => "professeur",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(rename = "nom", default)]
    pub last_name: String,
    #[serde(rename = "prenom", default)]
    pub first_name: String,
    pub email: String,
    #[serde(default)]
    pub role: Role,
    #[serde(rename = "createdAt", with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(
        rename = "updatedAt",
        default,
        with = "timestamp::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Record for User {
    const COLLECTION: &'static str = COLLECTION;
    const TOUCH_UPDATED_AT: bool = true;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nom: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prenom: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

pub fn validate_email(email: &str) -> AppResult<String> {
    let e = email.trim().to_lowercase();
    match e.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(e),
        _ => Err(AppError::Validation(format!("invalid email address: {email:?}"))),
    }
}

/// Writes the profile document under the account uid.
pub fn create_profile(
    conn: &Connection,
    uid: &str,
    email: &str,
    last_name: &str,
    first_name: &str,
    role: Role,
) -> AppResult<Stored<User>> {
    let user = User {
        last_name: last_name.trim().to_string(),
        first_name: first_name.trim().to_string(),
        email: validate_email(email)?,
        role,
        created_at: Utc::now(),
        updated_at: None,
    };
    super::create_with_id(conn, uid, &user)?;
    Ok(Stored {
        id: uid.to_string(),
        record: user,
    })
}

pub fn update(conn: &Connection, id: &str, patch: UserPatch) -> AppResult<()> {
    super::update::<User, _>(conn, id, &patch)
}

pub fn list(conn: &Connection, role: Option<Role>) -> AppResult<Vec<Stored<User>>> {
    match role {
        Some(r) => super::find_where::<User>(conn, &[("role", r.as_wire())]),
        None => super::list_all::<User>(conn),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access;
    use crate::db;
    use serde_json::json;

    #[test]
    fn role_uses_french_wire_names() {
        assert_eq!(serde_json::to_value(Role::Teacher).unwrap(), json!("professeur"));
        assert_eq!(serde_json::to_value(Role::Admin).unwrap(), json!("admin"));
    }

    #[test]
    fn profile_is_stored_under_the_given_uid() {
        let conn = db::test_conn();
        create_profile(&conn, "uid-1", " Prof@Lycee.FR ", "Martin", "Anne", Role::Admin).unwrap();
        let u = access::require::<User>(&conn, "uid-1").unwrap();
        assert_eq!(u.record.email, "prof@lycee.fr");
        assert_eq!(u.record.role, Role::Admin);
    }

    #[test]
    fn list_filters_by_role() {
        let conn = db::test_conn();
        create_profile(&conn, "a", "a@x.fr", "A", "a", Role::Admin).unwrap();
        create_profile(&conn, "b", "b@x.fr", "B", "b", Role::Teacher).unwrap();
        create_profile(&conn, "c", "c@x.fr", "C", "c", Role::Teacher).unwrap();
        assert_eq!(list(&conn, None).unwrap().len(), 3);
        let teachers = list(&conn, Some(Role::Teacher)).unwrap();
        let ids: Vec<_> = teachers.iter().map(|u| u.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn update_stamps_updated_at() {
        let conn = db::test_conn();
        create_profile(&conn, "a", "a@x.fr", "A", "a", Role::Teacher).unwrap();
        update(
            &conn,
            "a",
            UserPatch {
                role: Some(Role::Admin),
                ..Default::default()
            },
        )
        .unwrap();
        let u = access::require::<User>(&conn, "a").unwrap();
        assert_eq!(u.record.role, Role::Admin);
        assert!(u.record.updated_at.is_some());
    }

    #[test]
    fn rejects_malformed_email() {
        assert!(validate_email("nobody").is_err());
        assert!(validate_email("@x.fr").is_err());
    }
}
