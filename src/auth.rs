//! Local accounts and the signed-in session.
//!
//! Accounts live in `auth_accounts`, apart from the `users` profile
//! documents; a profile shares its id with the account uid.

use crate::access::{self, users, users::Role, users::User, Stored};
use crate::error::{AppError, AppResult};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::info;
use uuid::Uuid;

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub email: String,
    pub role: Role,
    pub nom: String,
    pub prenom: String,
}

impl Session {
    fn from_profile(profile: &Stored<User>) -> Self {
        Self {
            user_id: profile.id.clone(),
            email: profile.record.email.clone(),
            role: profile.record.role,
            nom: profile.record.last_name.clone(),
            prenom: profile.record.first_name.clone(),
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn check_password(password: &str) -> AppResult<()> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

pub fn account_count(conn: &Connection) -> AppResult<i64> {
    Ok(conn.query_row("SELECT COUNT(*) FROM auth_accounts", [], |r| r.get(0))?)
}

/// Registers an account and returns its uid.
pub fn register(conn: &Connection, email: &str, password: &str) -> AppResult<String> {
    let email = users::validate_email(email)?;
    check_password(password)?;
    let uid = Uuid::new_v4().to_string();
    let salt = Uuid::new_v4().simple().to_string();
    conn.execute(
        "INSERT INTO auth_accounts(uid, email, salt, password_hash, created_at)
         VALUES(?, ?, ?, ?, ?)",
        (
            &uid,
            &email,
            &salt,
            hash_password(&salt, password),
            Utc::now().to_rfc3339(),
        ),
    )
    .map_err(|e| match e {
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            AppError::Conflict(format!("an account already exists for {email}"))
        }
        other => AppError::Db(other),
    })?;
    info!(uid = %uid, "account registered");
    Ok(uid)
}

pub fn delete_account(conn: &Connection, uid: &str) -> AppResult<()> {
    conn.execute("DELETE FROM auth_accounts WHERE uid = ?", [uid])?;
    Ok(())
}

fn verify(conn: &Connection, email: &str, password: &str) -> AppResult<(String, String)> {
    let email = email.trim().to_lowercase();
    let row: Option<(String, String, String)> = conn
        .query_row(
            "SELECT uid, salt, password_hash FROM auth_accounts WHERE email = ?",
            [&email],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?)),
        )
        .optional()?;
    match row {
        Some((uid, salt, hash)) if hash_password(&salt, password) == hash => Ok((uid, email)),
        _ => Err(AppError::BadCredentials),
    }
}

/// Verifies credentials and loads the profile, creating a teacher profile
/// when the account has none.
pub fn sign_in(conn: &Connection, email: &str, password: &str) -> AppResult<Session> {
    let (uid, email) = verify(conn, email, password)?;
    let profile = match access::get_by_id::<User>(conn, &uid)? {
        Some(p) => p,
        None => {
            info!(uid = %uid, "no profile for account; creating a teacher profile");
            users::create_profile(conn, &uid, &email, "", "", Role::Teacher)?
        }
    };
    Ok(Session::from_profile(&profile))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Public,
    Authenticated,
    Admin,
}

/// Roster and calendar edits; reads of the same collections stay open to
/// every signed-in user.
const ADMIN_METHODS: [&str; 11] = [
    "classes.create",
    "classes.update",
    "classes.delete",
    "classes.importStudents",
    "students.create",
    "students.update",
    "students.delete",
    "students.import",
    "periods.create",
    "periods.update",
    "periods.delete",
];

pub fn required_access(method: &str) -> Access {
    if method == "health" || method == "workspace.select" || method.starts_with("auth.") {
        Access::Public
    } else if method.starts_with("users.") || ADMIN_METHODS.contains(&method) {
        Access::Admin
    } else {
        Access::Authenticated
    }
}

/// `bootstrap_open` is true while no account exists; it lets the first
/// `users.create` through without a session.
pub fn authorize(method: &str, session: Option<&Session>, bootstrap_open: bool) -> AppResult<()> {
    match required_access(method) {
        Access::Public => Ok(()),
        Access::Authenticated => session.map(|_| ()).ok_or(AppError::Unauthorized),
        Access::Admin => match session {
            Some(s) if s.is_admin() => Ok(()),
            Some(_) => Err(AppError::Forbidden),
            None if bootstrap_open && method == "users.create" => Ok(()),
            None => Err(AppError::Unauthorized),
        },
    }
}
