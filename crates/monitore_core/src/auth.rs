//! Identity: users, password verification, bearer-token sessions and role
//! membership. Role is a set-membership fact in `user_roles`, not a field
//! on the user row; [`has_role`] is the only way to ask about it and is
//! consulted on every request.

use crate::access::Principal;
use crate::error::{CoreError, CoreResult};
use crate::ids;
use rusqlite::{params, Connection, OptionalExtension};
use sha2::{Digest, Sha256};

pub const ROLE_ADMIN: &str = "admin";

#[derive(Debug, Clone)]
pub struct User {
    pub id: String,
    pub email: String,
    pub full_name: Option<String>,
    pub email_confirmed: bool,
}

#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub user_id: String,
}

fn hash_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(b":");
    hasher.update(password.as_bytes());
    let digest = hasher.finalize();
    let mut out = String::with_capacity(64);
    for byte in digest {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

pub fn create_user(
    conn: &Connection,
    email: &str,
    password: &str,
    full_name: Option<&str>,
    email_confirmed: bool,
) -> CoreResult<User> {
    let id = ids::new_id();
    let salt = ids::new_id();
    let hash = hash_password(&salt, password);
    conn.execute(
        r#"
        INSERT INTO users (id, email, password_salt, password_hash, full_name, email_confirmed)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6)
        "#,
        params![id, email, salt, hash, full_name, email_confirmed as i64],
    )?;
    Ok(User {
        id,
        email: email.to_string(),
        full_name: full_name.map(str::to_string),
        email_confirmed,
    })
}

pub fn find_user_by_email(conn: &Connection, email: &str) -> CoreResult<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, email, full_name, email_confirmed FROM users WHERE email = ?1",
            params![email],
            |row| {
                Ok(User {
                    id: row.get(0)?,
                    email: row.get(1)?,
                    full_name: row.get(2)?,
                    email_confirmed: row.get::<_, i64>(3)? != 0,
                })
            },
        )
        .optional()?;
    Ok(user)
}

pub fn grant_role(conn: &Connection, user_id: &str, role: &str) -> CoreResult<()> {
    conn.execute(
        "INSERT OR IGNORE INTO user_roles (user_id, role) VALUES (?1, ?2)",
        params![user_id, role],
    )?;
    Ok(())
}

/// Set-membership predicate over `user_roles`. "No row" means false, never
/// null.
pub fn has_role(conn: &Connection, user_id: &str, role: &str) -> CoreResult<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM user_roles WHERE user_id = ?1 AND role = ?2",
            params![user_id, role],
            |row| row.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

pub fn count_role_rows(conn: &Connection, role: &str) -> CoreResult<i64> {
    let count = conn.query_row(
        "SELECT COUNT(*) FROM user_roles WHERE role = ?1",
        params![role],
        |row| row.get(0),
    )?;
    Ok(count)
}

/// Verifies email/password and opens a session. Wrong email and wrong
/// password fail identically.
pub fn login(conn: &Connection, email: &str, password: &str) -> CoreResult<Session> {
    let credentials: Option<(String, String, String)> = conn
        .query_row(
            "SELECT id, password_salt, password_hash FROM users WHERE email = ?1",
            params![email],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;

    let (user_id, salt, stored_hash) = credentials.ok_or(CoreError::AccessDenied)?;
    if hash_password(&salt, password) != stored_hash {
        return Err(CoreError::AccessDenied);
    }

    let token = ids::new_token();
    conn.execute(
        "INSERT INTO sessions (token, user_id) VALUES (?1, ?2)",
        params![token, user_id],
    )?;
    Ok(Session { token, user_id })
}

/// Resolves a bearer token to a principal for this one request. Admin-ness
/// is looked up fresh each time; an unknown or absent token degrades to
/// Anonymous rather than failing, since anonymous access is a first-class
/// mode.
pub fn principal_for_token(conn: &Connection, token: Option<&str>) -> CoreResult<Principal> {
    let Some(token) = token else {
        return Ok(Principal::Anonymous);
    };
    let user_id: Option<String> = conn
        .query_row(
            "SELECT user_id FROM sessions WHERE token = ?1",
            params![token],
            |row| row.get(0),
        )
        .optional()?;
    match user_id {
        None => Ok(Principal::Anonymous),
        Some(id) => {
            let admin = has_role(conn, &id, ROLE_ADMIN)?;
            Ok(Principal::User { id, admin })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    #[test]
    fn login_round_trip_yields_principal() {
        let conn = db::open_in_memory().unwrap();
        let user = create_user(&conn, "cidadao@example.com", "s3nha-forte", None, true).unwrap();
        let session = login(&conn, "cidadao@example.com", "s3nha-forte").unwrap();
        assert_eq!(session.user_id, user.id);

        let principal = principal_for_token(&conn, Some(&session.token)).unwrap();
        assert_eq!(principal.user_id(), Some(user.id.as_str()));
        assert!(!principal.is_admin());
    }

    #[test]
    fn wrong_password_and_wrong_email_fail_the_same_way() {
        let conn = db::open_in_memory().unwrap();
        create_user(&conn, "cidadao@example.com", "s3nha-forte", None, true).unwrap();
        assert!(matches!(
            login(&conn, "cidadao@example.com", "errada"),
            Err(CoreError::AccessDenied)
        ));
        assert!(matches!(
            login(&conn, "ninguem@example.com", "s3nha-forte"),
            Err(CoreError::AccessDenied)
        ));
    }

    #[test]
    fn unknown_token_is_anonymous() {
        let conn = db::open_in_memory().unwrap();
        let principal = principal_for_token(&conn, Some("deadbeef")).unwrap();
        assert_eq!(principal, Principal::Anonymous);
        assert_eq!(principal_for_token(&conn, None).unwrap(), Principal::Anonymous);
    }

    #[test]
    fn role_membership_is_a_predicate_not_a_field() {
        let conn = db::open_in_memory().unwrap();
        let user = create_user(&conn, "gestor@example.com", "senha", None, true).unwrap();
        assert!(!has_role(&conn, &user.id, ROLE_ADMIN).unwrap());

        grant_role(&conn, &user.id, ROLE_ADMIN).unwrap();
        assert!(has_role(&conn, &user.id, ROLE_ADMIN).unwrap());

        // Granting twice stays a single membership row.
        grant_role(&conn, &user.id, ROLE_ADMIN).unwrap();
        assert_eq!(count_role_rows(&conn, ROLE_ADMIN).unwrap(), 1);
    }

    #[test]
    fn role_change_is_visible_on_the_next_resolution() {
        let conn = db::open_in_memory().unwrap();
        create_user(&conn, "gestor@example.com", "senha", None, true).unwrap();
        let session = login(&conn, "gestor@example.com", "senha").unwrap();

        let before = principal_for_token(&conn, Some(&session.token)).unwrap();
        assert!(!before.is_admin());

        grant_role(&conn, &session.user_id, ROLE_ADMIN).unwrap();
        let after = principal_for_token(&conn, Some(&session.token)).unwrap();
        assert!(after.is_admin());
    }

    #[test]
    fn duplicate_email_is_rejected_by_the_unique_constraint() {
        let conn = db::open_in_memory().unwrap();
        create_user(&conn, "dup@example.com", "a", None, false).unwrap();
        assert!(create_user(&conn, "dup@example.com", "b", None, false).is_err());
    }
}
