//! One-time admin provisioning, safe to run on every application start and
//! under concurrent invocation. User creation and role grant happen in a
//! single IMMEDIATE transaction; the UNIQUE constraint on `users.email` is
//! the actual race-safety mechanism, the lookup is just the fast path.

use crate::auth::{self, ROLE_ADMIN};
use crate::error::{CoreError, CoreResult};
use rusqlite::{Connection, TransactionBehavior};
use serde::Serialize;

pub const ADMIN_EMAIL: &str = "admin.monitore@monitore.com";
pub const ADMIN_PASSWORD: &str = "Monitore10";
pub const ADMIN_FULL_NAME: &str = "Administrador Monitore";

#[derive(Debug, Clone, Serialize)]
pub struct BootstrapOutcome {
    pub user_id: String,
    pub user_exists: bool,
}

pub fn ensure_admin(conn: &mut Connection) -> CoreResult<BootstrapOutcome> {
    let tx = conn
        .transaction_with_behavior(TransactionBehavior::Immediate)
        .map_err(|err| CoreError::Bootstrap(err.to_string()))?;

    if let Some(existing) = auth::find_user_by_email(&tx, ADMIN_EMAIL)? {
        return Ok(BootstrapOutcome {
            user_id: existing.id,
            user_exists: true,
        });
    }

    let created = auth::create_user(&tx, ADMIN_EMAIL, ADMIN_PASSWORD, Some(ADMIN_FULL_NAME), true)
        .map_err(|err| CoreError::Bootstrap(format!("creating admin account: {err}")))?;
    auth::grant_role(&tx, &created.id, ROLE_ADMIN)
        .map_err(|err| CoreError::Bootstrap(format!("assigning admin role: {err}")))?;

    tx.commit()
        .map_err(|err| CoreError::Bootstrap(err.to_string()))?;

    Ok(BootstrapOutcome {
        user_id: created.id,
        user_exists: false,
    })
}
