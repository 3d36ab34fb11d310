//! Pure access-control decisions. Every read and write path calls these
//! explicitly; nothing else enforces visibility. Decisions are computed per
//! request from a freshly resolved [`Principal`] and are never cached, since
//! role membership can change between requests.

use crate::schema::Occurrence;

/// The acting identity for a single operation. `admin` is resolved from the
/// role table at request time, not carried in any session state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Principal {
    Anonymous,
    User { id: String, admin: bool },
}

impl Principal {
    pub fn user(id: impl Into<String>) -> Self {
        Principal::User {
            id: id.into(),
            admin: false,
        }
    }

    pub fn admin(id: impl Into<String>) -> Self {
        Principal::User {
            id: id.into(),
            admin: true,
        }
    }

    pub fn is_admin(&self) -> bool {
        matches!(self, Principal::User { admin: true, .. })
    }

    pub fn user_id(&self) -> Option<&str> {
        match self {
            Principal::Anonymous => None,
            Principal::User { id, .. } => Some(id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

impl Decision {
    pub fn is_allowed(self) -> bool {
        self == Decision::Allow
    }
}

/// Anyone may create an occurrence, authenticated or not. The reporter id
/// recorded on the row is the principal's id when present, else null.
pub fn can_create(_principal: &Principal) -> Decision {
    Decision::Allow
}

/// Public rows are readable by everyone; private rows only by their
/// reporter or an admin.
pub fn can_read(principal: &Principal, occurrence: &Occurrence) -> Decision {
    if occurrence.is_public || principal.is_admin() {
        return Decision::Allow;
    }
    match (&occurrence.reporter_user_id, principal.user_id()) {
        (Some(reporter), Some(caller)) if reporter == caller => Decision::Allow,
        _ => Decision::Deny,
    }
}

/// Contact PII is admin-only. The reporter cannot read it back either:
/// contact data is write-only from the reporter's perspective after
/// submission.
pub fn can_read_contact(principal: &Principal) -> Decision {
    if principal.is_admin() {
        Decision::Allow
    } else {
        Decision::Deny
    }
}

/// Status/priority updates, comment appends and deletion are admin-only.
/// Reporters cannot edit their own submissions post-creation.
pub fn can_mutate(principal: &Principal) -> Decision {
    if principal.is_admin() {
        Decision::Allow
    } else {
        Decision::Deny
    }
}

/// Dashboard listing: admins see every row, everyone else only the rows
/// they could read individually.
pub fn visible<'a>(
    principal: &Principal,
    occurrences: impl IntoIterator<Item = &'a Occurrence>,
) -> Vec<&'a Occurrence> {
    occurrences
        .into_iter()
        .filter(|occurrence| can_read(principal, occurrence).is_allowed())
        .collect()
}
