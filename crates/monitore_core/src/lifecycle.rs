//! Occurrence operations with access control enforced at the application
//! boundary. Every function re-resolves permission from the principal it is
//! handed; none of them cache or assume prior checks.

use crate::access::{self, Principal};
use crate::db;
use crate::error::{CoreError, CoreResult};
use crate::schema::{HistoryEntry, NewOccurrence, Occurrence, OccurrenceContact, Priority, Status};
use rusqlite::Connection;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

pub fn now_rfc3339() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .expect("UTC timestamp always formats as RFC 3339")
}

/// Validates and stores a citizen submission. Open to every principal; the
/// reporter id on the row is the caller's id when authenticated, else null.
pub fn submit(
    conn: &mut Connection,
    principal: &Principal,
    submission: &NewOccurrence,
) -> CoreResult<Occurrence> {
    if !access::can_create(principal).is_allowed() {
        return Err(CoreError::AccessDenied);
    }
    submission.validate()?;
    db::insert_occurrence(conn, submission, principal.user_id())
}

/// Single-row read under the visibility rule. A row the caller may not see
/// reads exactly like a row that does not exist.
pub fn fetch(conn: &Connection, principal: &Principal, id: &str) -> CoreResult<Occurrence> {
    let occurrence = db::get_occurrence(conn, id)?.ok_or(CoreError::NotFound)?;
    if !access::can_read(principal, &occurrence).is_allowed() {
        return Err(CoreError::NotFound);
    }
    Ok(occurrence)
}

/// Dashboard listing, filtered through the same read rule as [`fetch`].
pub fn list(conn: &Connection, principal: &Principal) -> CoreResult<Vec<Occurrence>> {
    let all = db::list_occurrences(conn)?;
    Ok(access::visible(principal, &all)
        .into_iter()
        .cloned()
        .collect())
}

/// Contact PII read. Admin-only, including against the reporter.
pub fn fetch_contact(
    conn: &Connection,
    principal: &Principal,
    occurrence_id: &str,
) -> CoreResult<OccurrenceContact> {
    if !access::can_read_contact(principal).is_allowed() {
        return Err(CoreError::AccessDenied);
    }
    db::get_contact(conn, occurrence_id)?.ok_or(CoreError::NotFound)
}

/// Admin triage: sets status and priority. Any status may follow any other;
/// the workflow enumeration is ordered but the transition relation is the
/// complete graph. Omitted fields keep their current value. Submitting both
/// fields unchanged is rejected so the UI can show "nothing to update";
/// field changes do not append history (only explicit comments do).
pub fn update_triage(
    conn: &Connection,
    principal: &Principal,
    id: &str,
    status: Option<Status>,
    priority: Option<Priority>,
) -> CoreResult<Occurrence> {
    if !access::can_mutate(principal).is_allowed() {
        return Err(CoreError::AccessDenied);
    }
    let current = db::get_occurrence(conn, id)?.ok_or(CoreError::NotFound)?;
    let next_status = status.unwrap_or(current.status);
    let next_priority = priority.unwrap_or(current.priority);
    if next_status == current.status && next_priority == current.priority {
        return Err(CoreError::validation("status", "no change submitted"));
    }
    db::set_status_priority(conn, id, next_status, next_priority)?;
    db::get_occurrence(conn, id)?.ok_or(CoreError::NotFound)
}

/// Admin comment: appends a `Comment` history entry with the current time.
/// Text must be non-empty after trimming.
pub fn add_comment(
    conn: &mut Connection,
    principal: &Principal,
    id: &str,
    text: &str,
) -> CoreResult<Occurrence> {
    if !access::can_mutate(principal).is_allowed() {
        return Err(CoreError::AccessDenied);
    }
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(CoreError::validation("comment", "comment must not be empty"));
    }
    // Existence check first so a comment against a missing row is NotFound,
    // not a silent no-op.
    let _ = db::get_occurrence(conn, id)?.ok_or(CoreError::NotFound)?;
    let entry = HistoryEntry::Comment {
        comment: trimmed.to_string(),
        timestamp: now_rfc3339(),
    };
    db::append_history(conn, id, &entry)?;
    db::get_occurrence(conn, id)?.ok_or(CoreError::NotFound)
}

/// Admin deletion. The contact row goes with it via the FK cascade.
pub fn remove(conn: &Connection, principal: &Principal, id: &str) -> CoreResult<()> {
    if !access::can_mutate(principal).is_allowed() {
        return Err(CoreError::AccessDenied);
    }
    db::delete_occurrence(conn, id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Category;
    use time::OffsetDateTime;

    fn submission(is_public: bool) -> NewOccurrence {
        NewOccurrence {
            reporter_name: "Ana Lima".to_string(),
            reporter_phone: "31987651234".to_string(),
            category: Category::Ramp,
            address: "Rua Sete de Setembro, 45".to_string(),
            reference_point: None,
            description: "Rampa de acesso quebrada na entrada da escola.".to_string(),
            photos: vec![],
            accessibility_affected: true,
            is_public,
        }
    }

    fn setup() -> (Connection, Occurrence) {
        let mut conn = db::open_in_memory().unwrap();
        let created = submit(&mut conn, &Principal::user("u1"), &submission(false)).unwrap();
        (conn, created)
    }

    #[test]
    fn invalid_submission_creates_no_row() {
        let mut conn = db::open_in_memory().unwrap();
        let mut bad = submission(true);
        bad.description = "curta demais".to_string();
        assert!(submit(&mut conn, &Principal::Anonymous, &bad).is_err());
        assert!(db::list_occurrences(&conn).unwrap().is_empty());
    }

    #[test]
    fn private_row_reads_like_missing_for_strangers() {
        let (conn, created) = setup();
        assert!(matches!(
            fetch(&conn, &Principal::user("u2"), &created.id),
            Err(CoreError::NotFound)
        ));
        assert!(fetch(&conn, &Principal::user("u1"), &created.id).is_ok());
        assert!(fetch(&conn, &Principal::admin("a1"), &created.id).is_ok());
    }

    #[test]
    fn every_status_pair_is_an_accepted_transition() {
        let (conn, created) = setup();
        let admin = Principal::admin("a1");
        for from in Status::ALL {
            for to in Status::ALL {
                db::set_status_priority(&conn, &created.id, from, Priority::Low).unwrap();
                let result = update_triage(&conn, &admin, &created.id, Some(to), Some(Priority::High));
                let updated = result.unwrap();
                assert_eq!(updated.status, to, "transition {from:?} -> {to:?}");
            }
        }
    }

    #[test]
    fn unchanged_status_and_priority_is_rejected() {
        let (conn, created) = setup();
        let admin = Principal::admin("a1");
        let err = update_triage(
            &conn,
            &admin,
            &created.id,
            Some(created.status),
            Some(created.priority),
        )
        .unwrap_err();
        assert!(matches!(err, CoreError::Validation { .. }));
    }

    #[test]
    fn priority_alone_is_independently_settable() {
        let (conn, created) = setup();
        let admin = Principal::admin("a1");
        let updated = update_triage(&conn, &admin, &created.id, None, Some(Priority::High)).unwrap();
        assert_eq!(updated.status, created.status);
        assert_eq!(updated.priority, Priority::High);
        // No history entry for a plain field change.
        assert!(updated.history.is_empty());
    }

    #[test]
    fn non_admin_cannot_triage_or_comment_own_report() {
        let (mut conn, created) = setup();
        let reporter = Principal::user("u1");
        assert!(matches!(
            update_triage(&conn, &reporter, &created.id, Some(Status::Completed), None),
            Err(CoreError::AccessDenied)
        ));
        assert!(matches!(
            add_comment(&mut conn, &reporter, &created.id, "tentativa"),
            Err(CoreError::AccessDenied)
        ));
    }

    #[test]
    fn comment_appends_exact_text_with_fresh_timestamp() {
        let (mut conn, created) = setup();
        let admin = Principal::admin("a1");
        let updated =
            add_comment(&mut conn, &admin, &created.id, "Acionado setor de obras").unwrap();

        assert_eq!(updated.history.len(), 1);
        match &updated.history[0] {
            HistoryEntry::Comment { comment, timestamp } => {
                assert_eq!(comment, "Acionado setor de obras");
                let commented =
                    OffsetDateTime::parse(timestamp, &Rfc3339).expect("comment timestamp parses");
                let created_at = OffsetDateTime::parse(&created.created_at, &Rfc3339)
                    .expect("created_at parses");
                assert!(commented >= created_at);
            }
            other => panic!("expected comment entry, got {other:?}"),
        }
    }

    #[test]
    fn blank_comment_is_rejected() {
        let (mut conn, created) = setup();
        let admin = Principal::admin("a1");
        assert!(matches!(
            add_comment(&mut conn, &admin, &created.id, "   "),
            Err(CoreError::Validation { .. })
        ));
    }

    #[test]
    fn history_grows_monotonically_and_keeps_prior_entries_intact() {
        let (mut conn, created) = setup();
        let admin = Principal::admin("a1");

        let mut snapshots: Vec<Vec<HistoryEntry>> = Vec::new();
        for text in ["primeiro", "segundo", "terceiro"] {
            let updated = add_comment(&mut conn, &admin, &created.id, text).unwrap();
            snapshots.push(updated.history);
        }

        for window in snapshots.windows(2) {
            let (earlier, later) = (&window[0], &window[1]);
            assert_eq!(later.len(), earlier.len() + 1);
            assert_eq!(&later[..earlier.len()], earlier.as_slice());
        }
    }

    #[test]
    fn listing_respects_visibility_per_principal() {
        let mut conn = db::open_in_memory().unwrap();
        submit(&mut conn, &Principal::user("u1"), &submission(false)).unwrap();
        submit(&mut conn, &Principal::Anonymous, &submission(true)).unwrap();

        assert_eq!(list(&conn, &Principal::Anonymous).unwrap().len(), 1);
        assert_eq!(list(&conn, &Principal::user("u1")).unwrap().len(), 2);
        assert_eq!(list(&conn, &Principal::admin("a1")).unwrap().len(), 2);
    }

    #[test]
    fn contact_read_is_admin_only_end_to_end() {
        let (conn, created) = setup();
        assert!(matches!(
            fetch_contact(&conn, &Principal::user("u1"), &created.id),
            Err(CoreError::AccessDenied)
        ));
        let contact = fetch_contact(&conn, &Principal::admin("a1"), &created.id).unwrap();
        assert_eq!(contact.phone, "31987651234");
    }

    #[test]
    fn admin_delete_removes_the_row() {
        let (conn, created) = setup();
        assert!(matches!(
            remove(&conn, &Principal::user("u1"), &created.id),
            Err(CoreError::AccessDenied)
        ));
        remove(&conn, &Principal::admin("a1"), &created.id).unwrap();
        assert!(db::get_occurrence(&conn, &created.id).unwrap().is_none());
    }
}
