use crate::error::CoreResult;
use crate::ids;
use crate::schema::{
    Category, HistoryEntry, NewOccurrence, Occurrence, OccurrenceContact, Priority, Status,
};
use rusqlite::{params, Connection, Row};

pub fn open(db_path: &str) -> CoreResult<Connection> {
    let conn = Connection::open(db_path)?;
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    init(&conn)?;
    Ok(conn)
}

pub fn open_in_memory() -> CoreResult<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    init(&conn)?;
    Ok(conn)
}

pub fn init(conn: &Connection) -> CoreResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS users (
          id TEXT PRIMARY KEY,
          email TEXT NOT NULL UNIQUE,
          password_salt TEXT NOT NULL,
          password_hash TEXT NOT NULL,
          full_name TEXT,
          email_confirmed INTEGER NOT NULL DEFAULT 0,
          created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
        );

        CREATE TABLE IF NOT EXISTS sessions (
          token TEXT PRIMARY KEY,
          user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
          created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
        );

        CREATE TABLE IF NOT EXISTS user_roles (
          user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
          role TEXT NOT NULL,
          UNIQUE(user_id, role)
        );

        CREATE TABLE IF NOT EXISTS occurrences (
          id TEXT PRIMARY KEY,
          user_id TEXT,
          category TEXT NOT NULL,
          address TEXT NOT NULL,
          reference_point TEXT,
          description TEXT NOT NULL,
          photos_json TEXT NOT NULL DEFAULT '[]',
          accessibility_affected INTEGER NOT NULL DEFAULT 0,
          is_public INTEGER NOT NULL DEFAULT 1,
          status TEXT NOT NULL DEFAULT 'received',
          priority TEXT NOT NULL DEFAULT 'medium',
          history_json TEXT NOT NULL DEFAULT '[]',
          created_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ','now'))
        );

        CREATE INDEX IF NOT EXISTS idx_occurrences_created_at ON occurrences(created_at);
        CREATE INDEX IF NOT EXISTS idx_occurrences_status ON occurrences(status);

        CREATE TABLE IF NOT EXISTS occurrence_contacts (
          occurrence_id TEXT PRIMARY KEY REFERENCES occurrences(id) ON DELETE CASCADE,
          name TEXT NOT NULL,
          phone TEXT NOT NULL
        );
        "#,
    )?;
    Ok(())
}

const OCCURRENCE_COLUMNS: &str = "id, user_id, category, address, reference_point, description, \
     photos_json, accessibility_affected, is_public, status, priority, history_json, created_at";

/// Raw column values before enum/JSON decoding, so query_map stays on the
/// rusqlite error type and decoding failures surface as CoreError.
#[derive(Debug)]
struct OccurrenceRow {
    id: String,
    user_id: Option<String>,
    category: String,
    address: String,
    reference_point: Option<String>,
    description: String,
    photos_json: String,
    accessibility_affected: i64,
    is_public: i64,
    status: String,
    priority: String,
    history_json: String,
    created_at: String,
}

impl OccurrenceRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(OccurrenceRow {
            id: row.get(0)?,
            user_id: row.get(1)?,
            category: row.get(2)?,
            address: row.get(3)?,
            reference_point: row.get(4)?,
            description: row.get(5)?,
            photos_json: row.get(6)?,
            accessibility_affected: row.get(7)?,
            is_public: row.get(8)?,
            status: row.get(9)?,
            priority: row.get(10)?,
            history_json: row.get(11)?,
            created_at: row.get(12)?,
        })
    }

    fn decode(self) -> CoreResult<Occurrence> {
        Ok(Occurrence {
            id: self.id,
            reporter_user_id: self.user_id,
            category: Category::parse(&self.category)?,
            address: self.address,
            reference_point: self.reference_point,
            description: self.description,
            photos: serde_json::from_str(&self.photos_json)?,
            accessibility_affected: self.accessibility_affected != 0,
            is_public: self.is_public != 0,
            status: Status::parse(&self.status)?,
            priority: Priority::parse(&self.priority)?,
            history: serde_json::from_str(&self.history_json)?,
            created_at: self.created_at,
        })
    }
}

fn query_occurrences(
    conn: &Connection,
    sql: &str,
    args: &[&dyn rusqlite::ToSql],
) -> CoreResult<Vec<Occurrence>> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(args, OccurrenceRow::from_row)?;
    let mut out = Vec::new();
    for row in rows {
        out.push(row?.decode()?);
    }
    Ok(out)
}

/// Inserts the occurrence and its contact row in one transaction, so a
/// contact failure never leaves an occurrence without PII custody (and
/// vice versa). Returns the stored record.
pub fn insert_occurrence(
    conn: &mut Connection,
    submission: &NewOccurrence,
    reporter_user_id: Option<&str>,
) -> CoreResult<Occurrence> {
    let id = ids::new_id();
    let photos_json = serde_json::to_string(&submission.photos)?;

    let tx = conn.transaction()?;
    tx.execute(
        r#"
        INSERT INTO occurrences (
          id, user_id, category, address, reference_point, description,
          photos_json, accessibility_affected, is_public
        )
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
        "#,
        params![
            id,
            reporter_user_id,
            submission.category.as_str(),
            submission.address.trim(),
            submission.reference_point,
            submission.description.trim(),
            photos_json,
            submission.accessibility_affected as i64,
            submission.is_public as i64,
        ],
    )?;
    tx.execute(
        "INSERT INTO occurrence_contacts (occurrence_id, name, phone) VALUES (?1, ?2, ?3)",
        params![
            id,
            submission.reporter_name.trim(),
            submission.reporter_phone.trim()
        ],
    )?;
    tx.commit()?;

    get_occurrence(conn, &id)?.ok_or(crate::error::CoreError::NotFound)
}

pub fn get_occurrence(conn: &Connection, id: &str) -> CoreResult<Option<Occurrence>> {
    let sql = format!("SELECT {OCCURRENCE_COLUMNS} FROM occurrences WHERE id = ?1");
    let mut rows = query_occurrences(conn, &sql, &[&id])?;
    Ok(rows.pop())
}

/// Every row, newest first. Visibility filtering is the caller's job, via
/// the access evaluator.
pub fn list_occurrences(conn: &Connection) -> CoreResult<Vec<Occurrence>> {
    let sql = format!("SELECT {OCCURRENCE_COLUMNS} FROM occurrences ORDER BY created_at DESC, id");
    query_occurrences(conn, &sql, &[])
}

pub fn set_status_priority(
    conn: &Connection,
    id: &str,
    status: Status,
    priority: Priority,
) -> CoreResult<()> {
    let changed = conn.execute(
        "UPDATE occurrences SET status = ?2, priority = ?3 WHERE id = ?1",
        params![id, status.as_str(), priority.as_str()],
    )?;
    if changed == 0 {
        return Err(crate::error::CoreError::NotFound);
    }
    Ok(())
}

/// Appends one history entry. Read-modify-write inside a transaction keeps
/// the array append atomic; entries already present are never touched.
pub fn append_history(conn: &mut Connection, id: &str, entry: &HistoryEntry) -> CoreResult<()> {
    let tx = conn.transaction()?;
    let history_json: String = tx
        .query_row(
            "SELECT history_json FROM occurrences WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )?;
    let mut history: Vec<HistoryEntry> = serde_json::from_str(&history_json)?;
    history.push(entry.clone());
    let updated = serde_json::to_string(&history)?;
    tx.execute(
        "UPDATE occurrences SET history_json = ?2 WHERE id = ?1",
        params![id, updated],
    )?;
    tx.commit()?;
    Ok(())
}

pub fn delete_occurrence(conn: &Connection, id: &str) -> CoreResult<()> {
    let deleted = conn.execute("DELETE FROM occurrences WHERE id = ?1", params![id])?;
    if deleted == 0 {
        return Err(crate::error::CoreError::NotFound);
    }
    Ok(())
}

pub fn get_contact(conn: &Connection, occurrence_id: &str) -> CoreResult<Option<OccurrenceContact>> {
    let mut stmt = conn.prepare(
        "SELECT occurrence_id, name, phone FROM occurrence_contacts WHERE occurrence_id = ?1",
    )?;
    let mut rows = stmt.query_map(params![occurrence_id], |row| {
        Ok(OccurrenceContact {
            occurrence_id: row.get(0)?,
            name: row.get(1)?,
            phone: row.get(2)?,
        })
    })?;
    match rows.next() {
        Some(contact) => Ok(Some(contact?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Category;

    fn submission() -> NewOccurrence {
        NewOccurrence {
            reporter_name: "João Pereira".to_string(),
            reporter_phone: "21912345678".to_string(),
            category: Category::Tree,
            address: "Praça da Matriz, s/n - Centro".to_string(),
            reference_point: None,
            description: "Árvore com galhos caindo sobre a calçada.".to_string(),
            photos: vec!["p1".to_string(), "p2".to_string()],
            accessibility_affected: false,
            is_public: true,
        }
    }

    #[test]
    fn insert_stores_occurrence_and_contact_together() {
        let mut conn = open_in_memory().unwrap();
        let stored = insert_occurrence(&mut conn, &submission(), Some("u1")).unwrap();

        assert_eq!(stored.reporter_user_id.as_deref(), Some("u1"));
        assert_eq!(stored.status, Status::Received);
        assert_eq!(stored.priority, Priority::Medium);
        assert_eq!(stored.photos, vec!["p1", "p2"]);
        assert!(stored.history.is_empty());

        let contact = get_contact(&conn, &stored.id).unwrap().unwrap();
        assert_eq!(contact.name, "João Pereira");
        assert_eq!(contact.phone, "21912345678");
    }

    #[test]
    fn anonymous_insert_has_null_reporter() {
        let mut conn = open_in_memory().unwrap();
        let stored = insert_occurrence(&mut conn, &submission(), None).unwrap();
        assert_eq!(stored.reporter_user_id, None);
    }

    #[test]
    fn listing_is_newest_first() {
        let mut conn = open_in_memory().unwrap();
        let first = insert_occurrence(&mut conn, &submission(), None).unwrap();
        let second = insert_occurrence(&mut conn, &submission(), None).unwrap();
        let listed = list_occurrences(&conn).unwrap();
        assert_eq!(listed.len(), 2);
        // Same-millisecond inserts tie on created_at; both must be present.
        let ids: Vec<&str> = listed.iter().map(|o| o.id.as_str()).collect();
        assert!(ids.contains(&first.id.as_str()));
        assert!(ids.contains(&second.id.as_str()));
    }

    #[test]
    fn append_history_preserves_existing_entries() {
        let mut conn = open_in_memory().unwrap();
        let stored = insert_occurrence(&mut conn, &submission(), None).unwrap();

        let first = HistoryEntry::Comment {
            comment: "primeiro".to_string(),
            timestamp: "2026-02-01T10:00:00Z".to_string(),
        };
        let second = HistoryEntry::StatusChange {
            status: Status::UnderReview,
            timestamp: "2026-02-01T11:00:00Z".to_string(),
        };
        append_history(&mut conn, &stored.id, &first).unwrap();
        append_history(&mut conn, &stored.id, &second).unwrap();

        let reloaded = get_occurrence(&conn, &stored.id).unwrap().unwrap();
        assert_eq!(reloaded.history, vec![first, second]);
    }

    #[test]
    fn delete_cascades_to_contact() {
        let mut conn = open_in_memory().unwrap();
        let stored = insert_occurrence(&mut conn, &submission(), None).unwrap();
        delete_occurrence(&conn, &stored.id).unwrap();
        assert!(get_occurrence(&conn, &stored.id).unwrap().is_none());
        assert!(get_contact(&conn, &stored.id).unwrap().is_none());
    }

    #[test]
    fn updates_against_missing_rows_are_not_found() {
        let conn = open_in_memory().unwrap();
        assert!(matches!(
            set_status_priority(&conn, "missing", Status::Completed, Priority::High),
            Err(crate::error::CoreError::NotFound)
        ));
    }
}
