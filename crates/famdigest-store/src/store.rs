//! SQLite-backed datastore.
//!
//! The store is the only shared mutable resource in the system. Every
//! write is a single-row insert or update except
//! [`Store::confirm_opt_in_by_phone`], which is one multi-row UPDATE
//! guarded by a single phone-number predicate.

use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use famdigest_core::{CalendarKind, DeliveryChannel, EventPreference, NotifySlot};
use rusqlite::{Connection as SqliteConnection, Row, params};
use tracing::debug;

use crate::error::{StoreError, StoreResult};
use crate::models::{
    Calendar, Connection, MessageDirection, MessageLog, NewConnection, NewMessageLog,
    NewSubscription, Owner, Subscription,
};

/// SQLite-backed store for connections, calendars, subscriptions, and the
/// message log.
///
/// The connection sits behind a mutex so the store can be shared across
/// request handlers; statements are short-lived, so contention stays low.
pub struct Store {
    conn: Mutex<SqliteConnection>,
}

impl Store {
    /// Opens (or creates) the database at `path` and runs table setup.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let conn = SqliteConnection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_tables()?;
        Ok(store)
    }

    /// Creates an in-memory store, used by tests.
    pub fn in_memory() -> StoreResult<Self> {
        let conn = SqliteConnection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_tables()?;
        Ok(store)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SqliteConnection> {
        // A poisoned lock only means another thread panicked mid-statement;
        // the connection itself is still usable.
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn init_tables(&self) -> StoreResult<()> {
        let conn = self.lock();
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS owners (
                 id        TEXT PRIMARY KEY,
                 full_name TEXT NOT NULL,
                 email     TEXT,
                 phone     TEXT
             );

             CREATE TABLE IF NOT EXISTS connections (
                 id              INTEGER PRIMARY KEY AUTOINCREMENT,
                 owner_id        TEXT NOT NULL,
                 provider        TEXT NOT NULL,
                 email           TEXT NOT NULL,
                 access_token    TEXT,
                 refresh_token   TEXT,
                 password_sealed TEXT,
                 server_url      TEXT,
                 error           TEXT,
                 created_at      TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_connections_owner ON connections(owner_id);

             CREATE TABLE IF NOT EXISTS calendars (
                 id            INTEGER PRIMARY KEY AUTOINCREMENT,
                 connection_id INTEGER NOT NULL REFERENCES connections(id),
                 owner_id      TEXT NOT NULL,
                 external_id   TEXT NOT NULL,
                 summary       TEXT NOT NULL,
                 enabled       INTEGER NOT NULL DEFAULT 1,
                 UNIQUE(connection_id, external_id)
             );
             CREATE INDEX IF NOT EXISTS idx_calendars_owner ON calendars(owner_id);

             CREATE TABLE IF NOT EXISTS subscriptions (
                 id               INTEGER PRIMARY KEY AUTOINCREMENT,
                 owner_id         TEXT NOT NULL,
                 workspace_id     TEXT NOT NULL,
                 full_name        TEXT NOT NULL,
                 phone            TEXT NOT NULL,
                 email            TEXT,
                 notify_on        TEXT NOT NULL,
                 timezone         TEXT NOT NULL,
                 opt_in           INTEGER NOT NULL DEFAULT 0,
                 enabled          INTEGER NOT NULL DEFAULT 1,
                 event_preference TEXT NOT NULL,
                 channel          TEXT NOT NULL,
                 created_at       TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_subscriptions_phone ON subscriptions(phone);
             CREATE INDEX IF NOT EXISTS idx_subscriptions_notify ON subscriptions(notify_on);

             CREATE TABLE IF NOT EXISTS message_logs (
                 id              INTEGER PRIMARY KEY AUTOINCREMENT,
                 subscription_id INTEGER NOT NULL REFERENCES subscriptions(id),
                 external_id     TEXT,
                 body            TEXT NOT NULL,
                 segments        INTEGER NOT NULL DEFAULT 1,
                 direction       TEXT NOT NULL,
                 created_at      TEXT NOT NULL
             );
             CREATE INDEX IF NOT EXISTS idx_message_logs_subscription
                 ON message_logs(subscription_id, created_at);",
        )?;
        Ok(())
    }

    // === owners ===

    /// Inserts or refreshes an owner directory entry.
    pub fn upsert_owner(&self, owner: &Owner) -> StoreResult<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO owners (id, full_name, email, phone)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(id) DO UPDATE SET
                 full_name = excluded.full_name,
                 email = excluded.email,
                 phone = excluded.phone",
            params![owner.id, owner.full_name, owner.email, owner.phone],
        )?;
        Ok(())
    }

    pub fn owner(&self, id: &str) -> StoreResult<Option<Owner>> {
        let conn = self.lock();
        let mut stmt =
            conn.prepare("SELECT id, full_name, email, phone FROM owners WHERE id = ?1")?;
        optional(stmt.query_row(params![id], |row| {
            Ok(Owner {
                id: row.get(0)?,
                full_name: row.get(1)?,
                email: row.get(2)?,
                phone: row.get(3)?,
            })
        }))
    }

    // === connections ===

    pub fn insert_connection(&self, new: &NewConnection) -> StoreResult<i64> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO connections
                 (owner_id, provider, email, access_token, refresh_token,
                  password_sealed, server_url, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                new.owner_id,
                new.provider.as_str(),
                new.email,
                new.access_token,
                new.refresh_token,
                new.password_sealed,
                new.server_url,
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn connection(&self, id: i64) -> StoreResult<Option<Connection>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, provider, email, access_token, refresh_token,
                    password_sealed, server_url, error, created_at
             FROM connections WHERE id = ?1",
        )?;
        optional(stmt.query_row(params![id], connection_from_row))
    }

    pub fn connections_for_owner(&self, owner_id: &str) -> StoreResult<Vec<Connection>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, provider, email, access_token, refresh_token,
                    password_sealed, server_url, error, created_at
             FROM connections WHERE owner_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![owner_id], connection_from_row)?;
        collect(rows)
    }

    /// Sets or clears the owner-facing error state on a connection.
    pub fn set_connection_error(&self, id: i64, error: Option<&str>) -> StoreResult<()> {
        let conn = self.lock();
        let affected = conn.execute(
            "UPDATE connections SET error = ?2 WHERE id = ?1",
            params![id, error],
        )?;
        if affected == 0 {
            return Err(StoreError::not_found("connection", id));
        }
        Ok(())
    }

    /// Removes a connection and its calendars (provider revoke).
    pub fn delete_connection(&self, id: i64) -> StoreResult<()> {
        let conn = self.lock();
        conn.execute(
            "DELETE FROM calendars WHERE connection_id = ?1",
            params![id],
        )?;
        conn.execute("DELETE FROM connections WHERE id = ?1", params![id])?;
        Ok(())
    }

    // === calendars ===

    /// Records a calendar seen while listing a connection.
    ///
    /// Insert-or-update keyed on `(connection_id, external_id)`: the
    /// summary follows the provider, the enabled flag belongs to the owner
    /// and survives relisting.
    pub fn upsert_calendar(
        &self,
        connection_id: i64,
        owner_id: &str,
        external_id: &str,
        summary: &str,
    ) -> StoreResult<Calendar> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO calendars (connection_id, owner_id, external_id, summary)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(connection_id, external_id)
             DO UPDATE SET summary = excluded.summary",
            params![connection_id, owner_id, external_id, summary],
        )?;

        let mut stmt = conn.prepare(
            "SELECT id, connection_id, owner_id, external_id, summary, enabled
             FROM calendars WHERE connection_id = ?1 AND external_id = ?2",
        )?;
        Ok(stmt.query_row(params![connection_id, external_id], calendar_from_row)?)
    }

    pub fn set_calendar_enabled(&self, id: i64, enabled: bool) -> StoreResult<()> {
        let conn = self.lock();
        let affected = conn.execute(
            "UPDATE calendars SET enabled = ?2 WHERE id = ?1",
            params![id, enabled],
        )?;
        if affected == 0 {
            return Err(StoreError::not_found("calendar", id));
        }
        Ok(())
    }

    pub fn calendars_for_connection(&self, connection_id: i64) -> StoreResult<Vec<Calendar>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, connection_id, owner_id, external_id, summary, enabled
             FROM calendars WHERE connection_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![connection_id], calendar_from_row)?;
        collect(rows)
    }

    pub fn enabled_calendars_for_connection(
        &self,
        connection_id: i64,
    ) -> StoreResult<Vec<Calendar>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, connection_id, owner_id, external_id, summary, enabled
             FROM calendars WHERE connection_id = ?1 AND enabled = 1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![connection_id], calendar_from_row)?;
        collect(rows)
    }

    // === subscriptions ===

    pub fn insert_subscription(&self, new: &NewSubscription) -> StoreResult<i64> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO subscriptions
                 (owner_id, workspace_id, full_name, phone, email, notify_on,
                  timezone, event_preference, channel, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                new.owner_id,
                new.workspace_id,
                new.full_name,
                new.phone,
                new.email,
                new.notify_on.to_string(),
                new.timezone,
                new.event_preference.as_str(),
                new.channel.as_str(),
                Utc::now().to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn subscription(&self, id: i64) -> StoreResult<Option<Subscription>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "{SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE id = ?1"
        ))?;
        optional(stmt.query_row(params![id], subscription_from_row))
    }

    /// Subscriptions due at a slot: exact string match on the stored
    /// notify time, confirmed and enabled only.
    pub fn subscriptions_due(&self, slot: &NotifySlot) -> StoreResult<Vec<Subscription>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "{SUBSCRIPTION_COLUMNS} FROM subscriptions
             WHERE notify_on = ?1 AND opt_in = 1 AND enabled = 1
             ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![slot.to_string()], subscription_from_row)?;
        let due = collect(rows)?;
        debug!(slot = %slot, count = due.len(), "selected due subscriptions");
        Ok(due)
    }

    /// All subscription rows sharing a phone number, across owners and
    /// workspaces.
    pub fn subscriptions_by_phone(&self, phone: &str) -> StoreResult<Vec<Subscription>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(&format!(
            "{SUBSCRIPTION_COLUMNS} FROM subscriptions WHERE phone = ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![phone], subscription_from_row)?;
        collect(rows)
    }

    /// The opt-in transition: one UPDATE over every row sharing the phone
    /// number. Returns the number of rows now confirmed.
    pub fn confirm_opt_in_by_phone(&self, phone: &str) -> StoreResult<usize> {
        let conn = self.lock();
        let affected = conn.execute(
            "UPDATE subscriptions SET opt_in = 1 WHERE phone = ?1",
            params![phone],
        )?;
        debug!(phone = %phone, affected, "confirmed opt-in by phone");
        Ok(affected)
    }

    /// Pauses or resumes a subscription. Paused subscribers are disabled,
    /// not deleted.
    pub fn set_subscription_enabled(&self, id: i64, enabled: bool) -> StoreResult<()> {
        let conn = self.lock();
        let affected = conn.execute(
            "UPDATE subscriptions SET enabled = ?2 WHERE id = ?1",
            params![id, enabled],
        )?;
        if affected == 0 {
            return Err(StoreError::not_found("subscription", id));
        }
        Ok(())
    }

    // === message log ===

    pub fn insert_message_log(&self, new: &NewMessageLog) -> StoreResult<i64> {
        let conn = self.lock();
        conn.execute(
            "INSERT INTO message_logs
                 (subscription_id, external_id, body, segments, direction, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                new.subscription_id,
                new.external_id,
                new.body,
                new.segments,
                new.direction.as_str(),
                new.created_at.to_rfc3339(),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Timestamp of the most recent message for a subscriber, feeding the
    /// opt-in resend cool-down.
    pub fn last_message_log_at(&self, subscription_id: i64) -> StoreResult<Option<DateTime<Utc>>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT created_at FROM message_logs
             WHERE subscription_id = ?1
             ORDER BY created_at DESC, id DESC LIMIT 1",
        )?;
        let result = stmt.query_row(params![subscription_id], |row| {
            let raw: String = row.get(0)?;
            parse_col(0, DateTime::parse_from_rfc3339(&raw))
                .map(|dt| dt.with_timezone(&Utc))
        });
        optional(result)
    }

    pub fn message_logs_for_subscription(
        &self,
        subscription_id: i64,
    ) -> StoreResult<Vec<MessageLog>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT id, subscription_id, external_id, body, segments, direction, created_at
             FROM message_logs WHERE subscription_id = ?1 ORDER BY id",
        )?;
        let rows = stmt.query_map(params![subscription_id], message_log_from_row)?;
        collect(rows)
    }
}

const SUBSCRIPTION_COLUMNS: &str = "SELECT id, owner_id, workspace_id, full_name, phone, email,
            notify_on, timezone, opt_in, enabled, event_preference, channel, created_at";

// === row mapping ===

/// Converts a stored-value parse failure into a rusqlite conversion error
/// so it flows through `query_row` like any other column failure.
fn parse_col<T, E>(idx: usize, result: Result<T, E>) -> rusqlite::Result<T>
where
    E: std::error::Error + Send + Sync + 'static,
{
    result.map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn datetime_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_col(idx, DateTime::parse_from_rfc3339(&raw)).map(|dt| dt.with_timezone(&Utc))
}

fn connection_from_row(row: &Row<'_>) -> rusqlite::Result<Connection> {
    let provider: String = row.get(2)?;
    Ok(Connection {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        provider: parse_col(2, provider.parse::<CalendarKind>())?,
        email: row.get(3)?,
        access_token: row.get(4)?,
        refresh_token: row.get(5)?,
        password_sealed: row.get(6)?,
        server_url: row.get(7)?,
        error: row.get(8)?,
        created_at: datetime_col(row, 9)?,
    })
}

fn calendar_from_row(row: &Row<'_>) -> rusqlite::Result<Calendar> {
    Ok(Calendar {
        id: row.get(0)?,
        connection_id: row.get(1)?,
        owner_id: row.get(2)?,
        external_id: row.get(3)?,
        summary: row.get(4)?,
        enabled: row.get(5)?,
    })
}

fn subscription_from_row(row: &Row<'_>) -> rusqlite::Result<Subscription> {
    let notify_on: String = row.get(6)?;
    let event_preference: String = row.get(10)?;
    let channel: String = row.get(11)?;
    Ok(Subscription {
        id: row.get(0)?,
        owner_id: row.get(1)?,
        workspace_id: row.get(2)?,
        full_name: row.get(3)?,
        phone: row.get(4)?,
        email: row.get(5)?,
        notify_on: parse_col(6, notify_on.parse::<NotifySlot>())?,
        timezone: row.get(7)?,
        opt_in: row.get(8)?,
        enabled: row.get(9)?,
        event_preference: parse_col(10, event_preference.parse::<EventPreference>())?,
        channel: parse_col(11, channel.parse::<DeliveryChannel>())?,
        created_at: datetime_col(row, 12)?,
    })
}

fn message_log_from_row(row: &Row<'_>) -> rusqlite::Result<MessageLog> {
    let direction: String = row.get(5)?;
    Ok(MessageLog {
        id: row.get(0)?,
        subscription_id: row.get(1)?,
        external_id: row.get(2)?,
        body: row.get(3)?,
        segments: row.get(4)?,
        direction: parse_col(5, direction.parse::<MessageDirection>())?,
        created_at: datetime_col(row, 6)?,
    })
}

fn optional<T>(result: rusqlite::Result<T>) -> StoreResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(StoreError::from(e)),
    }
}

fn collect<T>(rows: impl Iterator<Item = rusqlite::Result<T>>) -> StoreResult<Vec<T>> {
    let mut result = Vec::new();
    for row in rows {
        result.push(row?);
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> Store {
        Store::in_memory().unwrap()
    }

    fn new_connection(owner: &str) -> NewConnection {
        NewConnection {
            owner_id: owner.to_string(),
            provider: CalendarKind::Google,
            email: format!("{owner}@example.com"),
            access_token: Some("ya29.token".to_string()),
            refresh_token: Some("1//refresh".to_string()),
            password_sealed: None,
            server_url: None,
        }
    }

    fn new_subscription(owner: &str, phone: &str) -> NewSubscription {
        NewSubscription {
            owner_id: owner.to_string(),
            workspace_id: "ws-1".to_string(),
            full_name: "Grandma".to_string(),
            phone: phone.to_string(),
            email: None,
            notify_on: "09:00".parse().unwrap(),
            timezone: "America/New_York".to_string(),
            event_preference: EventPreference::SameDay,
            channel: DeliveryChannel::Sms,
        }
    }

    fn log_at(subscription_id: i64, created_at: DateTime<Utc>) -> NewMessageLog {
        NewMessageLog {
            subscription_id,
            external_id: Some("SM123".to_string()),
            body: "hello".to_string(),
            segments: 1,
            direction: MessageDirection::Outbound,
            created_at,
        }
    }

    mod owners {
        use super::*;

        #[test]
        fn upsert_and_fetch() {
            let store = store();
            store
                .upsert_owner(&Owner {
                    id: "owner-1".to_string(),
                    full_name: "Dana".to_string(),
                    email: Some("dana@example.com".to_string()),
                    phone: None,
                })
                .unwrap();

            let owner = store.owner("owner-1").unwrap().unwrap();
            assert_eq!(owner.full_name, "Dana");

            // Upsert refreshes the row in place.
            store
                .upsert_owner(&Owner {
                    id: "owner-1".to_string(),
                    full_name: "Dana K.".to_string(),
                    email: Some("dana@example.com".to_string()),
                    phone: None,
                })
                .unwrap();
            assert_eq!(store.owner("owner-1").unwrap().unwrap().full_name, "Dana K.");

            assert!(store.owner("missing").unwrap().is_none());
        }
    }

    mod connections {
        use super::*;

        #[test]
        fn insert_and_fetch() {
            let store = store();
            let id = store.insert_connection(&new_connection("owner-1")).unwrap();

            let fetched = store.connection(id).unwrap().unwrap();
            assert_eq!(fetched.owner_id, "owner-1");
            assert_eq!(fetched.provider, CalendarKind::Google);
            assert!(fetched.error.is_none());

            assert!(store.connection(999).unwrap().is_none());
        }

        #[test]
        fn error_state_roundtrip() {
            let store = store();
            let id = store.insert_connection(&new_connection("owner-1")).unwrap();

            store
                .set_connection_error(id, Some("reconnect your Google account"))
                .unwrap();
            let fetched = store.connection(id).unwrap().unwrap();
            assert_eq!(
                fetched.error.as_deref(),
                Some("reconnect your Google account")
            );

            store.set_connection_error(id, None).unwrap();
            assert!(store.connection(id).unwrap().unwrap().error.is_none());
        }

        #[test]
        fn delete_removes_calendars_too() {
            let store = store();
            let id = store.insert_connection(&new_connection("owner-1")).unwrap();
            store.upsert_calendar(id, "owner-1", "primary", "Family").unwrap();

            store.delete_connection(id).unwrap();

            assert!(store.connection(id).unwrap().is_none());
            assert!(store.calendars_for_connection(id).unwrap().is_empty());
        }
    }

    mod calendars {
        use super::*;

        #[test]
        fn upsert_preserves_enabled_flag() {
            let store = store();
            let conn_id = store.insert_connection(&new_connection("owner-1")).unwrap();

            let cal = store
                .upsert_calendar(conn_id, "owner-1", "primary", "Family")
                .unwrap();
            assert!(cal.enabled);

            store.set_calendar_enabled(cal.id, false).unwrap();

            // Relisting updates the summary but not the owner's toggle.
            let again = store
                .upsert_calendar(conn_id, "owner-1", "primary", "Family (renamed)")
                .unwrap();
            assert_eq!(again.id, cal.id);
            assert_eq!(again.summary, "Family (renamed)");
            assert!(!again.enabled);
        }

        #[test]
        fn enabled_filter() {
            let store = store();
            let conn_id = store.insert_connection(&new_connection("owner-1")).unwrap();
            let a = store
                .upsert_calendar(conn_id, "owner-1", "a", "A")
                .unwrap();
            store.upsert_calendar(conn_id, "owner-1", "b", "B").unwrap();
            store.set_calendar_enabled(a.id, false).unwrap();

            let enabled = store.enabled_calendars_for_connection(conn_id).unwrap();
            assert_eq!(enabled.len(), 1);
            assert_eq!(enabled[0].external_id, "b");
        }
    }

    mod subscriptions {
        use super::*;

        #[test]
        fn due_requires_opt_in_and_enabled() {
            let store = store();
            let id = store
                .insert_subscription(&new_subscription("owner-1", "+15550001111"))
                .unwrap();

            let slot: NotifySlot = "09:00".parse().unwrap();
            // Not yet confirmed: never due.
            assert!(store.subscriptions_due(&slot).unwrap().is_empty());

            store.confirm_opt_in_by_phone("+15550001111").unwrap();
            assert_eq!(store.subscriptions_due(&slot).unwrap().len(), 1);

            store.set_subscription_enabled(id, false).unwrap();
            assert!(store.subscriptions_due(&slot).unwrap().is_empty());
        }

        #[test]
        fn due_matches_slot_exactly() {
            let store = store();
            store
                .insert_subscription(&new_subscription("owner-1", "+15550001111"))
                .unwrap();
            store.confirm_opt_in_by_phone("+15550001111").unwrap();

            assert_eq!(
                store
                    .subscriptions_due(&"09:00".parse().unwrap())
                    .unwrap()
                    .len(),
                1
            );
            assert!(store
                .subscriptions_due(&"09:15".parse().unwrap())
                .unwrap()
                .is_empty());
        }

        #[test]
        fn confirm_updates_every_row_sharing_phone() {
            let store = store();
            store
                .insert_subscription(&new_subscription("owner-1", "+15550001111"))
                .unwrap();
            store
                .insert_subscription(&new_subscription("owner-2", "+15550001111"))
                .unwrap();
            store
                .insert_subscription(&new_subscription("owner-3", "+15559998888"))
                .unwrap();

            let affected = store.confirm_opt_in_by_phone("+15550001111").unwrap();
            assert_eq!(affected, 2);

            let shared = store.subscriptions_by_phone("+15550001111").unwrap();
            assert!(shared.iter().all(|s| s.opt_in));

            let other = store.subscriptions_by_phone("+15559998888").unwrap();
            assert!(other.iter().all(|s| !s.opt_in));
        }

        #[test]
        fn confirm_is_idempotent() {
            let store = store();
            store
                .insert_subscription(&new_subscription("owner-1", "+15550001111"))
                .unwrap();

            store.confirm_opt_in_by_phone("+15550001111").unwrap();
            store.confirm_opt_in_by_phone("+15550001111").unwrap();

            let rows = store.subscriptions_by_phone("+15550001111").unwrap();
            assert!(rows.iter().all(|s| s.opt_in));
        }
    }

    mod message_logs {
        use super::*;
        use chrono::TimeZone;

        #[test]
        fn append_and_list() {
            let store = store();
            let sub_id = store
                .insert_subscription(&new_subscription("owner-1", "+15550001111"))
                .unwrap();

            let at = Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap();
            store.insert_message_log(&log_at(sub_id, at)).unwrap();

            let logs = store.message_logs_for_subscription(sub_id).unwrap();
            assert_eq!(logs.len(), 1);
            assert_eq!(logs[0].direction, MessageDirection::Outbound);
            assert_eq!(logs[0].created_at, at);
        }

        #[test]
        fn last_log_is_most_recent() {
            let store = store();
            let sub_id = store
                .insert_subscription(&new_subscription("owner-1", "+15550001111"))
                .unwrap();

            assert!(store.last_message_log_at(sub_id).unwrap().is_none());

            let earlier = Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap();
            let later = Utc.with_ymd_and_hms(2025, 6, 2, 9, 0, 0).unwrap();
            store.insert_message_log(&log_at(sub_id, later)).unwrap();
            store.insert_message_log(&log_at(sub_id, earlier)).unwrap();

            assert_eq!(store.last_message_log_at(sub_id).unwrap(), Some(later));
        }
    }

    #[test]
    fn open_persists_to_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("famdigest.db");

        {
            let store = Store::open(&path).unwrap();
            store.insert_connection(&new_connection("owner-1")).unwrap();
        }

        let store = Store::open(&path).unwrap();
        assert_eq!(store.connections_for_owner("owner-1").unwrap().len(), 1);
    }
}
