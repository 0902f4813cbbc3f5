use super::models::{
    ConfirmationState, LedgerCategory, LedgerCursor, LedgerEvent, LedgerPage, NewLedgerEvent,
    ReportRequest, ReportState, ReportStatus, UserId,
};
use super::schema::WALLET_VERSIONED_SCHEMAS;
use super::{LedgerReader, ReportStatusStore, WalletStore};
use crate::sqlite_persistence::VersionedSchema;
use anyhow::{bail, Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::info;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

pub struct SqliteWalletStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteWalletStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let path = db_path.as_ref();
        let is_new_db = !path.exists();

        let conn = Connection::open(path).context("Failed to open wallet database")?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        conn.execute("PRAGMA foreign_keys = ON;", [])?;

        let latest = WALLET_VERSIONED_SCHEMAS
            .last()
            .context("No wallet schemas defined")?;

        if is_new_db {
            info!("Creating new wallet database at {:?}", path);
            latest.create(&conn)?;
        } else {
            let db_version = VersionedSchema::stored_version(&conn)?;
            if db_version < 1 {
                bail!(
                    "Wallet database version {} is invalid (expected >= 1)",
                    db_version
                );
            }
            let schema = WALLET_VERSIONED_SCHEMAS
                .iter()
                .find(|s| s.version as i64 == db_version)
                .with_context(|| format!("Unknown wallet database version {}", db_version))?;
            schema.validate(&conn).with_context(|| {
                format!(
                    "Wallet database schema validation failed for version {}",
                    db_version
                )
            })?;
        }

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    #[cfg(test)]
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        WALLET_VERSIONED_SCHEMAS
            .last()
            .context("No wallet schemas defined")?
            .create(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn format_datetime(dt: &DateTime<Utc>) -> String {
        dt.to_rfc3339()
    }

    fn encode_cursor(event: &LedgerEvent) -> LedgerCursor {
        LedgerCursor(URL_SAFE_NO_PAD.encode(format!("{}:{}", event.created_at, event.id)))
    }

    fn decode_cursor(cursor: &LedgerCursor) -> Result<(i64, i64)> {
        let bytes = URL_SAFE_NO_PAD
            .decode(&cursor.0)
            .with_context(|| format!("Malformed ledger cursor {:?}", cursor.0))?;
        let text = String::from_utf8(bytes).context("Ledger cursor is not UTF-8")?;
        let (created_at, id) = text
            .split_once(':')
            .with_context(|| format!("Malformed ledger cursor {:?}", cursor.0))?;
        Ok((
            created_at.parse().context("Bad cursor timestamp")?,
            id.parse().context("Bad cursor id")?,
        ))
    }

    fn conversion_error(column: usize, message: String) -> rusqlite::Error {
        rusqlite::Error::FromSqlConversionFailure(column, Type::Text, message.into())
    }

    fn row_to_ledger_event(row: &rusqlite::Row) -> rusqlite::Result<LedgerEvent> {
        let category_str: String = row.get("category")?;
        let category = LedgerCategory::parse(&category_str).ok_or_else(|| {
            Self::conversion_error(3, format!("Unknown ledger category '{}'", category_str))
        })?;

        let confirmation = match row.get::<_, Option<String>>("confirmation")? {
            Some(s) => Some(ConfirmationState::parse(&s).ok_or_else(|| {
                Self::conversion_error(6, format!("Unknown confirmation state '{}'", s))
            })?),
            None => None,
        };

        Ok(LedgerEvent {
            id: row.get("id")?,
            user_id: row.get("user_id")?,
            created_at: row.get("created_at")?,
            category,
            amount_msats: row.get("amount_msats")?,
            fee_msats: row.get("fee_msats")?,
            confirmation,
        })
    }

    fn row_to_report_state(row: &rusqlite::Row) -> rusqlite::Result<ReportState> {
        let request_str: String = row.get("report_request")?;
        let status_str: String = row.get("report_status")?;
        Ok(ReportState {
            request: ReportRequest::parse(&request_str).ok_or_else(|| {
                Self::conversion_error(0, format!("Unknown report request '{}'", request_str))
            })?,
            status: ReportStatus::parse(&status_str).ok_or_else(|| {
                Self::conversion_error(1, format!("Unknown report status '{}'", status_str))
            })?,
        })
    }
}

impl ReportStatusStore for SqliteWalletStore {
    fn get_report_state(&self, user_id: UserId) -> Result<Option<ReportState>> {
        let conn = self.conn.lock().unwrap();
        let state = conn
            .query_row(
                "SELECT report_request, report_status FROM users WHERE id = ?1",
                params![user_id],
                Self::row_to_report_state,
            )
            .optional()?;
        Ok(state)
    }

    fn get_report_request(&self, user_id: UserId) -> Result<Option<ReportRequest>> {
        let conn = self.conn.lock().unwrap();
        let request: Option<String> = conn
            .query_row(
                "SELECT report_request FROM users WHERE id = ?1",
                params![user_id],
                |row| row.get(0),
            )
            .optional()?;

        match request {
            Some(s) => Ok(Some(
                ReportRequest::parse(&s)
                    .with_context(|| format!("Unknown report request '{}'", s))?,
            )),
            None => Ok(None),
        }
    }

    fn transition_status(
        &self,
        user_id: UserId,
        expected: ReportStatus,
        next: ReportStatus,
    ) -> Result<bool> {
        if !expected.can_transition_to(next) {
            bail!(
                "Invalid report status transition {} -> {} for user {}",
                expected,
                next,
                user_id
            );
        }

        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE users SET report_status = ?1, report_status_updated_at = ?2
             WHERE id = ?3 AND report_status = ?4",
            params![
                next.as_str(),
                Self::format_datetime(&Utc::now()),
                user_id,
                expected.as_str()
            ],
        )?;
        Ok(changed == 1)
    }

    fn begin_export(&self, user_id: UserId) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE users SET report_status = ?1, report_status_updated_at = ?2
             WHERE id = ?3 AND report_status = ?4 AND report_request = ?5",
            params![
                ReportStatus::InProgress.as_str(),
                Self::format_datetime(&Utc::now()),
                user_id,
                ReportStatus::NoRequest.as_str(),
                ReportRequest::FullReport.as_str()
            ],
        )?;
        Ok(changed == 1)
    }

    fn clear_if_idle(&self, user_id: UserId) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE users SET report_status = ?1, report_status_updated_at = ?2
             WHERE id = ?3 AND report_request = ?4 AND report_status IN (?5, ?6)",
            params![
                ReportStatus::NoRequest.as_str(),
                Self::format_datetime(&Utc::now()),
                user_id,
                ReportRequest::NoRequest.as_str(),
                ReportStatus::Done.as_str(),
                ReportStatus::Failed.as_str()
            ],
        )?;
        Ok(changed == 1)
    }

    fn set_report_request(&self, user_id: UserId, request: ReportRequest) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            "UPDATE users SET report_request = ?1 WHERE id = ?2",
            params![request.as_str(), user_id],
        )?;
        Ok(changed == 1)
    }

    fn list_users_needing_dispatch(&self) -> Result<Vec<UserId>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id FROM users
             WHERE (report_request = ?1 AND report_status = ?2)
                OR (report_request = ?3 AND report_status IN (?4, ?5))
             ORDER BY id",
        )?;
        let ids = stmt
            .query_map(
                params![
                    ReportRequest::FullReport.as_str(),
                    ReportStatus::NoRequest.as_str(),
                    ReportRequest::NoRequest.as_str(),
                    ReportStatus::Done.as_str(),
                    ReportStatus::Failed.as_str()
                ],
                |row| row.get(0),
            )?
            .collect::<rusqlite::Result<Vec<UserId>>>()?;
        Ok(ids)
    }

    fn recover_interrupted_exports(&self) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        let count = conn.execute(
            "UPDATE users SET report_status = ?1, report_status_updated_at = ?2
             WHERE report_status = ?3",
            params![
                ReportStatus::Failed.as_str(),
                Self::format_datetime(&Utc::now()),
                ReportStatus::InProgress.as_str()
            ],
        )?;
        Ok(count)
    }
}

impl LedgerReader for SqliteWalletStore {
    fn fetch_page(
        &self,
        user_id: UserId,
        cursor: Option<&LedgerCursor>,
        categories: &[LedgerCategory],
        limit: usize,
    ) -> Result<LedgerPage> {
        if limit == 0 {
            bail!("Ledger page limit must be positive");
        }
        if categories.is_empty() {
            return Ok(LedgerPage::default());
        }

        let mut sql = String::from(
            "SELECT id, user_id, created_at, category, amount_msats, fee_msats, confirmation
             FROM ledger_events WHERE user_id = ?",
        );
        let mut values: Vec<Value> = vec![Value::Integer(user_id)];

        let placeholders = vec!["?"; categories.len()].join(", ");
        sql.push_str(&format!(" AND category IN ({})", placeholders));
        values.extend(
            categories
                .iter()
                .map(|c| Value::Text(c.as_str().to_string())),
        );

        // Keyset continuation: strictly older than the last event already served
        if let Some(cursor) = cursor {
            let (created_at, id) = Self::decode_cursor(cursor)?;
            sql.push_str(" AND (created_at < ? OR (created_at = ? AND id < ?))");
            values.extend([
                Value::Integer(created_at),
                Value::Integer(created_at),
                Value::Integer(id),
            ]);
        }

        sql.push_str(" ORDER BY created_at DESC, id DESC LIMIT ?");
        values.push(Value::Integer(limit as i64));

        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&sql)?;
        let events = stmt
            .query_map(params_from_iter(values), Self::row_to_ledger_event)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let next_cursor = if events.len() == limit {
            events.last().map(Self::encode_cursor)
        } else {
            None
        };

        Ok(LedgerPage {
            events,
            next_cursor,
        })
    }
}

impl WalletStore for SqliteWalletStore {
    fn create_user(&self, handle: &str) -> Result<UserId> {
        let conn = self.conn.lock().unwrap();
        let existing: Option<UserId> = conn
            .query_row(
                "SELECT id FROM users WHERE handle = ?1",
                params![handle],
                |row| row.get(0),
            )
            .optional()?;
        if existing.is_some() {
            bail!("User with handle '{}' already exists", handle);
        }

        conn.execute("INSERT INTO users (handle) VALUES (?1)", params![handle])?;
        Ok(conn.last_insert_rowid())
    }

    fn get_user_id(&self, handle: &str) -> Result<Option<UserId>> {
        let conn = self.conn.lock().unwrap();
        let id = conn
            .query_row(
                "SELECT id FROM users WHERE handle = ?1",
                params![handle],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn add_ledger_event(&self, event: &NewLedgerEvent) -> Result<i64> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            "INSERT INTO ledger_events
             (user_id, created_at, category, amount_msats, fee_msats, confirmation)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event.user_id,
                event.created_at,
                event.category.as_str(),
                event.amount_msats,
                event.fee_msats,
                event.confirmation.map(|c| c.as_str())
            ],
        )
        .with_context(|| format!("Failed to add ledger event for user {}", event.user_id))?;
        Ok(conn.last_insert_rowid())
    }
}
