//! SQLite schema definitions for the wallet database.
//!
//! The `users` table carries the report request/status pair that coordinates
//! the export worker; `ledger_events` is the wallet history it reads.

use crate::sqlite_column;
use crate::sqlite_persistence::{ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema};

const USERS_TABLE_V1: Table = Table {
    name: "users",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!("handle", &SqlType::Text, non_null = true),
        sqlite_column!(
            "report_request",
            &SqlType::Text,
            non_null = true,
            default_value = Some("'no_request'")
        ),
        sqlite_column!(
            "report_status",
            &SqlType::Text,
            non_null = true,
            default_value = Some("'no_request'")
        ),
        sqlite_column!("report_status_updated_at", &SqlType::Text),
    ],
    indices: &[
        ("idx_users_handle", "handle"),
        ("idx_users_report", "report_request, report_status"),
    ],
};

const LEDGER_USER_FK: ForeignKey = ForeignKey {
    foreign_table: "users",
    foreign_column: "id",
    on_delete: ForeignKeyOnChange::Cascade,
};

const LEDGER_EVENTS_TABLE_V1: Table = Table {
    name: "ledger_events",
    columns: &[
        sqlite_column!("id", &SqlType::Integer, is_primary_key = true),
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&LEDGER_USER_FK)
        ),
        sqlite_column!("created_at", &SqlType::Integer, non_null = true),
        sqlite_column!("category", &SqlType::Text, non_null = true),
        sqlite_column!("amount_msats", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "fee_msats",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        // NULL for categories without a settlement step
        sqlite_column!("confirmation", &SqlType::Text),
    ],
    indices: &[(
        "idx_ledger_events_user_time",
        "user_id, created_at DESC, id DESC",
    )],
};

pub const WALLET_VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 1,
    tables: &[USERS_TABLE_V1, LEDGER_EVENTS_TABLE_V1],
}];
