use serde::Serialize;
use std::fmt;

pub type UserId = i64;

/// What the user has asked for. Written by the request/cancel surface,
/// read-only for the export worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportRequest {
    NoRequest,
    FullReport,
}

impl ReportRequest {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportRequest::NoRequest => "no_request",
            ReportRequest::FullReport => "full_report",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "no_request" => Some(ReportRequest::NoRequest),
            "full_report" => Some(ReportRequest::FullReport),
            _ => None,
        }
    }
}

/// Externally observable state of a user's report export.
///
/// ```text
/// NoRequest ──begin──▶ InProgress ──finish──▶ Done | Failed
///     ▲                                           │
///     └────────────── clear (idle) ───────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    NoRequest,
    InProgress,
    Done,
    Failed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportStatus::NoRequest => "no_request",
            ReportStatus::InProgress => "in_progress",
            ReportStatus::Done => "done",
            ReportStatus::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "no_request" => Some(ReportStatus::NoRequest),
            "in_progress" => Some(ReportStatus::InProgress),
            "done" => Some(ReportStatus::Done),
            "failed" => Some(ReportStatus::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ReportStatus::Done | ReportStatus::Failed)
    }

    /// Whether the state machine allows moving from `self` to `next`.
    pub fn can_transition_to(&self, next: ReportStatus) -> bool {
        matches!(
            (self, next),
            (ReportStatus::NoRequest, ReportStatus::InProgress)
                | (ReportStatus::InProgress, ReportStatus::Done)
                | (ReportStatus::InProgress, ReportStatus::Failed)
                | (ReportStatus::Done, ReportStatus::NoRequest)
                | (ReportStatus::Failed, ReportStatus::NoRequest)
        )
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The request and status columns of one user, read together.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportState {
    pub request: ReportRequest,
    pub status: ReportStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerCategory {
    Invoice,
    Withdrawal,
    Stacked,
    Spent,
}

impl LedgerCategory {
    pub const ALL: [LedgerCategory; 4] = [
        LedgerCategory::Invoice,
        LedgerCategory::Withdrawal,
        LedgerCategory::Stacked,
        LedgerCategory::Spent,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LedgerCategory::Invoice => "invoice",
            LedgerCategory::Withdrawal => "withdrawal",
            LedgerCategory::Stacked => "stacked",
            LedgerCategory::Spent => "spent",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "invoice" => Some(LedgerCategory::Invoice),
            "withdrawal" => Some(LedgerCategory::Withdrawal),
            "stacked" => Some(LedgerCategory::Stacked),
            "spent" => Some(LedgerCategory::Spent),
            _ => None,
        }
    }

    /// Incoming categories credit the wallet, outgoing ones debit it.
    pub fn is_incoming(&self) -> bool {
        matches!(self, LedgerCategory::Invoice | LedgerCategory::Stacked)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfirmationState {
    Confirmed,
    Pending,
    Failed,
    Expired,
    Cancelled,
}

impl ConfirmationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfirmationState::Confirmed => "confirmed",
            ConfirmationState::Pending => "pending",
            ConfirmationState::Failed => "failed",
            ConfirmationState::Expired => "expired",
            ConfirmationState::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "confirmed" => Some(ConfirmationState::Confirmed),
            "pending" => Some(ConfirmationState::Pending),
            "failed" => Some(ConfirmationState::Failed),
            "expired" => Some(ConfirmationState::Expired),
            "cancelled" => Some(ConfirmationState::Cancelled),
            _ => None,
        }
    }
}

/// One recorded wallet transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEvent {
    pub id: i64,
    pub user_id: UserId,
    /// Unix timestamp (seconds).
    pub created_at: i64,
    pub category: LedgerCategory,
    pub amount_msats: i64,
    pub fee_msats: i64,
    /// `None` for categories that have no settlement step (stacked, spent).
    pub confirmation: Option<ConfirmationState>,
}

/// A ledger event about to be recorded; the store assigns the id.
#[derive(Debug, Clone)]
pub struct NewLedgerEvent {
    pub user_id: UserId,
    pub created_at: i64,
    pub category: LedgerCategory,
    pub amount_msats: i64,
    pub fee_msats: i64,
    pub confirmation: Option<ConfirmationState>,
}

/// Opaque pagination token handed back by a ledger page fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerCursor(pub String);

#[derive(Debug, Clone, Default)]
pub struct LedgerPage {
    pub events: Vec<LedgerEvent>,
    /// `None` once the ledger is exhausted.
    pub next_cursor: Option<LedgerCursor>,
}
