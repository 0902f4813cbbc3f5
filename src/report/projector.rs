use crate::wallet_store::{ConfirmationState, LedgerCategory, LedgerEvent};

/// One line of a wallet report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    /// Unix timestamp (seconds).
    pub time: i64,
    pub category: LedgerCategory,
    /// Signed net amount in millisatoshis, fees included.
    pub net_msats: i64,
}

/// Events carrying a confirmation state only count once confirmed.
pub fn is_reportable(event: &LedgerEvent) -> bool {
    match event.confirmation {
        None | Some(ConfirmationState::Confirmed) => true,
        Some(_) => false,
    }
}

pub fn project(event: &LedgerEvent) -> ReportRow {
    let amount = event.amount_msats.saturating_abs();
    let signed = if event.category.is_incoming() {
        amount
    } else {
        -amount
    };

    ReportRow {
        time: event.created_at,
        category: event.category,
        net_msats: signed.saturating_sub(event.fee_msats.saturating_abs()),
    }
}

/// Renders millisatoshis as sats: integers when whole, otherwise up to three
/// decimals with trailing zeros trimmed.
pub fn format_sats(msats: i64) -> String {
    let sign = if msats < 0 { "-" } else { "" };
    let abs = msats.unsigned_abs();
    let whole = abs / 1000;
    let frac = abs % 1000;

    if frac == 0 {
        return format!("{}{}", sign, whole);
    }

    let frac = format!("{:03}", frac);
    format!("{}{}.{}", sign, whole, frac.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(category: LedgerCategory, amount: i64, fee: i64) -> LedgerEvent {
        LedgerEvent {
            id: 1,
            user_id: 1,
            created_at: 100,
            category,
            amount_msats: amount,
            fee_msats: fee,
            confirmation: None,
        }
    }

    #[test]
    fn test_incoming_is_positive() {
        let row = project(&event(LedgerCategory::Stacked, 5000, 0));
        assert_eq!(row.net_msats, 5000);
        assert_eq!(row.time, 100);
        assert_eq!(row.category, LedgerCategory::Stacked);

        assert_eq!(project(&event(LedgerCategory::Invoice, -2000, 0)).net_msats, 2000);
    }

    #[test]
    fn test_outgoing_is_negative_and_pays_fee() {
        assert_eq!(project(&event(LedgerCategory::Spent, 2000, 0)).net_msats, -2000);
        assert_eq!(
            project(&event(LedgerCategory::Withdrawal, 10_000, 1500)).net_msats,
            -11_500
        );
        assert_eq!(
            project(&event(LedgerCategory::Invoice, 10_000, -1000)).net_msats,
            9000
        );
    }

    #[test]
    fn test_only_confirmed_or_unsettled_events_reported() {
        let mut e = event(LedgerCategory::Invoice, 1000, 0);
        assert!(is_reportable(&e));

        e.confirmation = Some(ConfirmationState::Confirmed);
        assert!(is_reportable(&e));

        for state in [
            ConfirmationState::Pending,
            ConfirmationState::Failed,
            ConfirmationState::Expired,
            ConfirmationState::Cancelled,
        ] {
            e.confirmation = Some(state);
            assert!(!is_reportable(&e), "{:?} should be skipped", state);
        }
    }

    #[test]
    fn test_format_sats() {
        assert_eq!(format_sats(0), "0");
        assert_eq!(format_sats(5000), "5");
        assert_eq!(format_sats(-2000), "-2");
        assert_eq!(format_sats(1500), "1.5");
        assert_eq!(format_sats(1), "0.001");
        assert_eq!(format_sats(-10), "-0.01");
        assert_eq!(format_sats(123_450), "123.45");
    }
}
