use market_store::{TransactionActivity, TransactionStatus};
use serde::{Serialize, Serializer};

use super::MarketError;

/// Status of an item as derived from its ledger.
///
/// `Ready` means no activity has ever been recorded for the item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CurrentStatus {
    Ready,
    Recorded(TransactionStatus),
}

impl CurrentStatus {
    /// Derives the status from the item's latest activity.
    pub fn from_latest(latest: Option<&TransactionActivity>) -> Self {
        match latest {
            Some(activity) => CurrentStatus::Recorded(activity.status),
            None => CurrentStatus::Ready,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CurrentStatus::Ready => "READY",
            CurrentStatus::Recorded(status) => status.as_str(),
        }
    }
}

impl std::fmt::Display for CurrentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CurrentStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Parses a ledger status.
pub fn parse_status(raw: &str) -> Result<TransactionStatus, MarketError> {
    Ok(raw.parse::<TransactionStatus>()?)
}

/// Parses the status requested with a new pickup; blank means ON_PROCESS.
pub fn parse_requested_status(raw: Option<&str>) -> Result<TransactionStatus, MarketError> {
    match raw.map(str::trim) {
        None | Some("") => Ok(TransactionStatus::OnProcess),
        Some(value) => parse_status(value),
    }
}

#[cfg(test)]
mod tests {
    use common::ItemId;
    use market_store::Sequence;

    use super::*;

    #[test]
    fn ready_without_activity() {
        assert_eq!(CurrentStatus::from_latest(None), CurrentStatus::Ready);
        assert_eq!(CurrentStatus::Ready.to_string(), "READY");
    }

    #[test]
    fn recorded_uses_latest_status() {
        let activity = TransactionActivity::new(
            ItemId::new(),
            TransactionStatus::OnDeliver,
            None,
            Sequence::first(),
        );
        let status = CurrentStatus::from_latest(Some(&activity));
        assert_eq!(status, CurrentStatus::Recorded(TransactionStatus::OnDeliver));
        assert_eq!(serde_json::to_value(status).unwrap(), "ON_DELIVER");
    }

    #[test]
    fn requested_status_defaults_to_on_process() {
        assert_eq!(
            parse_requested_status(None).unwrap(),
            TransactionStatus::OnProcess
        );
        assert_eq!(
            parse_requested_status(Some("  ")).unwrap(),
            TransactionStatus::OnProcess
        );
        assert_eq!(
            parse_requested_status(Some("ON_DELIVER")).unwrap(),
            TransactionStatus::OnDeliver
        );
    }

    #[test]
    fn unknown_status_is_invalid_input() {
        let err = parse_requested_status(Some("SHIPPED")).unwrap_err();
        assert!(matches!(err, MarketError::InvalidStatus(_)));
        assert!(parse_status("READY").is_err());
    }
}
