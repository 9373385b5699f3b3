use crate::model::records::UndisposedPurchase;
use chrono::Utc;
use ron::{de::SpannedError, ser::PrettyConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const CHECKPOINT_VERSION: &str = "1.0.0";

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("I/O error")]
    Io(#[from] std::io::Error),

    #[error("Unable to deserialize")]
    Deserialize(#[from] SpannedError),

    #[error("Unable to serialize")]
    Serialize(#[from] ron::Error),

    #[error("Expected version `{CHECKPOINT_VERSION}`, found `{0}`")]
    Version(String),

    #[error("Invalid open purchase `{txn_id}`: {reason}")]
    InvalidLot { txn_id: String, reason: &'static str },
}

/// State for carrying open purchase lots across tax years.
#[derive(Debug, Default)]
pub struct State {
    pub(crate) header: CheckpointHeader,

    /// Purchase lots with quantity remaining at the end of a run.
    ///
    /// Each lot keeps its original quantity, cost basis and fee, so reconciling against it in a
    /// later run prorates exactly as an uninterrupted run would.
    pub open_purchases: Vec<UndisposedPurchase>,
}

/// On-disk representation of [`State`].
#[derive(Debug, Deserialize, Serialize)]
struct Checkpoint {
    header: CheckpointHeader,
    open_purchases: Vec<UndisposedPurchase>,
}

/// Header for checkpoints.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct CheckpointHeader {
    /// When the checkpoint was saved.
    pub time: String,

    /// Checkpoint version.
    pub semver: String,

    /// Timestamp of the most recent transaction processed.
    pub latest_row_time: Option<String>,
}

impl Default for CheckpointHeader {
    fn default() -> Self {
        Self {
            time: format!("{}", Utc::now().format("%F %T")),
            semver: CHECKPOINT_VERSION.to_string(),
            latest_row_time: None,
        }
    }
}

impl State {
    pub fn new(open_purchases: Vec<UndisposedPurchase>) -> Self {
        Self {
            open_purchases,
            ..Default::default()
        }
    }

    /// Load a `State` from the given path.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CheckpointError> {
        let serialized = std::fs::read_to_string(path)?;
        let checkpoint: Checkpoint = ron::from_str(&serialized)?;

        // Validate header.
        if checkpoint.header.semver != CHECKPOINT_VERSION {
            return Err(CheckpointError::Version(checkpoint.header.semver));
        }
        for lot in &checkpoint.open_purchases {
            validate_lot(lot)?;
        }

        Ok(checkpoint.into())
    }

    /// Save a `State` to the given path.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), CheckpointError> {
        let header = CheckpointHeader {
            latest_row_time: self.header.latest_row_time.clone(),
            ..Default::default()
        };
        let checkpoint = Checkpoint {
            header,
            open_purchases: self.open_purchases.clone(),
        };
        let serialized = ron::ser::to_string_pretty(&checkpoint, PrettyConfig::default())?;

        std::fs::write(path, serialized)?;

        Ok(())
    }

    /// Record the timestamp of the most recent transaction processed, returning the old value (if
    /// any).
    pub fn latest_row_time(&mut self, time: String) -> Option<String> {
        self.header.latest_row_time.replace(time)
    }

    pub fn header(&self) -> &CheckpointHeader {
        &self.header
    }
}

fn validate_lot(lot: &UndisposedPurchase) -> Result<(), CheckpointError> {
    let reason = if !lot.quantity_remaining.is_positive() {
        "quantity_remaining must be greater than zero"
    } else if lot.quantity_remaining > lot.quantity {
        "quantity_remaining exceeds quantity"
    } else if lot.price.is_negative() || lot.fee.is_negative() || lot.cost_basis.is_negative() {
        "negative price, fee or cost_basis"
    } else {
        return Ok(());
    };

    Err(CheckpointError::InvalidLot {
        txn_id: lot.txn_id.clone(),
        reason,
    })
}

impl From<Checkpoint> for State {
    fn from(checkpoint: Checkpoint) -> Self {
        Self {
            header: checkpoint.header,
            open_purchases: checkpoint.open_purchases,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::amount::Quantity;
    use chrono::NaiveDateTime;
    use tracing_test::traced_test;

    fn open_lot() -> UndisposedPurchase {
        UndisposedPurchase {
            symbol: "BTCUSD".to_string(),
            exchange: "CoinbasePro".to_string(),
            time: NaiveDateTime::parse_from_str("2021-05-04 12:30:00", "%F %T")
                .unwrap()
                .and_utc(),
            txn_id: "1234".to_string(),
            price: "57000.01".parse().unwrap(),
            quantity: "0.01".parse().unwrap(),
            quantity_remaining: "0.00534381".parse().unwrap(),
            cost_basis: "570.5".parse().unwrap(),
            fee: "0.4999".parse().unwrap(),
        }
    }

    #[test]
    #[traced_test]
    fn test_checkpoint_save_and_load() {
        let dir = std::env::temp_dir().join(format!("fifocount-checkpoint-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("state.ron");

        let mut state = State::new(vec![open_lot()]);
        assert_eq!(state.latest_row_time("2021-12-31 23:59:59".to_string()), None);
        state.save(&path).unwrap();

        let loaded = State::load(&path).unwrap();
        similar_asserts::assert_eq!(loaded.open_purchases, state.open_purchases);
        assert_eq!(
            loaded.header().latest_row_time.as_deref(),
            Some("2021-12-31 23:59:59")
        );

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    #[traced_test]
    fn test_checkpoint_version_mismatch() {
        let serialized = r#"(
            header: (time: "2020-01-01 00:00:00", semver: "0.0.1", latest_row_time: None),
            open_purchases: [],
        )"#;
        let dir = std::env::temp_dir().join(format!("fifocount-version-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("old.ron");
        std::fs::write(&path, serialized).unwrap();

        let err = State::load(&path).unwrap_err();
        assert!(matches!(err, CheckpointError::Version(v) if v == "0.0.1"));

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    #[traced_test]
    fn test_checkpoint_rejects_invalid_lots() {
        let dir = std::env::temp_dir().join(format!("fifocount-invalid-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("invalid.ron");

        let overdrawn = UndisposedPurchase {
            quantity_remaining: "1.5".parse().unwrap(),
            quantity: "1".parse().unwrap(),
            ..open_lot()
        };
        let negative = UndisposedPurchase {
            price: "-57000.01".parse().unwrap(),
            ..open_lot()
        };
        let empty = UndisposedPurchase {
            quantity_remaining: Quantity::ZERO,
            ..open_lot()
        };

        for lot in [overdrawn, negative, empty] {
            State::new(vec![lot]).save(&path).unwrap();

            let err = State::load(&path).unwrap_err();
            assert!(
                matches!(&err, CheckpointError::InvalidLot { txn_id, .. } if txn_id == "1234"),
                "{err:?}"
            );
        }

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
