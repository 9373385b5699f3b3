pub use crate::basis::{BasisError, LedgerError, ReconcileError};
pub use crate::export::ExportError;
pub use crate::imports::{ImportError, MalformedRecord};
pub use crate::model::amount::ParseAmountError;
pub use crate::model::checkpoint::CheckpointError;
