pub use self::{amount::*, checkpoint::*, records::*, stats::*, sums::*, transaction::*};

pub mod amount;
pub mod checkpoint;
pub mod records;
mod stats;
mod sums;
pub mod transaction;
