#![forbid(unsafe_code)]

pub mod basis;
pub mod errors;
pub mod export;
pub mod imports;
pub mod model;
pub mod util;
