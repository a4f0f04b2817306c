pub mod claims;
pub mod extract;
pub mod patent;
pub mod report;
pub mod text;

mod error;

pub use error::{Error, Result};
pub use patent::PatentRecord;
pub use report::{RiskLevel, ScoredCandidate};
