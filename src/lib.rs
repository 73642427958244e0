pub mod api;
pub mod bill;
pub mod cli;
pub mod config;
pub mod entity;
pub mod error;
pub mod extraction;
pub mod report;
pub mod storage;
pub mod warnings;

pub use bill::{compute_split, Bill, BillState, SplitSummary};
pub use config::Config;
pub use error::{BillsplitError, ErrorKind, Result};
pub use storage::{Session, SqliteStore};
