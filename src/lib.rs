pub mod accounts;
pub mod chain;
pub mod cli;
pub mod config;
pub mod daemon;
pub mod db;
pub mod http;
pub mod log;
pub mod models;
pub mod scan;
pub mod transactions;
pub mod wallet;

pub use crate::db::init_db;
pub use crate::scan::ScanError;
pub use crate::transactions::TransactionError;
