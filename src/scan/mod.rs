//! Block scanning and transfer extraction.
//!
//! [`BlockScanner`] walks the chain from the persisted cursor to the node head,
//! handing every accepted block to the [`TransferExtractor`], which fans its
//! transfer events out over a bounded set of concurrent tasks.

mod events;
mod extractor;
mod resolver;
mod scanner;
mod store;
mod types;

pub use events::{
    ChannelEventSender, EventSender, ExtractDataEvent, NoopEventSender, ProcessingEvent, ScanStatusEvent, StopReason,
};
pub use extractor::{BlockRef, DEFAULT_MAX_EXTRACTING_SIZE, NOTIFY_FAILED_REASON, TransferExtractor};
pub use resolver::ScanTargetResolver;
pub use scanner::{BlockScanner, SessionSummary};
pub use store::{ScanStore, SqliteScanStore};
pub use types::{ExtractError, ExtractSummary, ScanError};
