//! Event types and traits for scanner notifications.
//!
//! The scanner reports new block headers, per-account extracted transfers and
//! its own lifecycle through an [`EventSender`]. Delivery is fire-and-forget:
//! a `false` return from [`EventSender::send`] is treated as a failed
//! notification and recorded as an unscan record, never retried inline.
//!
//! # Event Categories
//!
//! - **Block Events** ([`ProcessingEvent::NewBlock`]): A block was accepted, or
//!   orphaned by a fork when [`BlockHeader::fork`] is set
//! - **Extraction Events** ([`ExtractDataEvent`]): One tracked account's view of one transfer
//! - **Status Events** ([`ScanStatusEvent`]): Session started, progress, caught up, stopped
//!
//! # Example Usage
//!
//! ```rust,ignore
//! use tokio::sync::mpsc;
//! use pia_wallet::scan::{ChannelEventSender, ProcessingEvent};
//!
//! let (tx, mut rx) = mpsc::unbounded_channel();
//! let sender = ChannelEventSender::new(tx);
//!
//! while let Some(event) = rx.recv().await {
//!     match event {
//!         ProcessingEvent::NewBlock(header) if header.fork => {
//!             println!("Block {} orphaned", header.height);
//!         }
//!         ProcessingEvent::ExtractData(e) => {
//!             println!("{} touched by {}", e.account_key, e.data.transaction.tx_id);
//!         }
//!         _ => {}
//!     }
//! }
//! ```

use crate::models::{BlockHeader, TxExtractData};

/// Top-level enum for all scanner notifications.
#[derive(Debug, Clone)]
pub enum ProcessingEvent {
    /// A block header was accepted, or orphaned (`fork == true`).
    NewBlock(BlockHeader),

    /// A transfer touched a tracked account.
    ExtractData(ExtractDataEvent),

    /// Scan session lifecycle.
    ScanStatus(ScanStatusEvent),
}

#[derive(Debug, Clone)]
pub struct ExtractDataEvent {
    pub account_key: String,
    pub data: TxExtractData,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanStatusEvent {
    Started {
        from_height: u64,
    },
    Progress {
        current_height: u64,
        head_height: u64,
    },
    CaughtUp {
        height: u64,
    },
    Stopped {
        last_scanned_height: u64,
        reason: StopReason,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Cancelled,
    Error(String),
}

pub trait EventSender: Send + Sync {
    fn send(&self, event: ProcessingEvent) -> bool;
}

#[derive(Debug, Clone, Default)]
pub struct NoopEventSender;

impl EventSender for NoopEventSender {
    fn send(&self, _event: ProcessingEvent) -> bool {
        true
    }
}

#[derive(Debug, Clone)]
pub struct ChannelEventSender {
    sender: tokio::sync::mpsc::UnboundedSender<ProcessingEvent>,
}

impl ChannelEventSender {
    pub fn new(sender: tokio::sync::mpsc::UnboundedSender<ProcessingEvent>) -> Self {
        Self { sender }
    }
}

impl EventSender for ChannelEventSender {
    fn send(&self, event: ProcessingEvent) -> bool {
        self.sender.send(event).is_ok()
    }
}
