//! Background daemon mode for continuous block scanning.
//!
//! The [`Daemon`] runs one scan session every `scan_interval`, each session
//! walking the chain from the persisted cursor to the node head. A failed
//! session is logged and retried on the next tick; only
//! [`ScanError::Fatal`] stops the daemon.
//!
//! # Usage Example
//!
//! ```ignore
//! use pia_wallet::{daemon::Daemon, scan::NoopEventSender, wallet::WalletContext};
//!
//! let context = WalletContext::open(config)?;
//! let daemon = Daemon::new(context.scanner(NoopEventSender), Duration::from_secs(10));
//! daemon.run().await?;
//! ```
//!
//! Ctrl+C, or cancelling [`Daemon::shutdown_token`], stops the daemon once the
//! block being scanned has been fully extracted.

use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::{signal, sync::mpsc, task::JoinHandle, time::sleep};
use tokio_util::sync::CancellationToken;

use crate::{
    log::mask_string,
    scan::{BlockScanner, EventSender, ProcessingEvent, ScanError, ScanStatusEvent},
};

pub struct Daemon<E: EventSender> {
    scanner: BlockScanner<E>,
    scan_interval: Duration,
    shutdown: CancellationToken,
}

impl<E: EventSender> Daemon<E> {
    pub fn new(scanner: BlockScanner<E>, scan_interval: Duration) -> Self {
        Self {
            scanner,
            scan_interval,
            shutdown: CancellationToken::new(),
        }
    }

    /// Cancelling this token stops the daemon after the current block.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Runs scan sessions until Ctrl+C, cancellation or a fatal error.
    pub async fn run(&self) -> Result<(), ScanError> {
        info!(interval_secs = self.scan_interval.as_secs(); "Daemon started. Press Ctrl+C to stop.");

        let shutdown = self.shutdown.clone();
        let ctrlc_handle = tokio::spawn(async move {
            tokio::select! {
                res = signal::ctrl_c() => {
                    match res {
                        Ok(()) => info!("Received shutdown signal, stopping scanner..."),
                        Err(e) => error!(error:% = e; "Failed to listen for ctrl_c"),
                    }
                    shutdown.cancel();
                }
                _ = shutdown.cancelled() => {}
            }
        });

        let result = self.scan_and_sleep_loop().await;

        self.shutdown.cancel();
        if let Err(e) = ctrlc_handle.await {
            warn!(error:% = e; "Signal listener ended abnormally");
        }

        if result.is_ok() {
            info!("Daemon stopped gracefully.");
        }
        result
    }

    async fn scan_and_sleep_loop(&self) -> Result<(), ScanError> {
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            match self.scanner.scan(&self.shutdown).await {
                Ok(summary) => {
                    info!(
                        from = summary.start_height,
                        to = summary.end_height,
                        blocks = summary.blocks_scanned,
                        forks = summary.forks_detected;
                        "Scan session finished"
                    );
                },
                Err(ScanError::Fatal(e)) => {
                    error!(error:% = e; "A fatal error occurred during the scan session");
                    return Err(ScanError::Fatal(e));
                },
                Err(e) => {
                    warn!(error:% = e; "Scan session failed, will retry after interval");
                },
            }

            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("Scanner received shutdown signal. Exiting gracefully.");
                    break;
                }
                _ = sleep(self.scan_interval) => {}
            }
        }
        Ok(())
    }
}

/// Logs every scanner notification. Returns when all senders are dropped.
pub fn spawn_event_logger(mut rx: mpsc::UnboundedReceiver<ProcessingEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                ProcessingEvent::NewBlock(header) if header.fork => {
                    warn!(height = header.height, hash = header.hash.as_str(); "Block orphaned by fork");
                },
                ProcessingEvent::NewBlock(header) => {
                    debug!(height = header.height, hash = header.hash.as_str(); "New block");
                },
                ProcessingEvent::ExtractData(e) => {
                    info!(
                        account:% = mask_string(&e.account_key),
                        tx_id = e.data.transaction.tx_id.as_str(),
                        height = e.data.transaction.block_height,
                        inputs = e.data.inputs.len(),
                        outputs = e.data.outputs.len();
                        "Transfer extracted"
                    );
                },
                ProcessingEvent::ScanStatus(ScanStatusEvent::Progress {
                    current_height,
                    head_height,
                }) => {
                    debug!(current = current_height, head = head_height; "Scan progress");
                },
                ProcessingEvent::ScanStatus(status) => {
                    info!(status:? = status; "Scan status");
                },
            }
        }
    })
}
