//! Bounded-concurrency extraction of one block's transfer events.
//!
//! A dispatcher task spawns one worker per event, each holding a permit from a
//! semaphore of `max_extracting_size` permits. Workers only classify; they send
//! their result over a channel to the collector running in the caller's task.
//! The collector delivers notifications and is the only writer of unscan
//! records. It finishes once it has seen one result per event.

use std::sync::Arc;

use chrono::Utc;
use log::{debug, error, warn};
use tokio::sync::{Semaphore, mpsc};

use crate::{
    chain::{TransferEvent, asset::parse_units},
    log::mask_string,
    models::{
        Coin, LedgerTransaction, Recharge, RechargeSide, TxExtractData, UnscanRecord, gen_recharge_sid,
        gen_transaction_wx_id,
    },
    scan::{
        events::{EventSender, ExtractDataEvent, ProcessingEvent},
        resolver::ScanTargetResolver,
        store::ScanStore,
        types::{ExtractError, ExtractSummary, ScanError},
    },
};

pub const DEFAULT_MAX_EXTRACTING_SIZE: usize = 10;
pub const NOTIFY_FAILED_REASON: &str = "ExtractData Notify failed.";

const TRANSFER_OPERATION: &str = "transfer";

/// Identity of the block whose events are being extracted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRef {
    pub height: u64,
    pub hash: String,
    pub time: u64,
}

struct ExtractOutcome {
    tx_id: String,
    result: Result<Vec<(String, TxExtractData)>, ExtractError>,
}

/// Settings and collaborators shared by every worker of one batch.
struct ExtractContext {
    symbol: String,
    decimals: u8,
    native_tag: String,
    resolver: Option<Arc<dyn ScanTargetResolver>>,
    block: BlockRef,
}

#[derive(Clone)]
pub struct TransferExtractor {
    symbol: String,
    decimals: u8,
    native_tag: String,
    resolver: Option<Arc<dyn ScanTargetResolver>>,
    max_extracting_size: usize,
}

impl TransferExtractor {
    pub fn new(symbol: &str, decimals: u8, native_tag: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            decimals,
            native_tag: native_tag.to_string(),
            resolver: None,
            max_extracting_size: DEFAULT_MAX_EXTRACTING_SIZE,
        }
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn ScanTargetResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }

    /// Maximum number of events classified at the same time. Clamped to at least 1.
    pub fn max_extracting_size(mut self, size: usize) -> Self {
        self.max_extracting_size = size.max(1);
        self
    }

    /// Extracts every event of one block.
    ///
    /// Successful events are delivered through `event_sender` as they complete.
    /// Failed events, and events whose notification was refused, become unscan
    /// records keyed by the block height. Returns
    /// [`ScanError::ExtractionFailed`] when any event failed, after the whole
    /// batch has drained.
    pub async fn extract<E: EventSender + ?Sized>(
        &self,
        block: &BlockRef,
        events: &[TransferEvent],
        event_sender: &E,
        store: &dyn ScanStore,
    ) -> Result<ExtractSummary, ScanError> {
        let total = events.len();
        let mut summary = ExtractSummary {
            total,
            ..Default::default()
        };
        if total == 0 {
            return Ok(summary);
        }

        debug!(height = block.height, total = total; "Extracting block transfers");

        let context = Arc::new(ExtractContext {
            symbol: self.symbol.clone(),
            decimals: self.decimals,
            native_tag: self.native_tag.clone(),
            resolver: self.resolver.clone(),
            block: block.clone(),
        });
        let permits = Arc::new(Semaphore::new(self.max_extracting_size));
        let (tx, mut rx) = mpsc::channel::<ExtractOutcome>(total);

        let dispatcher = tokio::spawn(dispatch(events.to_vec(), context, permits, tx));

        let mut done = 0;
        let mut db_error = None;

        while done < total {
            let Some(outcome) = rx.recv().await else {
                break;
            };
            done += 1;

            let reason = match outcome.result {
                Ok(extracted) => {
                    let mut delivered = true;
                    for (account_key, data) in extracted {
                        delivered &= event_sender.send(ProcessingEvent::ExtractData(ExtractDataEvent { account_key, data }));
                    }
                    if delivered {
                        summary.succeeded += 1;
                        continue;
                    }
                    NOTIFY_FAILED_REASON.to_string()
                },
                Err(e) => {
                    warn!(
                        height = block.height,
                        tx_id = outcome.tx_id.as_str(),
                        error:% = e;
                        "Transfer extraction failed"
                    );
                    e.to_string()
                },
            };

            summary.failed += 1;
            let record = UnscanRecord::new(block.height, "", &reason);
            if let Err(e) = store.save_unscan_record(&record).await {
                error!(height = block.height, error:% = e; "Failed to save unscan record");
                db_error.get_or_insert(e);
            }
        }

        if let Err(e) = dispatcher.await {
            error!(height = block.height, error:% = e; "Extraction dispatcher failed");
        }

        // Workers that died without reporting still count against the batch.
        if done < total {
            let lost = total - done;
            summary.failed += lost;
            let reason = ExtractError::TaskLost.to_string();
            let record = UnscanRecord::new(block.height, "", &reason);
            if let Err(e) = store.save_unscan_record(&record).await {
                error!(height = block.height, error:% = e; "Failed to save unscan record");
                db_error.get_or_insert(e);
            }
        }

        if let Some(e) = db_error {
            return Err(e.into());
        }
        if summary.failed > 0 {
            return Err(ScanError::ExtractionFailed {
                height: block.height,
                failed: summary.failed,
                total,
            });
        }

        debug!(height = block.height, succeeded = summary.succeeded; "Block transfers extracted");
        Ok(summary)
    }
}

async fn dispatch(
    events: Vec<TransferEvent>,
    context: Arc<ExtractContext>,
    permits: Arc<Semaphore>,
    tx: mpsc::Sender<ExtractOutcome>,
) {
    for event in events {
        let Ok(permit) = permits.clone().acquire_owned().await else {
            return;
        };
        let context = context.clone();
        let tx = tx.clone();

        tokio::spawn(async move {
            let tx_id = event.transaction_id.clone();
            let result = context.extract_event(&event).await;
            drop(permit);
            let _ = tx.send(ExtractOutcome { tx_id, result }).await;
        });
    }
}

impl ExtractContext {
    async fn extract_event(&self, event: &TransferEvent) -> Result<Vec<(String, TxExtractData)>, ExtractError> {
        if event.currency_tag != self.native_tag {
            debug!(tx_id = event.transaction_id.as_str(), tag = event.currency_tag.as_str(); "Skipping non-native transfer");
            return Ok(Vec::new());
        }
        if event.transaction_id.is_empty() || event.op_type != TRANSFER_OPERATION {
            return Ok(Vec::new());
        }

        let resolver = self.resolver.as_ref().ok_or(ExtractError::NoResolver)?;
        parse_units(&event.amount, self.decimals)?;

        let from_key = self.resolve(resolver.as_ref(), &event.from).await?;
        let to_key = self.resolve(resolver.as_ref(), &event.to).await?;

        let mut extracted = Vec::new();
        match (from_key, to_key) {
            (Some(from), Some(to)) if from == to => {
                extracted.push((from, self.build(event, true, true)));
            },
            (from, to) => {
                if let Some(from) = from {
                    extracted.push((from, self.build(event, true, false)));
                }
                if let Some(to) = to {
                    extracted.push((to, self.build(event, false, true)));
                }
            },
        }
        Ok(extracted)
    }

    async fn resolve(&self, resolver: &dyn ScanTargetResolver, alias: &str) -> Result<Option<String>, ExtractError> {
        resolver.resolve(alias).await.map_err(|e| ExtractError::Resolve {
            alias: mask_string(alias),
            reason: e.to_string(),
        })
    }

    fn build(&self, event: &TransferEvent, input: bool, output: bool) -> TxExtractData {
        let coin = Coin::native(&self.symbol);
        let mut transaction = LedgerTransaction {
            wx_id: gen_transaction_wx_id(&event.transaction_id, &self.symbol, &coin.contract_id, event.operation_index),
            tx_id: event.transaction_id.clone(),
            coin: coin.clone(),
            from: vec![format!("{}:{}", event.from, event.amount)],
            to: vec![format!("{}:{}", event.to, event.amount)],
            amount: event.amount.clone(),
            decimals: self.decimals,
            fees: "0".to_string(),
            block_hash: self.block.hash.clone(),
            block_height: self.block.height,
            confirm_time: self.block.time as i64,
            is_memo: true,
            status: "1".to_string(),
            ..Default::default()
        };
        transaction.set_memo(&event.memo);

        let mut data = TxExtractData {
            transaction,
            inputs: Vec::new(),
            outputs: Vec::new(),
        };
        if input {
            data.inputs.push(self.recharge(event, RechargeSide::Input, &event.from, &coin));
        }
        if output {
            data.outputs.push(self.recharge(event, RechargeSide::Output, &event.to, &coin));
        }
        data
    }

    fn recharge(&self, event: &TransferEvent, side: RechargeSide, address: &str, coin: &Coin) -> Recharge {
        Recharge {
            sid: gen_recharge_sid(
                side,
                &event.transaction_id,
                &self.symbol,
                &coin.contract_id,
                event.operation_index,
            ),
            tx_id: event.transaction_id.clone(),
            address: address.to_string(),
            coin: coin.clone(),
            amount: event.amount.clone(),
            symbol: self.symbol.clone(),
            block_hash: self.block.hash.clone(),
            block_height: self.block.height,
            index: 0,
            created_at: Utc::now().timestamp(),
        }
    }
}
