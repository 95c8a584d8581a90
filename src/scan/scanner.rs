//! Block scan loop with fork detection.
//!
//! One session advances the persisted [`ScanCursor`] a block at a time until
//! it reaches the node head, the cancellation token fires, or a network or
//! decode failure ends the session. A block is accepted only when its
//! `previous_hash` matches the cursor hash. On a mismatch the block at the
//! cursor is treated as orphaned and the cursor is rewound to two heights
//! below the block being scanned (never below 1).

use std::sync::Arc;

use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::{
    chain::{
        Block, NodeGateway,
        asset::{format_units, parse_units, trim_decimal},
    },
    http::NodeError,
    log::mask_string,
    models::{AddressBalance, BlockHeader, ScanCursor, UnscanRecord},
    scan::{
        events::{EventSender, ProcessingEvent, ScanStatusEvent, StopReason},
        extractor::{BlockRef, TransferExtractor},
        store::ScanStore,
        types::{ExtractSummary, ScanError},
    },
};

/// What one scan session did before returning.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionSummary {
    pub start_height: u64,
    pub end_height: u64,
    pub blocks_scanned: u64,
    pub forks_detected: u64,
    pub cancelled: bool,
}

pub struct BlockScanner<E: EventSender> {
    symbol: String,
    decimals: u8,
    gateway: Arc<dyn NodeGateway>,
    store: Arc<dyn ScanStore>,
    extractor: TransferExtractor,
    event_sender: E,
}

impl<E: EventSender> BlockScanner<E> {
    pub fn new(
        symbol: &str,
        decimals: u8,
        gateway: Arc<dyn NodeGateway>,
        store: Arc<dyn ScanStore>,
        extractor: TransferExtractor,
        event_sender: E,
    ) -> Self {
        Self {
            symbol: symbol.to_string(),
            decimals,
            gateway,
            store,
            extractor,
            event_sender,
        }
    }

    pub fn event_sender(&self) -> &E {
        &self.event_sender
    }

    /// Runs one scan session.
    ///
    /// Returns `Ok` when the cursor reaches the node head or `cancel` fires.
    /// Cancellation is checked once per block, so an in-flight block always
    /// finishes extracting first.
    pub async fn scan(&self, cancel: &CancellationToken) -> Result<SessionSummary, ScanError> {
        let mut cursor = match self.store.load_cursor().await? {
            Some(cursor) => cursor,
            None => self.seed_cursor().await?,
        };

        let mut summary = SessionSummary {
            start_height: cursor.height,
            end_height: cursor.height,
            ..Default::default()
        };
        self.send_status(ScanStatusEvent::Started {
            from_height: cursor.height,
        });

        let result = self.scan_loop(&mut cursor, &mut summary, cancel).await;
        summary.end_height = cursor.height;

        match &result {
            Ok(()) if summary.cancelled => {
                info!(height = cursor.height; "Scan cancelled");
                self.send_status(ScanStatusEvent::Stopped {
                    last_scanned_height: cursor.height,
                    reason: StopReason::Cancelled,
                });
            },
            Ok(()) => {
                self.send_status(ScanStatusEvent::CaughtUp { height: cursor.height });
            },
            Err(e) => {
                warn!(height = cursor.height, error:% = e; "Scan session aborted");
                self.send_status(ScanStatusEvent::Stopped {
                    last_scanned_height: cursor.height,
                    reason: StopReason::Error(e.to_string()),
                });
            },
        }

        result.map(|_| summary)
    }

    async fn scan_loop(
        &self,
        cursor: &mut ScanCursor,
        summary: &mut SessionSummary,
        cancel: &CancellationToken,
    ) -> Result<(), ScanError> {
        loop {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                return Ok(());
            }

            let head = self.gateway.get_chain_head().await?;
            debug!(current = cursor.height, head = head.height; "Scanner tick");

            if cursor.height >= head.height {
                info!(height = head.height; "Block scanner has scanned the full chain");
                return Ok(());
            }

            let height = cursor.height + 1;
            let block = self.gateway.get_block(height).await?;

            if block.previous_hash == cursor.hash {
                self.accept_block(cursor, &block).await?;
                summary.blocks_scanned += 1;
                self.send_status(ScanStatusEvent::Progress {
                    current_height: cursor.height,
                    head_height: head.height,
                });
            } else {
                self.recover_fork(cursor, &block).await?;
                summary.forks_detected += 1;
            }
        }
    }

    /// Starts from the parent of the node head so an unstable tip is never the baseline.
    async fn seed_cursor(&self) -> Result<ScanCursor, ScanError> {
        info!("No scan cursor found, starting from the node head");

        let head = self.gateway.get_chain_head().await?;
        let height = head.height.saturating_sub(1).max(1);
        let block = self.gateway.get_block(height).await?;

        let cursor = ScanCursor {
            height,
            hash: block.hash,
        };
        self.store.save_cursor(&cursor).await?;
        Ok(cursor)
    }

    async fn accept_block(&self, cursor: &mut ScanCursor, block: &Block) -> Result<(), ScanError> {
        info!(height = block.height, events = block.transfer_events.len(); "Scanning block");

        // Extraction failures are already captured as unscan records.
        if let Err(e) = self.extract(block).await {
            warn!(height = block.height, error:% = e; "Block extraction incomplete");
        }

        *cursor = ScanCursor {
            height: block.height,
            hash: block.hash.clone(),
        };
        self.store.save_cursor(cursor).await?;

        let header = block.header(&self.symbol);
        self.store.save_block(&header).await?;
        self.event_sender.send(ProcessingEvent::NewBlock(header));
        Ok(())
    }

    async fn recover_fork(&self, cursor: &mut ScanCursor, block: &Block) -> Result<(), ScanError> {
        let orphan_height = block.height - 1;
        warn!(
            height = block.height,
            local_hash = cursor.hash.as_str(),
            node_hash = block.previous_hash.as_str();
            "Fork detected"
        );

        let orphan = self.store.load_block(orphan_height).await?;
        let removed = self.store.delete_unscan_records(orphan_height).await?;
        debug!(height = orphan_height, removed = removed; "Dropped unscan records of orphaned block");

        let rewind_height = block.height.saturating_sub(2).max(1);
        let hash = match self.store.load_block(rewind_height).await? {
            Some(local) => local.hash,
            None => self.gateway.get_block(rewind_height).await?.hash,
        };

        *cursor = ScanCursor {
            height: rewind_height,
            hash,
        };
        self.store.save_cursor(cursor).await?;
        info!(height = cursor.height, hash = cursor.hash.as_str(); "Rescanning after fork");

        if let Some(mut header) = orphan {
            header.fork = true;
            self.store.save_block(&header).await?;
            self.event_sender.send(ProcessingEvent::NewBlock(header));
        }
        Ok(())
    }

    async fn extract(&self, block: &Block) -> Result<ExtractSummary, ScanError> {
        let block_ref = BlockRef {
            height: block.height,
            hash: block.hash.clone(),
            time: block.timestamp,
        };
        self.extractor
            .extract(&block_ref, &block.transfer_events, &self.event_sender, self.store.as_ref())
            .await
    }

    /// Scans one height out of band without touching the cursor or fork state.
    ///
    /// A fetch failure is recorded as an unscan record for `height`.
    pub async fn scan_block(&self, height: u64) -> Result<ExtractSummary, ScanError> {
        let block = match self.gateway.get_block(height).await {
            Ok(block) => block,
            Err(e) => {
                warn!(height = height, error:% = e; "Could not fetch block for rescan");
                self.store
                    .save_unscan_record(&UnscanRecord::new(height, "", &e.to_string()))
                    .await?;
                return Err(e.into());
            },
        };

        info!(height = height; "Rescanning block");
        let result = self.extract(&block).await;
        self.event_sender.send(ProcessingEvent::NewBlock(block.header(&self.symbol)));
        result
    }

    /// Makes the next session start at `height`.
    ///
    /// The cursor is anchored at `height - 1` with the previous hash reported by
    /// block `height`, so the first block of the next session is always accepted.
    pub async fn set_rescan_block_height(&self, height: u64) -> Result<(), ScanError> {
        if height == 0 {
            return Err(ScanError::InvalidArgument(
                "block height to rescan must be greater than 0".to_string(),
            ));
        }

        let block = self.gateway.get_block(height).await?;
        let cursor = ScanCursor {
            height: height - 1,
            hash: block.previous_hash,
        };
        self.store.save_cursor(&cursor).await?;
        info!(height = height; "Scan cursor reset");
        Ok(())
    }

    /// Height of the last accepted block, 0 when nothing was scanned yet.
    pub async fn scanned_block_height(&self) -> Result<u64, ScanError> {
        Ok(self.store.load_cursor().await?.map(|c| c.height).unwrap_or(0))
    }

    pub async fn current_block_header(&self) -> Result<BlockHeader, ScanError> {
        let head = self.gateway.get_chain_head().await?;
        Ok(BlockHeader {
            hash: head.block_id,
            previous_hash: String::new(),
            height: head.height,
            time: 0,
            symbol: self.symbol.clone(),
            fork: false,
        })
    }

    /// Looks up on-chain balances. Aliases whose lookup fails are left out.
    pub async fn balances_by_address(&self, aliases: &[String]) -> Vec<AddressBalance> {
        let mut balances = Vec::with_capacity(aliases.len());
        for alias in aliases {
            match self.gateway.get_balance(alias).await {
                Ok(balance) => {
                    let normalized = match parse_units(&balance.amount, self.decimals) {
                        Ok(units) => trim_decimal(&format_units(units, self.decimals)),
                        Err(_) => balance.amount.clone(),
                    };
                    balances.push(AddressBalance {
                        symbol: self.symbol.clone(),
                        address: alias.clone(),
                        balance: normalized.clone(),
                        confirm_balance: normalized.clone(),
                        unconfirm_balance: normalized,
                    });
                },
                Err(e) => log_balance_failure(alias, &e),
            }
        }
        balances
    }

    fn send_status(&self, status: ScanStatusEvent) {
        self.event_sender.send(ProcessingEvent::ScanStatus(status));
    }
}

fn log_balance_failure(alias: &str, e: &NodeError) {
    warn!(alias:% = mask_string(alias), error:% = e; "Balance lookup failed");
}

#[cfg(test)]
mod tests {
    use std::{
        collections::{HashMap, VecDeque},
        sync::Mutex,
    };

    use async_trait::async_trait;
    use tempfile::tempdir;

    use super::*;
    use crate::{
        chain::{AccountBalance, BroadcastResult, BroadcastTransaction, ChainHead, TransferEvent},
        db::{SqlitePool, get_scan_cursor, get_unscan_records, init_db, upsert_scan_cursor},
        scan::{resolver::ScanTargetResolver, store::SqliteScanStore},
    };

    /// Node whose chain is a map of height to block, with a scripted sequence of heads.
    #[derive(Default)]
    struct MockNode {
        blocks: Mutex<HashMap<u64, Block>>,
        heads: Mutex<VecDeque<Option<u64>>>,
        last_head: Mutex<u64>,
        block_fetches: Mutex<Vec<u64>>,
    }

    impl MockNode {
        fn with_chain(tip: u64, tag: &str) -> Self {
            let node = Self::default();
            node.set_chain(1, tip, tag, "genesis");
            *node.last_head.lock().unwrap() = tip;
            node
        }

        /// Replaces heights `from..=to` with blocks whose hashes carry `tag`.
        fn set_chain(&self, from: u64, to: u64, tag: &str, base_tag: &str) {
            let mut blocks = self.blocks.lock().unwrap();
            for height in from..=to {
                let previous_hash = if height == from {
                    blocks
                        .get(&(height - 1))
                        .map(|b| b.hash.clone())
                        .unwrap_or_else(|| hash(base_tag, height - 1))
                } else {
                    hash(tag, height - 1)
                };
                blocks.insert(
                    height,
                    Block {
                        height,
                        hash: hash(tag, height),
                        previous_hash,
                        timestamp: 1_559_638_536 + height * 3,
                        transfer_events: vec![],
                        skipped_operations: 0,
                    },
                );
            }
        }

        fn push_head(&self, head: Option<u64>) {
            self.heads.lock().unwrap().push_back(head);
        }
    }

    fn hash(tag: &str, height: u64) -> String {
        format!("{}-{:08}", tag, height)
    }

    #[async_trait]
    impl NodeGateway for MockNode {
        async fn get_chain_head(&self) -> Result<ChainHead, NodeError> {
            let scripted = self.heads.lock().unwrap().pop_front();
            let height = match scripted {
                Some(Some(h)) => h,
                Some(None) => return Err(NodeError::EmptyResponse),
                None => *self.last_head.lock().unwrap(),
            };
            *self.last_head.lock().unwrap() = height;
            Ok(ChainHead {
                height,
                block_id: format!("head-{}", height),
                last_irreversible_height: height.saturating_sub(3),
            })
        }

        async fn get_block(&self, height: u64) -> Result<Block, NodeError> {
            self.block_fetches.lock().unwrap().push(height);
            self.blocks
                .lock()
                .unwrap()
                .get(&height)
                .cloned()
                .ok_or_else(|| NodeError::UnexpectedResult(format!("no block {}", height)))
        }

        async fn get_balance(&self, alias: &str) -> Result<AccountBalance, NodeError> {
            if alias == "kencani" {
                Ok(AccountBalance {
                    alias: alias.to_string(),
                    amount: "12.50000000".to_string(),
                    currency_tag: "PIA".to_string(),
                })
            } else {
                Err(NodeError::AccountNotFound(alias.to_string()))
            }
        }

        async fn broadcast(&self, _tx: &BroadcastTransaction) -> Result<BroadcastResult, NodeError> {
            Err(NodeError::EmptyResponse)
        }
    }

    #[derive(Default)]
    struct RecordingSender {
        events: Mutex<Vec<ProcessingEvent>>,
    }

    impl RecordingSender {
        fn headers(&self) -> Vec<BlockHeader> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| match e {
                    ProcessingEvent::NewBlock(h) => Some(h.clone()),
                    _ => None,
                })
                .collect()
        }

        fn statuses(&self) -> Vec<ScanStatusEvent> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter_map(|e| match e {
                    ProcessingEvent::ScanStatus(s) => Some(s.clone()),
                    _ => None,
                })
                .collect()
        }

        fn extracted(&self) -> usize {
            self.events
                .lock()
                .unwrap()
                .iter()
                .filter(|e| matches!(e, ProcessingEvent::ExtractData(_)))
                .count()
        }
    }

    impl EventSender for Arc<RecordingSender> {
        fn send(&self, event: ProcessingEvent) -> bool {
            self.events.lock().unwrap().push(event);
            true
        }
    }

    struct OneAccount;

    #[async_trait]
    impl ScanTargetResolver for OneAccount {
        async fn resolve(&self, alias: &str) -> anyhow::Result<Option<String>> {
            Ok((alias == "kencani").then(|| "acc-1".to_string()))
        }
    }

    struct Harness {
        _temp_dir: tempfile::TempDir,
        pool: SqlitePool,
        node: Arc<MockNode>,
        sender: Arc<RecordingSender>,
        scanner: BlockScanner<Arc<RecordingSender>>,
    }

    fn harness(node: MockNode) -> Harness {
        let temp_dir = tempdir().unwrap();
        let pool = init_db(temp_dir.path().join("scanner.db")).unwrap();
        let node = Arc::new(node);
        let sender = Arc::new(RecordingSender::default());
        let extractor = TransferExtractor::new("PIA", 8, "PIA").with_resolver(Arc::new(OneAccount));
        let scanner = BlockScanner::new(
            "PIA",
            8,
            node.clone(),
            Arc::new(SqliteScanStore::new(pool.clone(), "PIA")),
            extractor,
            sender.clone(),
        );
        Harness {
            _temp_dir: temp_dir,
            pool,
            node,
            sender,
            scanner,
        }
    }

    impl Harness {
        fn cursor(&self) -> ScanCursor {
            get_scan_cursor(&self.pool.get().unwrap(), "PIA").unwrap().unwrap()
        }

        fn set_cursor(&self, height: u64, hash: &str) {
            let cursor = ScanCursor {
                height,
                hash: hash.to_string(),
            };
            upsert_scan_cursor(&self.pool.get().unwrap(), "PIA", &cursor).unwrap();
        }
    }

    #[tokio::test]
    async fn test_seeds_cursor_from_head_parent_and_catches_up() {
        let h = harness(MockNode::with_chain(20, "a"));

        let summary = h.scanner.scan(&CancellationToken::new()).await.unwrap();

        assert_eq!(summary.start_height, 19);
        assert_eq!(summary.end_height, 20);
        assert_eq!(summary.blocks_scanned, 1);
        assert_eq!(h.cursor(), ScanCursor {
            height: 20,
            hash: hash("a", 20)
        });
        assert_eq!(h.sender.headers().len(), 1);
        assert_eq!(h.sender.statuses().last(), Some(&ScanStatusEvent::CaughtUp { height: 20 }));
    }

    #[tokio::test]
    async fn test_advances_one_block_at_a_time() {
        let h = harness(MockNode::with_chain(15, "a"));
        h.set_cursor(10, &hash("a", 10));

        let summary = h.scanner.scan(&CancellationToken::new()).await.unwrap();

        assert_eq!(summary.blocks_scanned, 5);
        assert_eq!(*h.node.block_fetches.lock().unwrap(), vec![11, 12, 13, 14, 15]);
        let heights: Vec<u64> = h.sender.headers().iter().map(|b| b.height).collect();
        assert_eq!(heights, vec![11, 12, 13, 14, 15]);
        assert_eq!(h.scanner.scanned_block_height().await.unwrap(), 15);
    }

    #[tokio::test]
    async fn test_already_caught_up_is_not_an_error() {
        let h = harness(MockNode::with_chain(15, "a"));
        h.set_cursor(15, &hash("a", 15));

        let summary = h.scanner.scan(&CancellationToken::new()).await.unwrap();

        assert_eq!(summary.blocks_scanned, 0);
        assert!(h.node.block_fetches.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fork_rewinds_two_heights_and_resyncs() {
        let node = MockNode::with_chain(12, "a");
        let h = harness(node);
        h.set_cursor(10, &hash("a", 10));

        // Accept 11 and 12 on chain "a".
        h.scanner.scan(&CancellationToken::new()).await.unwrap();
        assert_eq!(h.cursor().height, 12);

        // Node reorganizes from height 12 onwards onto chain "b".
        h.node.set_chain(12, 14, "b", "a");
        *h.node.last_head.lock().unwrap() = 14;
        h.node.block_fetches.lock().unwrap().clear();

        let summary = h.scanner.scan(&CancellationToken::new()).await.unwrap();

        assert_eq!(summary.forks_detected, 1);
        assert_eq!(h.cursor(), ScanCursor {
            height: 14,
            hash: hash("b", 14)
        });
        // 13 mismatches, rewind to 11 (local hash), then 12..14 are rescanned.
        assert_eq!(*h.node.block_fetches.lock().unwrap(), vec![13, 12, 13, 14]);

        let headers = h.sender.headers();
        let orphan = headers.iter().find(|b| b.fork).expect("fork notification");
        assert_eq!(orphan.height, 12);
        assert_eq!(orphan.hash, hash("a", 12));

        let accepted_12 = headers.iter().rev().find(|b| b.height == 12).unwrap();
        assert!(!accepted_12.fork);
        assert_eq!(accepted_12.hash, hash("b", 12));
        assert_eq!(accepted_12.previous_hash, hash("a", 11));
    }

    #[tokio::test]
    async fn test_fork_near_genesis_clamps_to_one_and_fetches_hash() {
        let h = harness(MockNode::with_chain(3, "a"));
        h.set_cursor(1, "stale");

        // Head stays at 2 for the single mismatch, then the session catches up.
        h.node.push_head(Some(2));
        h.node.push_head(Some(1));
        h.scanner.scan(&CancellationToken::new()).await.unwrap();

        // Block 2 mismatches the stale hash, rewind clamps to 1 and 1's hash comes from the node.
        assert_eq!(h.cursor(), ScanCursor {
            height: 1,
            hash: hash("a", 1)
        });
        assert_eq!(*h.node.block_fetches.lock().unwrap(), vec![2, 1]);
        assert!(h.sender.headers().is_empty(), "No local orphan to notify");
    }

    #[tokio::test]
    async fn test_fork_drops_unscan_records_of_orphan() {
        let h = harness(MockNode::with_chain(12, "a"));
        h.set_cursor(11, "orphaned-11");
        let conn = h.pool.get().unwrap();
        crate::db::insert_unscan_record(&conn, "PIA", &UnscanRecord::new(11, "", "extract failed")).unwrap();
        crate::db::insert_unscan_record(&conn, "PIA", &UnscanRecord::new(9, "", "extract failed")).unwrap();

        h.node.push_head(Some(12));
        h.node.push_head(Some(10));
        h.scanner.scan(&CancellationToken::new()).await.unwrap();

        assert_eq!(h.cursor().height, 10);
        let records = get_unscan_records(&conn, "PIA").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].block_height, 9);
    }

    #[tokio::test]
    async fn test_head_failure_aborts_session() {
        let h = harness(MockNode::with_chain(15, "a"));
        h.set_cursor(10, &hash("a", 10));
        h.node.push_head(Some(15));
        h.node.push_head(None);

        let err = h.scanner.scan(&CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, ScanError::Network(_)));
        assert_eq!(h.cursor().height, 11, "Progress before the failure is kept");
        assert!(matches!(
            h.sender.statuses().last(),
            Some(ScanStatusEvent::Stopped {
                last_scanned_height: 11,
                reason: StopReason::Error(_)
            })
        ));
    }

    #[tokio::test]
    async fn test_block_fetch_failure_aborts_session() {
        let h = harness(MockNode::with_chain(12, "a"));
        h.set_cursor(10, &hash("a", 10));
        h.node.push_head(Some(13));

        let err = h.scanner.scan(&CancellationToken::new()).await.unwrap_err();

        assert!(matches!(err, ScanError::Network(_)));
        assert_eq!(h.cursor().height, 12);
    }

    #[tokio::test]
    async fn test_cancelled_session_stops_before_next_block() {
        let h = harness(MockNode::with_chain(15, "a"));
        h.set_cursor(10, &hash("a", 10));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = h.scanner.scan(&cancel).await.unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.blocks_scanned, 0);
        assert_eq!(h.cursor().height, 10);
        assert!(matches!(
            h.sender.statuses().last(),
            Some(ScanStatusEvent::Stopped {
                reason: StopReason::Cancelled,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_extraction_failure_still_advances_cursor() {
        let node = MockNode::with_chain(11, "a");
        node.blocks.lock().unwrap().get_mut(&11).unwrap().transfer_events = vec![TransferEvent {
            op_type: "transfer".to_string(),
            from: "kencani".to_string(),
            to: "other".to_string(),
            amount: "not-a-number".to_string(),
            currency_tag: "PIA".to_string(),
            memo: String::new(),
            transaction_id: "tx-1".to_string(),
            operation_index: 0,
        }];
        let h = harness(node);
        h.set_cursor(10, &hash("a", 10));

        h.scanner.scan(&CancellationToken::new()).await.unwrap();

        assert_eq!(h.cursor().height, 11);
        let conn = h.pool.get().unwrap();
        let records = get_unscan_records(&conn, "PIA").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].block_height, 11);
    }

    #[tokio::test]
    async fn test_scan_block_leaves_cursor_alone() {
        let node = MockNode::with_chain(12, "a");
        node.blocks.lock().unwrap().get_mut(&5).unwrap().transfer_events = vec![TransferEvent {
            op_type: "transfer".to_string(),
            from: "someone".to_string(),
            to: "kencani".to_string(),
            amount: "2.00000000".to_string(),
            currency_tag: "PIA".to_string(),
            memo: "hi".to_string(),
            transaction_id: "tx-5".to_string(),
            operation_index: 0,
        }];
        let h = harness(node);
        h.set_cursor(12, &hash("a", 12));

        let summary = h.scanner.scan_block(5).await.unwrap();

        assert_eq!(summary.succeeded, 1);
        assert_eq!(h.sender.extracted(), 1);
        assert_eq!(h.sender.headers()[0].height, 5);
        assert_eq!(h.cursor().height, 12);
    }

    #[tokio::test]
    async fn test_scan_block_fetch_failure_is_recorded() {
        let h = harness(MockNode::with_chain(5, "a"));

        let err = h.scanner.scan_block(99).await.unwrap_err();

        assert!(matches!(err, ScanError::Network(_)));
        let conn = h.pool.get().unwrap();
        let records = get_unscan_records(&conn, "PIA").unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].block_height, 99);
    }

    #[tokio::test]
    async fn test_set_rescan_block_height() {
        let h = harness(MockNode::with_chain(20, "a"));

        assert!(matches!(
            h.scanner.set_rescan_block_height(0).await,
            Err(ScanError::InvalidArgument(_))
        ));

        h.scanner.set_rescan_block_height(8).await.unwrap();
        assert_eq!(h.cursor(), ScanCursor {
            height: 7,
            hash: hash("a", 7)
        });
        assert_eq!(*h.node.block_fetches.lock().unwrap(), vec![8]);
    }

    #[tokio::test]
    async fn test_reset_to_first_block_extracts_it() {
        let node = MockNode::with_chain(3, "a");
        node.blocks.lock().unwrap().get_mut(&1).unwrap().transfer_events = vec![TransferEvent {
            op_type: "transfer".to_string(),
            from: "someone".to_string(),
            to: "kencani".to_string(),
            amount: "1.00000000".to_string(),
            currency_tag: "PIA".to_string(),
            memo: String::new(),
            transaction_id: "tx-1".to_string(),
            operation_index: 0,
        }];
        let h = harness(node);

        h.scanner.set_rescan_block_height(1).await.unwrap();
        assert_eq!(h.cursor(), ScanCursor {
            height: 0,
            hash: hash("genesis", 0)
        });

        let summary = h.scanner.scan(&CancellationToken::new()).await.unwrap();

        assert_eq!(summary.forks_detected, 0);
        assert_eq!(summary.blocks_scanned, 3);
        let heights: Vec<u64> = h.sender.headers().iter().map(|b| b.height).collect();
        assert_eq!(heights, vec![1, 2, 3]);
        assert_eq!(h.sender.extracted(), 1);
    }

    #[tokio::test]
    async fn test_balances_skip_failed_lookups() {
        let h = harness(MockNode::with_chain(2, "a"));

        let balances = h
            .scanner
            .balances_by_address(&["kencani".to_string(), "ghost".to_string()])
            .await;

        assert_eq!(balances.len(), 1);
        assert_eq!(balances[0].address, "kencani");
        assert_eq!(balances[0].balance, "12.5");
    }
}
