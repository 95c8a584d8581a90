//! Builds, signs, verifies and submits native transfers.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use log::{debug, info, warn};

use crate::{
    chain::{
        Asset, NodeGateway,
        asset::{format_units, parse_units, trim_decimal},
    },
    config::WalletConfig,
    db::{AccountRow, AddressRow, WalletDbResult},
    log::{mask_amount, mask_string},
    models::{LedgerTransaction, gen_transaction_wx_id},
    transactions::{
        codec::{TransferOperation, WireTransaction, signing_digest},
        error::TransactionError,
        raw_transaction::{KeySignature, RawTransaction, RawTransactionWithError, SummaryRawTransaction},
        signer::{KeyStore, TransactionSigner},
    },
};

/// Wallet-side account lookups needed to build a transaction.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn account(&self, account_id: &str) -> WalletDbResult<Option<AccountRow>>;

    /// Signing addresses of the account, oldest first.
    async fn addresses(&self, account_id: &str) -> WalletDbResult<Vec<AddressRow>>;
}

pub struct TransactionDecoder {
    symbol: String,
    decimals: u8,
    fee_string: String,
    chain_id: Vec<u8>,
    curve_type: String,
    expiration_minutes: i64,
    gateway: Arc<dyn NodeGateway>,
    accounts: Arc<dyn AccountStore>,
    signer: Arc<dyn TransactionSigner>,
}

impl TransactionDecoder {
    pub fn new(
        config: &WalletConfig,
        gateway: Arc<dyn NodeGateway>,
        accounts: Arc<dyn AccountStore>,
        signer: Arc<dyn TransactionSigner>,
    ) -> Result<Self, TransactionError> {
        let chain_id = hex::decode(&config.chain_id)
            .map_err(|e| TransactionError::InvalidArgument(format!("chain_id is not hex: {}", e)))?;

        Ok(Self {
            symbol: config.symbol.clone(),
            decimals: config.decimals,
            fee_string: config.fee_string.clone(),
            chain_id,
            curve_type: config.curve_type.clone(),
            expiration_minutes: config.expiration_minutes,
            gateway,
            accounts,
            signer,
        })
    }

    /// Checks preconditions and fills `raw` with an unsigned transfer and its signature requests.
    pub async fn create_raw_transaction(&self, raw: &mut RawTransaction) -> Result<(), TransactionError> {
        let account = self.local_account(&raw.account_id).await?;
        let (to, amount) = raw.recipient()?;
        let (to, amount) = (to.to_string(), amount.to_string());

        let balance = self.on_chain_balance(&account.alias).await?;
        self.on_chain_balance(&to).await?;

        let units = parse_units(&amount, self.decimals)?;
        if units <= 0 {
            return Err(TransactionError::InvalidArgument(format!(
                "transfer amount must be positive, got {}",
                amount
            )));
        }
        if balance < units {
            return Err(TransactionError::InsufficientBalance {
                balance: trim_decimal(&format_units(balance, self.decimals)),
                amount,
            });
        }

        let memo = raw.memo().to_string();
        self.build(raw, &account.alias, &to, units, &memo).await
    }

    /// Fills in every signature request of the source account.
    pub async fn sign_raw_transaction(&self, raw: &mut RawTransaction, keys: &dyn KeyStore) -> Result<(), TransactionError> {
        if raw.signatures.is_empty() {
            return Err(TransactionError::SignatureEmpty);
        }

        if let Some(key_signatures) = raw.signatures.get_mut(&raw.account_id) {
            for key_signature in key_signatures.iter_mut() {
                let private_key = keys.private_key(&key_signature.address)?;
                let digest = hex::decode(&key_signature.message)
                    .map_err(|e| TransactionError::SignatureInvalid(format!("digest is not hex: {}", e)))?;
                let signature = self
                    .signer
                    .sign(&digest, &private_key, &self.curve_type)
                    .map_err(|e| TransactionError::SignatureInvalid(e.to_string()))?;
                key_signature.signature = hex::encode(signature);
            }
        }

        info!(account_id = raw.account_id.as_str(); "Transaction hash signed");
        Ok(())
    }

    /// Verifies every signature and attaches them to the encoded transaction.
    pub async fn verify_raw_transaction(&self, raw: &mut RawTransaction) -> Result<(), TransactionError> {
        if raw.signatures.is_empty() {
            return Err(TransactionError::SignatureEmpty);
        }

        let mut tx = WireTransaction::decode(&hex::decode(&raw.raw_hex)?)?;
        let digest = signing_digest(&self.chain_id, &tx.signing_bytes()?);

        for (account_id, key_signatures) in &raw.signatures {
            debug!(account_id = account_id.as_str(), count = key_signatures.len(); "Verifying signatures");
            for key_signature in key_signatures {
                let combined = self.verify_one(&digest, key_signature)?;
                tx.signatures.push(hex::encode(combined));
            }
        }

        raw.raw_hex = hex::encode(tx.encode()?);
        raw.is_completed = true;
        Ok(())
    }

    fn verify_one(&self, digest: &[u8; 32], key_signature: &KeySignature) -> Result<Vec<u8>, TransactionError> {
        let failed = |reason: String| TransactionError::VerifyFailed {
            address: key_signature.address.address.clone(),
            reason,
        };

        if key_signature.message != hex::encode(digest) {
            return Err(failed("signed message does not match the transaction".to_string()));
        }
        let signature = hex::decode(&key_signature.signature).map_err(|e| failed(e.to_string()))?;
        let public_key = hex::decode(&key_signature.address.public_key).map_err(|e| failed(e.to_string()))?;

        self.signer
            .verify_and_combine(digest, &public_key, &signature)
            .map_err(|e| failed(e.to_string()))
    }

    /// Broadcasts a verified transaction and returns its ledger record.
    ///
    /// A node-side duplicate is reported as [`TransactionError::DuplicateSubmission`].
    pub async fn submit_raw_transaction(&self, raw: &mut RawTransaction) -> Result<LedgerTransaction, TransactionError> {
        let tx = WireTransaction::decode(&hex::decode(&raw.raw_hex)?)?;
        let envelope = tx.to_broadcast()?;

        let result = match self.gateway.broadcast(&envelope).await {
            Ok(result) => result,
            Err(e) => {
                warn!(account_id = raw.account_id.as_str(), error:% = e; "Broadcast failed");
                return Err(e.into());
            },
        };

        raw.tx_id = result.id;
        raw.is_submit = true;
        info!(tx_id = raw.tx_id.as_str(), block = result.block_num; "Transaction submitted");

        let mut record = LedgerTransaction {
            tx_id: raw.tx_id.clone(),
            account_id: raw.account_id.clone(),
            coin: raw.coin.clone(),
            from: raw.tx_from.clone(),
            to: raw.tx_to.clone(),
            amount: raw.tx_amount.clone(),
            decimals: self.decimals,
            fees: "0".to_string(),
            submit_time: Utc::now().timestamp(),
            ext_params: raw.ext_params.clone(),
            ..Default::default()
        };
        record.wx_id = gen_transaction_wx_id(&record.tx_id, &record.coin.symbol, &record.coin.contract_id, 0);
        Ok(record)
    }

    /// Native transfers carry no fee.
    pub fn raw_transaction_fee_rate(&self) -> (String, String) {
        ("0".to_string(), self.symbol.clone())
    }

    /// Sweeps `balance - retained_balance` to the summary address.
    ///
    /// Returns an empty list when the balance is below `min_transfer`. A failed
    /// build is returned alongside the transaction it belongs to.
    pub async fn create_summary_raw_transaction_with_error(
        &self,
        summary: &SummaryRawTransaction,
    ) -> Result<Vec<RawTransactionWithError>, TransactionError> {
        let min_transfer = parse_units(&summary.min_transfer, self.decimals)?;
        let retained = parse_units(&summary.retained_balance, self.decimals)?;
        if min_transfer < retained {
            return Err(TransactionError::InvalidArgument(
                "minimum transfer amount must not be below the retained balance".to_string(),
            ));
        }

        let account = self.local_account(&summary.account_id).await?;
        let balance = self.on_chain_balance(&account.alias).await?;
        let sweep = balance - retained;
        if balance < min_transfer || balance <= 0 || sweep <= 0 {
            debug!(account_id = summary.account_id.as_str(); "Balance below summary threshold");
            return Ok(Vec::new());
        }

        let amount = trim_decimal(&format_units(sweep, self.decimals));
        let mut raw = RawTransaction::new(summary.coin.clone(), &summary.account_id, &summary.summary_address, &amount);
        raw.ext_params = summary.ext_params.clone();
        let memo = raw.memo().to_string();

        let error = self
            .build(&mut raw, &account.alias, &summary.summary_address, sweep, &memo)
            .await
            .err();
        Ok(vec![RawTransactionWithError { raw_tx: raw, error }])
    }

    /// Like [`Self::create_summary_raw_transaction_with_error`], dropping failed builds.
    pub async fn create_summary_raw_transaction(
        &self,
        summary: &SummaryRawTransaction,
    ) -> Result<Vec<RawTransaction>, TransactionError> {
        Ok(self
            .create_summary_raw_transaction_with_error(summary)
            .await?
            .into_iter()
            .filter(|r| r.error.is_none())
            .map(|r| r.raw_tx)
            .collect())
    }

    async fn local_account(&self, account_id: &str) -> Result<AccountRow, TransactionError> {
        self.accounts
            .account(account_id)
            .await?
            .ok_or_else(|| TransactionError::AccountNotFound(account_id.to_string()))
    }

    /// Balance of `alias` in base units, if it exists on chain in the native currency.
    async fn on_chain_balance(&self, alias: &str) -> Result<i64, TransactionError> {
        let balance = self
            .gateway
            .get_balance(alias)
            .await
            .map_err(|e| TransactionError::AccountNotOnChain {
                alias: alias.to_string(),
                reason: e.to_string(),
            })?;

        if balance.currency_tag != self.fee_string {
            return Err(TransactionError::AccountNotOnChain {
                alias: alias.to_string(),
                reason: format!("balance is held in {}, expected {}", balance.currency_tag, self.fee_string),
            });
        }
        Ok(parse_units(&balance.amount, self.decimals)?)
    }

    async fn build(
        &self,
        raw: &mut RawTransaction,
        from: &str,
        to: &str,
        units: i64,
        memo: &str,
    ) -> Result<(), TransactionError> {
        let head = self.gateway.get_chain_head().await?;
        let reference = self.gateway.get_block(head.last_irreversible_height).await?;

        let expiration = Utc::now() + Duration::minutes(self.expiration_minutes);
        let expiration = u32::try_from(expiration.timestamp())
            .map_err(|_| TransactionError::InvalidArgument("expiration is out of range".to_string()))?;

        let tx = WireTransaction {
            ref_block_num: head.ref_block_num(),
            ref_block_prefix: reference.ref_block_prefix()?,
            expiration,
            operations: vec![TransferOperation {
                from: from.to_string(),
                to: to.to_string(),
                amount: Asset::new(units, self.decimals, &self.symbol),
                memo: memo.to_string(),
            }],
            signatures: Vec::new(),
        };
        let encoded = tx.encode()?;
        let digest = hex::encode(signing_digest(&self.chain_id, &tx.signing_bytes()?));

        let addresses = self.accounts.addresses(&raw.account_id).await?;
        if addresses.is_empty() {
            return Err(TransactionError::NoAddresses(raw.account_id.clone()));
        }
        let key_signatures = addresses
            .into_iter()
            .map(|address| KeySignature {
                ecc_type: self.curve_type.clone(),
                nonce: String::new(),
                address,
                message: digest.clone(),
                signature: String::new(),
            })
            .collect();

        let amount = trim_decimal(&format_units(units, self.decimals));
        let net = if from == to { 0 } else { -units };

        raw.ref_block_num = tx.ref_block_num;
        raw.ref_block_prefix = tx.ref_block_prefix;
        raw.expiration = tx.expiration;
        raw.raw_hex = hex::encode(encoded);
        raw.signatures.insert(raw.account_id.clone(), key_signatures);
        raw.fee_rate = "0".to_string();
        raw.fees = "0".to_string();
        raw.tx_amount = trim_decimal(&format_units(net, self.decimals));
        raw.tx_from = vec![format!("{}:{}", from, amount)];
        raw.tx_to = vec![format!("{}:{}", to, amount)];
        raw.is_built = true;

        info!(
            account_id = raw.account_id.as_str(),
            to:% = mask_string(to),
            amount:% = mask_amount(&amount),
            ref_block_num = tx.ref_block_num;
            "Raw transaction built"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::{
        collections::HashMap,
        sync::Mutex,
    };

    use secp256k1::{PublicKey, Secp256k1, SecretKey};
    use tempfile::{TempDir, tempdir};

    use super::*;
    use crate::{
        accounts::SqliteAccountRegistry,
        chain::{AccountBalance, Block, BroadcastResult, BroadcastTransaction, ChainHead},
        db::init_db,
        http::NodeError,
        models::Coin,
        transactions::{Secp256k1Signer, TransactionError},
    };

    const LIB_PREVIOUS: &str = "0017d8d9794ec4b1a6e5181139af96965ebfac5e";

    #[derive(Default)]
    struct MockNode {
        balances: HashMap<String, (String, String)>,
        duplicate: bool,
        broadcasts: Mutex<Vec<BroadcastTransaction>>,
    }

    impl MockNode {
        fn with_balance(mut self, alias: &str, amount: &str, tag: &str) -> Self {
            self.balances
                .insert(alias.to_string(), (amount.to_string(), tag.to_string()));
            self
        }
    }

    #[async_trait]
    impl NodeGateway for MockNode {
        async fn get_chain_head(&self) -> Result<ChainHead, NodeError> {
            Ok(ChainHead {
                height: 1_562_800,
                block_id: "head".to_string(),
                last_irreversible_height: 1_562_721,
            })
        }

        async fn get_block(&self, height: u64) -> Result<Block, NodeError> {
            Ok(Block {
                height,
                hash: "lib".to_string(),
                previous_hash: LIB_PREVIOUS.to_string(),
                timestamp: 0,
                transfer_events: vec![],
                skipped_operations: 0,
            })
        }

        async fn get_balance(&self, alias: &str) -> Result<AccountBalance, NodeError> {
            self.balances
                .get(alias)
                .map(|(amount, tag)| AccountBalance {
                    alias: alias.to_string(),
                    amount: amount.clone(),
                    currency_tag: tag.clone(),
                })
                .ok_or_else(|| NodeError::AccountNotFound(alias.to_string()))
        }

        async fn broadcast(&self, tx: &BroadcastTransaction) -> Result<BroadcastResult, NodeError> {
            if self.duplicate {
                return Err(NodeError::DuplicateTransaction("duplicate transaction".to_string()));
            }
            self.broadcasts.lock().unwrap().push(tx.clone());
            Ok(BroadcastResult {
                id: "a1b2c3".to_string(),
                block_num: 1_562_801,
                trx_num: 0,
                expired: false,
            })
        }
    }

    struct Wallet {
        _temp_dir: TempDir,
        decoder: TransactionDecoder,
        node: Arc<MockNode>,
        keys: HashMap<String, Vec<u8>>,
    }

    fn public_key_hex(secret: &SecretKey) -> String {
        hex::encode(PublicKey::from_secret_key(&Secp256k1::new(), secret).serialize())
    }

    /// Account `acc-1` (alias `kencani`) with two signing addresses.
    async fn wallet(node: MockNode) -> Wallet {
        let temp_dir = tempdir().unwrap();
        let pool = init_db(temp_dir.path().join("wallet.db")).unwrap();
        let registry = SqliteAccountRegistry::new(pool);

        let first = SecretKey::from_slice(&[1u8; 32]).unwrap();
        let second = SecretKey::from_slice(&[2u8; 32]).unwrap();
        registry
            .register_account("acc-1", "kencani", Some(&public_key_hex(&first)))
            .await
            .unwrap();
        registry
            .add_address(AddressRow {
                address: "kencani-2".to_string(),
                account_id: "acc-1".to_string(),
                public_key: public_key_hex(&second),
                hd_path: "m/44'/88'/0'/1".to_string(),
            })
            .await
            .unwrap();

        let node = Arc::new(node);
        let decoder = TransactionDecoder::new(
            &WalletConfig::default(),
            node.clone(),
            Arc::new(registry),
            Arc::new(Secp256k1Signer::new()),
        )
        .unwrap();

        let keys = HashMap::from([
            ("kencani".to_string(), first.secret_bytes().to_vec()),
            ("kencani-2".to_string(), second.secret_bytes().to_vec()),
        ]);
        Wallet {
            _temp_dir: temp_dir,
            decoder,
            node,
            keys,
        }
    }

    fn funded() -> MockNode {
        MockNode::default()
            .with_balance("kencani", "10.00000000", "PIA")
            .with_balance("kencani4", "0.00000000", "PIA")
    }

    fn transfer(amount: &str) -> RawTransaction {
        RawTransaction::new(Coin::native("PIA"), "acc-1", "kencani4", amount).with_memo("test")
    }

    #[tokio::test]
    async fn test_build_binds_reference_block_and_requests_signatures() {
        let w = wallet(funded()).await;
        let mut raw = transfer("1.5");

        w.decoder.create_raw_transaction(&mut raw).await.unwrap();

        assert!(raw.is_built);
        assert_eq!(raw.ref_block_num, 55_392);
        assert_eq!(raw.ref_block_prefix, 2_982_432_377);
        let now = Utc::now().timestamp();
        assert!((i64::from(raw.expiration) - (now + 30 * 60)).abs() <= 5);

        let tx = WireTransaction::decode(&hex::decode(&raw.raw_hex).unwrap()).unwrap();
        assert_eq!(tx.operations[0].amount, Asset::new(150_000_000, 8, "PIA"));
        assert_eq!(tx.operations[0].from, "kencani");
        assert_eq!(tx.operations[0].memo, "test");

        let expected = hex::encode(signing_digest(&[0u8; 32], &tx.signing_bytes().unwrap()));
        let requests = &raw.signatures["acc-1"];
        assert_eq!(requests.len(), 2);
        assert!(requests.iter().all(|r| r.message == expected));

        assert_eq!(raw.tx_amount, "-1.5");
        assert_eq!(raw.tx_from, vec!["kencani:1.5".to_string()]);
        assert_eq!(raw.tx_to, vec!["kencani4:1.5".to_string()]);
        assert_eq!(w.decoder.raw_transaction_fee_rate(), ("0".to_string(), "PIA".to_string()));
    }

    #[tokio::test]
    async fn test_build_preconditions() {
        let w = wallet(funded()).await;

        let mut unknown = RawTransaction::new(Coin::native("PIA"), "acc-9", "kencani4", "1");
        assert!(matches!(
            w.decoder.create_raw_transaction(&mut unknown).await,
            Err(TransactionError::AccountNotFound(_))
        ));

        let mut off_chain = RawTransaction::new(Coin::native("PIA"), "acc-1", "nobody", "1");
        assert!(matches!(
            w.decoder.create_raw_transaction(&mut off_chain).await,
            Err(TransactionError::AccountNotOnChain { alias, .. }) if alias == "nobody"
        ));

        let mut too_much = transfer("10.00000001");
        assert!(matches!(
            w.decoder.create_raw_transaction(&mut too_much).await,
            Err(TransactionError::InsufficientBalance { .. })
        ));
        assert!(!too_much.is_built);

        let mut exact = transfer("10");
        w.decoder.create_raw_transaction(&mut exact).await.unwrap();
    }

    #[tokio::test]
    async fn test_foreign_currency_balance_is_not_on_chain() {
        let node = MockNode::default()
            .with_balance("kencani", "10.00000000", "EOS")
            .with_balance("kencani4", "0.00000000", "PIA");
        let w = wallet(node).await;

        let mut raw = transfer("1");
        assert!(matches!(
            w.decoder.create_raw_transaction(&mut raw).await,
            Err(TransactionError::AccountNotOnChain { alias, .. }) if alias == "kencani"
        ));
    }

    #[tokio::test]
    async fn test_sign_verify_submit() {
        let w = wallet(funded()).await;
        let mut raw = transfer("2");

        w.decoder.create_raw_transaction(&mut raw).await.unwrap();
        w.decoder.sign_raw_transaction(&mut raw, &w.keys).await.unwrap();
        assert!(raw.signatures["acc-1"].iter().all(|s| s.signature.len() == 128));

        w.decoder.verify_raw_transaction(&mut raw).await.unwrap();
        assert!(raw.is_completed);
        let signed = WireTransaction::decode(&hex::decode(&raw.raw_hex).unwrap()).unwrap();
        assert_eq!(signed.signatures.len(), 2);
        assert!(signed.signatures.iter().all(|s| s.len() == 130));

        let record = w.decoder.submit_raw_transaction(&mut raw).await.unwrap();
        assert!(raw.is_submit);
        assert_eq!(raw.tx_id, "a1b2c3");
        assert_eq!(record.tx_id, "a1b2c3");
        assert_eq!(record.fees, "0");
        assert_eq!(record.amount, "-2");
        assert_eq!(record.memo(), Some("test"));
        assert_eq!(record.wx_id, gen_transaction_wx_id("a1b2c3", "PIA", "", 0));

        let broadcasts = w.node.broadcasts.lock().unwrap();
        assert_eq!(broadcasts.len(), 1);
        assert_eq!(broadcasts[0].operations[0].1.amount, "2.00000000 PIA");
        assert_eq!(broadcasts[0].signatures, signed.signatures);
    }

    #[tokio::test]
    async fn test_verify_rejects_foreign_signature() {
        let w = wallet(funded()).await;
        let mut raw = transfer("1");
        w.decoder.create_raw_transaction(&mut raw).await.unwrap();

        let mut wrong_keys = w.keys.clone();
        wrong_keys.insert("kencani-2".to_string(), vec![3u8; 32]);
        w.decoder.sign_raw_transaction(&mut raw, &wrong_keys).await.unwrap();

        let err = w.decoder.verify_raw_transaction(&mut raw).await.unwrap_err();
        assert!(matches!(err, TransactionError::VerifyFailed { address, .. } if address == "kencani-2"));
        assert!(!raw.is_completed);
    }

    #[tokio::test]
    async fn test_unsigned_transaction_cannot_be_verified() {
        let w = wallet(funded()).await;
        let mut raw = transfer("1");
        assert!(matches!(
            w.decoder.verify_raw_transaction(&mut raw).await,
            Err(TransactionError::SignatureEmpty)
        ));
    }

    #[tokio::test]
    async fn test_duplicate_broadcast_is_distinct() {
        let node = MockNode {
            duplicate: true,
            ..funded()
        };
        let w = wallet(node).await;
        let mut raw = transfer("1");
        w.decoder.create_raw_transaction(&mut raw).await.unwrap();
        w.decoder.sign_raw_transaction(&mut raw, &w.keys).await.unwrap();
        w.decoder.verify_raw_transaction(&mut raw).await.unwrap();

        let err = w.decoder.submit_raw_transaction(&mut raw).await.unwrap_err();
        assert!(matches!(err, TransactionError::DuplicateSubmission(_)));
        assert!(!raw.is_submit);
    }

    fn summary(min_transfer: &str, retained: &str) -> SummaryRawTransaction {
        SummaryRawTransaction {
            coin: Coin::native("PIA"),
            account_id: "acc-1".to_string(),
            summary_address: "kencani4".to_string(),
            min_transfer: min_transfer.to_string(),
            retained_balance: retained.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_summary_sweeps_above_retained_balance() {
        let w = wallet(funded()).await;

        let built = w.decoder.create_summary_raw_transaction(&summary("5", "0.25")).await.unwrap();
        assert_eq!(built.len(), 1);
        assert_eq!(built[0].to["kencani4"], "9.75");
        assert!(built[0].is_built);

        let skipped = w.decoder.create_summary_raw_transaction(&summary("20", "1")).await.unwrap();
        assert!(skipped.is_empty());

        assert!(matches!(
            w.decoder.create_summary_raw_transaction(&summary("1", "2")).await,
            Err(TransactionError::InvalidArgument(_))
        ));
    }
}
