//! Raw transfer construction, signing and submission.
//!
//! # Transaction Lifecycle
//!
//! 1. **Building**: [`TransactionDecoder::create_raw_transaction`] checks the
//!    source balance, binds the transfer to the last irreversible block and
//!    emits one [`KeySignature`] request per address of the account
//! 2. **Signing**: [`TransactionDecoder::sign_raw_transaction`] fills the
//!    requests through a [`TransactionSigner`]
//! 3. **Verification**: [`TransactionDecoder::verify_raw_transaction`] checks
//!    each signature and attaches it to the encoded transaction
//! 4. **Submission**: [`TransactionDecoder::submit_raw_transaction`] broadcasts
//!    and returns the [`LedgerTransaction`](crate::models::LedgerTransaction)
//!
//! The binary layout and its signing quirks live in [`codec`].

mod builder;
pub mod codec;
mod error;
mod raw_transaction;
mod signer;

pub use builder::{AccountStore, TransactionDecoder};
pub use codec::{CodecError, TransferOperation, WireTransaction, signing_digest};
pub use error::TransactionError;
pub use raw_transaction::{KeySignature, RawTransaction, RawTransactionWithError, SummaryRawTransaction};
pub use signer::{CURVE_SECP256K1, KeyStore, Secp256k1Signer, SignerError, TransactionSigner};
