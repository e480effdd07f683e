use std::time::Duration;
use thiserror::Error;

use crate::common::types::{BlockId, TxnId};

#[derive(Error, Debug)]
pub enum LockError {
    #[error("Transaction {txn_id} gave up waiting {waited:?} for a lock on {block}")]
    Timeout {
        txn_id: TxnId,
        block: BlockId,
        waited: Duration,
    },
}
