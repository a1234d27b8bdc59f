//! Thread-safe handle around a [`Blockchain`].
//!
//! Mining rounds are serialized by a round lock. A round takes the write lock
//! only to freeze the pool into a candidate and again to append the mined
//! block; the nonce search runs unlocked. Transactions submitted during the
//! search land in the fresh pool and wait for the next round, and readers only
//! ever see the chain before or after an append.

use super::{Balance, Blockchain, ChainViolation};
use crate::block::Block;
use crate::error::ChainError;
use crate::miner::{CancelToken, Miner};
use crate::transaction::Transaction;
use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, Clone)]
pub struct SharedLedger {
    chain: Arc<RwLock<Blockchain>>,
    round: Arc<Mutex<()>>,
    miner: Miner,
}

impl SharedLedger {
    pub fn new(chain: Blockchain, miner: Miner) -> Self {
        SharedLedger {
            chain: Arc::new(RwLock::new(chain)),
            round: Arc::new(Mutex::new(())),
            miner,
        }
    }

    pub fn submit_transaction(&self, tx: Transaction) -> Result<(), ChainError> {
        self.chain.write().add_transaction_to_pending_pool(tx)
    }

    /// Runs one mining round and returns a copy of the appended block.
    pub fn mine_pending_transactions(
        &self,
        miner_address: &str,
        cancel: &CancelToken,
    ) -> Result<Block, ChainError> {
        let _round = self.round.lock();

        let (mut candidate, difficulty) = {
            let mut chain = self.chain.write();
            (chain.prepare_candidate(miner_address), chain.difficulty())
        };

        if let Err(e) = self.miner.mine(&mut candidate, difficulty, cancel) {
            warn!("Mining round abandoned: {}", e);
            self.chain.write().restore_pending(candidate);
            return Err(e);
        }

        let mut chain = self.chain.write();
        if let Err(e) = chain.verify_candidate(&candidate) {
            chain.restore_pending(candidate);
            return Err(e);
        }
        let block = chain.push_block(candidate).clone();
        Ok(block)
    }

    pub fn balance_of(&self, address: &str) -> Result<Balance, ChainError> {
        self.chain.read().get_balance_of_address(address)
    }

    pub fn is_valid(&self) -> bool {
        self.chain.read().is_valid()
    }

    pub fn validate(&self) -> Result<(), ChainViolation> {
        self.chain.read().validate()
    }

    pub fn height(&self) -> usize {
        self.chain.read().height()
    }

    pub fn pending_len(&self) -> usize {
        self.chain.read().pending_transactions().len()
    }

    /// Read guard for queries not wrapped here. Holding it blocks appends.
    pub fn read(&self) -> RwLockReadGuard<'_, Blockchain> {
        self.chain.read()
    }
}
