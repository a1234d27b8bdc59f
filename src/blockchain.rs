//! The ledger: blocks, the pending pool, mining rounds, balances and
//! chain validation. [`shared`] wraps it for concurrent callers.

pub mod shared;
pub mod validation;

pub use shared::SharedLedger;
pub use validation::{validate_chain, ChainViolation, ValidationRule};

use crate::block::Block;
use crate::config::ChainConfig;
use crate::crypto::SignatureService;
use crate::error::ChainError;
use crate::miner::{meets_difficulty, CancelToken, Miner};
use crate::transaction::{Amount, Transaction};
use tracing::{debug, info, warn};

/// Signed balance. Spending without funds is allowed and goes negative.
pub type Balance = i128;

#[derive(Debug, Clone)]
pub struct Blockchain {
    blocks: Vec<Block>,
    difficulty: u32,
    pending_transactions: Vec<Transaction>,
    mining_reward: Amount,
    signer: SignatureService,
}

impl Default for Blockchain {
    fn default() -> Self {
        Self::new(SignatureService::new())
    }
}

impl Blockchain {
    /// Creates a chain holding only the genesis block, with default settings.
    pub fn new(signer: SignatureService) -> Self {
        let defaults = ChainConfig::default();
        Self::build(defaults.difficulty, defaults.mining_reward, signer)
    }

    pub fn with_config(config: &ChainConfig, signer: SignatureService) -> Result<Self, ChainError> {
        config.validate()?;
        Ok(Self::build(config.difficulty, config.mining_reward, signer))
    }

    fn build(difficulty: u32, mining_reward: Amount, signer: SignatureService) -> Self {
        Blockchain {
            blocks: vec![Self::genesis_block()],
            difficulty,
            pending_transactions: Vec::new(),
            mining_reward,
            signer,
        }
    }

    /// The genesis block has no transactions and an empty previous hash.
    fn genesis_block() -> Block {
        Block::new(Vec::new(), String::new())
    }

    pub fn signer(&self) -> &SignatureService {
        &self.signer
    }

    pub fn difficulty(&self) -> u32 {
        self.difficulty
    }

    pub fn mining_reward(&self) -> Amount {
        self.mining_reward
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn pending_transactions(&self) -> &[Transaction] {
        &self.pending_transactions
    }

    pub fn latest_block(&self) -> &Block {
        // The genesis block is never removed.
        &self.blocks[self.blocks.len() - 1]
    }

    /// Height of the tip; the genesis block is height 0.
    pub fn height(&self) -> usize {
        self.blocks.len() - 1
    }

    pub fn get_block(&self, height: i64) -> Result<&Block, ChainError> {
        usize::try_from(height)
            .ok()
            .and_then(|h| self.blocks.get(h))
            .ok_or(ChainError::OutOfRange {
                height,
                length: self.blocks.len(),
            })
    }

    /// Admits a signed transfer into the pool. Rejected transactions leave
    /// the pool untouched.
    pub fn add_transaction_to_pending_pool(&mut self, tx: Transaction) -> Result<(), ChainError> {
        if tx.from_address().map_or(true, str::is_empty) || tx.to_address().is_empty() {
            return Err(ChainError::MalformedTransaction(
                "must include from and to addresses".to_string(),
            ));
        }

        match tx.is_valid(&self.signer) {
            Ok(true) => {}
            Ok(false) => {
                return Err(ChainError::InvalidTransaction(
                    "signature does not verify".to_string(),
                ))
            }
            Err(e) => return Err(ChainError::InvalidTransaction(e.to_string())),
        }

        debug!(tx = %tx.calculate_hash(), amount = tx.amount(), "Transaction added to pending pool");
        self.pending_transactions.push(tx);
        Ok(())
    }

    /// Mines the pending pool into a new block with the plain unbounded search.
    pub fn mine_pending_transactions(&mut self, miner_address: &str) -> Result<&Block, ChainError> {
        self.mine_pending_transactions_with(miner_address, &Miner::default(), &CancelToken::new())
    }

    /// Mines the pending pool with `miner`. If the search is cancelled the
    /// pool is restored as it was.
    pub fn mine_pending_transactions_with(
        &mut self,
        miner_address: &str,
        miner: &Miner,
        cancel: &CancelToken,
    ) -> Result<&Block, ChainError> {
        let mut block = self.prepare_candidate(miner_address);
        let mined = miner
            .mine(&mut block, self.difficulty, cancel)
            .and_then(|_| self.verify_candidate(&block));
        if let Err(e) = mined {
            self.restore_pending(block);
            return Err(e);
        }
        Ok(self.push_block(block))
    }

    /// Appends an externally mined block after checking linkage and work.
    pub fn append_block(&mut self, block: Block) -> Result<&Block, ChainError> {
        self.verify_candidate(&block)?;
        Ok(self.push_block(block))
    }

    /// Freezes the pool into a block paying `miner_address`, leaving the pool empty.
    pub(crate) fn prepare_candidate(&mut self, miner_address: &str) -> Block {
        let mut transactions = Vec::with_capacity(self.pending_transactions.len() + 1);
        transactions.push(Transaction::reward(miner_address, self.mining_reward));
        transactions.append(&mut self.pending_transactions);
        Block::new(transactions, self.latest_block().hash())
    }

    /// Puts an abandoned candidate's transfers back ahead of newer arrivals.
    pub(crate) fn restore_pending(&mut self, candidate: Block) {
        let mut restored: Vec<Transaction> = candidate
            .into_transactions()
            .into_iter()
            .filter(|tx| !tx.is_reward())
            .collect();
        restored.append(&mut self.pending_transactions);
        self.pending_transactions = restored;
    }

    /// Candidates link to the tip's stored hash, the same one
    /// [`Self::prepare_candidate`] builds on.
    pub(crate) fn verify_candidate(&self, block: &Block) -> Result<(), ChainError> {
        let tip_hash = self.latest_block().hash();
        if block.previous_hash() != tip_hash {
            return Err(ChainError::InvalidBlock(format!(
                "Invalid previous block hash. Expected {}, but got {}.",
                tip_hash,
                block.previous_hash()
            )));
        }
        if block.hash() != block.calculate_hash() {
            return Err(ChainError::InvalidBlock(
                "Stored hash does not match block contents.".to_string(),
            ));
        }
        if !meets_difficulty(block.hash(), self.difficulty) {
            return Err(ChainError::InvalidBlock(
                "Invalid Proof-of-Work: Block hash does not meet difficulty target.".to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) fn push_block(&mut self, block: Block) -> &Block {
        info!(
            "Block mined and added to the chain. blockHash: {}, nonce: {}.",
            block.hash(),
            block.nonce()
        );
        if let Some(reward) = block.transactions().iter().find(|tx| tx.is_reward()) {
            info!("Mining reward {} given to {}.", reward.amount(), reward.to_address());
        }
        let index = self.blocks.len();
        self.blocks.push(block);
        &self.blocks[index]
    }

    /// Replays every transaction: senders lose `amount`, recipients gain it.
    /// A transfer to oneself only counts as a debit.
    pub fn get_balance_of_address(&self, address: &str) -> Result<Balance, ChainError> {
        self.blocks
            .iter()
            .flat_map(|block| block.transactions())
            .try_fold(0 as Balance, |mut balance, tx| -> Result<Balance, ChainError> {
                let amount = Balance::from(tx.amount());
                if tx.from_address() == Some(address) {
                    balance = balance.checked_sub(amount).ok_or(ChainError::AmountOverflow)?;
                } else if tx.to_address() == address {
                    balance = balance.checked_add(amount).ok_or(ChainError::AmountOverflow)?;
                }
                Ok(balance)
            })
    }

    /// Re-checks every block after genesis against its recomputed hashes.
    pub fn validate(&self) -> Result<(), ChainViolation> {
        validate_chain(&self.blocks, &self.signer)
    }

    pub fn is_valid(&self) -> bool {
        match self.validate() {
            Ok(()) => true,
            Err(violation) => {
                warn!(height = violation.height, rule = ?violation.rule, "{}", violation);
                false
            }
        }
    }

    /// Mutable access to a historical transaction, for tamper-detection demos.
    #[cfg(any(test, feature = "tamper-hooks"))]
    pub fn tamper_transaction(&mut self, height: usize, index: usize) -> Option<&mut Transaction> {
        self.blocks.get_mut(height)?.transactions_mut().get_mut(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;

    fn signed(signer: &SignatureService, from: &KeyPair, to: &str, amount: Amount) -> Transaction {
        let mut tx = Transaction::new(from.public_key_hex(), to, amount);
        tx.sign(from, signer).unwrap();
        tx
    }

    /// Replays the three-block narrative: Alice pays Bob 10 then 15, Bob pays Alice 26.
    fn narrative_chain() -> (Blockchain, KeyPair, KeyPair) {
        let mut chain = Blockchain::default();
        let signer = chain.signer().clone();
        let alice = signer.generate_key_pair();
        let bob = signer.generate_key_pair();

        let tx = signed(&signer, &alice, &bob.public_key_hex(), 10);
        chain.add_transaction_to_pending_pool(tx).unwrap();
        chain.mine_pending_transactions(&alice.public_key_hex()).unwrap();

        let tx = signed(&signer, &alice, &bob.public_key_hex(), 15);
        chain.add_transaction_to_pending_pool(tx).unwrap();
        chain.mine_pending_transactions(&bob.public_key_hex()).unwrap();

        let tx = signed(&signer, &bob, &alice.public_key_hex(), 26);
        chain.add_transaction_to_pending_pool(tx).unwrap();
        chain.mine_pending_transactions(&alice.public_key_hex()).unwrap();

        (chain, alice, bob)
    }

    #[test]
    fn test_fresh_chain_has_only_genesis() {
        let chain = Blockchain::default();
        assert_eq!(chain.blocks().len(), 1);
        assert_eq!(chain.height(), 0);
        assert_eq!(chain.latest_block().previous_hash(), "");
        assert!(chain.latest_block().transactions().is_empty());
        assert_eq!(chain.get_balance_of_address("anyone"), Ok(0));
        assert!(chain.is_valid());
    }

    #[test]
    fn test_narrative_balances() {
        let (chain, alice, bob) = narrative_chain();
        assert_eq!(chain.height(), 3);
        // Alice: +50 -10 -15 +26 +50
        assert_eq!(chain.get_balance_of_address(&alice.public_key_hex()), Ok(101));
        // Bob: +10 +15 +50 -26
        assert_eq!(chain.get_balance_of_address(&bob.public_key_hex()), Ok(49));
        assert!(chain.pending_transactions().is_empty());
    }

    #[test]
    fn test_blocks_link_and_meet_difficulty() {
        let (chain, _, _) = narrative_chain();
        for pair in chain.blocks().windows(2) {
            assert_eq!(pair[1].previous_hash(), pair[0].hash());
            assert!(pair[1].hash().starts_with("00"));
            assert!(pair[1].transactions()[0].is_reward());
        }
    }

    #[test]
    fn test_tampered_amount_breaks_validity() {
        let (mut chain, _, _) = narrative_chain();
        assert!(chain.is_valid());

        chain.tamper_transaction(2, 1).unwrap().set_amount(23);
        assert!(!chain.is_valid());
        let violation = chain.validate().unwrap_err();
        assert_eq!(violation.height, 2);
        assert_eq!(violation.rule, ValidationRule::InvalidTransactions);
    }

    #[test]
    fn test_tampered_reward_breaks_block_hash() {
        let (mut chain, _, _) = narrative_chain();
        chain.tamper_transaction(1, 0).unwrap().set_amount(5_000);

        let violation = chain.validate().unwrap_err();
        assert_eq!(violation.height, 1);
        assert_eq!(violation.rule, ValidationRule::HashMismatch);
    }

    #[test]
    fn test_tampered_genesis_breaks_link() {
        let (mut chain, _, _) = narrative_chain();
        chain.blocks[0] = Block::new(vec![Transaction::reward("mallory", 1)], "");

        let violation = chain.validate().unwrap_err();
        assert_eq!(violation.height, 1);
        assert_eq!(violation.rule, ValidationRule::PreviousHashMismatch);
    }

    #[test]
    fn test_unsigned_transaction_in_block_reports_violation() {
        let (mut chain, _, _) = narrative_chain();
        chain.blocks[3]
            .transactions_mut()
            .push(Transaction::new("alice", "bob", 1));

        let violation = chain.validate().unwrap_err();
        assert_eq!(violation.height, 3);
        assert_eq!(violation.rule, ValidationRule::InvalidTransactions);
        assert!(violation.detail.contains("signature is missing"));
    }

    #[test]
    fn test_rejected_transactions_leave_pool_empty() {
        let mut chain = Blockchain::default();
        let signer = chain.signer().clone();
        let alice = signer.generate_key_pair();

        let reward = Transaction::reward(alice.public_key_hex(), 50);
        assert!(matches!(
            chain.add_transaction_to_pending_pool(reward),
            Err(ChainError::MalformedTransaction(_))
        ));

        let no_recipient = signed(&signer, &alice, "", 5);
        assert!(matches!(
            chain.add_transaction_to_pending_pool(no_recipient),
            Err(ChainError::MalformedTransaction(_))
        ));

        let unsigned = Transaction::new(alice.public_key_hex(), "bob", 5);
        assert!(matches!(
            chain.add_transaction_to_pending_pool(unsigned),
            Err(ChainError::InvalidTransaction(_))
        ));

        let mut forged = signed(&signer, &alice, "bob", 5);
        forged.set_amount(500);
        assert!(matches!(
            chain.add_transaction_to_pending_pool(forged),
            Err(ChainError::InvalidTransaction(_))
        ));

        assert!(chain.pending_transactions().is_empty());
    }

    #[test]
    fn test_overspending_is_accepted() {
        let mut chain = Blockchain::default();
        let signer = chain.signer().clone();
        let alice = signer.generate_key_pair();

        let tx = signed(&signer, &alice, "bob", 1_000);
        chain.add_transaction_to_pending_pool(tx).unwrap();
        chain.mine_pending_transactions("miner").unwrap();
        assert_eq!(chain.get_balance_of_address(&alice.public_key_hex()), Ok(-1_000));
    }

    #[test]
    fn test_self_transfer_costs_its_amount() {
        let mut chain = Blockchain::default();
        let signer = chain.signer().clone();
        let alice = signer.generate_key_pair();

        let tx = signed(&signer, &alice, &alice.public_key_hex(), 10);
        chain.add_transaction_to_pending_pool(tx).unwrap();
        chain.mine_pending_transactions("miner").unwrap();
        assert_eq!(chain.get_balance_of_address(&alice.public_key_hex()), Ok(-10));
        assert_eq!(chain.get_balance_of_address("miner"), Ok(50));
    }

    #[test]
    fn test_mining_continues_on_tampered_tip() {
        let (mut chain, alice, _) = narrative_chain();
        chain.tamper_transaction(3, 0).unwrap().set_amount(5_000);
        assert!(!chain.is_valid());

        let stored_tip = chain.latest_block().hash().to_string();
        let block = chain.mine_pending_transactions(&alice.public_key_hex()).unwrap();
        assert_eq!(block.previous_hash(), stored_tip);
        assert_eq!(chain.height(), 4);
    }

    #[test]
    fn test_balance_exceeds_amount_range() {
        let mut chain = Blockchain::default();
        let big = Block::new(
            vec![Transaction::reward("whale", u64::MAX); 3],
            chain.latest_block().hash(),
        );
        chain.blocks.push(big);
        assert_eq!(
            chain.get_balance_of_address("whale"),
            Ok(3 * Balance::from(u64::MAX))
        );
    }

    #[test]
    fn test_get_block_bounds() {
        let (chain, _, _) = narrative_chain();
        assert!(chain.get_block(0).is_ok());
        assert!(chain.get_block(3).is_ok());
        assert_eq!(
            chain.get_block(-1).unwrap_err(),
            ChainError::OutOfRange { height: -1, length: 4 }
        );
        assert!(matches!(chain.get_block(4), Err(ChainError::OutOfRange { .. })));
    }

    #[test]
    fn test_cancelled_round_restores_pool() {
        let mut chain = Blockchain::with_config(
            &ChainConfig {
                difficulty: 64,
                mining_reward: 50,
            },
            SignatureService::new(),
        )
        .unwrap();
        let signer = chain.signer().clone();
        let alice = signer.generate_key_pair();
        chain
            .add_transaction_to_pending_pool(signed(&signer, &alice, "bob", 3))
            .unwrap();

        let cancel = CancelToken::new();
        cancel.cancel();
        let result = chain.mine_pending_transactions_with("miner", &Miner::new(2).unwrap(), &cancel);
        assert!(matches!(result, Err(ChainError::MiningCancelled)));
        assert_eq!(chain.height(), 0);
        assert_eq!(chain.pending_transactions().len(), 1);
        assert!(!chain.pending_transactions()[0].is_reward());
    }

    #[test]
    fn test_append_block_rejects_bad_link() {
        let mut chain = Blockchain::default();
        let mut orphan = Block::new(vec![Transaction::reward("miner", 50)], "deadbeef");
        crate::miner::mine_block(&mut orphan, chain.difficulty()).unwrap();
        assert!(matches!(
            chain.append_block(orphan),
            Err(ChainError::InvalidBlock(_))
        ));
        assert_eq!(chain.height(), 0);
    }

    #[test]
    fn test_with_config_rejects_zero_difficulty() {
        let config = ChainConfig {
            difficulty: 0,
            mining_reward: 50,
        };
        assert!(matches!(
            Blockchain::with_config(&config, SignatureService::new()),
            Err(ChainError::ConfigError(_))
        ));
    }
}
