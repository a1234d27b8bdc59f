//! Proof-of-work mining
//!
//! A block is mined when its hex hash starts with `difficulty` `'0'`
//! characters. [`mine_block`] is the plain unbounded search. [`Miner`] adds a
//! [`CancelToken`] checked on every attempt and can stripe the nonce space
//! across a rayon pool, keeping whichever valid nonce is found first.

use crate::block::Block;
use crate::error::ChainError;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use sha2::Sha256;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Largest meaningful difficulty: a SHA-256 hex hash has 64 characters.
pub const MAX_DIFFICULTY: u32 = 64;

pub fn meets_difficulty(hash: &str, difficulty: u32) -> bool {
    let difficulty = difficulty as usize;
    hash.len() >= difficulty && hash.bytes().take(difficulty).all(|b| b == b'0')
}

/// Increments the nonce from its current value until the hash meets `difficulty`.
pub fn mine_block(block: &mut Block, difficulty: u32) -> Result<(), ChainError> {
    Miner::default().mine(block, difficulty, &CancelToken::new())
}

/// Shared flag that stops an in-flight search.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Nonce searcher. With more than one thread it owns a rayon pool, built
/// once and shared by clones.
#[derive(Debug, Clone)]
pub struct Miner {
    threads: usize,
    pool: Option<Arc<ThreadPool>>,
}

impl Default for Miner {
    fn default() -> Self {
        Miner {
            threads: 1,
            pool: None,
        }
    }
}

impl Miner {
    pub fn new(threads: usize) -> Result<Self, ChainError> {
        let threads = threads.max(1);
        if threads == 1 {
            return Ok(Self::default());
        }
        let pool = ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|i| format!("miner-{}", i))
            .build()
            .map_err(|e| ChainError::InvalidBlock(format!("Failed to start mining pool: {}", e)))?;
        Ok(Miner {
            threads,
            pool: Some(Arc::new(pool)),
        })
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Searches for a nonce and stores it, with the matching hash, in `block`.
    pub fn mine(&self, block: &mut Block, difficulty: u32, cancel: &CancelToken) -> Result<(), ChainError> {
        if difficulty > MAX_DIFFICULTY {
            return Err(ChainError::InvalidBlock(format!(
                "Difficulty {} exceeds maximum {}",
                difficulty, MAX_DIFFICULTY
            )));
        }
        if meets_difficulty(block.hash(), difficulty) {
            return Ok(());
        }

        let header = block.header_hasher();
        let start = block.nonce().checked_add(1).ok_or(ChainError::NonceSpaceExhausted)?;

        let found = match &self.pool {
            Some(pool) => self.search_parallel(pool, &header, start, difficulty, cancel),
            None => search_lane(&header, start, 1, difficulty, &AtomicBool::new(false), cancel),
        };

        match found {
            Some((nonce, hash)) => {
                block.set_proof(nonce, hash);
                Ok(())
            }
            None if cancel.is_cancelled() => Err(ChainError::MiningCancelled),
            None => Err(ChainError::NonceSpaceExhausted),
        }
    }

    fn search_parallel(
        &self,
        pool: &ThreadPool,
        header: &Sha256,
        start: u64,
        difficulty: u32,
        cancel: &CancelToken,
    ) -> Option<(u64, String)> {
        let stride = self.threads as u64;
        let found = AtomicBool::new(false);
        pool.install(|| {
            (0..stride).into_par_iter().find_map_any(|lane| {
                let lane_start = start.checked_add(lane)?;
                search_lane(header, lane_start, stride, difficulty, &found, cancel)
            })
        })
    }
}

/// Tries `start`, `start + stride`, ... until a hash meets `difficulty`,
/// another lane has won, or the token is cancelled.
fn search_lane(
    header: &Sha256,
    start: u64,
    stride: u64,
    difficulty: u32,
    found: &AtomicBool,
    cancel: &CancelToken,
) -> Option<(u64, String)> {
    let mut nonce = start;
    loop {
        if cancel.is_cancelled() || found.load(Ordering::Relaxed) {
            return None;
        }
        let hash = Block::hash_with_nonce(header, nonce);
        if meets_difficulty(&hash, difficulty) {
            found.store(true, Ordering::Relaxed);
            return Some((nonce, hash));
        }
        nonce = nonce.checked_add(stride)?;
    }
}
