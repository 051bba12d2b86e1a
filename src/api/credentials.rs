//! Credential rotation across a small pool of API key/token pairs
//!
//! Every outbound call takes the next pair from the pool. Selection depends only
//! on the shared call counter, so the sequence is reproducible for a given pool.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::models::CredentialPair;

/// Number of calls between forced swaps to the next pool entry
pub const DEFAULT_SWAP_THRESHOLD: u64 = 100;

#[derive(Debug)]
struct PoolInner {
    pairs: Vec<CredentialPair>,
    swap_threshold: u64,
    calls: AtomicU64,
}

/// Shared, cheaply clonable credential pool
#[derive(Debug, Clone)]
pub struct CredentialPool {
    inner: Arc<PoolInner>,
}

impl CredentialPool {
    pub fn new(pairs: Vec<CredentialPair>, swap_threshold: u64) -> anyhow::Result<Self> {
        if pairs.is_empty() {
            anyhow::bail!("Credential pool needs at least one key/token pair");
        }

        Ok(Self {
            inner: Arc::new(PoolInner {
                pairs,
                swap_threshold: swap_threshold.max(1),
                calls: AtomicU64::new(0),
            }),
        })
    }

    pub fn single(pair: CredentialPair) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                pairs: vec![pair],
                swap_threshold: DEFAULT_SWAP_THRESHOLD,
                calls: AtomicU64::new(0),
            }),
        }
    }

    /// Select the pair for the next outbound call and advance the counter
    pub fn next_credential(&self) -> CredentialPair {
        let call = self.inner.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.inner.pairs[self.index_for_call(call)].clone()
    }

    /// Pool index used for the `call`-th request (1-based).
    ///
    /// On every multiple of the swap threshold the pool advances one step in its
    /// own cycle, otherwise the entry is `call mod len`.
    fn index_for_call(&self, call: u64) -> usize {
        let len = self.inner.pairs.len() as u64;
        let threshold = self.inner.swap_threshold;
        let index = if call % threshold == 0 {
            (call / threshold - 1) % len
        } else {
            call % len
        };
        index as usize
    }

    pub fn calls_made(&self) -> u64 {
        self.inner.calls.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.inner.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.pairs.is_empty()
    }
}
