//! Block engine: the tick-driven epoch state machine.
//!
//! Current block number, seed, and epoch start are published through an
//! `ArcSwap` snapshot so readers (handlers) never block the tick. A
//! `parking_lot::RwLock<()>` gates the window between snapshotting the
//! current block and completing a share insert: handlers take it in read
//! mode, the tick takes it in write mode, so a submission can never land
//! against a block that finishes closing mid-insert. A separate mutex
//! ensures a second tick is dropped rather than queued if finalization is
//! still in flight.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use parking_lot::RwLock;
use tokio::sync::Mutex as AsyncMutex;

use crate::config::FaucetConfig;
use crate::crypto::seed::generate_seed_hex;
use crate::crypto::weighted::SecureChooser;
use crate::error::AppError;
use crate::reward::{compute_rewards, RewardBudgets};
use crate::storage::Storage;

const META_BLOCK_NUMBER: &str = "currentBlockNumber";
const META_SEED_HEX: &str = "currentSeedHex";

#[derive(Debug, Clone)]
struct EngineSnapshot {
    block_number: u64,
    seed_hex: String,
    block_start: Instant,
}

pub struct BlockEngine {
    storage: Arc<dyn Storage>,
    config: FaucetConfig,
    snapshot: ArcSwap<EngineSnapshot>,
    epoch_lock: RwLock<()>,
    closing_lock: AsyncMutex<()>,
}

impl BlockEngine {
    /// Boots the engine: loads `currentBlockNumber`/`currentSeedHex` from
    /// meta, or initializes block 1 with a fresh seed on first boot.
    pub fn boot(storage: Arc<dyn Storage>, config: FaucetConfig) -> Result<Arc<Self>, AppError> {
        let existing_number = storage.get_meta(META_BLOCK_NUMBER)?;
        let existing_seed = storage.get_meta(META_SEED_HEX)?;

        let (block_number, seed_hex) = match (existing_number, existing_seed) {
            (Some(n), Some(s)) => {
                let n: u64 = n
                    .parse()
                    .map_err(|_| AppError::fatal("corrupt currentBlockNumber in meta"))?;
                (n, s)
            }
            _ => {
                let n = 1u64;
                let s = generate_seed_hex();
                storage.set_meta(META_BLOCK_NUMBER, &n.to_string())?;
                storage.set_meta(META_SEED_HEX, &s)?;
                storage.insert_block(n, &s)?;
                (n, s)
            }
        };

        tracing::info!(block_number, seed_hex = %seed_hex, "block engine booted");

        Ok(Arc::new(Self {
            storage,
            config,
            snapshot: ArcSwap::from_pointee(EngineSnapshot {
                block_number,
                seed_hex,
                block_start: Instant::now(),
            }),
            epoch_lock: RwLock::new(()),
            closing_lock: AsyncMutex::new(()),
        }))
    }

    pub fn current_block_number(&self) -> u64 {
        self.snapshot.load().block_number
    }

    pub fn current_seed_hex(&self) -> String {
        self.snapshot.load().seed_hex.clone()
    }

    pub fn ms_left(&self) -> u64 {
        let snap = self.snapshot.load();
        let elapsed = snap.block_start.elapsed().as_millis() as u64;
        self.config.block_time_ms.saturating_sub(elapsed)
    }

    pub fn config(&self) -> &FaucetConfig {
        &self.config
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    /// Runs `f` with the current block number/seed, holding the epoch read
    /// lock for the duration so a concurrent tick cannot close the block
    /// mid-way. Handlers must perform the PoW check and share insert inside
    /// `f` so both see the same block.
    pub fn with_open_epoch<T>(&self, f: impl FnOnce(u64, &str) -> T) -> T {
        let _guard = self.epoch_lock.read();
        let snap = self.snapshot.load();
        f(snap.block_number, &snap.seed_hex)
    }

    /// Closes the current block and opens the next one. Tolerant of a
    /// concurrent tick already in flight (dropped, not queued) and of
    /// finalization errors (the epoch clock still advances).
    pub fn tick(&self) {
        let Ok(_closing_guard) = self.closing_lock.try_lock() else {
            tracing::warn!("tick dropped: previous block still closing");
            return;
        };

        let closing_block = self.current_block_number();

        let result = self.finalize_and_advance(closing_block);
        if let Err(e) = result {
            tracing::error!(
                block = closing_block,
                error = %e,
                "block finalization failed; advancing epoch clock without retry"
            );
            if let Err(e) = self.force_advance(closing_block) {
                tracing::error!(block = closing_block, error = %e, "failed to advance epoch after finalization error");
            }
        }
    }

    fn finalize_and_advance(&self, closing_block: u64) -> Result<(), AppError> {
        let _epoch_guard = self.epoch_lock.write();

        let shares = self.storage.shares_for_block(closing_block)?;
        let mut shares_by_address: HashMap<String, u64> = HashMap::new();
        for row in &shares {
            *shares_by_address.entry(row.address.clone()).or_insert(0) += 1;
        }

        let budgets = RewardBudgets {
            pool_a_micro: self.config.pool_a_micro(),
            pool_b_micro: self.config.pool_b_micro(),
            pool_c_micro: self.config.pool_c_micro(),
        };
        let rewards = compute_rewards(&shares_by_address, budgets, &mut SecureChooser);

        let processed_at = chrono::Utc::now().timestamp_millis();
        self.storage
            .finalize_block(closing_block, processed_at, &rewards)?;

        tracing::info!(
            block = closing_block,
            shares = shares.len(),
            miners = shares_by_address.len(),
            "block finalized"
        );

        self.open_next_block(closing_block)
    }

    /// Called when finalization itself failed: the block is left without
    /// rewards applied (operator must reconcile) but the clock still moves.
    fn force_advance(&self, closing_block: u64) -> Result<(), AppError> {
        let _epoch_guard = self.epoch_lock.write();
        self.open_next_block(closing_block)
    }

    fn open_next_block(&self, closing_block: u64) -> Result<(), AppError> {
        let new_block_number = closing_block + 1;
        let new_seed = generate_seed_hex();

        self.storage
            .set_meta(META_BLOCK_NUMBER, &new_block_number.to_string())?;
        self.storage.set_meta(META_SEED_HEX, &new_seed)?;
        self.storage.insert_block(new_block_number, &new_seed)?;

        self.snapshot.store(Arc::new(EngineSnapshot {
            block_number: new_block_number,
            seed_hex: new_seed.clone(),
            block_start: Instant::now(),
        }));

        tracing::info!(block_number = new_block_number, seed_hex = %new_seed, "new block opened");
        Ok(())
    }

    /// Runs the tick loop until `shutdown` fires. Recomputes the delay from
    /// `now` on every iteration so scheduling skew never compounds.
    pub async fn run(self: Arc<Self>, mut shutdown: tokio::sync::watch::Receiver<bool>) {
        loop {
            let delay = Duration::from_millis(self.ms_left().max(1));
            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    self.tick();
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("block engine shutting down");
                        return;
                    }
                }
            }
        }
    }
}
