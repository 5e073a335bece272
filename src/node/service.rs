//! Async access point to the ledger
//!
//! Every mutation (append, replace, admit) takes the one write lock on the
//! [`Ledger`]. Mining copies a template under the read lock, searches on a
//! blocking thread with no lock held, then appends like any other block.
//! Each successful chain change cancels searches started on the old tip.

use crate::core::{Block, BlockError, BlockchainError, ChainStats, Transaction, Utxo};
use crate::mining::{MempoolError, MempoolStats, MineOutcome, Miner, MiningStats};
use crate::node::hooks::ChainObserver;
use crate::node::ledger::Ledger;
use crate::wallet::WalletError;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;

/// Errors surfaced by the ledger service
#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Chain rejected: {0}")]
    Chain(#[from] BlockchainError),
    #[error("Transaction rejected: {0}")]
    Mempool(#[from] MempoolError),
    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),
    #[error("Mining cancelled after {attempts} attempts")]
    Cancelled { attempts: u64 },
    #[error("Mining task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

/// A block mined by this node together with its search statistics
#[derive(Debug, Clone, serde::Serialize)]
pub struct MinedBlock {
    pub block: Block,
    pub stats: MiningStats,
}

/// Cloneable handle to the node's ledger
#[derive(Clone)]
pub struct LedgerService {
    ledger: Arc<RwLock<Ledger>>,
    /// Parent of every in-flight mining token; replaced on each chain change
    epoch: Arc<Mutex<CancellationToken>>,
    observers: Arc<RwLock<Vec<Arc<dyn ChainObserver>>>>,
}

impl LedgerService {
    /// Service over a fresh ledger holding only genesis
    pub fn new() -> Self {
        Self::with_ledger(Ledger::new())
    }

    pub fn with_ledger(ledger: Ledger) -> Self {
        Self {
            ledger: Arc::new(RwLock::new(ledger)),
            epoch: Arc::new(Mutex::new(CancellationToken::new())),
            observers: Arc::new(RwLock::new(Vec::new())),
        }
    }

    /// Register a hook that is told about chain and mempool changes
    pub async fn add_observer(&self, observer: Arc<dyn ChainObserver>) {
        self.observers.write().await.push(observer);
    }

    /// Copy of the whole chain
    pub async fn get_chain(&self) -> Vec<Block> {
        self.ledger.read().await.blockchain().blocks().to_vec()
    }

    pub async fn get_block(&self, index: u64) -> Option<Block> {
        self.ledger.read().await.blockchain().get_block(index).cloned()
    }

    pub async fn stats(&self) -> ChainStats {
        self.ledger.read().await.blockchain().stats()
    }

    /// Copy of the current UTXO set
    pub async fn get_utxo_snapshot(&self) -> Vec<Utxo> {
        self.ledger.read().await.utxo_set().to_vec()
    }

    pub async fn get_balance(&self, address: &str) -> u64 {
        self.ledger.read().await.balance(address)
    }

    /// Copy of the pending transactions in arrival order
    pub async fn get_mempool_snapshot(&self) -> Vec<Transaction> {
        self.ledger.read().await.mempool().snapshot()
    }

    pub async fn mempool_stats(&self) -> MempoolStats {
        self.ledger.read().await.mempool().stats()
    }

    /// Append a block from a peer or from local mining
    pub async fn append_block(&self, block: Block) -> Result<(), NodeError> {
        let index = block.index;
        let chain = {
            let mut ledger = self.ledger.write().await;
            let pruned = ledger.append_block(block).map_err(|e| {
                log::warn!("Rejected block {}: {}", index, e);
                e
            })?;
            log::debug!("Block {} confirmed {} pooled transactions", index, pruned);
            self.start_new_epoch().await;
            ledger.blockchain().blocks().to_vec()
        };

        self.notify_chain_changed(&chain).await;
        Ok(())
    }

    /// Consider a competing chain; adopt it only if it carries more work
    pub async fn replace_chain(&self, candidate: Vec<Block>) -> Result<(), NodeError> {
        let chain = {
            let mut ledger = self.ledger.write().await;
            let pruned = ledger.replace_chain(candidate).map_err(|e| {
                log::warn!("Rejected candidate chain: {}", e);
                e
            })?;
            log::debug!("Chain replacement pruned {} pooled transactions", pruned);
            self.start_new_epoch().await;
            ledger.blockchain().blocks().to_vec()
        };

        self.notify_chain_changed(&chain).await;
        Ok(())
    }

    /// Mine one block paying `miner_address` and append it.
    ///
    /// Fails with [`NodeError::Cancelled`] when the chain changes while
    /// the search is running, or before the found block could be appended.
    pub async fn mine_block(&self, miner_address: &str) -> Result<MinedBlock, NodeError> {
        let (template, cancel) = {
            let ledger = self.ledger.read().await;
            let cancel = self.epoch.lock().await.child_token();
            (ledger.mining_template(), cancel)
        };

        let miner = Miner::new(miner_address);
        let outcome = tokio::task::spawn_blocking(move || {
            miner.mine_block_detached(
                &template.previous,
                template.difficulty,
                template.transactions,
                &cancel,
            )
        })
        .await?;

        match outcome {
            MineOutcome::Found { block, stats } => self.commit_mined(block, stats).await,
            MineOutcome::Cancelled { attempts } => Err(NodeError::Cancelled { attempts }),
        }
    }

    /// Append a locally mined block. A block whose parent is no longer the
    /// tip lost a race with a peer and counts as cancelled.
    async fn commit_mined(&self, block: Block, stats: MiningStats) -> Result<MinedBlock, NodeError> {
        match self.append_block(block.clone()).await {
            Ok(()) => Ok(MinedBlock { block, stats }),
            Err(NodeError::Chain(BlockchainError::InvalidBlock {
                source: BlockError::ChainLinkage(_),
                ..
            })) => Err(NodeError::Cancelled {
                attempts: stats.hash_attempts,
            }),
            Err(e) => Err(e),
        }
    }

    /// Abort every search currently running
    pub async fn cancel_mining(&self) {
        self.start_new_epoch().await;
    }

    /// Admit a transaction received from a peer
    pub async fn admit_transaction(&self, tx: Transaction) -> Result<(), NodeError> {
        self.ledger
            .write()
            .await
            .admit_transaction(tx.clone())
            .map_err(|e| {
                log::warn!("Rejected transaction {}: {}", tx.id, e);
                e
            })?;

        self.notify_transaction_admitted(&tx).await;
        Ok(())
    }

    /// Build, sign and pool a transfer of `amount` to `to`
    pub async fn build_and_admit_transaction(
        &self,
        to: &str,
        amount: u64,
        private_key: &str,
    ) -> Result<Transaction, NodeError> {
        let tx = {
            let mut ledger = self.ledger.write().await;
            let tx = ledger.build_transaction(to, amount, private_key)?;
            ledger.admit_transaction(tx.clone())?;
            tx
        };

        self.notify_transaction_admitted(&tx).await;
        Ok(tx)
    }

    async fn start_new_epoch(&self) {
        let mut epoch = self.epoch.lock().await;
        epoch.cancel();
        *epoch = CancellationToken::new();
    }

    async fn notify_chain_changed(&self, chain: &[Block]) {
        for observer in self.observers.read().await.iter() {
            observer.on_chain_changed(chain);
        }
    }

    async fn notify_transaction_admitted(&self, tx: &Transaction) {
        for observer in self.observers.read().await.iter() {
            observer.on_transaction_admitted(tx);
        }
    }
}

impl Default for LedgerService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::BLOCK_REWARD;
    use crate::wallet::Wallet;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingObserver {
        chains: AtomicUsize,
        txs: AtomicUsize,
    }

    impl ChainObserver for CountingObserver {
        fn on_chain_changed(&self, _chain: &[Block]) {
            self.chains.fetch_add(1, Ordering::SeqCst);
        }

        fn on_transaction_admitted(&self, _tx: &Transaction) {
            self.txs.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_mine_block_pays_miner() {
        let service = LedgerService::new();
        let miner = Wallet::new();

        let mined = service.mine_block(&miner.address()).await.unwrap();

        assert_eq!(mined.block.index, 1);
        assert_eq!(service.get_chain().await.len(), 2);
        assert_eq!(service.get_balance(&miner.address()).await, BLOCK_REWARD);
    }

    #[tokio::test]
    async fn test_observers_are_notified() {
        let service = LedgerService::new();
        let observer = Arc::new(CountingObserver::default());
        service.add_observer(observer.clone()).await;

        let alice = Wallet::new();
        service.mine_block(&alice.address()).await.unwrap();
        service
            .build_and_admit_transaction(&Wallet::new().address(), 5, &alice.private_key())
            .await
            .unwrap();

        assert_eq!(observer.chains.load(Ordering::SeqCst), 1);
        assert_eq!(observer.txs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_chain_change_cancels_mining() {
        let service = LedgerService::new();
        let in_flight = service.epoch.lock().await.child_token();

        let peer = LedgerService::new();
        peer.mine_block(&Wallet::new().address()).await.unwrap();
        service.replace_chain(peer.get_chain().await).await.unwrap();

        assert!(in_flight.is_cancelled());
        assert!(!service.epoch.lock().await.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancel_mining() {
        let service = LedgerService::new();
        let in_flight = service.epoch.lock().await.child_token();
        service.cancel_mining().await;
        assert!(in_flight.is_cancelled());
    }

    #[tokio::test]
    async fn test_stale_mined_block_counts_as_cancelled() {
        let service = LedgerService::new();
        let template = service.ledger.read().await.mining_template();

        // the tip moves before the search result is committed
        service.mine_block(&Wallet::new().address()).await.unwrap();

        let outcome = Miner::new(&Wallet::new().address()).mine_block_detached(
            &template.previous,
            template.difficulty,
            template.transactions,
            &CancellationToken::new(),
        );
        let MineOutcome::Found { block, stats } = outcome else {
            panic!("search was not cancelled");
        };

        let err = service.commit_mined(block, stats).await.unwrap_err();
        assert!(matches!(err, NodeError::Cancelled { .. }));
        assert_eq!(service.get_chain().await.len(), 2);
    }

    #[tokio::test]
    async fn test_rejected_chain_keeps_local() {
        let service = LedgerService::new();
        service.mine_block(&Wallet::new().address()).await.unwrap();
        service.mine_block(&Wallet::new().address()).await.unwrap();

        let peer = LedgerService::new();
        peer.mine_block(&Wallet::new().address()).await.unwrap();

        let err = service
            .replace_chain(peer.get_chain().await)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            NodeError::Chain(BlockchainError::NotHeavier { .. })
        ));
        assert_eq!(service.get_chain().await.len(), 3);
    }

    #[tokio::test]
    async fn test_peer_block_goes_through_validation() {
        let service = LedgerService::new();
        let peer = LedgerService::new();
        let mined = peer.mine_block(&Wallet::new().address()).await.unwrap();

        let mut forged = mined.block.clone();
        forged.data[0].tx_outs[0].amount = 1_000;
        assert!(service.append_block(forged).await.is_err());

        service.append_block(mined.block).await.unwrap();
        assert_eq!(service.get_chain().await, peer.get_chain().await);
    }
}
