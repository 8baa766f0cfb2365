//! Application state shared across API handlers

use std::sync::Arc;
use std::time::Instant;

use ledger_gateway::{AssetGateway, LedgerGateway};
use multipool::{Snapshot, StakingEngine};
use staking_core::{Address, AddressError, AppConfig, Network};
use tokio::sync::RwLock;

/// A gateway serving both the staking ledger and the asset contract
pub trait Backend: LedgerGateway + AssetGateway {}

impl<T: LedgerGateway + AssetGateway> Backend for T {}

/// State representing a connected wallet
#[derive(Clone, Debug)]
pub struct WalletState {
    pub address: Address,
    /// When the wallet was connected
    pub connected_at: Instant,
}

impl WalletState {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            connected_at: Instant::now(),
        }
    }
}

/// Shared application state
pub struct AppState<B> {
    inner: Arc<AppStateInner<B>>,
}

impl<B> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct AppStateInner<B> {
    config: AppConfig,
    engine: StakingEngine<B, B>,
    wallet: RwLock<Option<WalletState>>,
}

impl<B: Backend> AppState<B> {
    /// Create state over one backend serving both gateways
    pub fn new(config: AppConfig, backend: Arc<B>) -> Self {
        let engine = StakingEngine::new(Arc::clone(&backend), backend, &config.staking);
        Self {
            inner: Arc::new(AppStateInner {
                config,
                engine,
                wallet: RwLock::new(None),
            }),
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub fn network(&self) -> Network {
        self.inner.config.network
    }

    pub fn engine(&self) -> &StakingEngine<B, B> {
        &self.inner.engine
    }

    /// Get current wallet state
    pub async fn wallet(&self) -> Option<WalletState> {
        self.inner.wallet.read().await.clone()
    }

    /// Validate and connect a wallet, then build its first snapshot.
    ///
    /// # Errors
    /// Returns `AddressError` if the address is not a 0x-prefixed 20-byte hex string.
    pub async fn set_wallet(&self, address: &str) -> Result<Arc<Snapshot>, AddressError> {
        let address = Address::parse(address)?;
        {
            let mut wallet = self.inner.wallet.write().await;
            *wallet = Some(WalletState::new(address.clone()));
        }
        Ok(self.inner.engine.connect(address).await)
    }

    /// Disconnect wallet (clear wallet state and the engine's snapshot)
    pub async fn disconnect_wallet(&self) {
        let mut wallet = self.inner.wallet.write().await;
        *wallet = None;
        self.inner.engine.disconnect().await;
    }
}
