// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet connection provider used by the wallet login path.

use std::time::Duration;

use async_trait::async_trait;
use rand::RngCore;
use sha2::{Digest, Sha256};
use tokio::sync::{watch, Mutex};
use tracing::info;

use crate::models::WalletAddress;

/// Connection state published by a provider.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected(WalletAddress),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WalletError {
    #[error("Wallet connection was rejected")]
    Rejected,

    #[error("No wallet is connected")]
    NotConnected,

    #[error("Wallet provider error: {0}")]
    Provider(String),
}

#[async_trait]
pub trait WalletProvider: Send + Sync {
    async fn connect(&self) -> Result<WalletAddress, WalletError>;

    async fn disconnect(&self);

    /// Sign `challenge` with the connected account.
    async fn sign_challenge(&self, challenge: &str) -> Result<String, WalletError>;

    /// Connection state changes, including disconnects initiated by the wallet.
    fn subscribe(&self) -> watch::Receiver<ConnectionState>;
}

/// In-process wallet that connects after `connect_delay` with a random address.
pub struct SimulatedWallet {
    connect_delay: Duration,
    reject: bool,
    state: watch::Sender<ConnectionState>,
    account: Mutex<Option<WalletAddress>>,
}

impl SimulatedWallet {
    pub fn new(connect_delay: Duration) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            connect_delay,
            reject: false,
            state,
            account: Mutex::new(None),
        }
    }

    /// A wallet whose user declines every connection request.
    pub fn rejecting(connect_delay: Duration) -> Self {
        Self {
            reject: true,
            ..Self::new(connect_delay)
        }
    }

    /// Simulate the wallet dropping the connection on its own.
    pub async fn drop_connection(&self) {
        self.account.lock().await.take();
        self.state.send_replace(ConnectionState::Disconnected);
    }
}

#[async_trait]
impl WalletProvider for SimulatedWallet {
    async fn connect(&self) -> Result<WalletAddress, WalletError> {
        self.state.send_replace(ConnectionState::Connecting);
        tokio::time::sleep(self.connect_delay).await;

        if self.reject {
            self.state.send_replace(ConnectionState::Disconnected);
            return Err(WalletError::Rejected);
        }

        let mut bytes = [0u8; 20];
        rand::rng().fill_bytes(&mut bytes);
        let address = WalletAddress::from_bytes(&bytes);

        *self.account.lock().await = Some(address.clone());
        self.state
            .send_replace(ConnectionState::Connected(address.clone()));
        info!(address = %address, "Wallet connected");
        Ok(address)
    }

    async fn disconnect(&self) {
        self.drop_connection().await;
    }

    async fn sign_challenge(&self, challenge: &str) -> Result<String, WalletError> {
        let account = self.account.lock().await;
        let address = account.as_ref().ok_or(WalletError::NotConnected)?;

        let mut hasher = Sha256::new();
        hasher.update(address.0.as_bytes());
        hasher.update(b"|");
        hasher.update(challenge.as_bytes());
        Ok(format!("0x{}", hex::encode(hasher.finalize())))
    }

    fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }
}
