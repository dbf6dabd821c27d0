// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Identity Contract Deployment
//!
//! The self-sovereign signup path and the wallet login path both end by
//! "deploying" an identity contract. Deployment is a staged process reported
//! through [`ContractStatus`]; the stage runner sits behind the
//! [`ContractDeployer`] trait so a real chain client can replace the
//! timer-driven [`SimulatedDeployer`] without touching the state machines.
//!
//! ## Cancellation
//!
//! Runs take a `tokio_util::sync::CancellationToken`. Closing the wizard
//! cancels the token and the runner returns [`DeployError::Cancelled`]
//! before reporting any further progress.

use std::time::Duration;

use async_trait::async_trait;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::models::WalletAddress;

/// Progress of an identity contract deployment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContractStatus {
    #[default]
    Idle,
    Compiling,
    Deploying,
    Minting,
    Done,
}

impl ContractStatus {
    /// Stages a deployment walks through after leaving `Idle`.
    pub const STAGES: [ContractStatus; 4] = [
        ContractStatus::Compiling,
        ContractStatus::Deploying,
        ContractStatus::Minting,
        ContractStatus::Done,
    ];
}

/// What is being bound into the identity contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeploymentRequest {
    /// Signup: bind a display name to a national identification number.
    Identity { name: String, nin: String },
    /// Login: bind an already connected wallet.
    Wallet { address: WalletAddress },
}

impl DeploymentRequest {
    fn seed(&self) -> Vec<u8> {
        match self {
            DeploymentRequest::Identity { name, nin } => {
                format!("identity|{}|{}", name.trim(), nin).into_bytes()
            }
            DeploymentRequest::Wallet { address } => format!("wallet|{address}").into_bytes(),
        }
    }
}

/// Credentials produced by a finished deployment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeployedIdentity {
    pub contract_address: WalletAddress,
    pub did: String,
    pub transaction_hash: String,
}

impl DeployedIdentity {
    /// Derive the identity for `request`. The nonce keeps repeated
    /// deployments of the same data at distinct addresses.
    pub fn derive(request: &DeploymentRequest, nonce: &[u8; 16], transaction: &[u8; 32]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(request.seed());
        hasher.update(b"|");
        hasher.update(nonce);
        let digest = hasher.finalize();

        let mut address = [0u8; 20];
        address.copy_from_slice(&digest[..20]);
        let contract_address = WalletAddress::from_bytes(&address);

        Self {
            did: format!("did:welli:{contract_address}"),
            contract_address,
            transaction_hash: format!("0x{}", hex::encode(transaction)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeployError {
    #[error("Deployment was cancelled")]
    Cancelled,

    #[error("Deployment failed: {0}")]
    Failed(String),
}

/// Runs an identity deployment, reporting each stage on `progress`.
#[async_trait]
pub trait ContractDeployer: Send + Sync {
    async fn deploy(
        &self,
        request: DeploymentRequest,
        progress: mpsc::UnboundedSender<ContractStatus>,
        cancel: CancellationToken,
    ) -> Result<DeployedIdentity, DeployError>;
}

/// Timer-driven deployment: every stage takes `stage_delay`.
#[derive(Debug, Clone)]
pub struct SimulatedDeployer {
    stage_delay: Duration,
    fail_at: Option<ContractStatus>,
}

impl SimulatedDeployer {
    pub fn new(stage_delay: Duration) -> Self {
        Self {
            stage_delay,
            fail_at: None,
        }
    }

    /// Make the run fail when it reaches `stage`.
    pub fn failing_at(mut self, stage: ContractStatus) -> Self {
        self.fail_at = Some(stage);
        self
    }
}

#[async_trait]
impl ContractDeployer for SimulatedDeployer {
    async fn deploy(
        &self,
        request: DeploymentRequest,
        progress: mpsc::UnboundedSender<ContractStatus>,
        cancel: CancellationToken,
    ) -> Result<DeployedIdentity, DeployError> {
        for stage in ContractStatus::STAGES {
            if stage != ContractStatus::Done {
                tokio::select! {
                    _ = tokio::time::sleep(self.stage_delay) => {},
                    _ = cancel.cancelled() => {
                        debug!(stage = ?stage, "Deployment cancelled");
                        return Err(DeployError::Cancelled);
                    }
                }
            }
            if cancel.is_cancelled() {
                return Err(DeployError::Cancelled);
            }
            if self.fail_at == Some(stage) {
                return Err(DeployError::Failed(format!("stage {stage:?} rejected")));
            }
            // The receiver may already be gone; the result still matters.
            let _ = progress.send(stage);
        }

        let mut nonce = [0u8; 16];
        let mut transaction = [0u8; 32];
        rand::rng().fill_bytes(&mut nonce);
        rand::rng().fill_bytes(&mut transaction);
        let identity = DeployedIdentity::derive(&request, &nonce, &transaction);

        info!(contract = %identity.contract_address, "Identity contract deployed");
        Ok(identity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_request() -> DeploymentRequest {
        DeploymentRequest::Identity {
            name: "Jane Doe".to_string(),
            nin: "12345678901".to_string(),
        }
    }

    #[test]
    fn derived_identity_is_deterministic_per_nonce() {
        let a = DeployedIdentity::derive(&identity_request(), &[1; 16], &[2; 32]);
        let b = DeployedIdentity::derive(&identity_request(), &[1; 16], &[2; 32]);
        let c = DeployedIdentity::derive(&identity_request(), &[3; 16], &[2; 32]);
        assert_eq!(a, b);
        assert_ne!(a.contract_address, c.contract_address);
        assert!(a.contract_address.is_well_formed());
        assert_eq!(a.did, format!("did:welli:{}", a.contract_address));
        assert_eq!(a.transaction_hash.len(), 66);
    }

    #[tokio::test(start_paused = true)]
    async fn simulated_run_reports_every_stage_in_order() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let deployer = SimulatedDeployer::new(Duration::from_millis(1500));

        let identity = deployer
            .deploy(identity_request(), tx, CancellationToken::new())
            .await
            .expect("deployment succeeds");

        let mut seen = Vec::new();
        while let Ok(stage) = rx.try_recv() {
            seen.push(stage);
        }
        assert_eq!(seen, ContractStatus::STAGES.to_vec());
        assert!(identity.contract_address.is_well_formed());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_run_stops_reporting() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let deployer = SimulatedDeployer::new(Duration::from_secs(10));

        let handle = tokio::spawn({
            let cancel = cancel.clone();
            async move { deployer.deploy(identity_request(), tx, cancel).await }
        });
        tokio::time::sleep(Duration::from_secs(15)).await;
        cancel.cancel();

        let result = handle.await.unwrap();
        assert_eq!(result, Err(DeployError::Cancelled));
        assert_eq!(rx.recv().await, Some(ContractStatus::Compiling));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn configured_failure_surfaces_as_error() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let deployer =
            SimulatedDeployer::new(Duration::from_millis(10)).failing_at(ContractStatus::Minting);
        let result = deployer
            .deploy(identity_request(), tx, CancellationToken::new())
            .await;
        assert!(matches!(result, Err(DeployError::Failed(_))));
    }
}
