// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Login
//!
//! Two independent ways to sign in:
//!
//! - **Credentials**: email and password, then a one-time code sent by email.
//! - **Wallet**: connect a wallet, prove control by signing a challenge, then
//!   bind it to a freshly deployed identity contract.
//!
//! Either path ends in a [`Session`] handed to the [`SessionHandler`]. The
//! handler runs at most once per flow lifetime; [`LoginFlow::reset`] starts a
//! new one.

use std::sync::Arc;

use async_trait::async_trait;
use rand::RngCore;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::client::{ClientError, HttpAccountClient};
use crate::config::ClientConfig;
use crate::contract::{
    ContractDeployer, ContractStatus, DeployError, DeployedIdentity, DeploymentRequest,
    SimulatedDeployer,
};
use crate::models::{UserResponse, VerifyOtpResponse, WalletAddress};
use crate::validation::{validate, Field, ValidationError};
use crate::wallet::{ConnectionState, WalletError, WalletProvider};

/// Account service calls used by the credential path.
#[async_trait]
pub trait LoginApi: Send + Sync {
    /// Check credentials; on success the service sends a login code.
    async fn request_login_code(&self, email: &str, password: &str) -> Result<(), ClientError>;

    async fn confirm_login_code(
        &self,
        email: &str,
        otp: &str,
    ) -> Result<VerifyOtpResponse, ClientError>;
}

/// Result of a completed login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
    Credentials {
        email: String,
        token: String,
        user: Option<UserResponse>,
    },
    Wallet {
        address: WalletAddress,
        identity: DeployedIdentity,
    },
}

/// Receives the session when a login completes.
pub trait SessionHandler: Send + Sync {
    fn on_session(&self, session: &Session);
}

impl<F> SessionHandler for F
where
    F: Fn(&Session) + Send + Sync,
{
    fn on_session(&self, session: &Session) {
        self(session)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum CredentialStep {
    #[default]
    EnterCredentials,
    AwaitingCode {
        email: String,
        password: String,
    },
    Complete,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum WalletStep {
    #[default]
    Disconnected,
    Connected(WalletAddress),
    Verified(WalletAddress),
    Deploying(WalletAddress),
    Complete,
}

impl WalletStep {
    fn address(&self) -> Option<&WalletAddress> {
        match self {
            WalletStep::Connected(address)
            | WalletStep::Verified(address)
            | WalletStep::Deploying(address) => Some(address),
            WalletStep::Disconnected | WalletStep::Complete => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LoginError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("{0}")]
    Rejected(String),

    #[error(transparent)]
    Wallet(#[from] WalletError),

    #[error(transparent)]
    Deploy(#[from] DeployError),

    #[error("Wallet disconnected")]
    Disconnected,

    /// The operation does not apply to the current step.
    #[error("Not available at this step")]
    OutOfOrder,

    #[error("Already signed in")]
    AlreadyComplete,
}

impl From<ClientError> for LoginError {
    fn from(err: ClientError) -> Self {
        LoginError::Rejected(err.to_string())
    }
}

/// Holds the wallet path at `Deploying` while a deployment runs. If the
/// deployment future is dropped before it resolves, the path goes back to
/// `Verified` and the deployment is cancelled.
struct DeployingGuard<'a> {
    step: &'a mut WalletStep,
    status: &'a mut ContractStatus,
    cancel: CancellationToken,
    armed: Option<WalletAddress>,
}

impl<'a> DeployingGuard<'a> {
    fn arm(
        step: &'a mut WalletStep,
        status: &'a mut ContractStatus,
        address: WalletAddress,
        cancel: CancellationToken,
    ) -> Self {
        *step = WalletStep::Deploying(address.clone());
        *status = ContractStatus::Idle;
        Self {
            step,
            status,
            cancel,
            armed: Some(address),
        }
    }

    fn disarm(mut self) {
        self.armed = None;
    }
}

impl Drop for DeployingGuard<'_> {
    fn drop(&mut self) {
        if let Some(address) = self.armed.take() {
            debug!(address = %address, "Deployment abandoned");
            self.cancel.cancel();
            *self.step = WalletStep::Verified(address);
            *self.status = ContractStatus::Idle;
        }
    }
}

pub struct LoginFlow {
    api: Arc<dyn LoginApi>,
    wallet: Arc<dyn WalletProvider>,
    deployer: Arc<dyn ContractDeployer>,
    on_session: Arc<dyn SessionHandler>,
    wallet_states: watch::Receiver<ConnectionState>,
    credentials: CredentialStep,
    wallet_step: WalletStep,
    contract_status: ContractStatus,
    error: Option<String>,
    session: Option<Session>,
}

impl LoginFlow {
    pub fn new(
        api: Arc<dyn LoginApi>,
        wallet: Arc<dyn WalletProvider>,
        deployer: Arc<dyn ContractDeployer>,
        on_session: Arc<dyn SessionHandler>,
    ) -> Self {
        let wallet_states = wallet.subscribe();
        Self {
            api,
            wallet,
            deployer,
            on_session,
            wallet_states,
            credentials: CredentialStep::default(),
            wallet_step: WalletStep::default(),
            contract_status: ContractStatus::default(),
            error: None,
            session: None,
        }
    }

    /// Flow against the account service at `config.api_url`. The wallet is
    /// supplied by the embedding application.
    pub fn from_config(
        config: &ClientConfig,
        wallet: Arc<dyn WalletProvider>,
        on_session: Arc<dyn SessionHandler>,
    ) -> Result<Self, ClientError> {
        Ok(Self::new(
            Arc::new(HttpAccountClient::new(config)?),
            wallet,
            Arc::new(SimulatedDeployer::new(config.deploy_stage)),
            on_session,
        ))
    }

    pub fn credential_step(&self) -> &CredentialStep {
        &self.credentials
    }

    pub fn wallet_step(&self) -> &WalletStep {
        &self.wallet_step
    }

    pub fn contract_status(&self) -> ContractStatus {
        self.contract_status
    }

    /// Message from the last failed operation, cleared by the next success.
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn is_complete(&self) -> bool {
        self.session.is_some()
    }

    /// Start a new lifetime: both paths return to their first step.
    pub fn reset(&mut self) {
        self.credentials = CredentialStep::default();
        self.wallet_step = WalletStep::default();
        self.contract_status = ContractStatus::default();
        self.error = None;
        self.session = None;
        self.wallet_states.mark_unchanged();
    }

    // -------------------------------------------------------------------------
    // Credential path
    // -------------------------------------------------------------------------

    pub async fn submit_credentials(
        &mut self,
        email: &str,
        password: &str,
    ) -> Result<(), LoginError> {
        self.ensure_open()?;
        if self.credentials != CredentialStep::EnterCredentials {
            return Err(LoginError::OutOfOrder);
        }

        let email = email.trim();
        let checked = validate(Field::Email, email).and_then(|()| {
            if password.is_empty() {
                Err(ValidationError::Required(Field::Password))
            } else {
                Ok(())
            }
        });
        if let Err(err) = checked {
            return Err(self.fail(err.into()));
        }

        let requested = self.api.request_login_code(email, password).await;
        match requested {
            Ok(()) => {
                debug!(email = %email, "Login code requested");
                self.error = None;
                self.credentials = CredentialStep::AwaitingCode {
                    email: email.to_string(),
                    password: password.to_string(),
                };
                Ok(())
            }
            Err(err) => Err(self.fail(err.into())),
        }
    }

    /// Ask for another code using the retained credentials.
    pub async fn resend_code(&mut self) -> Result<(), LoginError> {
        self.ensure_open()?;
        let CredentialStep::AwaitingCode { email, password } = &self.credentials else {
            return Err(LoginError::OutOfOrder);
        };

        let requested = self.api.request_login_code(email, password).await;
        match requested {
            Ok(()) => {
                self.error = None;
                Ok(())
            }
            Err(err) => Err(self.fail(err.into())),
        }
    }

    /// Verify the emailed code. A failure keeps the flow waiting for a code.
    pub async fn submit_code(&mut self, code: &str) -> Result<(), LoginError> {
        self.ensure_open()?;
        let CredentialStep::AwaitingCode { email, .. } = &self.credentials else {
            return Err(LoginError::OutOfOrder);
        };
        let email = email.clone();

        let confirmed = self.api.confirm_login_code(&email, code.trim()).await;
        let response = match confirmed {
            Ok(response) => response,
            Err(err) => return Err(self.fail(err.into())),
        };
        let Some(token) = response.token else {
            return Err(self.fail(LoginError::Rejected(
                "Verification did not return a session".to_string(),
            )));
        };

        self.credentials = CredentialStep::Complete;
        self.complete(Session::Credentials {
            email,
            token,
            user: response.user,
        });
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Wallet path
    // -------------------------------------------------------------------------

    pub async fn connect_wallet(&mut self) -> Result<WalletAddress, LoginError> {
        self.ensure_open()?;
        self.observe_wallet();
        if self.wallet_step != WalletStep::Disconnected {
            return Err(LoginError::OutOfOrder);
        }

        let connected = self.wallet.connect().await;
        match connected {
            Ok(address) => {
                self.wallet_states.mark_unchanged();
                self.error = None;
                self.wallet_step = WalletStep::Connected(address.clone());
                Ok(address)
            }
            Err(err) => Err(self.fail(err.into())),
        }
    }

    /// Have the wallet sign a fresh challenge.
    pub async fn verify_wallet(&mut self) -> Result<(), LoginError> {
        self.ensure_open()?;
        self.observe_wallet();
        let WalletStep::Connected(address) = &self.wallet_step else {
            return Err(self.fail(self.wallet_step_error()));
        };
        let address = address.clone();

        let mut nonce = [0u8; 16];
        rand::rng().fill_bytes(&mut nonce);
        let challenge = format!(
            "Sign in to WelliRecord\naddress: {address}\nnonce: {}",
            hex::encode(nonce)
        );

        let signed = self.wallet.sign_challenge(&challenge).await;
        match signed {
            Ok(signature) if signature.starts_with("0x") && signature.len() > 2 => {
                debug!(address = %address, "Wallet challenge signed");
                self.error = None;
                self.wallet_step = WalletStep::Verified(address);
                Ok(())
            }
            Ok(_) => Err(self.fail(LoginError::Wallet(WalletError::Provider(
                "malformed signature".to_string(),
            )))),
            Err(err) => {
                self.observe_wallet();
                Err(self.fail(err.into()))
            }
        }
    }

    /// Deploy the identity contract for the verified wallet.
    ///
    /// A disconnect while the deployment runs cancels it and returns the
    /// path to [`WalletStep::Disconnected`].
    pub async fn deploy_identity(&mut self) -> Result<DeployedIdentity, LoginError> {
        self.ensure_open()?;
        self.observe_wallet();
        let WalletStep::Verified(address) = &self.wallet_step else {
            return Err(self.fail(self.wallet_step_error()));
        };
        let address = address.clone();

        let deployer = Arc::clone(&self.deployer);
        let (progress, mut updates) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let mut guard = DeployingGuard::arm(
            &mut self.wallet_step,
            &mut self.contract_status,
            address.clone(),
            cancel.clone(),
        );
        let deployment = deployer.deploy(
            DeploymentRequest::Wallet {
                address: address.clone(),
            },
            progress,
            cancel.clone(),
        );
        tokio::pin!(deployment);

        let mut states = self.wallet_states.clone();
        let outcome = loop {
            tokio::select! {
                result = &mut deployment => break Some(result),
                Some(status) = updates.recv() => {
                    debug!(status = ?status, "Deployment progress");
                    *guard.status = status;
                }
                changed = states.changed() => {
                    let gone = changed.is_err()
                        || *states.borrow_and_update() == ConnectionState::Disconnected;
                    if gone {
                        cancel.cancel();
                        break None;
                    }
                }
            }
        };
        while let Ok(status) = updates.try_recv() {
            *guard.status = status;
        }
        guard.disarm();

        match outcome {
            None => {
                warn!(address = %address, "Wallet disconnected during deployment");
                self.disconnected();
                Err(self.fail(LoginError::Disconnected))
            }
            Some(Err(err)) => {
                warn!(address = %address, error = %err, "Identity deployment failed");
                self.wallet_step = WalletStep::Verified(address);
                self.contract_status = ContractStatus::Idle;
                Err(self.fail(err.into()))
            }
            Some(Ok(identity)) => {
                self.wallet_step = WalletStep::Complete;
                self.complete(Session::Wallet {
                    address,
                    identity: identity.clone(),
                });
                Ok(identity)
            }
        }
    }

    /// Disconnect the wallet on request of the user.
    pub async fn disconnect_wallet(&mut self) {
        self.wallet.disconnect().await;
        self.observe_wallet();
    }

    /// Apply connection changes published by the wallet since the last look.
    pub fn observe_wallet(&mut self) {
        let state = self.wallet_states.borrow_and_update().clone();
        if state == ConnectionState::Disconnected && self.wallet_step.address().is_some() {
            self.disconnected();
        }
    }

    fn disconnected(&mut self) {
        info!("Wallet login returned to disconnected");
        self.wallet_step = WalletStep::Disconnected;
        self.contract_status = ContractStatus::Idle;
    }

    fn wallet_step_error(&self) -> LoginError {
        match self.wallet_step {
            WalletStep::Disconnected => LoginError::Disconnected,
            _ => LoginError::OutOfOrder,
        }
    }

    // -------------------------------------------------------------------------
    // Shared
    // -------------------------------------------------------------------------

    fn ensure_open(&self) -> Result<(), LoginError> {
        if self.session.is_some() {
            return Err(LoginError::AlreadyComplete);
        }
        Ok(())
    }

    fn fail(&mut self, err: LoginError) -> LoginError {
        self.error = Some(err.to_string());
        err
    }

    fn complete(&mut self, session: Session) {
        if self.session.is_some() {
            return;
        }
        info!(
            kind = match &session {
                Session::Credentials { .. } => "credentials",
                Session::Wallet { .. } => "wallet",
            },
            "Login complete"
        );
        self.error = None;
        self.on_session.on_session(&session);
        self.session = Some(session);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_api_url;
    use crate::wallet::SimulatedWallet;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Accepts `jane@x.com` / `longenough1` and the code `123456`.
    #[derive(Default)]
    struct ScriptedApi {
        requests: Mutex<u32>,
    }

    #[async_trait]
    impl LoginApi for ScriptedApi {
        async fn request_login_code(&self, email: &str, password: &str) -> Result<(), ClientError> {
            *self.requests.lock().unwrap() += 1;
            if email == "jane@x.com" && password == "longenough1" {
                Ok(())
            } else {
                Err(ClientError::Rejected {
                    status: 401,
                    message: "Invalid email or password".to_string(),
                })
            }
        }

        async fn confirm_login_code(
            &self,
            email: &str,
            otp: &str,
        ) -> Result<VerifyOtpResponse, ClientError> {
            if otp != "123456" {
                return Err(ClientError::Rejected {
                    status: 401,
                    message: "Invalid or expired code".to_string(),
                });
            }
            Ok(VerifyOtpResponse {
                verified: true,
                token: Some(format!("token-for-{email}")),
                user: None,
            })
        }
    }

    struct Harness {
        flow: LoginFlow,
        api: Arc<ScriptedApi>,
        wallet: Arc<SimulatedWallet>,
        sessions: Arc<Mutex<Vec<Session>>>,
    }

    fn harness_with(deployer: SimulatedDeployer) -> Harness {
        let api = Arc::new(ScriptedApi::default());
        let wallet = Arc::new(SimulatedWallet::new(Duration::from_millis(100)));
        let sessions = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&sessions);
        let flow = LoginFlow::new(
            api.clone(),
            wallet.clone(),
            Arc::new(deployer),
            Arc::new(move |session: &Session| recorded.lock().unwrap().push(session.clone())),
        );
        Harness {
            flow,
            api,
            wallet,
            sessions,
        }
    }

    fn harness() -> Harness {
        harness_with(SimulatedDeployer::new(Duration::from_millis(1500)))
    }

    #[tokio::test]
    async fn credentials_then_code_completes_once() {
        let mut h = harness();
        h.flow.submit_credentials("jane@x.com", "longenough1").await.unwrap();
        assert_eq!(
            h.flow.credential_step(),
            &CredentialStep::AwaitingCode {
                email: "jane@x.com".to_string(),
                password: "longenough1".to_string(),
            }
        );

        h.flow.submit_code("123456").await.unwrap();
        assert_eq!(h.flow.credential_step(), &CredentialStep::Complete);
        assert_eq!(
            h.flow.submit_code("123456").await,
            Err(LoginError::AlreadyComplete)
        );

        let sessions = h.sessions.lock().unwrap();
        assert_eq!(sessions.len(), 1);
        assert!(matches!(
            &sessions[0],
            Session::Credentials { email, token, .. }
                if email == "jane@x.com" && token == "token-for-jane@x.com"
        ));
    }

    #[tokio::test]
    async fn malformed_credentials_never_reach_the_service() {
        let mut h = harness();
        assert_eq!(
            h.flow.submit_credentials("", "longenough1").await,
            Err(LoginError::Invalid(ValidationError::Required(Field::Email)))
        );
        assert_eq!(
            h.flow.submit_credentials("jane@x", "longenough1").await,
            Err(LoginError::Invalid(ValidationError::InvalidEmail))
        );
        assert_eq!(
            h.flow.submit_credentials("jane@x.com", "").await,
            Err(LoginError::Invalid(ValidationError::Required(Field::Password)))
        );
        assert_eq!(*h.api.requests.lock().unwrap(), 0);
        assert_eq!(h.flow.credential_step(), &CredentialStep::EnterCredentials);
    }

    #[tokio::test]
    async fn rejected_credentials_stay_on_entry() {
        let mut h = harness();
        let err = h
            .flow
            .submit_credentials("jane@x.com", "wrong-password")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Invalid email or password");
        assert_eq!(h.flow.error_message(), Some("Invalid email or password"));
        assert_eq!(h.flow.credential_step(), &CredentialStep::EnterCredentials);
    }

    #[tokio::test]
    async fn wrong_code_keeps_credentials_for_retry() {
        let mut h = harness();
        h.flow.submit_credentials("jane@x.com", "longenough1").await.unwrap();

        assert!(h.flow.submit_code("000000").await.is_err());
        assert_eq!(h.flow.error_message(), Some("Invalid or expired code"));
        assert_eq!(
            h.flow.credential_step(),
            &CredentialStep::AwaitingCode {
                email: "jane@x.com".to_string(),
                password: "longenough1".to_string(),
            }
        );

        h.flow.resend_code().await.unwrap();
        assert_eq!(*h.api.requests.lock().unwrap(), 2);
        h.flow.submit_code("123456").await.unwrap();
        assert!(h.flow.is_complete());
    }

    #[tokio::test]
    async fn code_before_credentials_is_out_of_order() {
        let mut h = harness();
        assert_eq!(h.flow.submit_code("123456").await, Err(LoginError::OutOfOrder));
        assert_eq!(h.flow.resend_code().await, Err(LoginError::OutOfOrder));
    }

    #[tokio::test(start_paused = true)]
    async fn wallet_path_completes_with_identity() {
        let mut h = harness();
        let address = h.flow.connect_wallet().await.unwrap();
        assert_eq!(h.flow.wallet_step(), &WalletStep::Connected(address.clone()));

        h.flow.verify_wallet().await.unwrap();
        assert_eq!(h.flow.wallet_step(), &WalletStep::Verified(address.clone()));

        let identity = h.flow.deploy_identity().await.unwrap();
        assert_eq!(h.flow.wallet_step(), &WalletStep::Complete);
        assert_eq!(h.flow.contract_status(), ContractStatus::Done);
        assert!(identity.did.starts_with("did:welli:0x"));

        let sessions = h.sessions.lock().unwrap();
        assert_eq!(
            sessions.as_slice(),
            &[Session::Wallet { address, identity }]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn rejected_connection_stays_disconnected() {
        let sessions = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&sessions);
        let mut flow = LoginFlow::new(
            Arc::new(ScriptedApi::default()),
            Arc::new(SimulatedWallet::rejecting(Duration::from_millis(100))),
            Arc::new(SimulatedDeployer::new(Duration::from_millis(10))),
            Arc::new(move |session: &Session| recorded.lock().unwrap().push(session.clone())),
        );

        assert_eq!(
            flow.connect_wallet().await,
            Err(LoginError::Wallet(WalletError::Rejected))
        );
        assert_eq!(flow.wallet_step(), &WalletStep::Disconnected);
        assert_eq!(flow.error_message(), Some("Wallet connection was rejected"));
        assert!(sessions.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn configured_flow_completes_wallet_login() {
        let mut config = ClientConfig::new(parse_api_url("http://127.0.0.1:9").unwrap());
        config.deploy_stage = Duration::from_millis(20);
        let sessions = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&sessions);
        let mut flow = LoginFlow::from_config(
            &config,
            Arc::new(SimulatedWallet::new(Duration::from_millis(10))),
            Arc::new(move |session: &Session| recorded.lock().unwrap().push(session.clone())),
        )
        .unwrap();

        flow.connect_wallet().await.unwrap();
        flow.verify_wallet().await.unwrap();
        flow.deploy_identity().await.unwrap();
        assert_eq!(sessions.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deploy_requires_verification() {
        let mut h = harness();
        assert_eq!(h.flow.deploy_identity().await, Err(LoginError::Disconnected));
        h.flow.connect_wallet().await.unwrap();
        assert_eq!(h.flow.deploy_identity().await, Err(LoginError::OutOfOrder));
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_returns_to_disconnected() {
        let mut h = harness();
        h.flow.connect_wallet().await.unwrap();
        h.wallet.drop_connection().await;

        assert_eq!(h.flow.verify_wallet().await, Err(LoginError::Disconnected));
        assert_eq!(h.flow.wallet_step(), &WalletStep::Disconnected);

        h.flow.connect_wallet().await.unwrap();
        h.flow.disconnect_wallet().await;
        assert_eq!(h.flow.wallet_step(), &WalletStep::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_during_deployment_cancels_it() {
        let mut h = harness();
        h.flow.connect_wallet().await.unwrap();
        h.flow.verify_wallet().await.unwrap();

        let wallet = Arc::clone(&h.wallet);
        let (result, ()) = tokio::join!(h.flow.deploy_identity(), async move {
            tokio::time::sleep(Duration::from_millis(2000)).await;
            wallet.drop_connection().await;
        });

        assert_eq!(result, Err(LoginError::Disconnected));
        assert_eq!(h.flow.wallet_step(), &WalletStep::Disconnected);
        assert_eq!(h.flow.contract_status(), ContractStatus::Idle);
        assert!(h.sessions.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_deployment_returns_to_verified() {
        let mut h = harness();
        let address = h.flow.connect_wallet().await.unwrap();
        h.flow.verify_wallet().await.unwrap();

        let abandoned =
            tokio::time::timeout(Duration::from_millis(2000), h.flow.deploy_identity()).await;
        assert!(abandoned.is_err());
        assert_eq!(h.flow.wallet_step(), &WalletStep::Verified(address));
        assert_eq!(h.flow.contract_status(), ContractStatus::Idle);

        h.flow.deploy_identity().await.unwrap();
        assert_eq!(h.flow.wallet_step(), &WalletStep::Complete);
        assert_eq!(h.sessions.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_deployment_can_be_retried() {
        let mut h = harness_with(
            SimulatedDeployer::new(Duration::from_millis(10)).failing_at(ContractStatus::Minting),
        );
        let address = h.flow.connect_wallet().await.unwrap();
        h.flow.verify_wallet().await.unwrap();

        let err = h.flow.deploy_identity().await.unwrap_err();
        assert!(matches!(err, LoginError::Deploy(DeployError::Failed(_))));
        assert_eq!(h.flow.wallet_step(), &WalletStep::Verified(address));
        assert!(h.sessions.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn reset_starts_a_new_lifetime() {
        let mut h = harness();
        h.flow.submit_credentials("jane@x.com", "longenough1").await.unwrap();
        h.flow.submit_code("123456").await.unwrap();
        assert_eq!(
            h.flow.connect_wallet().await,
            Err(LoginError::AlreadyComplete)
        );

        h.flow.reset();
        assert!(!h.flow.is_complete());
        assert_eq!(h.flow.credential_step(), &CredentialStep::EnterCredentials);

        h.flow.submit_credentials("jane@x.com", "longenough1").await.unwrap();
        h.flow.submit_code("123456").await.unwrap();
        assert_eq!(h.sessions.lock().unwrap().len(), 2);
    }
}
