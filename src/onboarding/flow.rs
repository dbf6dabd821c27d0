// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Async driver for the signup wizard.
//!
//! [`SignupFlow::dispatch`] feeds an event to the wizard, runs the returned
//! actions against the collaborators and feeds their results back until the
//! wizard has nothing left to do. Identity deployments run on a spawned task;
//! call [`SignupFlow::pump_deployment`] from the UI loop to apply progress.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::client::{ClientError, HttpAccountClient};
use crate::config::ClientConfig;
use crate::contract::{
    ContractDeployer, ContractStatus, DeployError, DeployedIdentity, DeploymentRequest,
    SimulatedDeployer,
};
use crate::onboarding::wizard::{CollaboratorResult, SignupWizard, WizardAction, WizardEvent};
use crate::onboarding::{AccountRegistrar, CodeVerifier, CompletionHandler};
use crate::session::{FileStatusStore, InitialScreen, OnboardingStatus, StatusStore};

struct DeploymentTask {
    generation: u64,
    cancel: CancellationToken,
    progress: mpsc::UnboundedReceiver<ContractStatus>,
    handle: JoinHandle<Result<DeployedIdentity, DeployError>>,
}

pub struct SignupFlow {
    wizard: SignupWizard,
    registrar: Arc<dyn AccountRegistrar>,
    verifier: Arc<dyn CodeVerifier>,
    deployer: Arc<dyn ContractDeployer>,
    status_store: Arc<dyn StatusStore>,
    on_complete: Arc<dyn CompletionHandler>,
    deployment: Option<DeploymentTask>,
}

impl SignupFlow {
    pub fn new(
        registrar: Arc<dyn AccountRegistrar>,
        verifier: Arc<dyn CodeVerifier>,
        deployer: Arc<dyn ContractDeployer>,
        status_store: Arc<dyn StatusStore>,
        on_complete: Arc<dyn CompletionHandler>,
    ) -> Self {
        Self {
            wizard: SignupWizard::new(),
            registrar,
            verifier,
            deployer,
            status_store,
            on_complete,
            deployment: None,
        }
    }

    /// Flow talking to the account service at `config.api_url`, keeping the
    /// onboarding status under `config.data_dir`.
    pub fn from_config(
        config: &ClientConfig,
        on_complete: Arc<dyn CompletionHandler>,
    ) -> Result<Self, ClientError> {
        let client = Arc::new(HttpAccountClient::new(config)?);
        Ok(Self::new(
            client.clone(),
            client,
            Arc::new(SimulatedDeployer::new(config.deploy_stage)),
            Arc::new(FileStatusStore::new(&config.data_dir)),
            on_complete,
        ))
    }

    /// Screen to open on, from the persisted status. An unreadable status
    /// counts as not onboarded.
    pub fn initial_screen(&self) -> InitialScreen {
        match self.status_store.load() {
            Ok(status) => status.initial_screen(),
            Err(e) => {
                warn!(error = %e, "Could not read onboarding status");
                InitialScreen::Onboarding
            }
        }
    }

    pub fn wizard(&self) -> &SignupWizard {
        &self.wizard
    }

    pub fn is_deploying(&self) -> bool {
        self.deployment.is_some()
    }

    /// Apply `event` and everything it sets in motion, except deployment
    /// progress which arrives through [`Self::pump_deployment`].
    pub async fn dispatch(&mut self, event: WizardEvent) {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            for action in self.wizard.handle(event) {
                if let Some(result) = self.run(action).await {
                    queue.push_back(WizardEvent::Collaborator {
                        generation: self.wizard.generation(),
                        result,
                    });
                }
            }
        }
    }

    /// Wait for the next deployment update and apply it.
    ///
    /// Returns `false` once no deployment is in flight.
    pub async fn pump_deployment(&mut self) -> bool {
        let Some(task) = self.deployment.as_mut() else {
            return false;
        };
        let generation = task.generation;

        let next = task.progress.recv().await;
        if let Some(status) = next {
            self.dispatch(WizardEvent::Collaborator {
                generation,
                result: CollaboratorResult::DeploymentProgress(status),
            })
            .await;
            return true;
        }

        // Progress channel closed: the deployment task has returned.
        let Some(task) = self.deployment.take() else {
            return false;
        };
        let result = match task.handle.await {
            Ok(Ok(identity)) => CollaboratorResult::DeploymentFinished(identity),
            Ok(Err(DeployError::Cancelled)) => return false,
            Ok(Err(e)) => CollaboratorResult::DeploymentFailed(e.to_string()),
            Err(e) => {
                warn!(error = %e, "Deployment task did not complete");
                CollaboratorResult::DeploymentFailed("Deployment was interrupted".to_string())
            }
        };
        self.dispatch(WizardEvent::Collaborator { generation, result })
            .await;
        false
    }

    /// Pump until the in-flight deployment, if any, has been applied.
    pub async fn finish_deployment(&mut self) {
        while self.pump_deployment().await {}
    }

    async fn run(&mut self, action: WizardAction) -> Option<CollaboratorResult> {
        match action {
            WizardAction::SendCode { email } => Some(match self.verifier.send_code(&email).await {
                Ok(()) => CollaboratorResult::CodeSent,
                Err(e) => {
                    warn!(error = %e, "Sending verification code failed");
                    CollaboratorResult::CodeSendFailed(e.to_string())
                }
            }),
            WizardAction::VerifyCode { email, code } => {
                Some(match self.verifier.verify_code(&email, &code).await {
                    Ok(()) => CollaboratorResult::CodeVerified,
                    Err(e) => CollaboratorResult::CodeRejected(e.to_string()),
                })
            }
            WizardAction::StartDeployment { name, nin } => {
                self.start_deployment(DeploymentRequest::Identity { name, nin });
                None
            }
            WizardAction::CancelDeployment => {
                if let Some(task) = self.deployment.take() {
                    task.cancel.cancel();
                }
                None
            }
            WizardAction::CreateAccount(account) => {
                Some(match self.registrar.create_account(&account).await {
                    Ok(()) => CollaboratorResult::AccountCreated,
                    Err(e) => {
                        warn!(error = %e, "Account creation failed");
                        CollaboratorResult::AccountRejected(e.to_string())
                    }
                })
            }
            WizardAction::Complete(account) => {
                info!(name = %account.name(), "Signup completed");
                self.on_complete.on_complete(&account);
                None
            }
            WizardAction::MarkOnboarded => {
                self.mark_onboarded();
                None
            }
        }
    }

    fn start_deployment(&mut self, request: DeploymentRequest) {
        if let Some(previous) = self.deployment.take() {
            previous.cancel.cancel();
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let deployer = Arc::clone(&self.deployer);
        let handle = tokio::spawn({
            let cancel = cancel.clone();
            async move { deployer.deploy(request, tx, cancel).await }
        });

        self.deployment = Some(DeploymentTask {
            generation: self.wizard.generation(),
            cancel,
            progress: rx,
            handle,
        });
    }

    /// A failed write only costs the user the onboarding screen on next launch.
    fn mark_onboarded(&self) {
        let previous = match self.status_store.load() {
            Ok(status) => status,
            Err(e) => {
                warn!(error = %e, "Could not read onboarding status, overwriting");
                OnboardingStatus::default()
            }
        };
        let status = OnboardingStatus::completed(&previous, Utc::now());
        if let Err(e) = self.status_store.save(&status) {
            warn!(error = %e, "Could not persist onboarding status");
        }
    }
}

impl Drop for SignupFlow {
    fn drop(&mut self) {
        if let Some(task) = self.deployment.take() {
            task.cancel.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_api_url;
    use crate::onboarding::wizard::{SignupPath, WizardStep};
    use crate::onboarding::CompletedAccount;
    use crate::session::MemoryStatusStore;
    use crate::validation::Field;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingRegistrar {
        calls: AtomicUsize,
        failures_left: AtomicUsize,
    }

    #[async_trait]
    impl AccountRegistrar for RecordingRegistrar {
        async fn create_account(&self, _account: &CompletedAccount) -> Result<(), ClientError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failures_left.load(Ordering::SeqCst) > 0 {
                self.failures_left.fetch_sub(1, Ordering::SeqCst);
                return Err(ClientError::Rejected {
                    status: 500,
                    message: "Service unavailable".to_string(),
                });
            }
            Ok(())
        }
    }

    struct FixedCode(&'static str);

    #[async_trait]
    impl CodeVerifier for FixedCode {
        async fn send_code(&self, _email: &str) -> Result<(), ClientError> {
            Ok(())
        }

        async fn verify_code(&self, _email: &str, code: &str) -> Result<(), ClientError> {
            if code == self.0 {
                Ok(())
            } else {
                Err(ClientError::Rejected {
                    status: 401,
                    message: "Invalid or expired code".to_string(),
                })
            }
        }
    }

    struct Harness {
        flow: SignupFlow,
        registrar: Arc<RecordingRegistrar>,
        store: Arc<MemoryStatusStore>,
        completed: Arc<Mutex<Vec<CompletedAccount>>>,
    }

    fn harness(registrar: RecordingRegistrar) -> Harness {
        let registrar = Arc::new(registrar);
        let store = Arc::new(MemoryStatusStore::default());
        let completed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&completed);
        let flow = SignupFlow::new(
            registrar.clone(),
            Arc::new(FixedCode("123456")),
            Arc::new(SimulatedDeployer::new(Duration::from_millis(1500))),
            store.clone(),
            Arc::new(move |account: &CompletedAccount| {
                sink.lock().unwrap().push(account.clone())
            }),
        );
        Harness {
            flow,
            registrar,
            store,
            completed,
        }
    }

    async fn edit(flow: &mut SignupFlow, field: Field, value: &str) {
        flow.dispatch(WizardEvent::Edit {
            field,
            value: value.to_string(),
        })
        .await;
    }

    async fn walk_standard_path(flow: &mut SignupFlow) {
        flow.dispatch(WizardEvent::ChoosePath(SignupPath::Standard)).await;
        edit(flow, Field::Name, "Jane Doe").await;
        edit(flow, Field::Email, "jane@x.com").await;
        edit(flow, Field::Phone, "+234 805 333 5504").await;
        edit(flow, Field::Password, "longenough1").await;
        flow.dispatch(WizardEvent::Next).await;
        edit(flow, Field::Nin, "12345678901").await;
        flow.dispatch(WizardEvent::Next).await;
        assert_eq!(flow.wizard().step(), WizardStep::CodeVerification);
        flow.dispatch(WizardEvent::EditCode("123456".to_string())).await;
        flow.dispatch(WizardEvent::Next).await;
        assert_eq!(flow.wizard().step(), WizardStep::Finalize);
    }

    #[tokio::test]
    async fn standard_path_completes_once_and_marks_onboarded() {
        let mut h = harness(RecordingRegistrar::default());
        walk_standard_path(&mut h.flow).await;

        h.flow.dispatch(WizardEvent::Submit).await;
        assert_eq!(h.registrar.calls.load(Ordering::SeqCst), 0);

        h.flow.dispatch(WizardEvent::SetAgreeToTerms(true)).await;
        h.flow.dispatch(WizardEvent::Submit).await;
        h.flow.dispatch(WizardEvent::Submit).await;

        assert_eq!(h.registrar.calls.load(Ordering::SeqCst), 1);
        assert_eq!(h.completed.lock().unwrap().len(), 1);
        assert!(h.flow.wizard().is_completed());

        let status = h.store.load().unwrap();
        assert!(status.onboarded);
        assert!(status.trial_start.is_some());
    }

    #[tokio::test]
    async fn registrar_failure_surfaces_and_retry_succeeds() {
        let registrar = RecordingRegistrar {
            failures_left: AtomicUsize::new(1),
            ..RecordingRegistrar::default()
        };
        let mut h = harness(registrar);
        walk_standard_path(&mut h.flow).await;
        h.flow.dispatch(WizardEvent::SetAgreeToTerms(true)).await;

        h.flow.dispatch(WizardEvent::Submit).await;
        assert_eq!(h.flow.wizard().step(), WizardStep::Finalize);
        assert_eq!(h.flow.wizard().error_message(), Some("Service unavailable"));
        assert!(h.completed.lock().unwrap().is_empty());
        assert!(!h.store.load().unwrap().onboarded);

        h.flow.dispatch(WizardEvent::Submit).await;
        assert_eq!(h.registrar.calls.load(Ordering::SeqCst), 2);
        assert_eq!(h.completed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn wrong_code_stays_on_verification() {
        let mut h = harness(RecordingRegistrar::default());
        h.flow
            .dispatch(WizardEvent::ChoosePath(SignupPath::Standard))
            .await;
        edit(&mut h.flow, Field::Name, "Jane Doe").await;
        edit(&mut h.flow, Field::Email, "jane@x.com").await;
        edit(&mut h.flow, Field::Phone, "08053335504").await;
        edit(&mut h.flow, Field::Password, "longenough1").await;
        h.flow.dispatch(WizardEvent::Next).await;
        edit(&mut h.flow, Field::Nin, "12345678901").await;
        h.flow.dispatch(WizardEvent::Next).await;

        h.flow
            .dispatch(WizardEvent::EditCode("654321".to_string()))
            .await;
        h.flow.dispatch(WizardEvent::Next).await;
        assert_eq!(h.flow.wizard().step(), WizardStep::CodeVerification);
        assert_eq!(
            h.flow.wizard().error_message(),
            Some("Invalid or expired code")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn identity_path_runs_deployment_to_credentials() {
        let mut h = harness(RecordingRegistrar::default());
        h.flow
            .dispatch(WizardEvent::ChoosePath(SignupPath::Identity))
            .await;
        edit(&mut h.flow, Field::Name, "Jane Doe").await;
        edit(&mut h.flow, Field::Nin, "12345678901").await;
        h.flow.dispatch(WizardEvent::Next).await;
        assert_eq!(h.flow.wizard().step(), WizardStep::Deployment);
        assert!(h.flow.is_deploying());

        assert!(h.flow.pump_deployment().await);
        assert_eq!(h.flow.wizard().contract_status(), ContractStatus::Compiling);

        h.flow.finish_deployment().await;
        assert_eq!(h.flow.wizard().step(), WizardStep::Credentials);
        assert!(h.flow.wizard().identity().is_some());

        h.flow.dispatch(WizardEvent::SetAgreeToTerms(true)).await;
        h.flow.dispatch(WizardEvent::Submit).await;
        let completed = h.completed.lock().unwrap();
        assert!(matches!(
            completed.as_slice(),
            [CompletedAccount::Identity { name, .. }] if name == "Jane Doe"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn closing_mid_deployment_discards_it() {
        let mut h = harness(RecordingRegistrar::default());
        h.flow
            .dispatch(WizardEvent::ChoosePath(SignupPath::Identity))
            .await;
        edit(&mut h.flow, Field::Name, "Jane Doe").await;
        edit(&mut h.flow, Field::Nin, "12345678901").await;
        h.flow.dispatch(WizardEvent::Next).await;
        h.flow.pump_deployment().await;

        h.flow.dispatch(WizardEvent::Close).await;
        assert!(!h.flow.is_deploying());
        assert!(!h.flow.pump_deployment().await);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(h.flow.wizard().step(), WizardStep::PathSelection);
        assert!(h.flow.wizard().form().is_blank());
        assert!(h.completed.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn configured_flow_persists_status_in_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = ClientConfig::new(parse_api_url("http://127.0.0.1:9").unwrap());
        config.data_dir = dir.path().join("welli");
        config.deploy_stage = Duration::from_millis(20);

        let completed = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&completed);
        let mut flow = SignupFlow::from_config(
            &config,
            Arc::new(move |account: &CompletedAccount| {
                sink.lock().unwrap().push(account.clone())
            }),
        )
        .unwrap();
        assert_eq!(flow.initial_screen(), InitialScreen::Onboarding);

        // The identity path registers nothing over HTTP, so no server is needed.
        flow.dispatch(WizardEvent::ChoosePath(SignupPath::Identity))
            .await;
        edit(&mut flow, Field::Name, "Jane Doe").await;
        edit(&mut flow, Field::Nin, "12345678901").await;
        flow.dispatch(WizardEvent::Next).await;
        flow.finish_deployment().await;
        flow.dispatch(WizardEvent::SetAgreeToTerms(true)).await;
        flow.dispatch(WizardEvent::Submit).await;

        assert_eq!(completed.lock().unwrap().len(), 1);
        assert_eq!(flow.initial_screen(), InitialScreen::Dashboard);
        let status = FileStatusStore::new(&config.data_dir).load().unwrap();
        assert!(status.onboarded);
    }
}
