// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Signup wizard state machine.
//!
//! [`SignupWizard::handle`] applies one [`WizardEvent`] and returns the side
//! effects the caller has to run. Results of those side effects come back as
//! [`WizardEvent::Collaborator`] tagged with the generation that requested
//! them; closing the wizard starts a new generation, so results that land
//! after a close are dropped.

use tracing::debug;

use crate::contract::{ContractStatus, DeployedIdentity};
use crate::onboarding::form::{SignupForm, ValidationState};
use crate::onboarding::CompletedAccount;
use crate::validation::Field;

/// Number of digits in a verification code.
pub const CODE_LENGTH: usize = 6;

pub const TERMS_REQUIRED_MESSAGE: &str = "You must agree to the terms and conditions";
pub const CODE_INCOMPLETE_MESSAGE: &str = "Enter the 6-digit code sent to your email";

const CONTACT_FIELDS: [Field; 4] = [Field::Name, Field::Email, Field::Phone, Field::Password];
const IDENTITY_FIELDS: [Field; 2] = [Field::Name, Field::Nin];
const STANDARD_FIELDS: [Field; 5] = [
    Field::Name,
    Field::Email,
    Field::Phone,
    Field::Password,
    Field::Nin,
];

/// Wizard position.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum WizardStep {
    #[default]
    PathSelection = 0,
    ContactDetails = 1,
    IdentityNumber = 2,
    CodeVerification = 3,
    Finalize = 4,
    IdentityBinding = 5,
    Deployment = 6,
    Credentials = 7,
}

impl WizardStep {
    pub fn index(self) -> u8 {
        self as u8
    }

    /// Form fields that can be edited while this step is shown.
    pub fn editable_fields(self) -> &'static [Field] {
        match self {
            WizardStep::ContactDetails => &CONTACT_FIELDS,
            WizardStep::IdentityNumber => &[Field::Nin],
            WizardStep::IdentityBinding => &IDENTITY_FIELDS,
            _ => &[],
        }
    }

    /// The path a step belongs to; `None` for path selection.
    pub fn path(self) -> Option<SignupPath> {
        match self {
            WizardStep::PathSelection => None,
            WizardStep::ContactDetails
            | WizardStep::IdentityNumber
            | WizardStep::CodeVerification
            | WizardStep::Finalize => Some(SignupPath::Standard),
            WizardStep::IdentityBinding | WizardStep::Deployment | WizardStep::Credentials => {
                Some(SignupPath::Identity)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignupPath {
    /// Contact details, national ID, emailed code, consent.
    Standard,
    /// National ID bound to a deployed identity contract.
    Identity,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardEvent {
    ChoosePath(SignupPath),
    Edit { field: Field, value: String },
    Blur(Field),
    SetAgreeToTerms(bool),
    EditCode(String),
    ResendCode,
    Next,
    Back,
    Submit,
    Close,
    Collaborator {
        generation: u64,
        result: CollaboratorResult,
    },
}

/// Outcome of a [`WizardAction`] run by the driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollaboratorResult {
    CodeSent,
    CodeSendFailed(String),
    CodeVerified,
    CodeRejected(String),
    DeploymentProgress(ContractStatus),
    DeploymentFinished(DeployedIdentity),
    DeploymentFailed(String),
    AccountCreated,
    AccountRejected(String),
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardAction {
    SendCode { email: String },
    VerifyCode { email: String, code: String },
    StartDeployment { name: String, nin: String },
    CancelDeployment,
    CreateAccount(CompletedAccount),
    Complete(CompletedAccount),
    MarkOnboarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    SendingCode,
    VerifyingCode,
}

#[derive(Debug, Default)]
pub struct SignupWizard {
    step: WizardStep,
    form: SignupForm,
    validation: ValidationState,
    code: String,
    contract_status: ContractStatus,
    identity: Option<DeployedIdentity>,
    message: Option<String>,
    pending: Option<Pending>,
    deployment_active: bool,
    submitting: Option<CompletedAccount>,
    completed: bool,
    generation: u64,
}

impl SignupWizard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> WizardStep {
        self.step
    }

    pub fn form(&self) -> &SignupForm {
        &self.form
    }

    pub fn validation(&self) -> &ValidationState {
        &self.validation
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn contract_status(&self) -> ContractStatus {
        self.contract_status
    }

    pub fn identity(&self) -> Option<&DeployedIdentity> {
        self.identity.as_ref()
    }

    /// User-visible message from the last failed collaborator call or consent check.
    pub fn error_message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn is_busy(&self) -> bool {
        self.pending.is_some() || self.submitting.is_some()
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.is_some()
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn handle(&mut self, event: WizardEvent) -> Vec<WizardAction> {
        match event {
            WizardEvent::Close => self.close(),
            WizardEvent::Collaborator { generation, result } => {
                if generation != self.generation {
                    debug!(
                        generation,
                        current = self.generation,
                        "Dropping result from a closed wizard session"
                    );
                    return Vec::new();
                }
                self.apply_result(result)
            }
            _ if self.completed => Vec::new(),
            WizardEvent::ChoosePath(path) => {
                if self.step == WizardStep::PathSelection {
                    self.step = match path {
                        SignupPath::Standard => WizardStep::ContactDetails,
                        SignupPath::Identity => WizardStep::IdentityBinding,
                    };
                }
                Vec::new()
            }
            WizardEvent::Edit { field, value } => {
                if !self.step.editable_fields().contains(&field) || self.is_busy() {
                    debug!(field = ?field, step = ?self.step, "Ignoring edit outside its step");
                    return Vec::new();
                }
                if self.form.apply_edit(field, value) {
                    self.validation.revalidate(&self.form, field);
                }
                Vec::new()
            }
            WizardEvent::Blur(field) => {
                self.validation.touch(&self.form, field);
                Vec::new()
            }
            WizardEvent::SetAgreeToTerms(agree) => {
                if !self.is_busy() {
                    self.form.agree_to_terms = agree;
                    if agree && self.message.as_deref() == Some(TERMS_REQUIRED_MESSAGE) {
                        self.message = None;
                    }
                }
                Vec::new()
            }
            WizardEvent::EditCode(code) => {
                if self.step == WizardStep::CodeVerification
                    && self.pending.is_none()
                    && code.len() <= CODE_LENGTH
                    && code.chars().all(|c| c.is_ascii_digit())
                {
                    self.code = code;
                }
                Vec::new()
            }
            WizardEvent::ResendCode => {
                if self.step == WizardStep::CodeVerification && self.pending.is_none() {
                    self.pending = Some(Pending::SendingCode);
                    self.message = None;
                    return vec![WizardAction::SendCode {
                        email: self.form.email.trim().to_string(),
                    }];
                }
                Vec::new()
            }
            WizardEvent::Next => self.next(),
            WizardEvent::Back => {
                self.back();
                Vec::new()
            }
            WizardEvent::Submit => self.submit(),
        }
    }

    fn next(&mut self) -> Vec<WizardAction> {
        if self.is_busy() {
            return Vec::new();
        }

        match self.step {
            WizardStep::ContactDetails => {
                if self.validation.validate_fields(&self.form, &CONTACT_FIELDS) {
                    self.step = WizardStep::IdentityNumber;
                }
                Vec::new()
            }
            WizardStep::IdentityNumber => {
                if !self.validation.validate_fields(&self.form, &[Field::Nin]) {
                    return Vec::new();
                }
                self.pending = Some(Pending::SendingCode);
                self.message = None;
                vec![WizardAction::SendCode {
                    email: self.form.email.trim().to_string(),
                }]
            }
            WizardStep::CodeVerification => {
                if self.code.len() != CODE_LENGTH {
                    self.message = Some(CODE_INCOMPLETE_MESSAGE.to_string());
                    return Vec::new();
                }
                self.pending = Some(Pending::VerifyingCode);
                self.message = None;
                vec![WizardAction::VerifyCode {
                    email: self.form.email.trim().to_string(),
                    code: self.code.clone(),
                }]
            }
            WizardStep::IdentityBinding => {
                if !self.validation.validate_fields(&self.form, &IDENTITY_FIELDS) {
                    return Vec::new();
                }
                self.step = WizardStep::Deployment;
                self.contract_status = ContractStatus::Idle;
                self.deployment_active = true;
                self.message = None;
                vec![WizardAction::StartDeployment {
                    name: self.form.name.trim().to_string(),
                    nin: self.form.nin.clone(),
                }]
            }
            _ => Vec::new(),
        }
    }

    fn back(&mut self) {
        if self.is_busy() {
            return;
        }

        let previous = match self.step {
            WizardStep::ContactDetails | WizardStep::IdentityBinding => WizardStep::PathSelection,
            WizardStep::IdentityNumber => WizardStep::ContactDetails,
            WizardStep::CodeVerification => {
                self.code.clear();
                WizardStep::IdentityNumber
            }
            // The code was consumed on verification; a fresh one is needed.
            WizardStep::Finalize => {
                self.code.clear();
                WizardStep::CodeVerification
            }
            WizardStep::PathSelection | WizardStep::Deployment | WizardStep::Credentials => {
                return
            }
        };
        self.step = previous;
        self.message = None;
    }

    fn submit(&mut self) -> Vec<WizardAction> {
        if self.is_busy() {
            return Vec::new();
        }

        let fields: &[Field] = match self.step {
            WizardStep::Finalize => &STANDARD_FIELDS,
            WizardStep::Credentials => &IDENTITY_FIELDS,
            _ => return Vec::new(),
        };
        if !self.validation.validate_fields(&self.form, fields) {
            return Vec::new();
        }

        let account = match self.step {
            WizardStep::Finalize => CompletedAccount::Standard {
                name: self.form.name.trim().to_string(),
                email: self.form.email.trim().to_string(),
                phone: self.form.phone.trim().to_string(),
                password: self.form.password.clone(),
                nin: self.form.nin.clone(),
            },
            WizardStep::Credentials => match &self.identity {
                Some(identity) => CompletedAccount::Identity {
                    name: self.form.name.trim().to_string(),
                    nin: self.form.nin.clone(),
                    identity: identity.clone(),
                },
                None => return Vec::new(),
            },
            _ => return Vec::new(),
        };

        if !self.form.agree_to_terms {
            self.message = Some(TERMS_REQUIRED_MESSAGE.to_string());
            return Vec::new();
        }

        self.message = None;
        self.submitting = Some(account.clone());
        vec![WizardAction::CreateAccount(account)]
    }

    fn apply_result(&mut self, result: CollaboratorResult) -> Vec<WizardAction> {
        match result {
            CollaboratorResult::CodeSent => {
                if self.pending == Some(Pending::SendingCode) {
                    self.pending = None;
                    self.code.clear();
                    if self.step == WizardStep::IdentityNumber {
                        self.step = WizardStep::CodeVerification;
                    }
                }
            }
            CollaboratorResult::CodeSendFailed(message) => {
                if self.pending == Some(Pending::SendingCode) {
                    self.pending = None;
                    self.message = Some(message);
                }
            }
            CollaboratorResult::CodeVerified => {
                if self.pending == Some(Pending::VerifyingCode) {
                    self.pending = None;
                    self.step = WizardStep::Finalize;
                }
            }
            CollaboratorResult::CodeRejected(message) => {
                if self.pending == Some(Pending::VerifyingCode) {
                    self.pending = None;
                    self.code.clear();
                    self.message = Some(message);
                }
            }
            CollaboratorResult::DeploymentProgress(status) => {
                if self.step == WizardStep::Deployment && self.deployment_active {
                    self.contract_status = status;
                }
            }
            CollaboratorResult::DeploymentFinished(identity) => {
                if self.step == WizardStep::Deployment && self.deployment_active {
                    self.deployment_active = false;
                    self.contract_status = ContractStatus::Done;
                    self.identity = Some(identity);
                    self.step = WizardStep::Credentials;
                }
            }
            CollaboratorResult::DeploymentFailed(message) => {
                if self.step == WizardStep::Deployment && self.deployment_active {
                    self.deployment_active = false;
                    self.contract_status = ContractStatus::Idle;
                    self.step = WizardStep::IdentityBinding;
                    self.message = Some(message);
                }
            }
            CollaboratorResult::AccountCreated => {
                if let Some(account) = self.submitting.take() {
                    self.completed = true;
                    return vec![WizardAction::Complete(account), WizardAction::MarkOnboarded];
                }
            }
            CollaboratorResult::AccountRejected(message) => {
                if self.submitting.take().is_some() {
                    self.message = Some(message);
                }
            }
        }
        Vec::new()
    }

    /// Discard everything entered in this session.
    fn close(&mut self) -> Vec<WizardAction> {
        let actions = if self.deployment_active {
            vec![WizardAction::CancelDeployment]
        } else {
            Vec::new()
        };
        *self = Self {
            generation: self.generation.wrapping_add(1),
            ..Self::default()
        };
        actions
    }
}
