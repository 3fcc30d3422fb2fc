//! Service layer API for the loan lifecycle
//!
//! `LoanService` is the only component that advances a loan's state:
//!
//! ```text
//! Proposed --approve--> Approved --invest(s)--> Invested --disburse--> Disbursed
//! ```
//!
//! `Invested` is never requested directly. It is reached by the investment
//! that brings the total up to the principal.
//!
//! Every transition is a read-check-write cycle run inside the loan's slot in
//! [`LoanLocks`], and the store re-checks the loan version when it writes.
//! Agreement rendering and investor notification happen outside the slot.
use super::config::NotificationConfig;
use super::documents::{DocumentGenerator, TextAgreementGenerator};
use super::error::{LoanError, ValidationError};
use super::loan::{Investment, Loan, LoanState};
use super::locks::LoanLocks;
use super::notify::{Attachment, Notification, Notifier, TracingNotifier};
use super::store::{LedgerStore, LoanDetails, LoanRepository};
use super::types::{Investor, TimeStamp};
use super::utils::{self, INVESTMENT_PREFIX, LOAN_PREFIX};
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const DEFAULT_ATTACHMENT_NAME: &str = "agreement.txt";

// outcome of one locked pass over an investment
enum InvestStep {
    Committed(Loan, Investor),
    NeedsAgreement(Investor),
}

pub struct LoanService {
    repo: Arc<dyn LoanRepository>,
    documents: Arc<dyn DocumentGenerator>,
    notifier: Arc<dyn Notifier>,
    locks: LoanLocks,
    attachment_name: String,
}

fn new_id(prefix: &str) -> Result<String, LoanError> {
    utils::new_uuid_to_bech32(prefix).map_err(|e| LoanError::Identity(e.to_string()))
}

fn ensure_state(loan: &Loan, expected: LoanState) -> Result<(), LoanError> {
    if loan.state != expected {
        warn!(
            loan_id = %loan.id,
            expected = %expected,
            found = %loan.state,
            "loan is not in the required state"
        );
        return Err(LoanError::InvalidTransition {
            loan_id: loan.id.clone(),
            expected,
            found: loan.state,
        });
    }
    Ok(())
}

fn require_id(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::MissingField(field));
    }
    Ok(())
}

fn require_document(name: &'static str, bytes: &[u8]) -> Result<(), ValidationError> {
    if bytes.is_empty() {
        return Err(ValidationError::MissingDocument(name));
    }
    Ok(())
}

impl LoanService {
    pub fn new(
        repo: Arc<dyn LoanRepository>,
        documents: Arc<dyn DocumentGenerator>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            repo,
            documents,
            notifier,
            locks: LoanLocks::new(),
            attachment_name: DEFAULT_ATTACHMENT_NAME.into(),
        }
    }

    /// Wire the default collaborators around an opened store.
    pub fn from_store(store: &LedgerStore, config: &NotificationConfig) -> Self {
        Self::new(
            store.repository(),
            Arc::new(TextAgreementGenerator::new()),
            Arc::new(TracingNotifier::from_config(config)),
        )
        .with_attachment_name(config.attachment_name.clone())
    }

    pub fn with_attachment_name(mut self, name: impl Into<String>) -> Self {
        self.attachment_name = name.into();
        self
    }

    fn load(&self, loan_id: &str) -> Result<Loan, LoanError> {
        self.repo
            .get_by_id(loan_id)
            .map(LoanDetails::into_loan)
            .map_err(|err| {
                warn!(loan_id, error = %err, "failed to load loan");
                err.into()
            })
    }

    fn persist(&self, loan: &mut Loan) -> Result<(), LoanError> {
        self.repo.update(loan).map_err(|err| {
            error!(loan_id = %loan.id, error = %err, "failed to update loan");
            err.into()
        })
    }

    /// The loan with its borrower, employees and investors resolved.
    pub fn get_loan(&self, loan_id: &str) -> Result<LoanDetails, LoanError> {
        Ok(self.repo.get_by_id(loan_id)?)
    }

    /// Propose a new loan for `borrower_id`.
    pub fn create_loan(
        &self,
        borrower_id: &str,
        principal: Decimal,
        rate: Decimal,
        roi: Decimal,
    ) -> Result<Loan, LoanError> {
        let loan = Loan::new(new_id(LOAN_PREFIX)?, borrower_id.to_owned(), principal, rate, roi);

        loan.validate_initial_state().inspect_err(|err| {
            warn!(borrower_id, error = %err, "loan validation failed");
        })?;
        self.repo.get_borrower_by_id(borrower_id).inspect_err(|err| {
            warn!(borrower_id, error = %err, "borrower lookup failed");
        })?;
        self.repo.save(&loan).inspect_err(|err| {
            error!(loan_id = %loan.id, error = %err, "failed to save loan");
        })?;

        info!(
            loan_id = %loan.id,
            state = %loan.state,
            principal = %loan.principal,
            "loan created"
        );
        Ok(loan)
    }

    /// Approve a proposed loan after a field visit, attaching the visit's proof image.
    pub fn approve_loan(
        &self,
        loan_id: &str,
        field_validator_id: &str,
        proof_image: Vec<u8>,
    ) -> Result<Loan, LoanError> {
        require_id("field_validator_id", field_validator_id)?;
        require_document("proof_image", &proof_image)?;

        let slot = self.locks.slot(loan_id);
        let _guard = slot.lock();

        let mut loan = self.load(loan_id)?;
        // a repeat approval reports AlreadyProcessed even once the loan has moved past Approved
        if loan.approved_at.is_some() {
            warn!(loan_id, "loan already approved");
            return Err(LoanError::AlreadyProcessed {
                loan_id: loan.id,
                step: "approved",
            });
        }
        ensure_state(&loan, LoanState::Proposed)?;
        let validator = self.repo.get_employee_by_id(field_validator_id)?;

        loan.state = LoanState::Approved;
        loan.approved_at = Some(TimeStamp::new());
        loan.field_validator_id = Some(validator.id.clone());
        loan.proof_image = Some(proof_image);
        self.persist(&mut loan)?;

        info!(loan_id = %loan.id, field_validator_id = %validator.id, "loan approved");
        Ok(loan)
    }

    /// Record an investment in an approved loan.
    ///
    /// The investment that completes the funding moves the loan to `Invested`
    /// and stores the rendered agreement on it. Rejections are checked in the
    /// order: state, amount, duplicate investor, principal ceiling, investor
    /// lookup.
    pub fn invest(
        &self,
        loan_id: &str,
        investor_id: &str,
        amount: Decimal,
    ) -> Result<Loan, LoanError> {
        let mut agreement: Option<Vec<u8>> = None;

        let (loan, investor) = loop {
            let step = {
                let slot = self.locks.slot(loan_id);
                let _guard = slot.lock();

                let mut loan = self.load(loan_id)?;
                let investor = self.check_investment(&loan, investor_id, amount)?;
                let completes = loan.total_invested().checked_add(amount) == Some(loan.principal);

                if completes && agreement.is_none() {
                    InvestStep::NeedsAgreement(investor)
                } else {
                    let letter = if completes { agreement.take() } else { None };
                    self.commit_investment(&mut loan, &investor, amount, letter)?;
                    InvestStep::Committed(loan, investor)
                }
            };

            match step {
                InvestStep::Committed(loan, investor) => break (loan, investor),
                InvestStep::NeedsAgreement(investor) => {
                    debug!(loan_id, "rendering agreement before committing final investment");
                    let letter = self
                        .documents
                        .generate_agreement(loan_id, &investor.name, amount)
                        .map_err(|source| {
                            error!(loan_id, error = %source, "failed to generate agreement");
                            LoanError::ArtifactGeneration {
                                loan_id: loan_id.to_owned(),
                                source,
                            }
                        })?;
                    // re-validated from a fresh read on the next pass
                    agreement = Some(letter);
                }
            }
        };

        self.notify_investor(&loan, &investor, amount);
        Ok(loan)
    }

    fn check_investment(
        &self,
        loan: &Loan,
        investor_id: &str,
        amount: Decimal,
    ) -> Result<Investor, LoanError> {
        ensure_state(loan, LoanState::Approved)?;

        if amount <= Decimal::ZERO {
            warn!(loan_id = %loan.id, %amount, "investment amount must be greater than 0");
            return Err(ValidationError::NonPositive("amount", amount).into());
        }
        if loan.has_investor(investor_id) {
            warn!(loan_id = %loan.id, investor_id, "investor has already invested");
            return Err(LoanError::DuplicateInvestor {
                loan_id: loan.id.clone(),
                investor_id: investor_id.to_owned(),
            });
        }
        let invested = loan.total_invested();
        // an overflowing sum is past any principal
        let within = invested
            .checked_add(amount)
            .is_some_and(|total| total <= loan.principal);
        if !within {
            warn!(
                loan_id = %loan.id,
                %invested,
                %amount,
                principal = %loan.principal,
                "investment exceeds principal"
            );
            return Err(LoanError::OverInvestment {
                loan_id: loan.id.clone(),
                amount,
                invested,
                principal: loan.principal,
            });
        }

        Ok(self.repo.get_investor_by_id(investor_id)?)
    }

    fn commit_investment(
        &self,
        loan: &mut Loan,
        investor: &Investor,
        amount: Decimal,
        agreement: Option<Vec<u8>>,
    ) -> Result<(), LoanError> {
        let investment = Investment::new(
            new_id(INVESTMENT_PREFIX)?,
            loan.id.clone(),
            investor.id.clone(),
            amount,
        );
        loan.push_investment(investment);

        if loan.is_fully_funded() {
            loan.state = LoanState::Invested;
            loan.agreement_letter = agreement;
        }
        self.persist(loan)?;

        info!(
            loan_id = %loan.id,
            investor_id = %investor.id,
            %amount,
            state = %loan.state,
            "investment processed"
        );
        if loan.state == LoanState::Invested {
            info!(loan_id = %loan.id, "loan fully funded");
        }
        Ok(())
    }

    fn notify_investor(&self, loan: &Loan, investor: &Investor, amount: Decimal) {
        let funded = loan.state == LoanState::Invested;
        let attachment = loan
            .agreement_letter
            .as_ref()
            .filter(|_| funded)
            .map(|content| Attachment {
                filename: self.attachment_name.clone(),
                content: content.clone(),
            });

        let (subject, closing) = if attachment.is_some() {
            ("Loan Agreement", "Please find the agreement letter attached.")
        } else {
            (
                "Investment Received",
                "The agreement letter will follow once the loan is fully funded.",
            )
        };
        let notification = Notification {
            recipient: investor.email.clone(),
            subject: subject.into(),
            body: format!(
                "Hi {},\n\nThank you for your investment of {} in loan {}.\n{}\n\nRegards,\nLoan Service",
                investor.name, amount, loan.id, closing
            ),
            attachment,
        };

        if let Err(err) = self.notifier.notify(&notification) {
            error!(
                loan_id = %loan.id,
                investor_id = %investor.id,
                error = %err,
                "failed to send notification to investor"
            );
        }
    }

    /// Hand the funds to the borrower, attaching the signed agreement.
    pub fn disburse_loan(
        &self,
        loan_id: &str,
        field_officer_id: &str,
        notes: &str,
        signed_agreement: Vec<u8>,
    ) -> Result<Loan, LoanError> {
        require_id("field_officer_id", field_officer_id)?;
        require_document("signed_agreement", &signed_agreement)?;

        let slot = self.locks.slot(loan_id);
        let _guard = slot.lock();

        let mut loan = self.load(loan_id)?;
        // checked before the state so a repeat disbursement is named as such
        if loan.disbursed_at.is_some() {
            warn!(loan_id, "loan already disbursed");
            return Err(LoanError::AlreadyProcessed {
                loan_id: loan.id,
                step: "disbursed",
            });
        }
        ensure_state(&loan, LoanState::Invested)?;
        let officer = self.repo.get_employee_by_id(field_officer_id)?;

        loan.state = LoanState::Disbursed;
        loan.disbursed_at = Some(TimeStamp::new());
        loan.field_officer_id = Some(officer.id.clone());
        loan.disburse_notes = Some(notes.trim().to_owned()).filter(|n| !n.is_empty());
        loan.signed_agreement = Some(signed_agreement);
        self.persist(&mut loan)?;

        info!(loan_id = %loan.id, field_officer_id = %officer.id, "loan disbursed");
        Ok(loan)
    }
}
