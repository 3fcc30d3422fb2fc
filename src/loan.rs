//! Loan aggregate and its investment entries
//!
//! The aggregate owns its data and answers queries about it. It never decides
//! whether a transition is legal; that policy lives in [`crate::service`].
use super::error::ValidationError;
use super::types::TimeStamp;
use chrono::Utc;
use rust_decimal::Decimal;

const HUNDRED: Decimal = Decimal::ONE_HUNDRED;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, minicbor::Encode, minicbor::Decode,
)]
pub enum LoanState {
    #[n(0)]
    Proposed,
    #[n(1)]
    Approved,
    #[n(2)]
    Invested,
    #[n(3)]
    Disbursed,
}

impl LoanState {
    pub fn as_str(&self) -> &'static str {
        match self {
            LoanState::Proposed => "proposed",
            LoanState::Approved => "approved",
            LoanState::Invested => "invested",
            LoanState::Disbursed => "disbursed",
        }
    }
    /// The only state this one may advance to.
    pub fn next(&self) -> Option<LoanState> {
        match self {
            LoanState::Proposed => Some(LoanState::Approved),
            LoanState::Approved => Some(LoanState::Invested),
            LoanState::Invested => Some(LoanState::Disbursed),
            LoanState::Disbursed => None,
        }
    }
    pub fn is_terminal(&self) -> bool {
        self.next().is_none()
    }
}

impl std::fmt::Display for LoanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One investor's share of a loan. Never edited once appended.
#[derive(Debug, Clone, PartialEq)]
pub struct Investment {
    pub id: String,
    pub loan_id: String,
    pub investor_id: String,
    pub amount: Decimal,
    pub created_at: TimeStamp<Utc>,
}

impl Investment {
    pub fn new(id: String, loan_id: String, investor_id: String, amount: Decimal) -> Self {
        Self {
            id,
            loan_id,
            investor_id,
            amount,
            created_at: TimeStamp::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Loan {
    pub id: String,
    pub state: LoanState,
    pub principal: Decimal,
    pub rate: Decimal,
    pub roi: Decimal,
    pub created_at: TimeStamp<Utc>,
    pub approved_at: Option<TimeStamp<Utc>>,
    pub disbursed_at: Option<TimeStamp<Utc>>,
    pub borrower_id: String,
    pub field_validator_id: Option<String>,
    pub field_officer_id: Option<String>,
    pub proof_image: Option<Vec<u8>>,
    pub agreement_letter: Option<Vec<u8>>,
    pub signed_agreement: Option<Vec<u8>>,
    pub disburse_notes: Option<String>,
    pub investments: Vec<Investment>, // insertion order
    pub version: u64,                 // bumped by every successful store update
}

impl Loan {
    /// A fresh loan in the proposed state. Call [`Loan::validate_initial_state`] before storing it.
    pub fn new(
        id: String,
        borrower_id: String,
        principal: Decimal,
        rate: Decimal,
        roi: Decimal,
    ) -> Self {
        Self {
            id,
            state: LoanState::Proposed,
            principal,
            rate,
            roi,
            created_at: TimeStamp::new(),
            approved_at: None,
            disbursed_at: None,
            borrower_id,
            field_validator_id: None,
            field_officer_id: None,
            proof_image: None,
            agreement_letter: None,
            signed_agreement: None,
            disburse_notes: None,
            investments: vec![],
            version: 0,
        }
    }

    pub fn validate_initial_state(&self) -> Result<(), ValidationError> {
        if self.borrower_id.trim().is_empty() {
            return Err(ValidationError::MissingField("borrower_id"));
        }
        if self.principal <= Decimal::ZERO {
            return Err(ValidationError::NonPositive("principal", self.principal));
        }
        if self.rate <= Decimal::ZERO {
            return Err(ValidationError::NonPositive("rate", self.rate));
        }
        if self.roi <= Decimal::ZERO {
            return Err(ValidationError::NonPositive("roi", self.roi));
        }
        if self.state != LoanState::Proposed {
            return Err(ValidationError::NotProposed(self.state));
        }
        Ok(())
    }

    pub fn total_invested(&self) -> Decimal {
        self.investments.iter().map(|inv| inv.amount).sum()
    }

    pub fn remaining(&self) -> Decimal {
        self.principal - self.total_invested()
    }

    pub fn is_fully_funded(&self) -> bool {
        self.total_invested() == self.principal
    }

    pub fn has_investor(&self, investor_id: &str) -> bool {
        self.investments
            .iter()
            .any(|inv| inv.investor_id == investor_id)
    }

    pub fn push_investment(&mut self, investment: Investment) {
        self.investments.push(investment);
    }

    /// Interest owed by the borrower, `principal * rate / 100`.
    ///
    /// `None` when the product does not fit in a `Decimal`.
    pub fn interest_amount(&self) -> Option<Decimal> {
        self.principal.checked_mul(self.rate)?.checked_div(HUNDRED)
    }

    /// Return earned on `amount` at this loan's roi, `None` on overflow.
    pub fn investor_profit(&self, amount: Decimal) -> Option<Decimal> {
        amount.checked_mul(self.roi)?.checked_div(HUNDRED)
    }

    pub fn has_proof_image(&self) -> bool {
        self.proof_image.as_ref().is_some_and(|b| !b.is_empty())
    }
    pub fn has_agreement_letter(&self) -> bool {
        self.agreement_letter.as_ref().is_some_and(|b| !b.is_empty())
    }
    pub fn has_signed_agreement(&self) -> bool {
        self.signed_agreement.as_ref().is_some_and(|b| !b.is_empty())
    }
}
