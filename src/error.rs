use super::loan::LoanState;
use rust_decimal::Decimal;

/// Kinds of record the ledger refers to by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Entity {
    Loan,
    Borrower,
    Investor,
    Employee,
}

impl std::fmt::Display for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Entity::Loan => "loan",
            Entity::Borrower => "borrower",
            Entity::Investor => "investor",
            Entity::Employee => "employee",
        };
        f.write_str(name)
    }
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum ValidationError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("{0} must be greater than 0, got {1}")]
    NonPositive(&'static str, Decimal),
    #[error("loan must start in 'proposed' state, found '{0}'")]
    NotProposed(LoanState),
    #[error("{0} document is required and must not be empty")]
    MissingDocument(&'static str),
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: String },
    #[error("{entity} {id} already exists")]
    AlreadyExists { entity: Entity, id: String },
    #[error("loan {loan_id} was modified concurrently: expected version {expected}, found {found}")]
    VersionConflict {
        loan_id: String,
        expected: u64,
        found: u64,
    },
    #[error("{entity} {id} referenced by loan {loan_id} does not exist")]
    MissingReference {
        entity: Entity,
        id: String,
        loan_id: String,
    },
    #[error("storage backend failure")]
    Backend(#[from] sled::Error),
    #[error("failed to encode {0} row: {1}")]
    Encode(&'static str, String),
    #[error("failed to decode {0} row: {1}")]
    Decode(&'static str, String),
}

impl StoreError {
    pub fn not_found(entity: Entity, id: impl Into<String>) -> Self {
        StoreError::NotFound {
            entity,
            id: id.into(),
        }
    }
    pub fn already_exists(entity: Entity, id: impl Into<String>) -> Self {
        StoreError::AlreadyExists {
            entity,
            id: id.into(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum LoanError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),
    #[error("{entity} {id} not found")]
    NotFound { entity: Entity, id: String },
    #[error("loan {loan_id} must be in '{expected}' state, found '{found}'")]
    InvalidTransition {
        loan_id: String,
        expected: LoanState,
        found: LoanState,
    },
    #[error("loan {loan_id} has already been {step}")]
    AlreadyProcessed { loan_id: String, step: &'static str },
    #[error("investor {investor_id} has already invested in loan {loan_id}")]
    DuplicateInvestor { loan_id: String, investor_id: String },
    #[error(
        "investment of {amount} exceeds principal of loan {loan_id}: {invested} of {principal} already invested"
    )]
    OverInvestment {
        loan_id: String,
        amount: Decimal,
        invested: Decimal,
        principal: Decimal,
    },
    #[error("failed to generate agreement for loan {loan_id}")]
    ArtifactGeneration {
        loan_id: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("storage failure: {0}")]
    Storage(StoreError),
    #[error("failed to generate identifier: {0}")]
    Identity(String),
}

impl From<StoreError> for LoanError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, id } => LoanError::NotFound { entity, id },
            other => LoanError::Storage(other),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
    #[error("failed to initialise logging: {0}")]
    Logging(String),
}
