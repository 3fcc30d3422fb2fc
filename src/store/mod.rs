//! Persistence port for the loan aggregate and the actor directory
//!
//! Business logic only ever sees [`LoanRepository`]. The backend is picked once,
//! when the process opens a [`LedgerStore`].
use super::config::{StorageBackend, StorageConfig};
use super::error::StoreError;
use super::loan::{Investment, Loan};
use super::seed;
use super::types::{Borrower, Employee, Investor};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

pub mod memory;
pub mod sled_store;

pub use memory::MemoryStore;
pub use sled_store::SledStore;

/// A loan with its references resolved for display.
///
/// The actors are joined at read time and are never written back.
#[derive(Debug, Clone)]
pub struct LoanDetails {
    pub loan: Loan,
    pub borrower: Option<Borrower>,
    pub field_validator: Option<Employee>,
    pub field_officer: Option<Employee>,
    pub investors: BTreeMap<String, Investor>, // keyed by investor id
}

impl LoanDetails {
    pub fn investor_of(&self, investment: &Investment) -> Option<&Investor> {
        self.investors.get(&investment.investor_id)
    }
    pub fn into_loan(self) -> Loan {
        self.loan
    }
}

pub trait LoanRepository: Send + Sync {
    /// Store a new aggregate. Fails with `AlreadyExists` if the id is taken.
    fn save(&self, loan: &Loan) -> Result<(), StoreError>;

    /// Fetch the aggregate with its investments and resolved references.
    fn get_by_id(&self, id: &str) -> Result<LoanDetails, StoreError>;

    /// Replace the stored aggregate, investments included, as one unit.
    ///
    /// The stored version must equal `loan.version`; on success both are
    /// advanced by one.
    fn update(&self, loan: &mut Loan) -> Result<(), StoreError>;

    fn get_investor_by_id(&self, id: &str) -> Result<Investor, StoreError>;
    fn get_employee_by_id(&self, id: &str) -> Result<Employee, StoreError>;
    fn get_borrower_by_id(&self, id: &str) -> Result<Borrower, StoreError>;
}

/// Write side of the actor directory, used for seeding and tests.
pub trait ActorStore: Send + Sync {
    fn put_borrower(&self, borrower: Borrower) -> Result<(), StoreError>;
    fn put_investor(&self, investor: Investor) -> Result<(), StoreError>;
    fn put_employee(&self, employee: Employee) -> Result<(), StoreError>;
}

/// The backend chosen at start-up.
#[derive(Clone)]
pub enum LedgerStore {
    Memory(Arc<MemoryStore>),
    Sled(Arc<SledStore>),
}

impl LedgerStore {
    pub fn open(config: &StorageConfig) -> Result<Self, StoreError> {
        let store = match config.backend {
            StorageBackend::Memory => LedgerStore::Memory(Arc::new(MemoryStore::new())),
            StorageBackend::Sled => LedgerStore::Sled(Arc::new(SledStore::open(&config.path)?)),
        };
        info!(backend = ?config.backend, "ledger store opened");

        if config.seed_actors {
            let report = seed::seed_defaults(store.actors().as_ref())?;
            info!(
                inserted = report.inserted,
                skipped = report.skipped,
                "actor directory seeded"
            );
        }
        Ok(store)
    }

    pub fn repository(&self) -> Arc<dyn LoanRepository> {
        match self {
            LedgerStore::Memory(store) => store.clone(),
            LedgerStore::Sled(store) => store.clone(),
        }
    }

    /// Push buffered writes to disk. A no-op for the memory backend.
    pub fn flush(&self) -> Result<(), StoreError> {
        if let LedgerStore::Sled(store) = self {
            store.flush()?;
        }
        Ok(())
    }

    pub fn actors(&self) -> Arc<dyn ActorStore> {
        match self {
            LedgerStore::Memory(store) => store.clone(),
            LedgerStore::Sled(store) => store.clone(),
        }
    }
}
