//! Loan lifecycle and investment ledger.
//!
//! A loan is proposed for a borrower, approved after a field visit, funded by
//! one or more investors and finally disbursed. [`service::LoanService`] drives
//! every transition; [`store`] persists the aggregate behind a repository port.
pub mod config;
pub mod documents;
pub mod error;
pub mod loan;
pub mod locks;
pub mod notify;
pub mod seed;
pub mod service;
pub mod store;
pub mod telemetry;
pub mod types;
pub mod utils;

pub use error::{LoanError, StoreError, ValidationError};
pub use loan::{Investment, Loan, LoanState};
pub use service::LoanService;
