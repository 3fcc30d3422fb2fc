//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use loan_ledger::config::{StorageBackend, StorageConfig};
use loan_ledger::documents::{DocumentGenerator, TextAgreementGenerator};
use loan_ledger::notify::{Notification, Notifier};
use loan_ledger::store::LedgerStore;
use loan_ledger::{Loan, LoanService};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::path::Path;
use std::sync::Arc;

// ids from the seeded actor directory
pub const BORROWER: &str = "BORR-001";
pub const VALIDATOR: &str = "EMP-001";
pub const OFFICER: &str = "EMP-002";
pub const INVESTORS: [&str; 5] = ["INV-001", "INV-002", "INV-003", "INV-004", "INV-005"];

pub const PROOF_IMAGE: &[u8] = b"\x89PNG field visit";
pub const SIGNED_AGREEMENT: &[u8] = b"%PDF signed by borrower";

/// Keeps every notification so tests can inspect what investors were told.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        self.sent.lock().push(notification.clone());
        Ok(())
    }
}

pub struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn notify(&self, notification: &Notification) -> anyhow::Result<()> {
        anyhow::bail!("mail relay refused {}", notification.recipient)
    }
}

pub struct FailingDocuments;

impl DocumentGenerator for FailingDocuments {
    fn generate_agreement(&self, loan_id: &str, _: &str, _: Decimal) -> anyhow::Result<Vec<u8>> {
        anyhow::bail!("template missing for {loan_id}")
    }
}

pub fn memory_store() -> anyhow::Result<LedgerStore> {
    Ok(LedgerStore::open(&StorageConfig {
        backend: StorageBackend::Memory,
        ..StorageConfig::default()
    })?)
}

pub fn sled_store(dir: &Path) -> anyhow::Result<LedgerStore> {
    Ok(LedgerStore::open(&StorageConfig {
        backend: StorageBackend::Sled,
        path: dir.join("ledger.db"),
        seed_actors: true,
    })?)
}

pub fn service(store: &LedgerStore, notifier: Arc<dyn Notifier>) -> LoanService {
    LoanService::new(
        store.repository(),
        Arc::new(TextAgreementGenerator::new()),
        notifier,
    )
}

/// A loan created and approved by the seeded validator.
pub fn approved_loan(service: &LoanService, principal: Decimal) -> anyhow::Result<Loan> {
    let loan = service.create_loan(BORROWER, principal, dec!(10), dec!(8))?;
    Ok(service.approve_loan(&loan.id, VALIDATOR, PROOF_IMAGE.to_vec())?)
}
