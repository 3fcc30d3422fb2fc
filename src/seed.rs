//! Default actor directory inserted on first start.
use super::error::StoreError;
use super::store::ActorStore;
use super::types::{Borrower, Employee, Investor};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedReport {
    pub inserted: usize,
    pub skipped: usize,
}

pub fn default_borrowers() -> Vec<Borrower> {
    [
        ("BORR-001", "Hana Wijaya", "3271000001"),
        ("BORR-002", "Marco Bellini", "3271000002"),
        ("BORR-003", "Tomasz Nowak", "3271000003"),
        ("BORR-004", "Priya Raman", "3271000004"),
        ("BORR-005", "Kwame Mensah", "3271000005"),
    ]
    .into_iter()
    .map(|(id, name, nid)| Borrower::new(id, name, nid))
    .collect()
}

pub fn default_employees() -> Vec<Employee> {
    [
        ("EMP-001", "Ines Duarte", "ines.duarte@company.example"),
        ("EMP-002", "Oskar Lind", "oskar.lind@company.example"),
        ("EMP-003", "Mei Tanaka", "mei.tanaka@company.example"),
    ]
    .into_iter()
    .map(|(id, name, email)| Employee::new(id, name, email))
    .collect()
}

pub fn default_investors() -> Vec<Investor> {
    [
        ("INV-001", "Rafael Costa", "rafael@investor.example"),
        ("INV-002", "Aylin Demir", "aylin@investor.example"),
        ("INV-003", "Noah Fischer", "noah@investor.example"),
        ("INV-004", "Zara Ahmed", "zara@investor.example"),
        ("INV-005", "Liam O'Brien", "liam@investor.example"),
    ]
    .into_iter()
    .map(|(id, name, email)| Investor::new(id, name, email))
    .collect()
}

fn tally(report: &mut SeedReport, result: Result<(), StoreError>) -> Result<(), StoreError> {
    match result {
        Ok(()) => report.inserted += 1,
        Err(StoreError::AlreadyExists { .. }) => report.skipped += 1,
        Err(other) => return Err(other),
    }
    Ok(())
}

/// Insert the default directory, leaving records that already exist untouched.
pub fn seed_defaults(actors: &dyn ActorStore) -> Result<SeedReport, StoreError> {
    let mut report = SeedReport::default();
    for borrower in default_borrowers() {
        tally(&mut report, actors.put_borrower(borrower))?;
    }
    for employee in default_employees() {
        tally(&mut report, actors.put_employee(employee))?;
    }
    for investor in default_investors() {
        tally(&mut report, actors.put_investor(investor))?;
    }
    Ok(report)
}
