//! In-memory backend.
//!
//! All tables sit behind one reader/writer lock, so a writer publishes a loan
//! and its investment list together and readers never see one without the other.
use super::{ActorStore, LoanDetails, LoanRepository};
use crate::error::{Entity, StoreError};
use crate::loan::{Investment, Loan};
use crate::types::{Borrower, Employee, Investor};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Default)]
struct Tables {
    loans: HashMap<String, Loan>, // stored without investments
    investments: HashMap<String, Vec<Investment>>, // keyed by loan id
    investors: HashMap<String, Investor>,
    borrowers: HashMap<String, Borrower>,
    employees: HashMap<String, Employee>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn loan_count(&self) -> usize {
        self.tables.read().loans.len()
    }
}

fn split(loan: &Loan) -> (Loan, Vec<Investment>) {
    let mut row = loan.clone();
    let investments = std::mem::take(&mut row.investments);
    (row, investments)
}

impl LoanRepository for MemoryStore {
    fn save(&self, loan: &Loan) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        if tables.loans.contains_key(&loan.id) {
            return Err(StoreError::already_exists(Entity::Loan, &loan.id));
        }

        let (row, investments) = split(loan);
        tables.investments.insert(loan.id.clone(), investments);
        tables.loans.insert(loan.id.clone(), row);
        Ok(())
    }

    fn get_by_id(&self, id: &str) -> Result<LoanDetails, StoreError> {
        let tables = self.tables.read();
        let mut loan = tables
            .loans
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(Entity::Loan, id))?;
        loan.investments = tables.investments.get(id).cloned().unwrap_or_default();

        let investors: BTreeMap<String, Investor> = loan
            .investments
            .iter()
            .filter_map(|inv| tables.investors.get(&inv.investor_id))
            .map(|investor| (investor.id.clone(), investor.clone()))
            .collect();
        let employee = |id: &Option<String>| {
            id.as_ref()
                .and_then(|id| tables.employees.get(id))
                .cloned()
        };

        Ok(LoanDetails {
            borrower: tables.borrowers.get(&loan.borrower_id).cloned(),
            field_validator: employee(&loan.field_validator_id),
            field_officer: employee(&loan.field_officer_id),
            investors,
            loan,
        })
    }

    fn update(&self, loan: &mut Loan) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        let stored = tables
            .loans
            .get(&loan.id)
            .ok_or_else(|| StoreError::not_found(Entity::Loan, &loan.id))?;
        if stored.version != loan.version {
            return Err(StoreError::VersionConflict {
                loan_id: loan.id.clone(),
                expected: loan.version,
                found: stored.version,
            });
        }

        loan.version += 1;
        let (row, investments) = split(loan);
        tables.investments.insert(loan.id.clone(), investments);
        tables.loans.insert(loan.id.clone(), row);
        Ok(())
    }

    fn get_investor_by_id(&self, id: &str) -> Result<Investor, StoreError> {
        self.tables
            .read()
            .investors
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(Entity::Investor, id))
    }

    fn get_employee_by_id(&self, id: &str) -> Result<Employee, StoreError> {
        self.tables
            .read()
            .employees
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(Entity::Employee, id))
    }

    fn get_borrower_by_id(&self, id: &str) -> Result<Borrower, StoreError> {
        self.tables
            .read()
            .borrowers
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(Entity::Borrower, id))
    }
}

impl ActorStore for MemoryStore {
    fn put_borrower(&self, borrower: Borrower) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        if tables.borrowers.contains_key(&borrower.id) {
            return Err(StoreError::already_exists(Entity::Borrower, borrower.id));
        }
        tables.borrowers.insert(borrower.id.clone(), borrower);
        Ok(())
    }

    fn put_investor(&self, investor: Investor) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        if tables.investors.contains_key(&investor.id) {
            return Err(StoreError::already_exists(Entity::Investor, investor.id));
        }
        tables.investors.insert(investor.id.clone(), investor);
        Ok(())
    }

    fn put_employee(&self, employee: Employee) -> Result<(), StoreError> {
        let mut tables = self.tables.write();
        if tables.employees.contains_key(&employee.id) {
            return Err(StoreError::already_exists(Entity::Employee, employee.id));
        }
        tables.employees.insert(employee.id.clone(), employee);
        Ok(())
    }
}
