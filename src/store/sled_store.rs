//! Durable backend on sled.
//!
//! Each table is its own tree holding CBOR rows: `borrowers`, `investors`,
//! `employees`, `loans` and `investments`. Investment rows are keyed
//! `<loan_id>/<position>`, and the loan row records how many positions it owns.
//! Foreign keys are checked before every write. The loan row and its
//! investment rows are read and written inside one transaction.
use super::{ActorStore, LoanDetails, LoanRepository};
use crate::error::{Entity, StoreError};
use crate::loan::{Investment, Loan, LoanState};
use crate::types::{Borrower, Employee, Investor, TimeStamp};
use chrono::Utc;
use rust_decimal::Decimal;
use sled::transaction::{ConflictableTransactionError, TransactionError};
use sled::{IVec, Transactional, Tree};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

#[derive(Debug, minicbor::Encode, minicbor::Decode)]
struct LoanRow {
    #[n(0)]
    id: String,
    #[n(1)]
    state: LoanState,
    #[n(2)]
    principal: [u8; 16], // rust_decimal serialized form
    #[n(3)]
    rate: [u8; 16],
    #[n(4)]
    roi: [u8; 16],
    #[n(5)]
    created_at: TimeStamp<Utc>,
    #[n(6)]
    approved_at: Option<TimeStamp<Utc>>,
    #[n(7)]
    disbursed_at: Option<TimeStamp<Utc>>,
    #[n(8)]
    borrower_id: String,
    #[n(9)]
    field_validator_id: Option<String>,
    #[n(10)]
    field_officer_id: Option<String>,
    #[n(11)]
    proof_image: Option<Vec<u8>>,
    #[n(12)]
    agreement_letter: Option<Vec<u8>>,
    #[n(13)]
    signed_agreement: Option<Vec<u8>>,
    #[n(14)]
    disburse_notes: Option<String>,
    #[n(15)]
    investment_count: u32,
    #[n(16)]
    version: u64,
}

#[derive(Debug, minicbor::Encode, minicbor::Decode)]
struct InvestmentRow {
    #[n(0)]
    id: String,
    #[n(1)]
    loan_id: String,
    #[n(2)]
    investor_id: String,
    #[n(3)]
    amount: [u8; 16],
    #[n(4)]
    created_at: TimeStamp<Utc>,
}

impl LoanRow {
    fn from_loan(loan: &Loan) -> Self {
        Self {
            id: loan.id.clone(),
            state: loan.state,
            principal: loan.principal.serialize(),
            rate: loan.rate.serialize(),
            roi: loan.roi.serialize(),
            created_at: loan.created_at.clone(),
            approved_at: loan.approved_at.clone(),
            disbursed_at: loan.disbursed_at.clone(),
            borrower_id: loan.borrower_id.clone(),
            field_validator_id: loan.field_validator_id.clone(),
            field_officer_id: loan.field_officer_id.clone(),
            proof_image: loan.proof_image.clone(),
            agreement_letter: loan.agreement_letter.clone(),
            signed_agreement: loan.signed_agreement.clone(),
            disburse_notes: loan.disburse_notes.clone(),
            investment_count: loan.investments.len() as u32,
            version: loan.version,
        }
    }

    fn into_loan(self, investments: Vec<Investment>) -> Loan {
        Loan {
            id: self.id,
            state: self.state,
            principal: Decimal::deserialize(self.principal),
            rate: Decimal::deserialize(self.rate),
            roi: Decimal::deserialize(self.roi),
            created_at: self.created_at,
            approved_at: self.approved_at,
            disbursed_at: self.disbursed_at,
            borrower_id: self.borrower_id,
            field_validator_id: self.field_validator_id,
            field_officer_id: self.field_officer_id,
            proof_image: self.proof_image,
            agreement_letter: self.agreement_letter,
            signed_agreement: self.signed_agreement,
            disburse_notes: self.disburse_notes,
            investments,
            version: self.version,
        }
    }
}

impl From<&Investment> for InvestmentRow {
    fn from(inv: &Investment) -> Self {
        Self {
            id: inv.id.clone(),
            loan_id: inv.loan_id.clone(),
            investor_id: inv.investor_id.clone(),
            amount: inv.amount.serialize(),
            created_at: inv.created_at.clone(),
        }
    }
}

impl From<InvestmentRow> for Investment {
    fn from(row: InvestmentRow) -> Self {
        Self {
            id: row.id,
            loan_id: row.loan_id,
            investor_id: row.investor_id,
            amount: Decimal::deserialize(row.amount),
            created_at: row.created_at,
        }
    }
}

fn investment_key(loan_id: &str, position: u32) -> String {
    format!("{loan_id}/{position:08}")
}

fn encode_row<T: minicbor::Encode<()>>(table: &'static str, row: &T) -> Result<IVec, StoreError> {
    minicbor::to_vec(row)
        .map(IVec::from)
        .map_err(|e| StoreError::Encode(table, e.to_string()))
}

fn decode_row<T>(table: &'static str, bytes: &[u8]) -> Result<T, StoreError>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    minicbor::decode(bytes).map_err(|e| StoreError::Decode(table, e.to_string()))
}

fn abort(err: StoreError) -> ConflictableTransactionError<StoreError> {
    ConflictableTransactionError::Abort(err)
}

fn from_tx(err: TransactionError<StoreError>) -> StoreError {
    match err {
        TransactionError::Abort(err) => err,
        TransactionError::Storage(err) => StoreError::Backend(err),
    }
}

fn investment_rows(loan: &Loan) -> Result<Vec<(String, IVec)>, StoreError> {
    loan.investments
        .iter()
        .enumerate()
        .map(|(position, inv)| {
            let row = encode_row("investment", &InvestmentRow::from(inv))?;
            Ok((investment_key(&loan.id, position as u32), row))
        })
        .collect()
}

pub struct SledStore {
    db: sled::Db,
    loans: Tree,
    investments: Tree,
    investors: Tree,
    borrowers: Tree,
    employees: Tree,
}

impl SledStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Self::new(sled::open(path)?)
    }

    pub fn new(db: sled::Db) -> Result<Self, StoreError> {
        Ok(Self {
            loans: db.open_tree("loans")?,
            investments: db.open_tree("investments")?,
            investors: db.open_tree("investors")?,
            borrowers: db.open_tree("borrowers")?,
            employees: db.open_tree("employees")?,
            db,
        })
    }

    /// Block until all pending writes are on disk.
    pub fn flush(&self) -> Result<usize, StoreError> {
        Ok(self.db.flush()?)
    }

    fn lookup<T>(tree: &Tree, table: &'static str, id: &str) -> Result<Option<T>, StoreError>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        tree.get(id.as_bytes())?
            .map(|bytes| decode_row(table, &bytes))
            .transpose()
    }

    fn insert_new<T: minicbor::Encode<()>>(
        tree: &Tree,
        entity: Entity,
        table: &'static str,
        id: &str,
        row: &T,
    ) -> Result<(), StoreError> {
        let bytes = encode_row(table, row)?;
        tree.compare_and_swap(id.as_bytes(), None::<&[u8]>, Some(bytes))?
            .map_err(|_| StoreError::already_exists(entity, id))
    }

    // every id the aggregate points at must already exist
    fn ensure_references(&self, loan: &Loan) -> Result<(), StoreError> {
        let missing = |entity: Entity, id: &str| StoreError::MissingReference {
            entity,
            id: id.to_owned(),
            loan_id: loan.id.clone(),
        };

        if !self.borrowers.contains_key(loan.borrower_id.as_bytes())? {
            return Err(missing(Entity::Borrower, &loan.borrower_id));
        }
        for id in loan.field_validator_id.iter().chain(&loan.field_officer_id) {
            if !self.employees.contains_key(id.as_bytes())? {
                return Err(missing(Entity::Employee, id));
            }
        }
        for inv in &loan.investments {
            if !self.investors.contains_key(inv.investor_id.as_bytes())? {
                return Err(missing(Entity::Investor, &inv.investor_id));
            }
        }
        Ok(())
    }
}

impl LoanRepository for SledStore {
    fn save(&self, loan: &Loan) -> Result<(), StoreError> {
        self.ensure_references(loan)?;
        let row = encode_row("loan", &LoanRow::from_loan(loan))?;
        let rows = investment_rows(loan)?;

        (&self.loans, &self.investments)
            .transaction(|(loans, investments)| {
                if loans.get(loan.id.as_bytes())?.is_some() {
                    return Err(abort(StoreError::already_exists(Entity::Loan, &loan.id)));
                }
                loans.insert(loan.id.as_bytes(), row.clone())?;
                for (key, value) in &rows {
                    investments.insert(key.as_bytes(), value.clone())?;
                }
                Ok(())
            })
            .map_err(from_tx)?;

        debug!(loan_id = %loan.id, "loan row inserted");
        Ok(())
    }

    fn get_by_id(&self, id: &str) -> Result<LoanDetails, StoreError> {
        let (row, rows) = (&self.loans, &self.investments)
            .transaction(|(loans, investments)| {
                let bytes = loans
                    .get(id.as_bytes())?
                    .ok_or_else(|| abort(StoreError::not_found(Entity::Loan, id)))?;
                let row: LoanRow = decode_row("loan", &bytes).map_err(abort)?;

                let mut rows = Vec::with_capacity(row.investment_count as usize);
                for position in 0..row.investment_count {
                    let key = investment_key(id, position);
                    let bytes = investments.get(key.as_bytes())?.ok_or_else(|| {
                        abort(StoreError::Decode("investment", format!("missing row {key}")))
                    })?;
                    rows.push(decode_row::<InvestmentRow>("investment", &bytes).map_err(abort)?);
                }
                Ok((row, rows))
            })
            .map_err(from_tx)?;

        let loan = row.into_loan(rows.into_iter().map(Investment::from).collect());

        let mut investors = BTreeMap::new();
        for inv in &loan.investments {
            if let Some(investor) =
                Self::lookup::<Investor>(&self.investors, "investor", &inv.investor_id)?
            {
                investors.insert(investor.id.clone(), investor);
            }
        }
        let employee = |id: &Option<String>| match id {
            Some(id) => Self::lookup::<Employee>(&self.employees, "employee", id),
            None => Ok(None),
        };

        Ok(LoanDetails {
            borrower: Self::lookup(&self.borrowers, "borrower", &loan.borrower_id)?,
            field_validator: employee(&loan.field_validator_id)?,
            field_officer: employee(&loan.field_officer_id)?,
            investors,
            loan,
        })
    }

    fn update(&self, loan: &mut Loan) -> Result<(), StoreError> {
        self.ensure_references(loan)?;
        let expected = loan.version;
        let mut next = LoanRow::from_loan(loan);
        next.version = expected + 1;
        let row = encode_row("loan", &next)?;
        let rows = investment_rows(loan)?;
        let loan_id = loan.id.as_str();

        (&self.loans, &self.investments)
            .transaction(|(loans, investments)| {
                let bytes = loans
                    .get(loan_id.as_bytes())?
                    .ok_or_else(|| abort(StoreError::not_found(Entity::Loan, loan_id)))?;
                let stored: LoanRow = decode_row("loan", &bytes).map_err(abort)?;
                if stored.version != expected {
                    return Err(abort(StoreError::VersionConflict {
                        loan_id: loan_id.to_owned(),
                        expected,
                        found: stored.version,
                    }));
                }

                for position in 0..stored.investment_count {
                    investments.remove(investment_key(loan_id, position).as_bytes())?;
                }
                for (key, value) in &rows {
                    investments.insert(key.as_bytes(), value.clone())?;
                }
                loans.insert(loan_id.as_bytes(), row.clone())?;
                Ok(())
            })
            .map_err(from_tx)?;

        loan.version = expected + 1;
        debug!(loan_id = %loan.id, version = loan.version, "loan row replaced");
        Ok(())
    }

    fn get_investor_by_id(&self, id: &str) -> Result<Investor, StoreError> {
        Self::lookup(&self.investors, "investor", id)?
            .ok_or_else(|| StoreError::not_found(Entity::Investor, id))
    }

    fn get_employee_by_id(&self, id: &str) -> Result<Employee, StoreError> {
        Self::lookup(&self.employees, "employee", id)?
            .ok_or_else(|| StoreError::not_found(Entity::Employee, id))
    }

    fn get_borrower_by_id(&self, id: &str) -> Result<Borrower, StoreError> {
        Self::lookup(&self.borrowers, "borrower", id)?
            .ok_or_else(|| StoreError::not_found(Entity::Borrower, id))
    }
}

impl ActorStore for SledStore {
    fn put_borrower(&self, borrower: Borrower) -> Result<(), StoreError> {
        Self::insert_new(&self.borrowers, Entity::Borrower, "borrower", &borrower.id, &borrower)
    }

    fn put_investor(&self, investor: Investor) -> Result<(), StoreError> {
        Self::insert_new(&self.investors, Entity::Investor, "investor", &investor.id, &investor)
    }

    fn put_employee(&self, employee: Employee) -> Result<(), StoreError> {
        Self::insert_new(&self.employees, Entity::Employee, "employee", &employee.id, &employee)
    }
}
