//! End-to-end lifecycle scenarios, run against both storage backends.
//!
//! The sled runs get their own temporary database each, sled holds a file lock
//! on the directory for as long as the handle lives.
mod common;

use anyhow::Context;
use common::*;
use loan_ledger::error::{Entity, LoanError, ValidationError};
use loan_ledger::store::LedgerStore;
use loan_ledger::LoanState;
use rust_decimal_macros::dec;
use std::sync::Arc;
use tempfile::tempdir;

fn single_investor_funds_loan(store: &LedgerStore) -> anyhow::Result<()> {
    let notifier = Arc::new(RecordingNotifier::default());
    let service = service(store, notifier.clone());

    let loan = service
        .create_loan(BORROWER, dec!(1_000_000), dec!(10), dec!(8))
        .context("Loan Failed on Create: ")?;
    assert_eq!(loan.state, LoanState::Proposed);

    let loan = service
        .approve_loan(&loan.id, VALIDATOR, PROOF_IMAGE.to_vec())
        .context("Loan Failed on Approval: ")?;
    assert_eq!(loan.state, LoanState::Approved);
    assert!(loan.approved_at.is_some());

    let loan = service
        .invest(&loan.id, INVESTORS[0], dec!(1_000_000))
        .context("Loan Failed on Invest: ")?;
    assert_eq!(loan.state, LoanState::Invested);
    assert!(loan.has_agreement_letter());
    assert_eq!(loan.investments.len(), 1);
    assert_eq!(loan.investments[0].amount, dec!(1_000_000));
    assert_eq!(loan.investments[0].investor_id, INVESTORS[0]);

    // what was returned is what was stored
    let details = service.get_loan(&loan.id)?;
    assert_eq!(details.loan, loan);
    assert_eq!(details.borrower.map(|b| b.id).as_deref(), Some(BORROWER));
    assert_eq!(details.field_validator.map(|e| e.id).as_deref(), Some(VALIDATOR));
    assert!(details.investors.contains_key(INVESTORS[0]));

    let sent = notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].recipient, "rafael@investor.example");
    assert_eq!(sent[0].subject, "Loan Agreement");
    let attachment = sent[0].attachment.as_ref().context("agreement not attached")?;
    assert_eq!(Some(&attachment.content), loan.agreement_letter.as_ref());

    Ok(())
}

fn invest_rejects_unapproved_loan_and_bad_amounts(store: &LedgerStore) -> anyhow::Result<()> {
    let service = service(store, Arc::new(RecordingNotifier::default()));
    let proposed = service.create_loan(BORROWER, dec!(500), dec!(10), dec!(8))?;

    let err = service.invest(&proposed.id, INVESTORS[0], dec!(100)).unwrap_err();
    assert!(matches!(
        err,
        LoanError::InvalidTransition {
            expected: LoanState::Approved,
            found: LoanState::Proposed,
            ..
        }
    ));

    let approved = service.approve_loan(&proposed.id, VALIDATOR, PROOF_IMAGE.to_vec())?;
    for amount in [dec!(0), dec!(-25)] {
        let err = service.invest(&approved.id, INVESTORS[0], amount).unwrap_err();
        assert!(matches!(
            err,
            LoanError::Validation(ValidationError::NonPositive("amount", _))
        ));
    }

    assert!(service.get_loan(&approved.id)?.loan.investments.is_empty());
    Ok(())
}

fn disburse_requires_full_funding(store: &LedgerStore) -> anyhow::Result<()> {
    let service = service(store, Arc::new(RecordingNotifier::default()));
    let loan = approved_loan(&service, dec!(1_000))?;
    service.invest(&loan.id, INVESTORS[0], dec!(400))?;

    let err = service
        .disburse_loan(&loan.id, OFFICER, "cash handed over", SIGNED_AGREEMENT.to_vec())
        .unwrap_err();
    assert!(matches!(
        err,
        LoanError::InvalidTransition {
            expected: LoanState::Invested,
            found: LoanState::Approved,
            ..
        }
    ));

    let stored = service.get_loan(&loan.id)?.loan;
    assert_eq!(stored.state, LoanState::Approved);
    assert!(stored.disbursed_at.is_none());
    Ok(())
}

fn full_lifecycle_with_several_investors(store: &LedgerStore) -> anyhow::Result<()> {
    let notifier = Arc::new(RecordingNotifier::default());
    let service = service(store, notifier.clone());
    let loan = approved_loan(&service, dec!(10_000))?;

    let shares = [dec!(2_500.50), dec!(4_000), dec!(3_499.50)];
    let mut last = loan.clone();
    for (investor, amount) in INVESTORS.iter().zip(shares) {
        last = service.invest(&loan.id, investor, amount)?;
    }
    assert_eq!(last.state, LoanState::Invested);
    assert_eq!(last.total_invested(), dec!(10_000));
    assert_eq!(last.remaining(), dec!(0));

    // only the completing investor receives the agreement
    let sent = notifier.sent();
    assert_eq!(sent.len(), 3);
    assert!(sent[..2].iter().all(|n| n.attachment.is_none()));
    assert!(sent[2].attachment.is_some());

    let err = service.invest(&loan.id, INVESTORS[3], dec!(1)).unwrap_err();
    assert!(matches!(err, LoanError::InvalidTransition { .. }));

    let disbursed = service.disburse_loan(&loan.id, OFFICER, "  ", SIGNED_AGREEMENT.to_vec())?;
    assert_eq!(disbursed.state, LoanState::Disbursed);
    assert!(disbursed.state.is_terminal());
    assert!(disbursed.has_signed_agreement());
    assert_eq!(disbursed.disburse_notes, None);
    assert_eq!(disbursed.field_officer_id.as_deref(), Some(OFFICER));

    let err = service
        .disburse_loan(&loan.id, OFFICER, "again", SIGNED_AGREEMENT.to_vec())
        .unwrap_err();
    assert!(matches!(err, LoanError::AlreadyProcessed { step: "disbursed", .. }));

    let err = service
        .approve_loan(&loan.id, VALIDATOR, PROOF_IMAGE.to_vec())
        .unwrap_err();
    assert!(matches!(err, LoanError::AlreadyProcessed { step: "approved", .. }));

    let details = service.get_loan(&loan.id)?;
    assert_eq!(details.loan, disbursed);
    assert_eq!(details.field_officer.clone().map(|e| e.name).as_deref(), Some("Oskar Lind"));
    assert_eq!(details.investors.len(), 3);
    for investment in &details.loan.investments {
        assert!(details.investor_of(investment).is_some());
    }
    Ok(())
}

fn unknown_references_are_not_found(store: &LedgerStore) -> anyhow::Result<()> {
    let service = service(store, Arc::new(RecordingNotifier::default()));

    let err = service
        .create_loan("BORR-404", dec!(100), dec!(10), dec!(8))
        .unwrap_err();
    assert!(matches!(err, LoanError::NotFound { entity: Entity::Borrower, .. }));

    let err = service.get_loan("loan_missing").unwrap_err();
    assert!(matches!(err, LoanError::NotFound { entity: Entity::Loan, .. }));

    let err = service
        .approve_loan("loan_missing", VALIDATOR, PROOF_IMAGE.to_vec())
        .unwrap_err();
    assert!(matches!(err, LoanError::NotFound { entity: Entity::Loan, .. }));

    let loan = approved_loan(&service, dec!(100))?;
    let err = service.invest(&loan.id, "INV-404", dec!(10)).unwrap_err();
    assert!(matches!(err, LoanError::NotFound { entity: Entity::Investor, .. }));

    service.invest(&loan.id, INVESTORS[0], dec!(100))?;
    let err = service
        .disburse_loan(&loan.id, "EMP-404", "", SIGNED_AGREEMENT.to_vec())
        .unwrap_err();
    assert!(matches!(err, LoanError::NotFound { entity: Entity::Employee, .. }));
    Ok(())
}

#[test]
fn single_investor_funds_loan_in_memory() -> anyhow::Result<()> {
    single_investor_funds_loan(&memory_store()?)
}

#[test]
fn single_investor_funds_loan_on_sled() -> anyhow::Result<()> {
    let dir = tempdir()?;
    single_investor_funds_loan(&sled_store(dir.path())?)
}

#[test]
fn invest_rejects_unapproved_loan_and_bad_amounts_in_memory() -> anyhow::Result<()> {
    invest_rejects_unapproved_loan_and_bad_amounts(&memory_store()?)
}

#[test]
fn invest_rejects_unapproved_loan_and_bad_amounts_on_sled() -> anyhow::Result<()> {
    let dir = tempdir()?;
    invest_rejects_unapproved_loan_and_bad_amounts(&sled_store(dir.path())?)
}

#[test]
fn disburse_requires_full_funding_in_memory() -> anyhow::Result<()> {
    disburse_requires_full_funding(&memory_store()?)
}

#[test]
fn disburse_requires_full_funding_on_sled() -> anyhow::Result<()> {
    let dir = tempdir()?;
    disburse_requires_full_funding(&sled_store(dir.path())?)
}

#[test]
fn full_lifecycle_with_several_investors_in_memory() -> anyhow::Result<()> {
    full_lifecycle_with_several_investors(&memory_store()?)
}

#[test]
fn full_lifecycle_with_several_investors_on_sled() -> anyhow::Result<()> {
    let dir = tempdir()?;
    full_lifecycle_with_several_investors(&sled_store(dir.path())?)
}

#[test]
fn unknown_references_are_not_found_in_memory() -> anyhow::Result<()> {
    unknown_references_are_not_found(&memory_store()?)
}

#[test]
fn unknown_references_are_not_found_on_sled() -> anyhow::Result<()> {
    let dir = tempdir()?;
    unknown_references_are_not_found(&sled_store(dir.path())?)
}

#[test]
fn failed_notification_does_not_undo_investment() -> anyhow::Result<()> {
    let store = memory_store()?;
    let service = service(&store, Arc::new(FailingNotifier));
    let loan = approved_loan(&service, dec!(100))?;

    let loan = service
        .invest(&loan.id, INVESTORS[0], dec!(100))
        .context("notification failure leaked out of invest")?;
    assert_eq!(loan.state, LoanState::Invested);
    assert_eq!(service.get_loan(&loan.id)?.loan.state, LoanState::Invested);
    Ok(())
}

#[test]
fn failed_agreement_keeps_loan_open_for_retry() -> anyhow::Result<()> {
    let store = memory_store()?;
    let broken = loan_ledger::LoanService::new(
        store.repository(),
        Arc::new(FailingDocuments),
        Arc::new(RecordingNotifier::default()),
    );
    let loan = approved_loan(&broken, dec!(100))?;
    broken.invest(&loan.id, INVESTORS[0], dec!(40))?;

    let err = broken.invest(&loan.id, INVESTORS[1], dec!(60)).unwrap_err();
    assert!(matches!(err, LoanError::ArtifactGeneration { .. }));
    let stored = broken.get_loan(&loan.id)?.loan;
    assert_eq!(stored.state, LoanState::Approved);
    assert_eq!(stored.total_invested(), dec!(40));

    // a healthy service over the same store can finish the funding
    let healthy = service(&store, Arc::new(RecordingNotifier::default()));
    let funded = healthy.invest(&loan.id, INVESTORS[1], dec!(60))?;
    assert_eq!(funded.state, LoanState::Invested);
    Ok(())
}

#[test]
fn sled_ledger_survives_reopen() -> anyhow::Result<()> {
    let dir = tempdir()?;
    let loan_id = {
        let store = sled_store(dir.path())?;
        let service = service(&store, Arc::new(RecordingNotifier::default()));
        let loan = approved_loan(&service, dec!(300))?;
        service.invest(&loan.id, INVESTORS[0], dec!(100))?;
        service.invest(&loan.id, INVESTORS[1], dec!(200))?;
        store.flush()?;
        loan.id
    };

    // seeding again on reopen must not fail on the existing directory
    let store = sled_store(dir.path())?;
    let service = service(&store, Arc::new(RecordingNotifier::default()));
    let loan = service.get_loan(&loan_id)?.loan;
    assert_eq!(loan.state, LoanState::Invested);
    let order: Vec<_> = loan.investments.iter().map(|i| i.investor_id.as_str()).collect();
    assert_eq!(order, [INVESTORS[0], INVESTORS[1]]);

    let disbursed = service.disburse_loan(&loan_id, OFFICER, "paid out", SIGNED_AGREEMENT.to_vec())?;
    assert_eq!(disbursed.disburse_notes.as_deref(), Some("paid out"));
    Ok(())
}
