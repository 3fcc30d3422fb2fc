//! Walk one loan through its whole lifecycle.
//!
//! ```text
//! LEDGER_CONFIG=ledger.toml cargo run --example walkthrough
//! ```
//!
//! Without a config file the ledger runs in memory with the default actors.
use anyhow::Context;
use loan_ledger::config::LedgerConfig;
use loan_ledger::service::LoanService;
use loan_ledger::store::LedgerStore;
use loan_ledger::telemetry;
use rust_decimal::Decimal;

fn main() -> anyhow::Result<()> {
    let config = LedgerConfig::load().context("loading config")?;
    telemetry::init_tracing(&config.logging)?;

    let store = LedgerStore::open(&config.storage).context("opening ledger store")?;
    let service = LoanService::from_store(&store, &config.notifications);

    let loan = service.create_loan(
        "BORR-001",
        Decimal::new(1_000_000, 0),
        Decimal::new(10, 0),
        Decimal::new(8, 0),
    )?;
    service.approve_loan(&loan.id, "EMP-001", b"field-visit.jpg".to_vec())?;

    // two investors split the principal, the second one completes it
    service.invest(&loan.id, "INV-001", Decimal::new(400_000, 0))?;
    service.invest(&loan.id, "INV-002", Decimal::new(600_000, 0))?;

    service.disburse_loan(
        &loan.id,
        "EMP-002",
        "funds transferred to borrower account",
        b"signed-agreement.pdf".to_vec(),
    )?;
    store.flush()?;

    let details = service.get_loan(&loan.id)?;
    let loan = &details.loan;
    println!("loan {} is {}", loan.id, loan.state);
    let interest = loan
        .interest_amount()
        .map_or_else(|| "out of range".to_owned(), |i| i.to_string());
    println!("  principal {} at {}% (interest {interest})", loan.principal, loan.rate);
    for investment in &loan.investments {
        let name = details
            .investor_of(investment)
            .map(|i| i.name.as_str())
            .unwrap_or("unknown investor");
        let profit = loan
            .investor_profit(investment.amount)
            .map_or_else(|| "out of range".to_owned(), |p| p.to_string());
        println!("  {name} invested {} and earns {profit}", investment.amount);
    }
    if let Some(officer) = &details.field_officer {
        println!("  disbursed by {}", officer.name);
    }
    Ok(())
}
