//! Agreement documents handed to investors once a loan is fully funded.
use super::types::TimeStamp;
use rust_decimal::Decimal;

pub trait DocumentGenerator: Send + Sync {
    /// Render the agreement for `investor_name` committing `amount` to `loan_id`.
    fn generate_agreement(
        &self,
        loan_id: &str,
        investor_name: &str,
        amount: Decimal,
    ) -> anyhow::Result<Vec<u8>>;
}

/// Plain-text agreement stamped with a SHA-256 fingerprint of its terms.
#[derive(Debug, Default, Clone, Copy)]
pub struct TextAgreementGenerator;

impl TextAgreementGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn fingerprint(loan_id: &str, investor_name: &str, amount: Decimal) -> String {
        let terms = format!("{loan_id}|{investor_name}|{}", amount.normalize());
        sha256::digest(terms)
    }
}

impl DocumentGenerator for TextAgreementGenerator {
    fn generate_agreement(
        &self,
        loan_id: &str,
        investor_name: &str,
        amount: Decimal,
    ) -> anyhow::Result<Vec<u8>> {
        if loan_id.trim().is_empty() {
            anyhow::bail!("agreement requires a loan id");
        }
        if investor_name.trim().is_empty() {
            anyhow::bail!("agreement for loan {loan_id} requires an investor name");
        }

        let document = format!(
            "LOAN AGREEMENT\n\
             \n\
             This agreement certifies that investor {investor_name} has committed {amount:.2} to loan {loan_id}.\n\
             \n\
             Issued: {issued}\n\
             Fingerprint: {fingerprint}\n",
            issued = TimeStamp::new(),
            fingerprint = Self::fingerprint(loan_id, investor_name, amount),
        );
        Ok(document.into_bytes())
    }
}
