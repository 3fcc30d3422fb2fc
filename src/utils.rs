//! Identifier generation

use bech32::Bech32m;
use uuid7::uuid7;

/// Human readable prefix for loan identifiers.
pub const LOAN_PREFIX: &str = "loan_";
/// Human readable prefix for investment identifiers.
pub const INVESTMENT_PREFIX: &str = "inv_";

// construct a unique time-ordered id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}
