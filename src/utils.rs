//! Identifier helpers

use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?;
    Ok(encode)
}

/// Same scheme with the failure folded away. The prefixes the crate hands in
/// here are compile-time constants that are always valid bech32 HRPs; a bad
/// caller-supplied prefix falls back to the bare uuid string.
pub fn new_id(hrp: &str) -> String {
    new_uuid_to_bech32(hrp).unwrap_or_else(|_| uuid7().to_string())
}
