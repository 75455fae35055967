use alloy_primitives::{Address, B256, Signature};
use alloy_sol_types::{SolStruct, eip712_domain};
use axum::http::StatusCode;
use axum::response::IntoResponse;

alloy_sol_types::sol! {
    struct CompetitionClaim {
        address account;
        string nonce;
        string issuedAt;
    }
}

/// Max age of a signed claim, in seconds.
const CLAIM_MAX_AGE_SECS: i64 = 300;
/// Tolerated clock skew for claims issued "in the future".
const CLAIM_MAX_SKEW_SECS: i64 = 60;

/// EIP-712 domain for competition claims on Arbitrum.
fn domain() -> alloy_sol_types::Eip712Domain {
    eip712_domain! {
        name: "GMX Ladder",
        version: "1",
        chain_id: 42161,
        verifying_contract: Address::ZERO,
    }
}

#[derive(Debug, PartialEq, Eq)]
pub enum AuthError {
    InvalidAddress,
    InvalidSignature,
    NonceMismatch,
    Expired,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        let msg = match self {
            Self::InvalidAddress => "invalid address",
            Self::InvalidSignature => "invalid signature",
            Self::NonceMismatch => "nonce mismatch",
            Self::Expired => "expired",
        };
        (StatusCode::UNAUTHORIZED, msg).into_response()
    }
}

/// Checks `issued_at` (RFC 3339) is no older than five minutes relative to `now`.
pub fn check_issued_at(
    issued_at: &str,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<(), AuthError> {
    let issued: chrono::DateTime<chrono::Utc> = issued_at
        .parse()
        .map_err(|_| AuthError::InvalidSignature)?;
    let age = (now - issued).num_seconds();
    if age > CLAIM_MAX_AGE_SECS || age < -CLAIM_MAX_SKEW_SECS {
        return Err(AuthError::Expired);
    }
    Ok(())
}

/// Hash the wallet signs for a claim.
pub fn claim_signing_hash(account: Address, nonce: &str, issued_at: &str) -> B256 {
    let claim = CompetitionClaim {
        account,
        nonce: nonce.to_string(),
        issuedAt: issued_at.to_string(),
    };
    claim.eip712_signing_hash(&domain())
}

/// Recovers the signer of an EIP-712 `CompetitionClaim` and verifies it matches `address`.
pub fn recover_claim_signer(
    address: &str,
    nonce: &str,
    issued_at: &str,
    signature_hex: &str,
    now: chrono::DateTime<chrono::Utc>,
) -> Result<Address, AuthError> {
    let claimed: Address = address
        .trim()
        .to_lowercase()
        .parse()
        .map_err(|_| AuthError::InvalidAddress)?;

    check_issued_at(issued_at, now)?;

    let signing_hash = claim_signing_hash(claimed, nonce, issued_at);

    let sig_hex = signature_hex.strip_prefix("0x").unwrap_or(signature_hex);
    let sig_bytes = hex::decode(sig_hex).map_err(|_| AuthError::InvalidSignature)?;
    if sig_bytes.len() != 65 {
        return Err(AuthError::InvalidSignature);
    }

    // r || s || v
    let sig = Signature::from_raw(&sig_bytes).map_err(|_| AuthError::InvalidSignature)?;
    let recovered = sig
        .recover_address_from_prehash(&signing_hash)
        .map_err(|_| AuthError::InvalidSignature)?;

    if recovered != claimed {
        return Err(AuthError::InvalidSignature);
    }

    Ok(recovered)
}
