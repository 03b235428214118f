use drand_verify::Pubkey;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Quicknet public key (G2, 96 bytes), hex encoded.
/// Network: drand quicknet (bls-unchained-g1-rfc9380)
pub const QUICKNET_PK_HEX: &str = "83cf0f2896adee7eb8b5f01fcad3912212c437e0073e911fb90022d3e760183c8c4b450b6a0a6c3ac6a5776a2d1064510d1fec758c921cc22b0e17e63aaf4bcb5ed66304de9cf809bd274ca73bab4af5a6e9c76a4bc09e76eae8991ef5ece45a";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    #[error("invalid pubkey length (expected 96 bytes)")]
    InvalidPubkeyLength,

    #[error("invalid pubkey (failed to parse G2 point)")]
    InvalidPubkey,

    #[error("verification failed: {0}")]
    VerificationFailed(String),

    #[error("invalid BLS signature")]
    InvalidSignature,
}

/// Verify a quicknet drand beacon and derive randomness.
///
/// Returns 32-byte randomness = sha256(signature) on success.
pub fn verify_quicknet_beacon(
    pubkey_bytes: &[u8],
    round: u64,
    signature: &[u8],
) -> Result<[u8; 32], VerifyError> {
    let pk_fixed: [u8; 96] = pubkey_bytes
        .try_into()
        .map_err(|_| VerifyError::InvalidPubkeyLength)?;

    // Quicknet signs on G1 with the RFC 9380 hash-to-curve suite
    let pk = drand_verify::G2PubkeyRfc::from_fixed(pk_fixed)
        .map_err(|_| VerifyError::InvalidPubkey)?;

    // Unchained: no previous signature
    let is_valid = pk
        .verify(round, &[], signature)
        .map_err(|e| VerifyError::VerificationFailed(format!("{:?}", e)))?;

    if !is_valid {
        return Err(VerifyError::InvalidSignature);
    }

    Ok(Sha256::digest(signature).into())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Real quicknet test vector
    const TEST_ROUND: u64 = 1000;
    const TEST_SIG_HEX: &str = "b44679b9a59af2ec876b1a6b1ad52ea9b1615fc3982b19576350f93447cb1125e342b73a8dd2bacbe47e4b6b63ed5e39";
    const TEST_RANDOMNESS_HEX: &str =
        "fe290beca10872ef2fb164d2aa4442de4566183ec51c56ff3cd603d930e54fdd";

    #[test]
    fn test_verify_quicknet_beacon_valid() {
        let pk_bytes = hex::decode(QUICKNET_PK_HEX).unwrap();
        let sig_bytes = hex::decode(TEST_SIG_HEX).unwrap();

        let randomness = verify_quicknet_beacon(&pk_bytes, TEST_ROUND, &sig_bytes).unwrap();
        assert_eq!(hex::encode(randomness), TEST_RANDOMNESS_HEX);
    }

    #[test]
    fn test_tampered_signature_fails() {
        let pk_bytes = hex::decode(QUICKNET_PK_HEX).unwrap();
        let mut sig_bytes = hex::decode(TEST_SIG_HEX).unwrap();
        sig_bytes[0] ^= 0xFF;

        assert!(verify_quicknet_beacon(&pk_bytes, TEST_ROUND, &sig_bytes).is_err());
    }

    #[test]
    fn test_wrong_round_fails() {
        let pk_bytes = hex::decode(QUICKNET_PK_HEX).unwrap();
        let sig_bytes = hex::decode(TEST_SIG_HEX).unwrap();

        assert!(verify_quicknet_beacon(&pk_bytes, TEST_ROUND + 1, &sig_bytes).is_err());
    }

    #[test]
    fn test_short_pubkey_rejected() {
        let sig_bytes = hex::decode(TEST_SIG_HEX).unwrap();
        let result = verify_quicknet_beacon(&[0u8; 48], TEST_ROUND, &sig_bytes);
        assert_eq!(result, Err(VerifyError::InvalidPubkeyLength));
    }
}
