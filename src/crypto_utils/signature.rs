use hmac::{Hmac, Mac};
use sha2::Sha512;
use subtle::ConstantTimeEq;

use crate::error::{AppError, AppResult};

type HmacSha512 = Hmac<Sha512>;

/// HMAC-SHA512 signature generation and verification
pub struct HmacSignature;

impl HmacSignature {
    /// Generate HMAC-SHA512 signature
    pub fn sign(message: &[u8], secret: &[u8]) -> AppResult<Vec<u8>> {
        let mut mac = HmacSha512::new_from_slice(secret)
            .map_err(|e| AppError::Internal(format!("HMAC initialization failed: {}", e)))?;

        mac.update(message);
        Ok(mac.finalize().into_bytes().to_vec())
    }

    /// Generate HMAC-SHA512 signature as lowercase hex (128 characters)
    pub fn sign_hex(message: &[u8], secret: &[u8]) -> AppResult<String> {
        let signature = Self::sign(message, secret)?;
        Ok(hex::encode(signature))
    }

    /// Verify a hex signature by exact, case-sensitive comparison with the
    /// recomputed digest.
    pub fn verify_hex(message: &[u8], signature_hex: &str, secret: &[u8]) -> AppResult<bool> {
        let expected = Self::sign_hex(message, secret)?;
        Ok(constant_time_eq(&expected, signature_hex))
    }
}

/// Constant-time string comparison. Length differences short-circuit.
pub fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }

    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hmac_hex_length() {
        let signature_hex = HmacSignature::sign_hex(b"test message", b"secret key").unwrap();
        assert_eq!(signature_hex.len(), 128);
        assert!(signature_hex.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn test_hmac_known_vector() {
        // RFC 4231 test case 2
        let signature_hex =
            HmacSignature::sign_hex(b"what do ya want for nothing?", b"Jefe").unwrap();
        assert_eq!(
            signature_hex,
            "164b7a7bfcf819e2e395fbe73b56e0a387bd64222e831fd610270cd7ea2505549758bf75c05a994a6d034f65f8f0e6fdcaeab1a34d4a6b4b636e070a38bce737"
        );
    }

    #[test]
    fn test_hmac_verify_hex() {
        let message = b"test message";
        let secret = b"secret key";

        let signature_hex = HmacSignature::sign_hex(message, secret).unwrap();
        assert!(HmacSignature::verify_hex(message, &signature_hex, secret).unwrap());
        assert!(!HmacSignature::verify_hex(message, &signature_hex, b"other key").unwrap());
    }

    #[test]
    fn test_verify_is_case_sensitive() {
        let message = b"test message";
        let secret = b"secret key";

        let upper = HmacSignature::sign_hex(message, secret).unwrap().to_uppercase();
        assert!(!HmacSignature::verify_hex(message, &upper, secret).unwrap());
    }

    #[test]
    fn test_constant_time_eq() {
        assert!(constant_time_eq("abc", "abc"));
        assert!(constant_time_eq("", ""));
        assert!(!constant_time_eq("abc", "abd"));
        assert!(!constant_time_eq("abc", "ab"));
        assert!(!constant_time_eq("abc", "ABC"));
    }
}
