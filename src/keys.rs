use secp256k1::{global::SECP256K1, rand, Keypair, XOnlyPublicKey};
use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SecretKeyError {
    #[error("secret key should be 64-char hex, got {0} chars")]
    InvalidLength(usize),

    #[error("invalid hex encoding")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("invalid secret key")]
    InvalidSecretKey,
}

#[derive(Error, Debug)]
pub enum PubKeyError {
    #[error("invalid hex encoding")]
    InvalidHex(#[from] hex::FromHexError),

    #[error("invalid public key length: expected 32 bytes, got {0}")]
    InvalidLength(usize),
}

/// a 32-byte secret key, always a valid secp256k1 scalar
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct SecretKey([u8; 32]);

impl SecretKey {
    /// generate a new random secret key
    pub fn generate() -> Self {
        let keypair = Keypair::new(SECP256K1, &mut rand::thread_rng());
        SecretKey(keypair.secret_bytes())
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self, SecretKeyError> {
        // ensure it is in the curve
        let _ = secp256k1::SecretKey::from_slice(&bytes)
            .map_err(|_| SecretKeyError::InvalidSecretKey)?;

        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn from_hex(hex_str: &str) -> Result<Self, SecretKeyError> {
        if hex_str.len() != 64 {
            return Err(SecretKeyError::InvalidLength(hex_str.len()));
        }

        let mut bytes = [0u8; 32];
        hex::decode_to_slice(hex_str, &mut bytes)?;
        Self::from_bytes(bytes)
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub(crate) fn keypair(&self) -> Keypair {
        Keypair::from_seckey_slice(SECP256K1, &self.0)
            .expect("should always work because SecretKey is validated on construction")
    }

    /// get the x-only public key for this secret key
    pub fn pubkey(&self) -> PubKey {
        let (xonly_pk, _) = XOnlyPublicKey::from_keypair(&self.keypair());
        PubKey(xonly_pk.serialize())
    }
}

// never print the key material
impl fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<sk for {}>", self.pubkey().to_hex())
    }
}

/// a 32-byte x-only public key.
///
/// no curve check happens here: any 32 bytes can be looked up on relays, and
/// keys that are not on the curve simply never verify a signature.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PubKey(pub [u8; 32]);

crate::types::hex_newtype!(PubKey, 32, PubKeyError, "pk");

impl PubKey {
    /// bech32 "npub1..." encoding
    pub fn to_npub(&self) -> String {
        crate::nip19::encode_npub(self)
    }

    pub(crate) fn to_xonly(&self) -> Option<XOnlyPublicKey> {
        XOnlyPublicKey::from_slice(&self.0).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pubkey_from_secret() {
        // BIP-340 test vector 0
        let sk = SecretKey::from_hex(
            "0000000000000000000000000000000000000000000000000000000000000003",
        )
        .unwrap();
        assert_eq!(
            sk.pubkey().to_hex(),
            "f9308a019258c31049344f85f89d5229b531c845836f99b08601f113bce036f9"
        );
    }

    #[test]
    fn test_secret_key_rejects_zero() {
        assert!(matches!(
            SecretKey::from_hex(&"0".repeat(64)),
            Err(SecretKeyError::InvalidSecretKey)
        ));
        assert!(matches!(
            SecretKey::from_hex("abc"),
            Err(SecretKeyError::InvalidLength(3))
        ));
    }

    #[test]
    fn test_pubkey_hex_is_case_insensitive() {
        let lower = "d91191e30e00444b942c0e82cad470b32af171764c2275bee0bd99377efd4075";
        let upper = lower.to_uppercase();
        assert_eq!(
            PubKey::from_hex(lower).unwrap(),
            PubKey::from_hex(&upper).unwrap()
        );
        assert_eq!(PubKey::from_hex(&upper).unwrap().to_hex(), lower);
    }

    #[test]
    fn test_pubkey_not_on_curve_is_still_a_key() {
        let pk = PubKey::from_bytes([0u8; 32]);
        assert!(pk.to_xonly().is_none());
        assert_eq!(pk.to_hex(), "0".repeat(64));
    }

    #[test]
    fn test_generated_keys_differ() {
        assert_ne!(SecretKey::generate().pubkey(), SecretKey::generate().pubkey());
    }
}
