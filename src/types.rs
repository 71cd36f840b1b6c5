use std::fmt;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IDError {
    #[error("invalid hex encoding")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("invalid ID length: expected 32 bytes, got {0}")]
    InvalidLength(usize),
}

#[derive(Error, Debug)]
pub enum SignatureError {
    #[error("invalid hex encoding")]
    InvalidHex(#[from] hex::FromHexError),
    #[error("invalid signature length: expected 64 bytes, got {0}")]
    InvalidLength(usize),
}

/// fixed-size byte strings that travel as lowercase hex in event json
macro_rules! hex_newtype {
    ($name:ident, $len:literal, $error:ident, $debug_tag:literal) => {
        impl $name {
            pub fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            pub fn from_hex(hex_str: &str) -> Result<Self, $error> {
                if hex_str.len() != $len * 2 {
                    return Err($error::InvalidLength(hex_str.len() / 2));
                }
                let mut bytes = [0u8; $len];
                hex::decode_to_slice(hex_str, &mut bytes)?;
                Ok(Self(bytes))
            }

            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = $error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::from_hex(s)
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = <std::borrow::Cow<'de, str>>::deserialize(deserializer)?;
                Self::from_hex(&s).map_err(serde::de::Error::custom)
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!("<", $debug_tag, ":{}>"), self.to_hex())
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.to_hex())
            }
        }
    };
}

pub(crate) use hex_newtype;

/// sha256 of the canonical event serialization
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ID(pub [u8; 32]);

hex_newtype!(ID, 32, IDError, "id");

/// BIP-340 schnorr signature over the event id
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature(pub [u8; 64]);

hex_newtype!(Signature, 64, SignatureError, "sig");

/// event kind
#[derive(Copy, Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct Kind(pub u16);

impl Kind {
    /// profile metadata, content is a json object
    pub const METADATA: Kind = Kind(0);
    /// short text note, only used here as the login test-signature payload
    pub const TEXT_NOTE: Kind = Kind(1);
    /// deletion request pointing at earlier events with "e" tags
    pub const DELETION: Kind = Kind(5);
    /// NIP-32 label, carries reviews
    pub const LABEL: Kind = Kind(1985);
}

impl From<u16> for Kind {
    fn from(value: u16) -> Self {
        Self(value)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
