use crate::foundation::ProtectionError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Time units of the consensus protocol. The engine never does arithmetic on
/// them beyond ordering comparisons.
pub type Slot = u64;
pub type Epoch = u64;

/// Store-assigned validator identifier. Ids start at 1 and are never reused.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd, Deserialize, Serialize)]
#[serde(transparent)]
pub struct ValidatorId(u32);

impl ValidatorId {
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ValidatorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn parse_hex_bytes(s: &str) -> Result<Vec<u8>, ProtectionError> {
    let trimmed = s.strip_prefix("0x").unwrap_or(s);
    Ok(hex::decode(trimmed)?)
}

macro_rules! define_bytes_type {
    ($name:ident) => {
        /// Opaque byte string. The engine never parses the content; equality is
        /// the only operation it relies on.
        #[derive(Clone, Debug, Default, Eq, Hash, PartialEq, PartialOrd, Ord)]
        pub struct $name(Vec<u8>);

        impl $name {
            pub fn new(value: impl Into<Vec<u8>>) -> Self {
                Self(value.into())
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                for byte in &self.0 {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }

        impl fmt::LowerHex for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                if f.alternate() {
                    f.write_str("0x")?;
                }
                for byte in &self.0 {
                    write!(f, "{:02x}", byte)?;
                }
                Ok(())
            }
        }

        impl FromStr for $name {
            type Err = ProtectionError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(parse_hex_bytes(s)?))
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                if serializer.is_human_readable() {
                    serializer.serialize_str(&format!("{:#x}", self))
                } else {
                    self.0.serialize(serializer)
                }
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                if deserializer.is_human_readable() {
                    let s = String::deserialize(deserializer)?;
                    s.parse().map_err(serde::de::Error::custom)
                } else {
                    let bytes = Vec::<u8>::deserialize(deserializer)?;
                    Ok(Self(bytes))
                }
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<Vec<u8>> for $name {
            fn from(value: Vec<u8>) -> Self {
                Self(value)
            }
        }

        impl From<&[u8]> for $name {
            fn from(value: &[u8]) -> Self {
                Self(value.to_vec())
            }
        }
    };
}

define_bytes_type!(PublicKey);
define_bytes_type!(SigningRoot);
