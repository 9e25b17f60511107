use color_eyre::eyre::{
    Result,
    eyre,
};
use serde::{
    Deserialize,
    Deserializer,
    Serialize,
    Serializer,
};
use std::{
    fmt,
    str::FromStr,
};

const ID_LENGTH: usize = 32;

fn parse_hex_id(raw: &str) -> Result<[u8; ID_LENGTH]> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    if digits.is_empty() || digits.len() > ID_LENGTH * 2 {
        return Err(eyre!("invalid 32-byte hex identifier: {raw:?}"));
    }
    // Short forms such as `0x6` are left-padded the way the ledger prints them.
    let padded = format!("{digits:0>64}");
    let mut out = [0u8; ID_LENGTH];
    hex::decode_to_slice(&padded, &mut out)
        .map_err(|e| eyre!("invalid 32-byte hex identifier {raw:?}: {e}"))?;
    Ok(out)
}

macro_rules! hex_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name([u8; ID_LENGTH]);

        impl $name {
            pub const fn new(bytes: [u8; ID_LENGTH]) -> Self {
                Self(bytes)
            }

            pub fn as_bytes(&self) -> &[u8; ID_LENGTH] {
                &self.0
            }

            pub fn to_hex(&self) -> String {
                format!("0x{}", hex::encode(self.0))
            }
        }

        impl FromStr for $name {
            type Err = color_eyre::eyre::Report;

            fn from_str(s: &str) -> Result<Self> {
                parse_hex_id(s).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.to_hex())
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_hex())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(
                &self,
                serializer: S,
            ) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(&self.to_hex())
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(
                deserializer: D,
            ) -> std::result::Result<Self, D::Error> {
                let raw = String::deserialize(deserializer)?;
                raw.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

hex_identifier!(
    /// Identifier of a ledger-resident object.
    ObjectId
);

hex_identifier!(
    /// Account address that can own objects and sign transactions.
    Address
);

/// Shared clock object every deployment exposes at `0x6`.
pub const CLOCK_OBJECT_ID: ObjectId = {
    let mut bytes = [0u8; ID_LENGTH];
    bytes[ID_LENGTH - 1] = 6;
    ObjectId::new(bytes)
};

/// A reference to an object as last observed on the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub object_id: ObjectId,
    pub version: u64,
    pub digest: String,
    #[serde(rename = "type")]
    pub type_tag: String,
}

/// Object type of a coin holding a balance of `token_type`.
pub fn coin_type(token_type: &str) -> String {
    format!("0x2::coin::Coin<{token_type}>")
}

impl ObjectRef {
    /// True only for `Coin<token_type>` itself, not for other objects
    /// parameterised by the token such as its treasury cap.
    pub fn is_coin_of(&self, token_type: &str) -> bool {
        self.type_tag == coin_type(token_type)
    }
}

/// Options for `getOwnedObjects`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedObjectsQuery {
    pub struct_type: Option<String>,
    pub show_type: bool,
    pub show_content: bool,
    pub page_size: Option<u32>,
}

impl Default for OwnedObjectsQuery {
    fn default() -> Self {
        Self {
            struct_type: None,
            show_type: true,
            show_content: true,
            page_size: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub bytes: String,
    pub signature: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransactionDigest(pub String);

impl fmt::Display for TransactionDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TransactionConfirmation {
    pub digest: TransactionDigest,
    pub checkpoint: Option<u64>,
}

/// The remote ledger as seen by this client.
///
/// Every method is a network round trip. Implementations own their retry and
/// timeout behaviour; callers here never retry.
pub trait LedgerClient {
    fn get_owned_objects(
        &self,
        owner: &Address,
        query: &OwnedObjectsQuery,
    ) -> impl Future<Output = Result<Vec<ObjectRef>>>;

    /// Submit signed bytes. Resolves once the ledger accepted or rejected the
    /// transaction, not at finality.
    fn execute_transaction_block(
        &self,
        signed: &SignedTransaction,
    ) -> impl Future<Output = Result<TransactionDigest>>;

    fn wait_for_transaction(
        &self,
        digest: &TransactionDigest,
    ) -> impl Future<Output = Result<TransactionConfirmation>>;
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    #[test]
    fn object_id__parses_short_form_with_left_padding() {
        let id: ObjectId = "0x6".parse().unwrap();

        assert_eq!(CLOCK_OBJECT_ID, id);
        assert_eq!(
            "0x0000000000000000000000000000000000000000000000000000000000000006",
            id.to_string()
        );
    }

    #[test]
    fn object_id__rejects_non_hex_and_overlong_input() {
        assert!("0xzz".parse::<ObjectId>().is_err());
        assert!("".parse::<ObjectId>().is_err());
        let too_long = format!("0x{}", "1".repeat(65));
        assert!(too_long.parse::<ObjectId>().is_err());
    }

    #[test]
    fn address__round_trips_through_json_as_hex_string() {
        let address: Address = "0xabc".parse().unwrap();

        let json = serde_json::to_string(&address).unwrap();
        let back: Address = serde_json::from_str(&json).unwrap();

        assert_eq!(format!("\"{}\"", address.to_hex()), json);
        assert_eq!(address, back);
    }

    #[test]
    fn object_ref__matches_only_coins_of_the_token() {
        let object = |type_tag: &str| ObjectRef {
            object_id: "0x1".parse().unwrap(),
            version: 3,
            digest: "d".into(),
            type_tag: type_tag.into(),
        };
        let coin = object("0x2::coin::Coin<0xabc::brownie::BROWNIE>");
        let cap = object("0x2::coin::TreasuryCap<0xabc::brownie::BROWNIE>");
        let metadata = object("0x2::coin::CoinMetadata<0xabc::brownie::BROWNIE>");

        assert!(coin.is_coin_of("0xabc::brownie::BROWNIE"));
        assert!(!coin.is_coin_of("0xdef::brownie::BROWNIE"));
        assert!(!cap.is_coin_of("0xabc::brownie::BROWNIE"));
        assert!(!metadata.is_coin_of("0xabc::brownie::BROWNIE"));
    }
}
