use crate::{
    Error,
    Result,
    ledger::{
        Address,
        LedgerClient,
        coin_type,
        ObjectId,
        ObjectRef,
        OwnedObjectsQuery,
    },
};
use serde::{
    Deserialize,
    Serialize,
};

/// An owned object known to carry a balance of the production token.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenHolding(ObjectRef);

impl TokenHolding {
    pub fn new(object: ObjectRef) -> Self {
        Self(object)
    }

    pub fn object_id(&self) -> ObjectId {
        self.0.object_id
    }

    pub fn object_ref(&self) -> &ObjectRef {
        &self.0
    }
}

/// Every `Coin<type_tag>` `owner` holds, in the order the ledger returned
/// them. No match is an empty list, not an error.
pub async fn locate<L: LedgerClient>(
    ledger: &L,
    owner: &Address,
    type_tag: &str,
) -> Result<Vec<TokenHolding>> {
    let query = OwnedObjectsQuery {
        struct_type: Some(coin_type(type_tag)),
        ..OwnedObjectsQuery::default()
    };
    let objects = ledger
        .get_owned_objects(owner, &query)
        .await
        .map_err(Error::QueryFailure)?;
    let total = objects.len();
    let holdings: Vec<_> = objects
        .into_iter()
        .filter(|object| object.is_coin_of(type_tag))
        .map(TokenHolding::new)
        .collect();
    tracing::debug!(
        %owner,
        type_tag,
        owned = total,
        matching = holdings.len(),
        "located token holdings"
    );
    Ok(holdings)
}
