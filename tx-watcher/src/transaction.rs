//! Transaction records as delivered by the node.

use serde::{Deserialize, Deserializer, Serialize};

use crate::{
    address::Address,
    quantity::{parse_quantity, QuantityError},
};

/// A transaction as returned by `eth_getBlockByNumber`.
///
/// Height and index stay in their wire form; [`Transaction::position`]
/// decodes them. A missing or `null` field decodes as empty, so one bad
/// entry only fails its own position instead of the whole block. Every
/// other field the node sends is ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    /// Transaction hash (hex)
    #[serde(default, deserialize_with = "null_as_default")]
    pub hash: String,

    /// Sender address
    #[serde(default, deserialize_with = "null_as_default")]
    pub from: Address,

    /// Recipient address, absent for contract creation
    #[serde(default)]
    pub to: Option<Address>,

    /// Block height as a hex quantity
    #[serde(default, deserialize_with = "null_as_default")]
    pub block_number: String,

    /// Index within the block as a hex quantity
    #[serde(default, deserialize_with = "null_as_default")]
    pub transaction_index: String,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Decoded location of a transaction in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TxPosition {
    /// Block height
    pub block: u64,
    /// Index within the block
    pub index: u64,
}

impl Transaction {
    /// Decode the block height and in-block index.
    pub fn position(&self) -> Result<TxPosition, QuantityError> {
        Ok(TxPosition {
            block: parse_quantity(&self.block_number)?,
            index: parse_quantity(&self.transaction_index)?,
        })
    }
}
