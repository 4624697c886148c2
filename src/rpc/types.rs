//! Types for the ledger node JSON-RPC interface

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// JSON-RPC error code for an unknown method.
pub const METHOD_NOT_FOUND_CODE: i64 = -32601;

/// Identifies a block either by its height or by its hash.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BlockId {
    Height(u64),
    Hash(String),
}

impl BlockId {
    /// Check whether the given block is the one this id refers to
    pub fn matches(&self, block: &Block) -> bool {
        match self {
            BlockId::Height(height) => block.index == *height,
            BlockId::Hash(hash) => block.hash == *hash,
        }
    }

    /// The JSON value the node expects as the first `getblock` parameter
    pub fn to_param(&self) -> Value {
        match self {
            BlockId::Height(height) => Value::from(*height),
            BlockId::Hash(hash) => Value::from(hash.as_str()),
        }
    }
}

impl From<u64> for BlockId {
    fn from(height: u64) -> Self {
        BlockId::Height(height)
    }
}

impl From<&str> for BlockId {
    fn from(hash: &str) -> Self {
        BlockId::Hash(hash.to_string())
    }
}

impl From<String> for BlockId {
    fn from(hash: String) -> Self {
        BlockId::Hash(hash)
    }
}

impl std::fmt::Display for BlockId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BlockId::Height(height) => write!(f, "{}", height),
            BlockId::Hash(hash) => f.write_str(hash),
        }
    }
}

/// A verbose block as returned by `getblock`.
///
/// Only the fields the monitor reads are typed; everything else the node sends is kept in
/// `extra` so the host can still render it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Block {
    /// The block hash.
    pub hash: String,
    /// The block height.
    pub index: u64,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub version: u32,
    #[serde(rename = "previousblockhash", default)]
    pub previous_block_hash: Option<String>,
    #[serde(rename = "nextblockhash", default)]
    pub next_block_hash: Option<String>,
    #[serde(rename = "merkleroot", default)]
    pub merkle_root: Option<String>,
    /// Block timestamp in milliseconds.
    #[serde(default)]
    pub time: u64,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub primary: Option<u32>,
    #[serde(rename = "nextconsensus", default)]
    pub next_consensus: Option<String>,
    #[serde(default)]
    pub confirmations: Option<u64>,
    #[serde(default)]
    pub witnesses: Vec<Value>,
    /// Full transactions included in the block.
    #[serde(default)]
    pub tx: Vec<Transaction>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A verbose transaction as returned by `getrawtransaction`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    /// The transaction hash.
    pub hash: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub nonce: u64,
    #[serde(default)]
    pub sender: Option<String>,
    /// System fee as a decimal string.
    #[serde(rename = "sysfee", default)]
    pub system_fee: Option<String>,
    /// Network fee as a decimal string.
    #[serde(rename = "netfee", default)]
    pub network_fee: Option<String>,
    #[serde(rename = "validuntilblock", default)]
    pub valid_until_block: Option<u64>,
    #[serde(default)]
    pub signers: Vec<Value>,
    #[serde(default)]
    pub attributes: Vec<Value>,
    #[serde(default)]
    pub script: Option<String>,
    #[serde(default)]
    pub witnesses: Vec<Value>,
    /// Hash of the containing block, present once the transaction is confirmed.
    #[serde(rename = "blockhash", default)]
    pub block_hash: Option<String>,
    #[serde(default)]
    pub confirmations: Option<u64>,
    #[serde(rename = "blocktime", default)]
    pub block_time: Option<u64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Response of the `expressgetpopulatedblocks` extension.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PopulatedBlocks {
    /// Heights of blocks containing at least one transaction, highest first.
    #[serde(default)]
    pub blocks: Vec<u64>,
    /// Identifies the chain instance; changes when the chain is reset.
    #[serde(rename = "cacheId", default)]
    pub cache_id: String,
}

/// A typed contract invocation argument.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContractParameter {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: Value,
}

impl ContractParameter {
    /// A `Hash160` argument from a big-endian script hash hex string
    pub fn hash160(script_hash: &str) -> Self {
        Self {
            kind: "Hash160".to_string(),
            value: Value::from(script_hash),
        }
    }
}

/// One value on the result stack of an invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StackItem {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub value: Option<Value>,
}

/// Response of `invokefunction`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvokeResult {
    /// VM state after execution (`HALT` or `FAULT`).
    #[serde(default)]
    pub state: Option<String>,
    #[serde(rename = "gasconsumed", default)]
    pub gas_consumed: Option<String>,
    #[serde(default)]
    pub exception: Option<String>,
    #[serde(default)]
    pub stack: Vec<StackItem>,
}

impl InvokeResult {
    /// Parse the first stack value as an integer amount, defaulting to zero when the
    /// stack is empty or the first item carries no value.
    pub fn first_integer(&self) -> Result<u128, RpcError> {
        let Some(value) = self.stack.first().and_then(|item| item.value.as_ref()) else {
            return Ok(0);
        };
        match value {
            Value::String(text) if text.is_empty() => Ok(0),
            Value::String(text) => text
                .parse::<u128>()
                .map_err(|e| RpcError::Malformed(format!("invalid integer {:?}: {}", text, e))),
            Value::Number(number) => number
                .as_u64()
                .map(u128::from)
                .ok_or_else(|| RpcError::Malformed(format!("invalid integer {}", number))),
            Value::Null => Ok(0),
            other => Err(RpcError::Malformed(format!(
                "unexpected stack value {}",
                other
            ))),
        }
    }
}

/// Error object of a JSON-RPC response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RpcErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

/// Envelope of a JSON-RPC 2.0 response.
#[derive(Debug, Deserialize)]
pub struct RpcResponse<T> {
    #[serde(default)]
    pub id: Option<Value>,
    pub result: Option<T>,
    pub error: Option<RpcErrorObject>,
}

/// Error types for ledger node calls
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("Method not found: {0}")]
    MethodNotFound(String),

    #[error("RPC error {code}: {message}")]
    RemoteError { code: i64, message: String },

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("HTTP status: {0}")]
    StatusError(u16),

    #[error("JSON parse error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("No data returned")]
    NoData,

    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl RpcError {
    /// Build the error for a JSON-RPC error object returned by `method`
    pub fn from_remote(method: &str, error: RpcErrorObject) -> Self {
        if error.code == METHOD_NOT_FOUND_CODE || error.message.contains("Method not found") {
            RpcError::MethodNotFound(method.to_string())
        } else {
            RpcError::RemoteError {
                code: error.code,
                message: error.message,
            }
        }
    }

    /// Whether the node lacks the called method entirely
    pub fn is_method_not_found(&self) -> bool {
        matches!(self, RpcError::MethodNotFound(_))
    }
}
