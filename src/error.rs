//! Gateway error taxonomy. Separates transport, codec, and contract
//! failures so the orchestrator can decide recovery versus escalation.

use alloy::primitives::TxHash;
use alloy::providers::PendingTransactionError;

use crate::revert::RevertError;

#[derive(Debug, thiserror::Error)]
pub(crate) enum GatewayError {
    /// RPC endpoint unreachable, or the node rejected the request for a
    /// reason other than a decodable contract revert.
    #[error("RPC call failed: {0}")]
    Connection(alloy::contract::Error),
    #[error("function `{function}` not present in interface description")]
    UnknownFunction { function: String },
    #[error("failed to encode call to `{function}`: {source}")]
    Encoding {
        function: String,
        #[source]
        source: alloy::dyn_abi::Error,
    },
    #[error("failed to decode `{function}` response: {source}")]
    Decoding {
        function: String,
        #[source]
        source: alloy::dyn_abi::Error,
    },
    #[error("`{function}` returned an unexpected value shape")]
    UnexpectedReturn { function: String },
    #[error("contract reverted: {0}")]
    Revert(RevertError),
    /// Mined but with a failure execution status, as opposed to a revert
    /// surfaced synchronously by the node.
    #[error("transaction {tx_hash} mined with failure status")]
    TransactionFailed { tx_hash: TxHash },
    #[error("failed to confirm transaction: {0}")]
    Confirmation(#[from] PendingTransactionError),
}
