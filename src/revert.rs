//! Decoding of contract revert data into declared error types.
//!
//! A failed call carries the raw revert payload in the node's error
//! response. The leading 4 bytes are the selector derived from the
//! canonical signature of the Solidity error that fired; matching it
//! against the declared error set of the interface description turns an
//! opaque `execution reverted` into a named contract error.

use alloy::json_abi::JsonAbi;

/// A revert classified against a contract's declared errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub(crate) enum RevertError {
    /// The revert payload matched a declared error's selector.
    #[error("`{name}`: {message}")]
    Named { name: String, message: String },
    /// The payload was too short or matched no declared selector.
    #[error("unrecognized revert: {message}")]
    Unknown { message: String },
}

/// Classifies a failed call against the declared error set.
///
/// Returns `None` when the failure carries no revert payload at all
/// (connection failures and other transport errors must never be
/// classified as contract errors). Pure; performs no I/O.
pub(crate) fn decode_revert(
    error_abi: &JsonAbi,
    err: &alloy::contract::Error,
) -> Option<RevertError> {
    let data = err.as_revert_data()?;
    let message = err.to_string();

    let Some(selector) = data.get(..4) else {
        return Some(RevertError::Unknown { message });
    };

    // First match wins; iteration order over declared errors is not
    // significant because selectors are unique per signature.
    for declared in error_abi.errors.values().flatten() {
        if declared.selector().as_slice() == selector {
            return Some(RevertError::Named {
                name: declared.name.clone(),
                message,
            });
        }
    }

    Some(RevertError::Unknown { message })
}
