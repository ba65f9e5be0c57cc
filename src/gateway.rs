//! Generic contract gateway: read-only queries and signed transactions
//! against an ABI-described contract over an HTTP RPC endpoint.
//!
//! The gateway is deliberately untyped at the call boundary — functions
//! are addressed by name within an interface description and arguments
//! travel as [`DynSolValue`]s. The typed surface lives one layer up in
//! [`crate::contract`].

use alloy::dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt};
use alloy::json_abi::{Function, JsonAbi};
use alloy::network::EthereumWallet;
use alloy::primitives::{Address, Bytes};
use alloy::providers::{Provider, ProviderBuilder, RootProvider};
use alloy::rpc::client::RpcClient;
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::TransportError;
use tracing::info;
use url::Url;

use crate::error::GatewayError;
use crate::revert::decode_revert;

pub(crate) struct ContractGateway {
    /// Bare provider for view calls, built once and reused across runs.
    provider: RootProvider,
    rpc_url: Url,
}

impl ContractGateway {
    pub(crate) fn new(rpc_url: Url) -> Self {
        Self {
            provider: RootProvider::new(RpcClient::builder().http(rpc_url.clone())),
            rpc_url,
        }
    }

    /// Executes a view call and decodes the response into the function's
    /// declared output values. No signing key involved.
    pub(crate) async fn read_value(
        &self,
        contract: Address,
        abi: &JsonAbi,
        function: &str,
        args: &[DynSolValue],
    ) -> Result<Vec<DynSolValue>, GatewayError> {
        read_value_with(&self.provider, contract, abi, function, args).await
    }

    /// Signs, broadcasts, and waits for a state-changing call to be
    /// mined. The wallet filler derives the caller identity from the
    /// signer and fills in chain id and nonce.
    ///
    /// A synchronous revert is decoded against `error_abi`; a mined
    /// receipt with failure status becomes [`GatewayError::TransactionFailed`].
    pub(crate) async fn submit_transaction(
        &self,
        contract: Address,
        abi: &JsonAbi,
        error_abi: &JsonAbi,
        function: &str,
        args: &[DynSolValue],
        signer: &PrivateKeySigner,
    ) -> Result<TransactionReceipt, GatewayError> {
        let calldata = encode_call(abi, function, args)?;

        let wallet = EthereumWallet::from(signer.clone());
        let provider = ProviderBuilder::new()
            .wallet(wallet)
            .connect_http(self.rpc_url.clone());

        info!(%contract, function, "Submitting contract transaction");

        let tx = TransactionRequest::default()
            .to(contract)
            .input(calldata.into());

        let pending = match provider.send_transaction(tx).await {
            Ok(pending) => pending,
            Err(rpc_err) => return Err(classify_send_error(error_abi, rpc_err)),
        };

        info!(tx_hash = %pending.tx_hash(), function, "Transaction broadcast, awaiting receipt");

        let receipt = confirm_receipt(pending.get_receipt().await?)?;

        info!(tx_hash = %receipt.transaction_hash, function, "Transaction confirmed");

        Ok(receipt)
    }
}

/// Classifies a rejected `eth_sendRawTransaction` against the declared
/// error set: a decodable revert becomes [`GatewayError::Revert`],
/// anything else stays a connection-level failure.
fn classify_send_error(error_abi: &JsonAbi, rpc_err: TransportError) -> GatewayError {
    // Wrap in alloy::contract::Error to reuse its revert data
    // extraction when classifying the failure.
    let err = alloy::contract::Error::TransportError(rpc_err);
    match decode_revert(error_abi, &err) {
        Some(decoded) => GatewayError::Revert(decoded),
        None => GatewayError::Connection(err),
    }
}

/// A transaction can be mined and still have failed: the receipt's
/// execution status is the final word, not inclusion in a block.
fn confirm_receipt(receipt: TransactionReceipt) -> Result<TransactionReceipt, GatewayError> {
    if !receipt.status() {
        return Err(GatewayError::TransactionFailed {
            tx_hash: receipt.transaction_hash,
        });
    }
    Ok(receipt)
}

fn resolve_function<'a>(abi: &'a JsonAbi, name: &str) -> Result<&'a Function, GatewayError> {
    abi.function(name)
        .and_then(|overloads| overloads.first())
        .ok_or_else(|| GatewayError::UnknownFunction {
            function: name.to_string(),
        })
}

fn encode_call(abi: &JsonAbi, name: &str, args: &[DynSolValue]) -> Result<Bytes, GatewayError> {
    let function = resolve_function(abi, name)?;
    let calldata = function
        .abi_encode_input(args)
        .map_err(|source| GatewayError::Encoding {
            function: name.to_string(),
            source,
        })?;
    Ok(Bytes::from(calldata))
}

async fn read_value_with<P: Provider>(
    provider: &P,
    contract: Address,
    abi: &JsonAbi,
    function: &str,
    args: &[DynSolValue],
) -> Result<Vec<DynSolValue>, GatewayError> {
    let calldata = encode_call(abi, function, args)?;

    let tx = TransactionRequest::default()
        .to(contract)
        .input(calldata.into());

    let raw = provider
        .call(tx)
        .await
        .map_err(|rpc_err| GatewayError::Connection(alloy::contract::Error::TransportError(rpc_err)))?;

    let declared = resolve_function(abi, function)?;
    declared
        .abi_decode_output(&raw)
        .map_err(|source| GatewayError::Decoding {
            function: function.to_string(),
            source,
        })
}
