//! Typed operations on the daily lottery contract.
//!
//! Wraps the generic [`ContractGateway`] with the lottery's interface
//! description and exposes the three operations the orchestrator needs:
//! the current lottery number, the draw state for a number, and the
//! draw transaction itself.

use std::sync::Arc;

use alloy::dyn_abi::DynSolValue;
use alloy::json_abi::JsonAbi;
use alloy::primitives::{Address, U256};
use async_trait::async_trait;

use crate::config::LotteryCtx;
use crate::error::GatewayError;
use crate::gateway::ContractGateway;

pub(crate) const DAILY_LOTTERY_ABI: &str = r#"[
    {
        "type": "function",
        "name": "lotteryNumber",
        "inputs": [],
        "outputs": [{ "name": "", "type": "uint64", "internalType": "uint64" }],
        "stateMutability": "view"
    },
    {
        "type": "function",
        "name": "getDrawState",
        "inputs": [{ "name": "_lotteryNumber", "type": "uint64", "internalType": "uint64" }],
        "outputs": [{ "name": "", "type": "uint8", "internalType": "enum LotteryDrawState" }],
        "stateMutability": "view"
    },
    {
        "type": "function",
        "name": "drawLottery",
        "inputs": [{ "name": "_lotteryNumber", "type": "uint64", "internalType": "uint64" }],
        "outputs": [],
        "stateMutability": "nonpayable"
    }
]"#;

pub(crate) const DAILY_LOTTERY_ERROR_ABI: &str = r#"[
    {
        "type": "error",
        "name": "DrawingInProgress",
        "inputs": []
    },
    {
        "type": "error",
        "name": "MinDrawIntervalNotMet",
        "inputs": [
            { "name": "startTime", "type": "uint256", "internalType": "uint256" },
            { "name": "currentTime", "type": "uint256", "internalType": "uint256" }
        ]
    }
]"#;

/// Coarse state of one lottery draw as reported by the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DrawState {
    NotDrawn,
    Drawing,
    Drawn,
}

impl DrawState {
    /// Maps the contract's numeric state code. Unrecognized codes map to
    /// `None`; the orchestrator treats those as not actionable rather
    /// than as errors.
    pub(crate) fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::NotDrawn),
            1 => Some(Self::Drawing),
            2 => Some(Self::Drawn),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid embedded contract interface: {0}")]
pub(crate) struct InterfaceError(#[from] serde_json::Error);

/// Contract operations the orchestrator depends on. A trait seam so the
/// orchestrator can be driven by a scripted double in tests.
#[async_trait]
pub(crate) trait LotteryDraw: Send + Sync {
    async fn current_lottery_number(&self) -> Result<u64, GatewayError>;

    async fn draw_state(&self, lottery_number: u64) -> Result<Option<DrawState>, GatewayError>;

    async fn draw(&self, lottery_number: u64) -> Result<(), GatewayError>;
}

pub(crate) struct DailyLotteryContract {
    gateway: ContractGateway,
    ctx: LotteryCtx,
    abi: JsonAbi,
    error_abi: JsonAbi,
}

impl DailyLotteryContract {
    pub(crate) fn new(ctx: LotteryCtx) -> Result<Self, InterfaceError> {
        Ok(Self {
            gateway: ContractGateway::new(ctx.rpc_url.clone()),
            abi: serde_json::from_str(DAILY_LOTTERY_ABI)?,
            error_abi: serde_json::from_str(DAILY_LOTTERY_ERROR_ABI)?,
            ctx,
        })
    }

    fn address(&self) -> Address {
        self.ctx.address
    }
}

#[async_trait]
impl LotteryDraw for DailyLotteryContract {
    async fn current_lottery_number(&self) -> Result<u64, GatewayError> {
        let values = self
            .gateway
            .read_value(self.address(), &self.abi, "lotteryNumber", &[])
            .await?;
        single_uint(&values, "lotteryNumber")
    }

    async fn draw_state(&self, lottery_number: u64) -> Result<Option<DrawState>, GatewayError> {
        let args = [DynSolValue::Uint(U256::from(lottery_number), 64)];
        let values = self
            .gateway
            .read_value(self.address(), &self.abi, "getDrawState", &args)
            .await?;
        let code = single_uint(&values, "getDrawState")?;
        let code = u8::try_from(code).map_err(|_| GatewayError::UnexpectedReturn {
            function: "getDrawState".to_string(),
        })?;
        Ok(DrawState::from_code(code))
    }

    async fn draw(&self, lottery_number: u64) -> Result<(), GatewayError> {
        let args = [DynSolValue::Uint(U256::from(lottery_number), 64)];
        self.gateway
            .submit_transaction(
                self.address(),
                &self.abi,
                &self.error_abi,
                "drawLottery",
                &args,
                &self.ctx.signer,
            )
            .await?;
        Ok(())
    }
}

// Allows sharing one contract handle between the orchestrator and other
// consumers, mirroring how gateways are usually held behind an Arc.
#[async_trait]
impl<T: LotteryDraw> LotteryDraw for Arc<T> {
    async fn current_lottery_number(&self) -> Result<u64, GatewayError> {
        (**self).current_lottery_number().await
    }

    async fn draw_state(&self, lottery_number: u64) -> Result<Option<DrawState>, GatewayError> {
        (**self).draw_state(lottery_number).await
    }

    async fn draw(&self, lottery_number: u64) -> Result<(), GatewayError> {
        (**self).draw(lottery_number).await
    }
}

fn single_uint(values: &[DynSolValue], function: &str) -> Result<u64, GatewayError> {
    let unexpected = || GatewayError::UnexpectedReturn {
        function: function.to_string(),
    };

    match values {
        [DynSolValue::Uint(value, _)] => u64::try_from(*value).map_err(|_| unexpected()),
        _ => Err(unexpected()),
    }
}

#[cfg(test)]
mod tests {
    use alloy::primitives::keccak256;

    use super::*;

    #[test]
    fn state_codes_map_to_draw_states() {
        assert_eq!(DrawState::from_code(0), Some(DrawState::NotDrawn));
        assert_eq!(DrawState::from_code(1), Some(DrawState::Drawing));
        assert_eq!(DrawState::from_code(2), Some(DrawState::Drawn));
    }

    #[test]
    fn unrecognized_state_codes_are_not_actionable() {
        assert_eq!(DrawState::from_code(3), None);
        assert_eq!(DrawState::from_code(u8::MAX), None);
    }

    #[test]
    fn embedded_abi_declares_the_three_operations() {
        let abi: JsonAbi = serde_json::from_str(DAILY_LOTTERY_ABI).unwrap();

        for function in ["lotteryNumber", "getDrawState", "drawLottery"] {
            assert!(abi.function(function).is_some(), "missing {function}");
        }
    }

    #[test]
    fn declared_error_selectors_derive_from_canonical_signatures() {
        let error_abi: JsonAbi = serde_json::from_str(DAILY_LOTTERY_ERROR_ABI).unwrap();

        for declared in error_abi.errors.values().flatten() {
            let expected = &keccak256(declared.signature().as_bytes())[..4];
            assert_eq!(declared.selector().as_slice(), expected);
        }

        let min_interval = &error_abi.errors["MinDrawIntervalNotMet"][0];
        assert_eq!(
            min_interval.signature(),
            "MinDrawIntervalNotMet(uint256,uint256)"
        );
    }

    #[test]
    fn single_uint_rejects_unexpected_shapes() {
        assert!(single_uint(&[], "lotteryNumber").is_err());
        assert!(
            single_uint(
                &[DynSolValue::Bool(true)],
                "lotteryNumber"
            )
            .is_err()
        );
        assert_eq!(
            single_uint(&[DynSolValue::Uint(U256::from(9u64), 64)], "lotteryNumber").unwrap(),
            9
        );
    }

    #[test]
    fn oversized_uint_is_an_unexpected_return() {
        let result = single_uint(&[DynSolValue::Uint(U256::MAX, 256)], "lotteryNumber");
        assert!(matches!(
            result,
            Err(GatewayError::UnexpectedReturn { .. })
        ));
    }
}
