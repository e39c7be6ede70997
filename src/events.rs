//! Decoding of EntryPoint `UserOperationEvent` logs.
//!
//! The event layout is generated with Alloy's `sol!` macro, so the topic
//! signature and ABI layout are checked at compile time and decoding is a
//! single `decode_log` call with validation enabled.
//!
//! A raw [`Log`] becomes a [`UserOperation`] through [`EntryPointDecoder`].
//! Anything that is not a well-formed `UserOperationEvent` emitted by the
//! target contract is rejected with [`TrackerError::DecodingError`].
//!
//! ## Example
//!
//! ```
//! use erc4337_analytics::events::{user_operation_filter, EntryPointDecoder, ENTRY_POINT_V06};
//!
//! let decoder = EntryPointDecoder::new(ENTRY_POINT_V06);
//! let filter = user_operation_filter(decoder.contract());
//! # let _ = filter;
//! ```

use crate::error::{TrackerError, TrackerResult};
use alloy::primitives::{address, Address, Log as PrimitiveLog, B256, U256};
use alloy::rpc::types::{Filter, Log};
use alloy::sol;
use alloy::sol_types::SolEvent;

sol! {
    interface IEntryPoint {
        /// Emitted by the EntryPoint after each UserOperation is executed.
        event UserOperationEvent(
            bytes32 indexed userOpHash,
            address indexed sender,
            address indexed paymaster,
            uint256 nonce,
            bool success,
            uint256 actualGasCost,
            uint256 actualGasUsed
        );
    }
}

pub use IEntryPoint::UserOperationEvent;

/// Canonical ERC-4337 EntryPoint v0.6 deployment address.
pub const ENTRY_POINT_V06: Address = address!("5FF137D4b0FDCD49DcA30c7CF57E578a026d2789");

/// A decoded `UserOperationEvent` with the log coordinates kept for correlation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserOperation {
    /// Account that submitted the operation.
    pub sender: Address,
    /// Whether the operation's execution succeeded.
    pub success: bool,
    /// Opaque operation hash.
    pub op_hash: B256,
    /// Paymaster that sponsored the operation, zero if none.
    pub paymaster: Address,
    /// Account nonce of the operation.
    pub nonce: U256,
    /// Gas cost charged for the operation, in wei.
    pub actual_gas_cost: U256,
    /// Block the event was included in, if known.
    pub block_number: Option<u64>,
    /// Transaction that emitted the event, if known.
    pub transaction_hash: Option<B256>,
}

/// Turns raw logs from one EntryPoint contract into [`UserOperation`]s.
#[derive(Debug, Clone, Copy)]
pub struct EntryPointDecoder {
    contract: Address,
}

impl EntryPointDecoder {
    /// Create a decoder bound to `contract`.
    #[must_use]
    pub const fn new(contract: Address) -> Self {
        Self { contract }
    }

    /// The contract address this decoder accepts logs from.
    #[must_use]
    pub const fn contract(&self) -> Address {
        self.contract
    }

    /// Decode one raw log.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::DecodingError`] if the log comes from another
    /// contract, carries a different event signature, or its topics or data
    /// do not match the `UserOperationEvent` layout.
    pub fn decode(&self, log: &Log) -> TrackerResult<UserOperation> {
        if log.address() != self.contract {
            return Err(TrackerError::decoding(
                format!(
                    "log emitted by {} instead of {}",
                    log.address(),
                    self.contract
                ),
                None,
            ));
        }

        match log.topics().first() {
            Some(topic0) if *topic0 == UserOperationEvent::SIGNATURE_HASH => {}
            Some(topic0) => {
                return Err(TrackerError::decoding(
                    format!("unexpected event signature {topic0}"),
                    None,
                ))
            }
            None => return Err(TrackerError::decoding("log has no topics", None)),
        }

        let primitive_log = PrimitiveLog {
            address: log.address(),
            data: log.data().clone(),
        };

        let decoded = UserOperationEvent::decode_log(&primitive_log, true).map_err(|e| {
            TrackerError::decoding("failed to decode UserOperationEvent", Some(Box::new(e)))
        })?;
        let event = decoded.data;

        Ok(UserOperation {
            sender: event.sender,
            success: event.success,
            op_hash: event.userOpHash,
            paymaster: event.paymaster,
            nonce: event.nonce,
            actual_gas_cost: event.actualGasCost,
            block_number: log.block_number,
            transaction_hash: log.transaction_hash,
        })
    }
}

/// Log filter scoped to `UserOperationEvent`s from a single contract.
#[must_use]
pub fn user_operation_filter(contract: Address) -> Filter {
    Filter::new()
        .address(contract)
        .event_signature(UserOperationEvent::SIGNATURE_HASH)
}
