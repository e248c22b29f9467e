//! Solidity types used for EIP-712 hashing.

use alloy_sol_types::sol;

sol!(
    /// ERC-3009 `transferWithAuthorization` as EIP-712 typed data.
    ///
    /// Authorizes moving `value` tokens from `from` to `to`, redeemable only
    /// between `validAfter` and `validBefore`, once per `nonce`.
    #[derive(Debug, PartialEq, Eq)]
    struct TransferWithAuthorization {
        address from;
        address to;
        uint256 value;
        uint256 validAfter;
        uint256 validBefore;
        bytes32 nonce;
    }
);
