//! Contract interfaces.
//!
//! Only the functions the dashboard actually calls; the protocol contracts
//! themselves are an external collaborator.

use alloy_sol_types::sol;

sol! {
    /// Multicall3 - deployed at the same address on all EVM chains
    interface IMulticall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct Result {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls)
            external payable returns (Result[] memory returnData);

        function getBlockNumber() external view returns (uint256 blockNumber);
        function getCurrentBlockTimestamp() external view returns (uint256 timestamp);
    }
}

sol! {
    interface IERC20 {
        function totalSupply() external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 amount) external returns (bool);
    }

    /// Rebasing staked token.
    interface IStakedToken {
        function circulatingSupply() external view returns (uint256);
    }

    interface IStaking {
        function epoch() external view returns (
            uint256 number, uint256 distribute, uint32 length, uint32 endTime
        );
        function index() external view returns (uint256);
        function unstake(uint256 amount, bool trigger) external;
    }

    /// Approve-and-stake helper in front of the staking contract.
    interface IStakingHelper {
        function stake(uint256 amount, address recipient) external;
    }

    /// Index-accruing wrapper around the staked token.
    interface IWrappedToken {
        function wrap(uint256 amount) external returns (uint256);
        function unwrap(uint256 amount) external returns (uint256);
    }

    interface IBondDepository {
        function bondPrice() external view returns (uint256);
        function bondPriceInUSD() external view returns (uint256);
        function maxPayout() external view returns (uint256);
        function payoutFor(uint256 value) external view returns (uint256);
        function currentDebt() external view returns (uint256);
        function terms() external view returns (
            uint256 controlVariable, uint256 vestingTerm, uint256 minimumPrice,
            uint256 maxPayout, uint256 fee, uint256 maxDebt
        );
        function deposit(uint256 amount, uint256 maxPrice, address depositor)
            external returns (uint256);
    }

    /// Fixed-rate redemption of the protocol token for the reserve asset.
    interface IRedemption {
        function redeemRate() external view returns (uint256);
        function totalRedeemed() external view returns (uint256);
        function swap(uint256 amount) external;
    }

    interface IPair {
        function getReserves() external view returns (
            uint112 reserve0, uint112 reserve1, uint32 blockTimestampLast
        );
        function token0() external view returns (address);
        function token1() external view returns (address);
        function totalSupply() external view returns (uint256);
        function balanceOf(address account) external view returns (uint256);
    }
}
