//! Centralized Contract Definitions
//!
//! All Solidity interfaces the JIT bot touches, defined with alloy's `sol!`.
//! Interfaces used for RPC calls carry `#[sol(rpc)]`; the router interfaces
//! are only used to decode pending calldata.
//!
//! Author: AI-Generated
//! Created: 2026-02-01
//! Modified: 2026-02-04 - pool/quoter/vault interfaces for JIT execution

use alloy::sol;

// ── ERC20 ─────────────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IERC20 {
        function decimals() external view returns (uint8);
    }
}

// ── Uniswap V3 pool ───────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface UniswapV3Pool {
        function slot0() external view returns (uint160 sqrtPriceX96, int24 tick, uint16 observationIndex, uint16 observationCardinality, uint16 observationCardinalityNext, uint8 feeProtocol, bool unlocked);
        function liquidity() external view returns (uint128);
        function fee() external view returns (uint24);
        function tickSpacing() external view returns (int24);
        function token0() external view returns (address);
        function token1() external view returns (address);
    }
}

// ── Routers (calldata decoding only) ──────────────────────────────────

sol! {
    /// SwapRouter (V3 periphery)
    interface ISwapRouter {
        struct ExactInputSingleParams {
            address tokenIn;
            address tokenOut;
            uint24 fee;
            address recipient;
            uint256 deadline;
            uint256 amountIn;
            uint256 amountOutMinimum;
            uint160 sqrtPriceLimitX96;
        }

        struct ExactInputParams {
            bytes path;
            address recipient;
            uint256 deadline;
            uint256 amountIn;
            uint256 amountOutMinimum;
        }

        struct ExactOutputSingleParams {
            address tokenIn;
            address tokenOut;
            uint24 fee;
            address recipient;
            uint256 deadline;
            uint256 amountOut;
            uint256 amountInMaximum;
            uint160 sqrtPriceLimitX96;
        }

        struct ExactOutputParams {
            bytes path;
            address recipient;
            uint256 deadline;
            uint256 amountOut;
            uint256 amountInMaximum;
        }

        function exactInputSingle(ExactInputSingleParams calldata params) external payable returns (uint256 amountOut);
        function exactInput(ExactInputParams calldata params) external payable returns (uint256 amountOut);
        function exactOutputSingle(ExactOutputSingleParams calldata params) external payable returns (uint256 amountIn);
        function exactOutput(ExactOutputParams calldata params) external payable returns (uint256 amountIn);
        function multicall(uint256 deadline, bytes[] calldata data) external payable returns (bytes[] memory results);
        function multicall(bytes[] calldata data) external payable returns (bytes[] memory results);
    }
}

sol! {
    /// SwapRouter02 (no deadline in the params struct)
    interface IV3SwapRouter {
        struct ExactInputSingleParams {
            address tokenIn;
            address tokenOut;
            uint24 fee;
            address recipient;
            uint256 amountIn;
            uint256 amountOutMinimum;
            uint160 sqrtPriceLimitX96;
        }

        function exactInputSingle(ExactInputSingleParams calldata params) external payable returns (uint256 amountOut);
    }
}

// ── Quoter ────────────────────────────────────────────────────────────

sol! {
    #[sol(rpc)]
    interface IQuoterV2 {
        struct QuoteExactInputSingleParams {
            address tokenIn;
            address tokenOut;
            uint256 amountIn;
            uint24 fee;
            uint160 sqrtPriceLimitX96;
        }

        function quoteExactInputSingle(QuoteExactInputSingleParams memory params) external returns (uint256 amountOut, uint160 sqrtPriceX96After, uint32 initializedTicksCrossed, uint256 gasEstimate);
    }
}

// ── Flashloan vault + receiver payload ────────────────────────────────

sol! {
    /// Balancer V2 vault flashloan entry point
    interface IFlashLoanVault {
        function flashLoan(address recipient, address[] tokens, uint256[] amounts, bytes userData) external;
    }
}

sol! {
    /// Decoded by the receiver contract inside receiveFlashLoan
    struct JitParams {
        address pool;
        int24 tickLower;
        int24 tickUpper;
        uint128 liquidity;
        uint256 amount0;
        uint256 amount1;
        uint256 hedgeMinOut;
        uint256 deadline;
    }
}
