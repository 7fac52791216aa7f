/// In most smart contract account implementations the signature field is computed off-chain by hashing a user operation and signing that hash using some signature scheme
/// This signature must be computed after gas is estimated, as those fields are included in the hash. However, `preVerificationGas` depends on the length and contents of the packed operation, signature included.
/// To get around this, we price the operation with a placeholder of the same length as a real ECDSA signature and only non-zero bytes, so the estimate never comes out lower than the signed operation.
/// See https://www.alchemy.com/blog/dummy-signatures-and-gas-token-transfers
pub const DUMMY_SIGNATURE: [u8; 65] = [1u8; 65];

/// Entry point contract address (v0.6). All entry point contracts have the same address
pub const ENTRY_POINT_ADDRESS: &str = "0x5FF137D4b0FDCD49DcA30c7CF57E578a026d2789";

/// Deterministic deployment proxy. Same address on every chain it has been deployed to
pub const DETERMINISTIC_DEPLOYER_ADDRESS: &str = "0x4e59b44847b379578588920ca78fbf26c0b4956c";
/// The one-off signer of the proxy deployment transaction
pub const DETERMINISTIC_DEPLOYER_SIGNER: &str = "0x3fab184622dc19b6109349b94811493bf2a45362";
/// Pre-signed (pre EIP-155) transaction deploying the proxy. Gas price 100 gwei, gas limit 100000
pub const DETERMINISTIC_DEPLOYER_TRANSACTION: &str = "0xf8a58085174876e800830186a08080b853604580600e600039806000f350fe7fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffe03601600081602082378035828234f58015156039578182fd5b8082525050506014600cf31ba02222222222222222222222222222222222222222222222222222222222222222a02222222222222222222222222222222222222222222222222222222222222222";
/// Gas price of the pre-signed proxy deployment
pub const DETERMINISTIC_DEPLOYER_GAS_PRICE: u64 = 100_000_000_000;
/// Gas limit of the pre-signed proxy deployment
pub const DETERMINISTIC_DEPLOYER_GAS_LIMIT: u64 = 100_000;

/// Gas units the funding policy budgets for a worst-case operation plus buffer
pub const DEFAULT_EXECUTION_GAS_BUDGET: u64 = 4_000_000;
/// Number of operations submitted per run
pub const DEFAULT_OPERATION_RUNS: usize = 2;

/// Call gas limit used while the account is not yet deployed and the call cannot be estimated
pub const DEFAULT_CALL_GAS_LIMIT: u64 = 100_000;
/// Verification gas of a deployed SimpleAccount
pub const BASE_VERIFICATION_GAS: u64 = 100_000;

/// Pre-verification gas overheads of a bundle holding a single operation
pub const PVG_FIXED: u64 = 21_000;
pub const PVG_PER_USER_OP: u64 = 18_300;
pub const PVG_PER_USER_OP_WORD: u64 = 4;
pub const PVG_ZERO_BYTE: u64 = 4;
pub const PVG_NON_ZERO_BYTE: u64 = 16;

/// Receipt polling of the entry point `UserOperationEvent` logs
pub const RECEIPT_TIMEOUT_SECS: u64 = 30;
pub const RECEIPT_POLL_INTERVAL_SECS: u64 = 5;

/// Scale of the `paid <N> expected <M>` figures reported by a bundler
pub const GAS_SHORTFALL_SCALE: u64 = 1_000_000_000;

/// Default owner key of the diagnostic account
pub const DEFAULT_OWNER_KEY: &str =
    "0x7777777777777777777777777777777777777777777777777777777777777777";
/// Default node endpoint
pub const DEFAULT_NETWORK: &str = "http://localhost:8545";
/// Default bundler endpoint
pub const DEFAULT_BUNDLER_URL: &str = "http://localhost:3000/rpc";
/// Default listen address of the in-process bundler
pub const DEFAULT_SELF_BUNDLER_ADDR: &str = "127.0.0.1:3000";
/// Default location of the compiled SimpleAccountFactory
pub const DEFAULT_FACTORY_ARTIFACT: &str = "artifacts/SimpleAccountFactory.json";

/// JSON-RPC error code the dev bundler uses for rejected operations
pub const USER_OPERATION_REJECTED_CODE: i32 = -32500;
