use crate::types;
use alloy_primitives::{Address as a_Address, U256 as a_U256};
use alloy_sol_types::{sol, SolCall};
use ethers::{
    contract::abigen,
    types::{Address, Bytes, U256},
};

abigen!(
    SimpleAccountFactory,
    r#"[
        function createAccount(address owner, uint256 salt) returns (address ret)
        function getAddress(address owner, uint256 salt) view returns (address)
    ]"#,
);

abigen!(
    EntryPoint,
    r#"[
        struct UserOperation { address sender; uint256 nonce; bytes initCode; bytes callData; uint256 callGasLimit; uint256 verificationGasLimit; uint256 preVerificationGas; uint256 maxFeePerGas; uint256 maxPriorityFeePerGas; bytes paymasterAndData; bytes signature; }
        function getNonce(address sender, uint192 key) view returns (uint256 nonce)
        function handleOps(UserOperation[] ops, address beneficiary)
        event UserOperationEvent(bytes32 indexed userOpHash, address indexed sender, address indexed paymaster, uint256 nonce, bool success, uint256 actualGasCost, uint256 actualGasUsed)
        error FailedOp(uint256 opIndex, string reason)
    ]"#,
);

// Simple account `execute()` function. See https://github.com/eth-infinitism/account-abstraction/blob/75f02457e71bcb4a63e5347589b75fa4da5c9964/contracts/samples/SimpleAccount.sol#L67
sol! {function execute(address dest, uint256 value, bytes calldata func);}
pub struct SimpleAccountExecute(executeCall);
impl SimpleAccountExecute {
    pub fn new(address: Address, value: U256, func: Bytes) -> Self {
        Self(executeCall {
            dest: a_Address::from(address.0),
            value: a_U256::from_limbs(value.0),
            func: func.to_vec(),
        })
    }

    /// Encodes the calldata
    pub fn encode(&self) -> Vec<u8> {
        self.0.encode()
    }
}

impl From<types::UserOperation> for UserOperation {
    fn from(uo: types::UserOperation) -> Self {
        Self {
            sender: uo.sender,
            nonce: uo.nonce,
            init_code: uo.init_code,
            call_data: uo.call_data,
            call_gas_limit: uo.call_gas_limit,
            verification_gas_limit: uo.verification_gas_limit,
            pre_verification_gas: uo.pre_verification_gas,
            max_fee_per_gas: uo.max_fee_per_gas,
            max_priority_fee_per_gas: uo.max_priority_fee_per_gas,
            paymaster_and_data: uo.paymaster_and_data,
            signature: uo.signature,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn execute_calldata_layout() {
        let dest = Address::repeat_byte(0xaa);
        let calldata = SimpleAccountExecute::new(dest, U256::zero(), Bytes::from(vec![1, 2, 3, 4]))
            .encode();
        // execute(address,uint256,bytes)
        assert_eq!(&calldata[..4], &[0xb6, 0x1d, 0x27, 0xf6]);
        assert_eq!(&calldata[16..36], dest.as_bytes());
        // selector + 3 head words + length word + one padded data word
        assert_eq!(calldata.len(), 4 + 32 * 5);
    }
}
