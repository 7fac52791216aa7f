use crate::{
    factory::FactoryDescriptor,
    types::{UserOperation, UserOperationHash},
};
use async_trait::async_trait;
use ethers::types::{Address, Bytes, TransactionReceipt, TransactionRequest, H256, U256};

/// Read access to the chain the tool talks to
#[async_trait]
pub trait Network: Send + Sync {
    /// The chain id resolved when connecting
    fn chain_id(&self) -> u64;

    async fn get_balance(&self, address: Address) -> anyhow::Result<U256>;

    async fn get_code(&self, address: Address) -> anyhow::Result<Bytes>;

    async fn get_gas_price(&self) -> anyhow::Result<U256>;
}

/// An identity that pays for funding and deployment transactions
#[async_trait]
pub trait Funder: Send + Sync {
    fn address(&self) -> Address;

    /// Sends a transaction from this identity and waits until it is mined
    ///
    /// # Arguments
    /// * `tx` - The transaction. `from` is overwritten with [address](Funder::address)
    ///
    /// # Returns
    /// * `TransactionReceipt` - The receipt of the mined transaction, whatever its status
    async fn send_and_confirm(&self, tx: TransactionRequest) -> anyhow::Result<TransactionReceipt>;
}

/// Deploys contracts to addresses derived purely from their code and constructor arguments
#[async_trait]
pub trait Deployer: Send + Sync {
    /// calculate the address the descriptor deploys to
    fn compute_address(&self, descriptor: &FactoryDescriptor) -> Address;

    async fn is_deployed(&self, address: Address) -> anyhow::Result<bool>;

    /// Deploys the descriptor, paid by `funder`, and returns the receipt of the deployment
    async fn deploy(
        &self,
        descriptor: &FactoryDescriptor,
        funder: &dyn Funder,
    ) -> anyhow::Result<TransactionReceipt>;
}

/// A smart contract account that crafts and signs its own user operations
#[async_trait]
pub trait AccountApi: Send + Sync {
    /// calculate the counterfactual address of this account.
    /// Works whether or not the account is deployed
    async fn counterfactual_address(&self) -> anyhow::Result<Address>;

    /// Builds and signs a user operation calling `target` with `data` from this account
    async fn create_signed_user_op(
        &self,
        target: Address,
        data: Bytes,
    ) -> anyhow::Result<UserOperation>;

    /// Looks up the transaction that included the user operation, `None` if it is not mined yet
    async fn get_user_op_receipt(&self, hash: UserOperationHash) -> anyhow::Result<Option<H256>>;
}

/// A relay accepting user operations
#[async_trait]
pub trait BundlerClient: Send + Sync {
    /// Fails when the relay cannot take operations for this chain and entry point
    async fn check_compatible(&self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn send_user_op_to_bundler(
        &self,
        user_operation: &UserOperation,
    ) -> anyhow::Result<UserOperationHash>;
}
