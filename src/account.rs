use crate::{
    consts::{
        BASE_VERIFICATION_GAS, DEFAULT_CALL_GAS_LIMIT, DUMMY_SIGNATURE, PVG_FIXED,
        PVG_NON_ZERO_BYTE, PVG_PER_USER_OP, PVG_PER_USER_OP_WORD, PVG_ZERO_BYTE,
        RECEIPT_POLL_INTERVAL_SECS, RECEIPT_TIMEOUT_SECS,
    },
    gen::{EntryPoint, SimpleAccountExecute, SimpleAccountFactory},
    traits::AccountApi,
    types::{UserOperation, UserOperationHash},
};
use anyhow::Context;
use async_trait::async_trait;
use ethers::{
    providers::Middleware,
    signers::{LocalWallet, Signer},
    types::{
        transaction::eip2718::TypedTransaction, Address, Bytes, TransactionRequest, H256, U256,
        U64,
    },
};
use std::{sync::Arc, time::Duration};
use tokio::{sync::OnceCell, time::Instant};
use tracing::{debug, trace};

/// Blocks searched backwards for the `UserOperationEvent` of a submitted operation
const RECEIPT_LOOKBACK_BLOCKS: u64 = 100;

/// A SimpleAccount owned by a local key, identified by `(owner, index)` under one factory
#[derive(Debug)]
pub struct SimpleAccountApi<M: Middleware> {
    /// Ethers provider
    provider: Arc<M>,
    /// The chain id the operations are signed for
    chain_id: u64,
    /// The key that owns and signs for the account
    owner: LocalWallet,
    /// The factory salt of the account
    index: U256,
    entry_point: EntryPoint<M>,
    /// The smart contract wallet factory contract object
    factory: SimpleAccountFactory<M>,
    /// Counterfactual address, fetched once
    address: OnceCell<Address>,
    receipt_timeout: Duration,
    receipt_interval: Duration,
}

impl<M: Middleware + 'static> SimpleAccountApi<M> {
    /// Create a new SimpleAccountApi
    ///
    /// # Arguments
    /// * `provider` - The ethers provider
    /// * `chain_id` - The chain id
    /// * `entry_point` - The entry point contract address
    /// * `factory` - The smart contract wallet factory contract address
    /// * `owner` - The account owner
    /// * `index` - The salt used to generate the smart contract wallet address
    pub fn new(
        provider: Arc<M>,
        chain_id: u64,
        entry_point: Address,
        factory: Address,
        owner: LocalWallet,
        index: U256,
    ) -> Self {
        Self {
            entry_point: EntryPoint::new(entry_point, provider.clone()),
            factory: SimpleAccountFactory::new(factory, provider.clone()),
            provider,
            chain_id,
            owner,
            index,
            address: OnceCell::new(),
            receipt_timeout: Duration::from_secs(RECEIPT_TIMEOUT_SECS),
            receipt_interval: Duration::from_secs(RECEIPT_POLL_INTERVAL_SECS),
        }
    }

    /// Gets the address of the account owner
    pub fn owner_address(&self) -> Address {
        self.owner.address()
    }

    /// Factory address followed by the `createAccount` calldata
    pub fn init_code(&self) -> Bytes {
        let mut init_code = self.factory.address().as_bytes().to_vec();
        if let Some(call_data) = self
            .factory
            .create_account(self.owner.address(), self.index)
            .calldata()
        {
            init_code.extend_from_slice(&call_data);
        }
        init_code.into()
    }

    async fn estimate(&self, from: Address, to: Address, data: Bytes) -> anyhow::Result<U256> {
        let tx: TypedTransaction = TransactionRequest::new().from(from).to(to).data(data).into();
        Ok(self.provider.estimate_gas(&tx, None).await?)
    }

    async fn sign(&self, uo: UserOperation) -> anyhow::Result<UserOperation> {
        let hash = uo.hash(&self.entry_point.address(), self.chain_id);
        let signature = self.owner.sign_message(hash.0.as_bytes()).await?;
        Ok(UserOperation {
            signature: signature.to_vec().into(),
            ..uo
        })
    }
}

#[async_trait]
impl<M: Middleware + 'static> AccountApi for SimpleAccountApi<M> {
    async fn counterfactual_address(&self) -> anyhow::Result<Address> {
        self.address
            .get_or_try_init(|| async {
                self.factory
                    .get_address(self.owner.address(), self.index)
                    .call()
                    .await
                    .context("factory's get_address should return the counterfactual address")
            })
            .await
            .copied()
    }

    async fn create_signed_user_op(
        &self,
        target: Address,
        data: Bytes,
    ) -> anyhow::Result<UserOperation> {
        let sender = self.counterfactual_address().await?;
        let deployed = !self.provider.get_code(sender, None).await?.is_empty();
        let call_data = Bytes::from(SimpleAccountExecute::new(target, U256::zero(), data).encode());
        let nonce = self
            .entry_point
            .get_nonce(sender, U256::zero())
            .call()
            .await
            .context("entry point should return the account nonce")?;

        let (init_code, init_gas, call_gas_limit) = if deployed {
            let call_gas = self
                .estimate(self.entry_point.address(), sender, call_data.clone())
                .await
                .context("should estimate the call gas")?;
            (Bytes::default(), U256::zero(), call_gas)
        } else {
            let init_code = self.init_code();
            let init_gas = self
                .estimate(
                    Address::zero(),
                    self.factory.address(),
                    Bytes::from(init_code[20..].to_vec()),
                )
                .await
                .context("should estimate the account creation gas")?;
            (init_code, init_gas, U256::from(DEFAULT_CALL_GAS_LIMIT))
        };

        let (max_fee_per_gas, max_priority_fee_per_gas) =
            self.provider.estimate_eip1559_fees(None).await?;
        let uo = UserOperation {
            sender,
            nonce,
            init_code,
            call_data,
            call_gas_limit,
            verification_gas_limit: U256::from(BASE_VERIFICATION_GAS) + init_gas,
            pre_verification_gas: U256::zero(),
            max_fee_per_gas,
            max_priority_fee_per_gas,
            paymaster_and_data: Bytes::default(),
            signature: Bytes::default(),
        };
        let uo = UserOperation {
            pre_verification_gas: pre_verification_gas(&uo),
            ..uo
        };
        debug!(
            "Built user operation for {sender:?}: nonce {}, deployed {deployed}",
            uo.nonce
        );

        self.sign(uo).await
    }

    async fn get_user_op_receipt(&self, hash: UserOperationHash) -> anyhow::Result<Option<H256>> {
        let deadline = Instant::now() + self.receipt_timeout;
        loop {
            let latest = self.provider.get_block_number().await?;
            let events = self
                .entry_point
                .user_operation_event_filter()
                .topic1(hash.0)
                .from_block(latest.saturating_sub(U64::from(RECEIPT_LOOKBACK_BLOCKS)))
                .query_with_meta()
                .await?;
            if let Some((_, meta)) = events.first() {
                return Ok(Some(meta.transaction_hash));
            }
            if Instant::now() >= deadline {
                return Ok(None);
            }
            trace!("user operation {hash} not mined yet");
            tokio::time::sleep(self.receipt_interval).await;
        }
    }
}

/// Gas the bundler charges for the calldata and per-operation overhead of `uo`.
///
/// The packed operation is priced with a placeholder signature so the estimate holds once signed.
pub fn pre_verification_gas(uo: &UserOperation) -> U256 {
    let packed = UserOperation {
        pre_verification_gas: U256::from(PVG_FIXED),
        signature: DUMMY_SIGNATURE.to_vec().into(),
        ..uo.clone()
    }
    .pack();
    let call_data_cost: u64 = packed
        .iter()
        .map(|&b| if b == 0 { PVG_ZERO_BYTE } else { PVG_NON_ZERO_BYTE })
        .sum();
    let words = (packed.len() as u64 + 31) / 32;
    U256::from(call_data_cost + PVG_FIXED + PVG_PER_USER_OP + PVG_PER_USER_OP_WORD * words)
}
