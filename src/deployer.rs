use crate::{
    consts::{
        DETERMINISTIC_DEPLOYER_ADDRESS, DETERMINISTIC_DEPLOYER_GAS_LIMIT,
        DETERMINISTIC_DEPLOYER_GAS_PRICE, DETERMINISTIC_DEPLOYER_SIGNER,
        DETERMINISTIC_DEPLOYER_TRANSACTION,
    },
    factory::FactoryDescriptor,
    traits::{Deployer, Funder},
};
use anyhow::Context;
use async_trait::async_trait;
use ethers::{
    providers::Middleware,
    types::{Address, Bytes, TransactionReceipt, TransactionRequest, H256, U256},
    utils::{get_create2_address_from_hash, keccak256},
};
use std::sync::Arc;
use tracing::info;

/// CREATE2 deployments through the deterministic deployment proxy, always with salt zero
#[derive(Debug)]
pub struct Create2Deployer<M> {
    provider: Arc<M>,
    proxy: Address,
    salt: H256,
}

impl<M: Middleware + 'static> Create2Deployer<M> {
    pub fn new(provider: Arc<M>) -> anyhow::Result<Self> {
        Ok(Self {
            provider,
            proxy: DETERMINISTIC_DEPLOYER_ADDRESS.parse()?,
            salt: H256::zero(),
        })
    }

    /// calculate the address `init_code` lands at when deployed through the proxy
    pub fn address_of(&self, init_code: &Bytes) -> Address {
        get_create2_address_from_hash(self.proxy, self.salt, keccak256(init_code))
    }

    async fn has_code(&self, address: Address) -> anyhow::Result<bool> {
        let code = self
            .provider
            .get_code(address, None)
            .await
            .with_context(|| format!("should get code at {address:?}"))?;
        Ok(!code.is_empty())
    }

    /// Deploys the proxy itself from its pre-signed transaction when the chain does not have it yet.
    /// The one-off signer is topped up by `funder` first
    async fn ensure_proxy(&self, funder: &dyn Funder) -> anyhow::Result<()> {
        if self.has_code(self.proxy).await? {
            return Ok(());
        }

        let signer: Address = DETERMINISTIC_DEPLOYER_SIGNER.parse()?;
        let needed = U256::from(DETERMINISTIC_DEPLOYER_GAS_PRICE)
            * U256::from(DETERMINISTIC_DEPLOYER_GAS_LIMIT);
        let balance = self.provider.get_balance(signer, None).await?;
        if balance < needed {
            info!("Funding deterministic deployer signer {signer:?}");
            funder
                .send_and_confirm(TransactionRequest::pay(signer, needed - balance))
                .await
                .context("should fund the deterministic deployer signer")?;
        }

        info!("Deploying deterministic deployer at {:?}", self.proxy);
        let raw: Bytes = DETERMINISTIC_DEPLOYER_TRANSACTION.parse()?;
        self.provider
            .send_raw_transaction(raw)
            .await
            .context("should send the deterministic deployer transaction")?
            .await?
            .context("deterministic deployer transaction should not be dropped")?;
        anyhow::ensure!(
            self.has_code(self.proxy).await?,
            "deterministic deployer missing at {:?} after deployment",
            self.proxy
        );
        Ok(())
    }
}

#[async_trait]
impl<M: Middleware + 'static> Deployer for Create2Deployer<M> {
    fn compute_address(&self, descriptor: &FactoryDescriptor) -> Address {
        self.address_of(&descriptor.init_code())
    }

    async fn is_deployed(&self, address: Address) -> anyhow::Result<bool> {
        self.has_code(address).await
    }

    async fn deploy(
        &self,
        descriptor: &FactoryDescriptor,
        funder: &dyn Funder,
    ) -> anyhow::Result<TransactionReceipt> {
        self.ensure_proxy(funder).await?;
        let data: Bytes = [self.salt.as_bytes(), descriptor.init_code().as_ref()]
            .concat()
            .into();
        let tx = TransactionRequest::new().to(self.proxy).data(data);
        funder.send_and_confirm(tx).await
    }
}
