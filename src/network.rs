use crate::{
    consts::DEFAULT_NETWORK,
    errors::RunOpError,
    traits::{Funder, Network},
    types::SignerType,
    utils::wallet_from_file,
};
use anyhow::Context;
use async_trait::async_trait;
use ethers::{
    prelude::{MiddlewareBuilder, SignerMiddleware},
    providers::{Http, Middleware, Provider},
    signers::Signer,
    types::{Address, Bytes, TransactionReceipt, TransactionRequest, U256},
};
use std::{path::Path, sync::Arc, time::Duration};
use tracing::info;

/// Resolves a `--network` value to a node URL. Bare names map to a local node
pub fn resolve_network_url(network: &str) -> Result<String, RunOpError> {
    match network {
        "localhost" | "local" | "dev" => Ok(DEFAULT_NETWORK.to_string()),
        url if url.starts_with("http://") || url.starts_with("https://") => Ok(url.to_string()),
        other => Err(RunOpError::Configuration(format!(
            "unknown network {other}. pass a node URL (http://...)"
        ))),
    }
}

/// The node connection and the chain it serves
#[derive(Clone, Debug)]
pub struct NetworkContext<M> {
    /// The ethers provider
    pub provider: Arc<M>,
    /// The chain id, read once when connecting
    pub chain_id: u64,
}

impl NetworkContext<Provider<Http>> {
    /// Connects to the node behind `network` and reads its chain id
    pub async fn connect(network: &str) -> Result<Self, RunOpError> {
        let url = resolve_network_url(network)?;
        let provider = Provider::<Http>::try_from(url.as_str())
            .map_err(|e| RunOpError::Configuration(format!("invalid network URL {url}: {e}")))?
            .interval(Duration::from_millis(500u64));
        let ctx = Self::new(Arc::new(provider)).await?;
        info!("Connected to {url}, chain id {}", ctx.chain_id);
        Ok(ctx)
    }
}

impl<M: Middleware + 'static> NetworkContext<M> {
    pub async fn new(provider: Arc<M>) -> anyhow::Result<Self> {
        let chain_id = provider
            .get_chainid()
            .await
            .context("should get chain id from the provider")?
            .as_u64();
        Ok(Self { provider, chain_id })
    }

    /// Picks the identity that pays for funding and deployment.
    /// A key file wins; otherwise the node's first unlocked account is used
    pub async fn resolve_funder(
        &self,
        key_file: Option<&Path>,
    ) -> Result<Arc<dyn Funder>, RunOpError> {
        if let Some(path) = key_file {
            let wallet = wallet_from_file(path)
                .map_err(|e| RunOpError::Configuration(format!("{e:#}")))?
                .with_chain_id(self.chain_id);
            let address = wallet.address();
            let client: SignerType<M> = SignerMiddleware::new(self.provider.clone(), wallet)
                .nonce_manager(address);
            info!("Funding from key file account {address:?}");
            return Ok(Arc::new(MiddlewareFunder::new(Arc::new(client), address)));
        }

        let accounts = self
            .provider
            .get_accounts()
            .await
            .map_err(|e| RunOpError::Configuration(format!("must specify --mnemonic: {e}")))?;
        match accounts.first() {
            Some(&address) => {
                info!("Funding from node account {address:?}");
                Ok(Arc::new(MiddlewareFunder::new(self.provider.clone(), address)))
            }
            None => Err(RunOpError::Configuration(
                "no account. use --mnemonic (needed to fund account)".to_string(),
            )),
        }
    }
}

#[async_trait]
impl<M: Middleware + 'static> Network for NetworkContext<M> {
    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    async fn get_balance(&self, address: Address) -> anyhow::Result<U256> {
        Ok(self.provider.get_balance(address, None).await?)
    }

    async fn get_code(&self, address: Address) -> anyhow::Result<Bytes> {
        Ok(self.provider.get_code(address, None).await?)
    }

    async fn get_gas_price(&self) -> anyhow::Result<U256> {
        Ok(self.provider.get_gas_price().await?)
    }
}

/// A [Funder](Funder) sending through any ethers middleware.
/// With a signer middleware the key signs locally, with a bare provider the node signs
#[derive(Debug)]
pub struct MiddlewareFunder<M> {
    client: Arc<M>,
    address: Address,
}

impl<M> MiddlewareFunder<M> {
    pub fn new(client: Arc<M>, address: Address) -> Self {
        Self { client, address }
    }
}

#[async_trait]
impl<M: Middleware + 'static> Funder for MiddlewareFunder<M> {
    fn address(&self) -> Address {
        self.address
    }

    async fn send_and_confirm(&self, tx: TransactionRequest) -> anyhow::Result<TransactionReceipt> {
        let tx = tx.from(self.address);
        let pending = self.client.send_transaction(tx, None).await?;
        let tx_hash = *pending;
        pending
            .await?
            .with_context(|| format!("transaction {tx_hash:?} was dropped"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_names_resolve_to_local_node() {
        assert_eq!(resolve_network_url("localhost").unwrap(), DEFAULT_NETWORK);
        assert_eq!(
            resolve_network_url("https://rpc.example.org").unwrap(),
            "https://rpc.example.org"
        );
        assert!(matches!(
            resolve_network_url("mainnet"),
            Err(RunOpError::Configuration(_))
        ));
    }

    #[tokio::test]
    async fn reads_chain_id_and_balances() {
        let (provider, mock) = Provider::mocked();
        // responses are served last-in first-out
        mock.push(U256::from(1_000u64)).unwrap();
        mock.push(ethers::types::U64::from(1337u64)).unwrap();
        let ctx = NetworkContext::new(Arc::new(provider)).await.unwrap();
        assert_eq!(Network::chain_id(&ctx), 1337);
        assert_eq!(
            ctx.get_balance(Address::zero()).await.unwrap(),
            U256::from(1_000u64)
        );
    }

    #[tokio::test]
    async fn no_node_accounts_is_a_configuration_error() {
        let (provider, mock) = Provider::mocked();
        mock.push::<Vec<Address>, _>(vec![]).unwrap();
        let ctx = NetworkContext {
            provider: Arc::new(provider),
            chain_id: 1337,
        };
        let err = ctx.resolve_funder(None).await.err().unwrap();
        assert!(err.to_string().contains("use --mnemonic"));
    }

    #[tokio::test]
    async fn unreachable_accounts_keep_the_cause() {
        // nothing queued, so eth_accounts fails
        let (provider, _mock) = Provider::mocked();
        let ctx = NetworkContext {
            provider: Arc::new(provider),
            chain_id: 1337,
        };
        let err = ctx.resolve_funder(None).await.err().unwrap();
        let message = err.to_string();
        assert!(message.contains("must specify --mnemonic: "));
        assert!(message.len() > "fatal: must specify --mnemonic: ".len());
    }

    #[tokio::test]
    async fn first_node_account_funds() {
        let (provider, mock) = Provider::mocked();
        let coinbase = Address::repeat_byte(0x11);
        mock.push::<Vec<Address>, _>(vec![coinbase, Address::repeat_byte(0x22)]).unwrap();
        let ctx = NetworkContext {
            provider: Arc::new(provider),
            chain_id: 1337,
        };
        let funder = ctx.resolve_funder(None).await.unwrap();
        assert_eq!(funder.address(), coinbase);
    }
}
