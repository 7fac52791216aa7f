use crate::{
    errors::UserOpMiddlewareError,
    traits::BundlerClient,
    types::{Request, Response, UserOperation, UserOperationHash},
};
use async_trait::async_trait;
use ethers::{
    providers::{Middleware, MiddlewareError},
    types::{Address, U64},
};
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use tracing::{debug, trace};

/// Node middleware paired with a bundler endpoint. Node calls go through the inner middleware,
/// user operations go to the bundler over JSON-RPC
#[derive(Clone, Debug)]
pub struct UserOpMiddleware<M> {
    inner: M,
    entry_point_address: Address,
    rpc_address: String,
    client: Client,
}

impl<M: Middleware> MiddlewareError for UserOpMiddlewareError<M> {
    type Inner = M::Error;

    fn from_err(src: M::Error) -> Self {
        UserOpMiddlewareError::MiddlewareError(src)
    }

    fn as_inner(&self) -> Option<&Self::Inner> {
        match self {
            UserOpMiddlewareError::MiddlewareError(e) => Some(e),
            _ => None,
        }
    }
}

#[async_trait]
impl<M: Middleware> Middleware for UserOpMiddleware<M> {
    type Error = UserOpMiddlewareError<M>;
    type Provider = M::Provider;
    type Inner = M;

    fn inner(&self) -> &M {
        &self.inner
    }
}

impl<M: Middleware> UserOpMiddleware<M> {
    pub fn new(inner: M, entry_point_address: Address, rpc_address: String) -> Self {
        Self {
            inner,
            entry_point_address,
            rpc_address,
            client: Client::new(),
        }
    }

    async fn request<P, R>(&self, method: &str, params: P) -> Result<R, UserOpMiddlewareError<M>>
    where
        P: Serialize + Send + Sync,
        R: DeserializeOwned,
    {
        trace!("bundler request {method}");
        let req_body = Request::new(method, params);
        let str_response = self
            .client
            .post(&self.rpc_address)
            .json(&req_body)
            .send()
            .await?
            .text()
            .await?;
        debug!("bundler response to {method}: {str_response}");
        parse_response(&str_response)
    }

    /// Gets the chain id the bundler serves
    pub async fn chain_id_from_bundler(&self) -> Result<u64, UserOpMiddlewareError<M>> {
        let chain_id: U64 = self.request("eth_chainId", Vec::<Value>::new()).await?;
        Ok(chain_id.as_u64())
    }

    /// Gets the entry points the bundler accepts operations for
    pub async fn supported_entry_points(&self) -> Result<Vec<Address>, UserOpMiddlewareError<M>> {
        self.request("eth_supportedEntryPoints", Vec::<Value>::new())
            .await
    }

    /// Makes sure the bundler and the node behind the inner middleware are on the same chain
    pub async fn validate_chain_id(&self) -> Result<(), UserOpMiddlewareError<M>> {
        let provider = self.get_chainid().await?.as_u64();
        let bundler = self.chain_id_from_bundler().await?;
        if bundler != provider {
            return Err(UserOpMiddlewareError::ChainIdMismatch { bundler, provider });
        }
        Ok(())
    }

    /// Checks that the bundler serves the node's chain and accepts our entry point
    pub async fn check_compatible(&self) -> Result<(), UserOpMiddlewareError<M>> {
        self.validate_chain_id().await?;
        let supported = self.supported_entry_points().await?;
        if !supported.contains(&self.entry_point_address) {
            return Err(UserOpMiddlewareError::UnsupportedEntryPoint(
                self.entry_point_address,
            ));
        }
        Ok(())
    }

    /// Sends a signed user operation to the bundler
    ///
    /// # Returns
    /// * `UserOperationHash` - The hash the bundler assigned to the operation
    /// * `UserOpMiddlewareError::JsonRpc` - The bundler rejected the operation; its message is kept verbatim
    pub async fn send_user_operation(
        &self,
        uo: &UserOperation,
    ) -> Result<UserOperationHash, UserOpMiddlewareError<M>> {
        let params = vec![json!(uo), json!(self.entry_point_address)];
        self.request("eth_sendUserOperation", params).await
    }
}

#[async_trait]
impl<M: Middleware + 'static> BundlerClient for UserOpMiddleware<M> {
    async fn check_compatible(&self) -> anyhow::Result<()> {
        Ok(UserOpMiddleware::check_compatible(self).await?)
    }

    async fn send_user_op_to_bundler(
        &self,
        user_operation: &UserOperation,
    ) -> anyhow::Result<UserOperationHash> {
        Ok(self.send_user_operation(user_operation).await?)
    }
}

/// Decodes a JSON-RPC reply. An error object wins over a result
fn parse_response<R: DeserializeOwned, M: Middleware>(
    body: &str,
) -> Result<R, UserOpMiddlewareError<M>> {
    let res = serde_json::from_str::<Response<R>>(body)?;
    match (res.result, res.error) {
        (_, Some(error)) => Err(UserOpMiddlewareError::JsonRpc {
            code: error.code,
            message: error.message,
        }),
        (Some(result), None) => Ok(result),
        (None, None) => Err(UserOpMiddlewareError::Serde(serde::de::Error::custom(
            "response has neither result nor error",
        ))),
    }
}
