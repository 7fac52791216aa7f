//! A bare-bones bundler for local debugging. Every accepted operation is sent on its own in a
//! `handleOps` transaction paid by the funder, who is also the beneficiary.

use crate::{
    consts::USER_OPERATION_REJECTED_CODE,
    gen::{EntryPoint, FailedOp},
    traits::Funder,
    types::{UserOperation, UserOperationHash},
};
use ethers::{
    contract::ContractError,
    providers::Middleware,
    types::{Address, TransactionRequest, H256, U64},
};
use hashbrown::HashMap;
use jsonrpsee::{
    core::{async_trait, RpcResult},
    proc_macros::rpc,
    server::{Server, ServerHandle},
    types::{error::INTERNAL_ERROR_CODE, ErrorObjectOwned},
};
use parking_lot::RwLock;
use pin_utils::pin_mut;
use std::{future::Future, net::SocketAddr, sync::Arc};
use tracing::{debug, info, warn};

#[rpc(server, namespace = "eth")]
pub trait EthApi {
    #[method(name = "chainId")]
    async fn chain_id(&self) -> RpcResult<U64>;

    #[method(name = "supportedEntryPoints")]
    async fn supported_entry_points(&self) -> RpcResult<Vec<Address>>;

    #[method(name = "sendUserOperation")]
    async fn send_user_operation(
        &self,
        user_operation: UserOperation,
        entry_point: Address,
    ) -> RpcResult<UserOperationHash>;
}

pub struct DevBundler<M: Middleware> {
    entry_point: EntryPoint<M>,
    chain_id: u64,
    funder: Arc<dyn Funder>,
    /// Operations already included, with their transaction
    included: RwLock<HashMap<UserOperationHash, H256>>,
}

impl<M: Middleware + 'static> DevBundler<M> {
    pub fn new(
        provider: Arc<M>,
        entry_point: Address,
        chain_id: u64,
        funder: Arc<dyn Funder>,
    ) -> Self {
        Self {
            entry_point: EntryPoint::new(entry_point, provider),
            chain_id,
            funder,
            included: RwLock::new(HashMap::new()),
        }
    }

    fn beneficiary(&self) -> Address {
        self.funder.address()
    }

    /// Runs `handleOps` as a call first so a failing operation is reported with its revert
    /// reason instead of burning gas
    async fn simulate(&self, user_operation: &UserOperation) -> Result<(), String> {
        self.entry_point
            .handle_ops(vec![user_operation.clone().into()], self.beneficiary())
            .from(self.beneficiary())
            .call()
            .await
            .map_err(|e| revert_message(&e))
    }

    async fn handle_op(&self, user_operation: UserOperation) -> Result<H256, String> {
        let call_data = self
            .entry_point
            .handle_ops(vec![user_operation.into()], self.beneficiary())
            .calldata()
            .ok_or_else(|| "cannot encode handleOps".to_string())?;
        let tx = TransactionRequest::new()
            .to(self.entry_point.address())
            .data(call_data);
        let receipt = self
            .funder
            .send_and_confirm(tx)
            .await
            .map_err(|e| format!("{e:#}"))?;
        if receipt.status == Some(U64::zero()) {
            return Err(format!(
                "handleOps reverted in transaction {:?}",
                receipt.transaction_hash
            ));
        }
        Ok(receipt.transaction_hash)
    }
}

fn revert_message<M: Middleware>(err: &ContractError<M>) -> String {
    match err.decode_revert::<FailedOp>() {
        Some(failed) => format!("FailedOp({}, {})", failed.op_index, failed.reason),
        None => err.to_string(),
    }
}

fn rejected(message: impl Into<String>) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(USER_OPERATION_REJECTED_CODE, message.into(), None::<()>)
}

fn internal(message: impl ToString) -> ErrorObjectOwned {
    ErrorObjectOwned::owned(INTERNAL_ERROR_CODE, message.to_string(), None::<()>)
}

#[async_trait]
impl<M: Middleware + 'static> EthApiServer for DevBundler<M> {
    async fn chain_id(&self) -> RpcResult<U64> {
        Ok(self.chain_id.into())
    }

    async fn supported_entry_points(&self) -> RpcResult<Vec<Address>> {
        Ok(vec![self.entry_point.address()])
    }

    async fn send_user_operation(
        &self,
        user_operation: UserOperation,
        entry_point: Address,
    ) -> RpcResult<UserOperationHash> {
        if entry_point != self.entry_point.address() {
            return Err(rejected(format!("unsupported entry point {entry_point:?}")));
        }
        let hash = user_operation.hash(&entry_point, self.chain_id);
        if self.included.read().contains_key(&hash) {
            return Err(rejected(format!("user operation {hash} already included")));
        }

        let gas_price = self
            .entry_point
            .client()
            .get_gas_price()
            .await
            .map_err(internal)?;
        if user_operation.max_fee_per_gas < gas_price {
            warn!("Rejecting underpriced user operation {hash}");
            return Err(rejected(format!(
                "user operation underpriced: paid {} expected {gas_price}",
                user_operation.max_fee_per_gas
            )));
        }

        debug!("Simulating user operation {hash}");
        self.simulate(&user_operation).await.map_err(rejected)?;
        let tx_hash = self.handle_op(user_operation).await.map_err(rejected)?;
        info!("Included user operation {hash} in transaction {tx_hash:?}");
        self.included.write().insert(hash, tx_hash);
        Ok(hash)
    }
}

/// Starts the bundler RPC server
///
/// # Returns
/// * `SocketAddr` - The address the server listens on
/// * `ServerHandle` - Stops the server
pub async fn start_dev_bundler<M: Middleware + 'static>(
    addr: SocketAddr,
    bundler: DevBundler<M>,
) -> anyhow::Result<(SocketAddr, ServerHandle)> {
    let server = Server::builder().build(addr).await?;
    let local_addr = server.local_addr()?;
    let handle = server.start(bundler.into_rpc());
    info!("Dev bundler listening on http://{local_addr}");
    Ok((local_addr, handle))
}

/// Runs the future to completion or until:
/// - `ctrl-c` is received.
/// - `SIGTERM` is received (unix only).
pub async fn run_until_ctrl_c<F, E>(fut: F) -> anyhow::Result<(), E>
where
    F: Future<Output = Result<(), E>>,
    E: Send + Sync + 'static + From<std::io::Error>,
{
    let ctrl_c = tokio::signal::ctrl_c();

    let mut stream = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
    let sigterm = stream.recv();
    pin_mut!(sigterm, ctrl_c, fut);

    tokio::select! {
        _ = ctrl_c => {
            info!("Received ctrl-c signal.");
        },
        _ = sigterm => {
            info!("Received SIGTERM signal.");
        },
        res = fut => res?,
    }

    Ok(())
}
