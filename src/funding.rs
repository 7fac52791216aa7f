use crate::traits::Funder;
use ethers::types::{Address, TransactionReceipt, TransactionRequest, U256};
use tracing::info;

/// Whether and how much to top up the account before submitting operations
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FundingDecision {
    /// Balance the account should hold
    pub required: U256,
    /// Balance the account holds
    pub current: U256,
    pub should_fund: bool,
    /// Value to transfer, zero when not funding
    pub amount: U256,
}

/// Applies the funding heuristic: fund only below half of the requirement, then fund up to all of it.
///
/// # Arguments
/// * `current_balance` - The account balance in wei
/// * `gas_price` - The current gas price in wei
/// * `execution_gas_budget` - Gas units a worst-case operation may burn, buffer included
pub fn decide(current_balance: U256, gas_price: U256, execution_gas_budget: U256) -> FundingDecision {
    let required = gas_price.saturating_mul(execution_gas_budget);
    let should_fund = current_balance < required / 2u64;
    FundingDecision {
        required,
        current: current_balance,
        should_fund,
        amount: if should_fund {
            required - current_balance
        } else {
            U256::zero()
        },
    }
}

/// Sends the transfer a decision asks for and waits until it is mined.
///
/// Returns `None` without touching the chain when the decision does not fund.
pub async fn fund(
    funder: &dyn Funder,
    account: Address,
    decision: &FundingDecision,
) -> anyhow::Result<Option<TransactionReceipt>> {
    if !decision.should_fund {
        info!("not funding account. balance is enough");
        return Ok(None);
    }

    info!("funding account to {}", decision.required);
    let receipt = funder
        .send_and_confirm(TransactionRequest::pay(account, decision.amount))
        .await?;
    info!(
        "funded account {account:?} with {} in transaction {:?}",
        decision.amount, receipt.transaction_hash
    );
    Ok(Some(receipt))
}
