use crate::{
    consts::GAS_SHORTFALL_SCALE,
    errors::BundlerError,
    traits::{AccountApi, BundlerClient},
    types::UserOperationHash,
};
use ethers::types::{Address, Bytes, H256, U256};
use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, info};

lazy_static! {
    static ref PAID_EXPECTED: Regex =
        Regex::new(r"paid (\d+) expected (\d+)").expect("shortfall pattern is valid");
}

/// A user operation the bundler accepted
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SubmittedOperation {
    pub hash: UserOperationHash,
    /// The transaction that included the operation, if it was mined before the lookup gave up
    pub transaction: Option<H256>,
}

/// Builds, signs and relays user operations for one account
pub struct OperationSubmitter<'a> {
    account: &'a dyn AccountApi,
    bundler: &'a dyn BundlerClient,
}

impl<'a> OperationSubmitter<'a> {
    pub fn new(account: &'a dyn AccountApi, bundler: &'a dyn BundlerClient) -> Self {
        Self { account, bundler }
    }

    /// Submits one operation calling `target` with `call_data` from the account.
    ///
    /// Bundler failures are diagnosed with [classify_failure](classify_failure) but never retried.
    pub async fn submit(
        &self,
        target: Address,
        call_data: Bytes,
    ) -> Result<SubmittedOperation, BundlerError> {
        let user_operation = self
            .account
            .create_signed_user_op(target, call_data)
            .await
            .map_err(BundlerError::Unclassified)?;
        debug!("Signed user operation {user_operation:?}");

        let relay = async {
            let hash = self
                .bundler
                .send_user_op_to_bundler(&user_operation)
                .await?;
            let transaction = self.account.get_user_op_receipt(hash).await?;
            anyhow::Ok(SubmittedOperation { hash, transaction })
        };
        let submitted = relay.await.map_err(classify_failure)?;
        info!(
            "reqId {} txid={:?}",
            submitted.hash, submitted.transaction
        );
        Ok(submitted)
    }
}

/// Diagnoses a bundler failure.
///
/// A message carrying `paid <N> expected <M>` becomes a [GasShortfall](BundlerError::GasShortfall).
/// The reported figures are scaled down by 1e9, the percentage is taken from the raw figures.
/// Anything else is passed through untouched.
pub fn classify_failure(error: anyhow::Error) -> BundlerError {
    match parse_gas_shortfall(&error.to_string()) {
        Some(shortfall) => shortfall,
        None => BundlerError::Unclassified(error),
    }
}

fn parse_gas_shortfall(message: &str) -> Option<BundlerError> {
    let captures = PAID_EXPECTED.captures(message)?;
    let raw_paid = U256::from_dec_str(&captures[1]).ok()?;
    let raw_expected = U256::from_dec_str(&captures[2]).ok()?;
    let percentage = raw_paid
        .saturating_mul(U256::from(100u64))
        .checked_div(raw_expected)
        .unwrap_or_default();
    let scale = U256::from(GAS_SHORTFALL_SCALE);
    let (paid, expected) = (raw_paid / scale, raw_expected / scale);
    Some(BundlerError::GasShortfall {
        paid,
        expected,
        percentage,
        missing: expected.saturating_sub(paid),
    })
}
