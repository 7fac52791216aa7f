use async_trait::async_trait;
use ethers::types::{Address, Bytes, TransactionReceipt, TransactionRequest, H256, U256};
use parking_lot::Mutex;
use std::sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc,
};
use userop_diag::{
    errors::{BundlerError, RunOpError},
    factory::FactoryDescriptor,
    session::{self, entry_point_selector, Collaborators, RunSettings},
    traits::{AccountApi, BundlerClient, Deployer, Funder, Network},
    types::{UserOperation, UserOperationHash},
};

const GWEI: u64 = 1_000_000_000;
const FACTORY: Address = Address::repeat_byte(0xfa);
const ACCOUNT: Address = Address::repeat_byte(0xac);

struct FakeNetwork {
    balance: U256,
    gas_price: U256,
}

#[async_trait]
impl Network for FakeNetwork {
    fn chain_id(&self) -> u64 {
        1337
    }

    async fn get_balance(&self, _address: Address) -> anyhow::Result<U256> {
        Ok(self.balance)
    }

    async fn get_code(&self, _address: Address) -> anyhow::Result<Bytes> {
        Ok(Bytes::default())
    }

    async fn get_gas_price(&self) -> anyhow::Result<U256> {
        Ok(self.gas_price)
    }
}

struct FakeDeployer {
    deployed: AtomicBool,
    deploys: AtomicUsize,
}

impl FakeDeployer {
    fn new(deployed: bool) -> Self {
        Self {
            deployed: AtomicBool::new(deployed),
            deploys: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Deployer for FakeDeployer {
    fn compute_address(&self, _descriptor: &FactoryDescriptor) -> Address {
        FACTORY
    }

    async fn is_deployed(&self, _address: Address) -> anyhow::Result<bool> {
        Ok(self.deployed.load(Ordering::SeqCst))
    }

    async fn deploy(
        &self,
        _descriptor: &FactoryDescriptor,
        funder: &dyn Funder,
    ) -> anyhow::Result<TransactionReceipt> {
        self.deploys.fetch_add(1, Ordering::SeqCst);
        let receipt = funder
            .send_and_confirm(TransactionRequest::new().data(vec![0x60, 0x80]))
            .await?;
        self.deployed.store(true, Ordering::SeqCst);
        Ok(receipt)
    }
}

#[derive(Default)]
struct RecordingFunder {
    sent: Mutex<Vec<TransactionRequest>>,
}

#[async_trait]
impl Funder for RecordingFunder {
    fn address(&self) -> Address {
        Address::repeat_byte(0x0f)
    }

    async fn send_and_confirm(&self, tx: TransactionRequest) -> anyhow::Result<TransactionReceipt> {
        self.sent.lock().push(tx);
        Ok(TransactionReceipt {
            transaction_hash: H256::repeat_byte(0x01),
            status: Some(1u64.into()),
            ..Default::default()
        })
    }
}

struct FakeAccount {
    factory: Address,
    nonce: Mutex<u64>,
}

#[async_trait]
impl AccountApi for FakeAccount {
    async fn counterfactual_address(&self) -> anyhow::Result<Address> {
        Ok(ACCOUNT)
    }

    async fn create_signed_user_op(
        &self,
        target: Address,
        data: Bytes,
    ) -> anyhow::Result<UserOperation> {
        let mut nonce = self.nonce.lock();
        let uo = UserOperation {
            sender: ACCOUNT,
            nonce: (*nonce).into(),
            init_code: self.factory.as_bytes().to_vec().into(),
            call_data: [target.as_bytes(), data.as_ref()].concat().into(),
            max_fee_per_gas: U256::from(GWEI),
            ..Default::default()
        };
        *nonce += 1;
        Ok(uo)
    }

    async fn get_user_op_receipt(&self, hash: UserOperationHash) -> anyhow::Result<Option<H256>> {
        Ok(Some(hash.0))
    }
}

#[derive(Default)]
struct FakeBundler {
    received: Mutex<Vec<UserOperation>>,
    expected_fee: Option<U256>,
    unreachable: bool,
}

#[async_trait]
impl BundlerClient for FakeBundler {
    async fn check_compatible(&self) -> anyhow::Result<()> {
        if self.unreachable {
            anyhow::bail!("Bundler transport error: connection refused");
        }
        Ok(())
    }

    async fn send_user_op_to_bundler(
        &self,
        uo: &UserOperation,
    ) -> anyhow::Result<UserOperationHash> {
        self.received.lock().push(uo.clone());
        if let Some(expected) = self.expected_fee {
            anyhow::bail!(
                "user operation underpriced: paid {} expected {expected}",
                uo.max_fee_per_gas
            );
        }
        Ok(uo.hash(&Address::zero(), 1337))
    }
}

struct Harness {
    deployer: Arc<FakeDeployer>,
    funder: Arc<RecordingFunder>,
    bundler: Arc<FakeBundler>,
    collaborators: Collaborators,
}

fn harness(factory_deployed: bool, balance: U256, bundler: FakeBundler) -> Harness {
    let deployer = Arc::new(FakeDeployer::new(factory_deployed));
    let funder = Arc::new(RecordingFunder::default());
    let bundler = Arc::new(bundler);
    let collaborators = Collaborators {
        network: Arc::new(FakeNetwork {
            balance,
            gas_price: U256::from(2 * GWEI),
        }),
        deployer: deployer.clone(),
        funder: funder.clone(),
        bundler: bundler.clone(),
    };
    Harness {
        deployer,
        funder,
        bundler,
        collaborators,
    }
}

fn settings() -> RunSettings {
    RunSettings::new(FactoryDescriptor::new(
        Bytes::from(vec![0x60, 0x80]),
        Bytes::default(),
    ))
}

fn make_account(factory: Address) -> Arc<dyn AccountApi> {
    Arc::new(FakeAccount {
        factory,
        nonce: Mutex::new(0),
    })
}

#[tokio::test]
async fn funds_empty_account_and_submits_twice() {
    let h = harness(true, U256::zero(), FakeBundler::default());
    let report = session::run(&h.collaborators, &settings(), make_account)
        .await
        .unwrap();

    assert_eq!(report.account, ACCOUNT);
    assert!(!report.deployed);
    let required = U256::from(2 * GWEI) * 4_000_000u64;
    assert_eq!(report.funding.required, required);

    let sent = h.funder.sent.lock();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, Some(ACCOUNT.into()));
    assert_eq!(sent[0].value, Some(required));

    assert_eq!(report.operations.len(), 2);
    assert_ne!(report.operations[0].hash, report.operations[1].hash);
    assert_eq!(h.deployer.deploys.load(Ordering::SeqCst), 0);

    let received = h.bundler.received.lock();
    // the account calls itself with entryPoint() by default
    let expected_call: Bytes = [ACCOUNT.as_bytes(), entry_point_selector().as_ref()]
        .concat()
        .into();
    assert!(received.iter().all(|uo| uo.call_data == expected_call));
    assert_eq!(received[0].init_code.as_ref(), FACTORY.as_bytes());
}

#[tokio::test]
async fn well_funded_account_is_left_alone() {
    let balance = U256::from(2 * GWEI) * 2_000_000u64;
    let h = harness(true, balance, FakeBundler::default());
    let report = session::run(&h.collaborators, &settings(), make_account)
        .await
        .unwrap();
    assert!(!report.funding.should_fund);
    assert!(h.funder.sent.lock().is_empty());
    assert_eq!(report.operations.len(), 2);
}

#[tokio::test]
async fn missing_factory_stops_before_the_account() {
    let h = harness(false, U256::zero(), FakeBundler::default());
    let called = AtomicBool::new(false);
    let err = session::run(&h.collaborators, &settings(), |factory| {
        called.store(true, Ordering::SeqCst);
        make_account(factory)
    })
    .await
    .unwrap_err();

    assert!(matches!(err, RunOpError::MissingFactory { address } if address == FACTORY));
    assert!(err.to_string().contains("--deploy-factory"));
    assert!(!called.load(Ordering::SeqCst));
    assert!(h.funder.sent.lock().is_empty());
    assert!(h.bundler.received.lock().is_empty());
}

#[tokio::test]
async fn missing_factory_is_reported_before_an_unreachable_bundler() {
    let bundler = FakeBundler {
        unreachable: true,
        ..Default::default()
    };
    let h = harness(false, U256::zero(), bundler);
    let err = session::run(&h.collaborators, &settings(), make_account)
        .await
        .unwrap_err();
    assert!(matches!(err, RunOpError::MissingFactory { .. }));
}

#[tokio::test]
async fn unreachable_bundler_is_a_configuration_error() {
    let bundler = FakeBundler {
        unreachable: true,
        ..Default::default()
    };
    let h = harness(true, U256::zero(), bundler);
    let err = session::run(&h.collaborators, &settings(), make_account)
        .await
        .unwrap_err();
    assert!(matches!(err, RunOpError::Configuration(ref m) if m.contains("connection refused")));
    assert!(h.funder.sent.lock().is_empty());
}

#[tokio::test]
async fn deploys_factory_when_permitted() {
    let h = harness(false, U256::zero(), FakeBundler::default());
    let settings = RunSettings {
        deploy_factory: true,
        runs: 1,
        ..settings()
    };
    let report = session::run(&h.collaborators, &settings, make_account)
        .await
        .unwrap();
    assert_eq!(h.deployer.deploys.load(Ordering::SeqCst), 1);
    // deployment, then funding
    assert_eq!(h.funder.sent.lock().len(), 2);
    assert_eq!(report.operations.len(), 1);
}

#[tokio::test]
async fn underpriced_operation_is_reported_as_shortfall() {
    let bundler = FakeBundler {
        expected_fee: Some(U256::from(4 * GWEI)),
        ..Default::default()
    };
    let h = harness(true, U256::zero(), bundler);
    let err = session::run(&h.collaborators, &settings(), make_account)
        .await
        .unwrap_err();

    match err {
        RunOpError::Bundler(BundlerError::GasShortfall {
            paid,
            expected,
            percentage,
            missing,
        }) => {
            assert_eq!(paid, U256::from(1u64));
            assert_eq!(expected, U256::from(4u64));
            assert_eq!(percentage, U256::from(25u64));
            assert_eq!(missing, U256::from(3u64));
        }
        other => panic!("unexpected {other:?}"),
    }
    // the first failure ends the run
    assert_eq!(h.bundler.received.lock().len(), 1);
}

#[tokio::test]
async fn explicit_target_and_call_data() {
    let h = harness(true, U256::zero(), FakeBundler::default());
    let target = Address::repeat_byte(0x77);
    let settings = RunSettings {
        target: Some(target),
        call_data: Some(Bytes::from(vec![0xde, 0xad])),
        runs: 1,
        ..settings()
    };
    session::run(&h.collaborators, &settings, make_account)
        .await
        .unwrap();
    let received = h.bundler.received.lock();
    assert_eq!(
        received[0].call_data.as_ref(),
        [target.as_bytes(), &[0xde_u8, 0xad][..]].concat().as_slice()
    );
}
