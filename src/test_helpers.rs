//! In-memory ledger and wallet for exercising actions end to end.
//!
//! [`FakeLedger`] runs a draft's commands against its coin set with the same
//! all-or-nothing rule as the real ledger. A coin created inside a
//! transaction that is not merged, consumed or transferred fails the whole
//! transaction.

use crate::{
    actions::{
        BAKE_BY_HAND,
        BUY_AUTO_BAKERS,
        BrownieClient,
        CLAIM_BROWNIES,
        GET_BAKING_ACCOUNT,
    },
    config::GameConfig,
    ledger::{
        Address,
        CLOCK_OBJECT_ID,
        LedgerClient,
        ObjectId,
        ObjectRef,
        OwnedObjectsQuery,
        SignedTransaction,
        TransactionConfirmation,
        TransactionDigest,
        coin_type,
    },
    transaction::{
        Argument,
        CallArg,
        Command,
        PureValue,
        TransactionDraft,
    },
    wallet::{
        SIGN_TRANSACTION_FEATURE,
        SignTransactionRequest,
        Wallet,
        WalletAccount,
        WalletError,
    },
};
use color_eyre::eyre::{
    Result,
    eyre,
};
use std::{
    collections::{
        HashMap,
        HashSet,
    },
    sync::{
        Arc,
        Mutex,
    },
};

pub const NATIVE_COIN: &str = "0x2::iota::IOTA";
pub const DEFAULT_GAS_BALANCE: u64 = 1_000_000_000_000;
pub const DEFAULT_CLAIM_YIELD: u64 = 10;

fn numbered_id(n: u64) -> ObjectId {
    let mut bytes = [0u8; 32];
    bytes[24..].copy_from_slice(&n.to_be_bytes());
    ObjectId::new(bytes)
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Purchase {
    pub baker_type_id: u64,
    pub count: u64,
    pub fee_paid: u64,
    pub brownies_paid: u64,
}

#[derive(Clone, Debug)]
struct FakeObject {
    id: ObjectId,
    owner: Option<Address>,
    type_tag: String,
    version: u64,
    balance: Option<u64>,
}

#[derive(Clone, Debug)]
struct FreshCoin {
    type_tag: String,
    balance: u64,
}

#[derive(Debug)]
struct LedgerState {
    objects: Vec<FakeObject>,
    gas: HashMap<Address, u64>,
    next_id: u64,
    token_type: String,
    bake_yield: u64,
    claim_yield: u64,
    license_price: u64,
    offline: bool,
    confirmations_fail: bool,
    stale: HashSet<ObjectId>,
    executed: Vec<TransactionDraft>,
    digests: HashMap<TransactionDigest, u64>,
    purchases: Vec<Purchase>,
}

impl LedgerState {
    fn allocate_id(&mut self) -> ObjectId {
        self.next_id += 1;
        numbered_id(self.next_id)
    }
}

#[derive(Clone, Debug)]
pub struct FakeLedger {
    state: Arc<Mutex<LedgerState>>,
}

impl Default for FakeLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeLedger {
    pub fn new() -> Self {
        let state = LedgerState {
            objects: Vec::new(),
            gas: HashMap::new(),
            next_id: 0x1000,
            token_type: coin_type("0xb0b::brownie::BROWNIE"),
            bake_yield: 10,
            claim_yield: DEFAULT_CLAIM_YIELD,
            license_price: 0,
            offline: false,
            confirmations_fail: false,
            stale: HashSet::new(),
            executed: Vec::new(),
            digests: HashMap::new(),
            purchases: Vec::new(),
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// A ledger with the deployment's shared objects published.
    pub fn for_config(config: &GameConfig) -> Self {
        let ledger = Self::new();
        {
            let mut state = ledger.state.lock().unwrap();
            state.token_type = coin_type(&config.token_type());
            state.bake_yield = config.bake_by_hand_amount;
            state.license_price = config.license_price_nanos;
        }
        ledger.add_shared_object(
            config.brownie_inc_id,
            format!("{}::{}::BrownieInc", config.package_id, config.module),
        );
        ledger.add_shared_object(CLOCK_OBJECT_ID, "0x2::clock::Clock");
        ledger
    }

    pub fn add_shared_object(&self, id: ObjectId, type_tag: impl Into<String>) {
        self.state.lock().unwrap().objects.push(FakeObject {
            id,
            owner: None,
            type_tag: type_tag.into(),
            version: 1,
            balance: None,
        });
    }

    /// A `Coin<inner>` owned by `owner`.
    pub fn mint_coin(&self, owner: Address, inner: &str, balance: u64) -> ObjectId {
        let mut state = self.state.lock().unwrap();
        let id = state.allocate_id();
        state.objects.push(FakeObject {
            id,
            owner: Some(owner),
            type_tag: coin_type(inner),
            version: 1,
            balance: Some(balance),
        });
        id
    }

    pub fn mint_object(&self, owner: Address, type_tag: &str) -> ObjectId {
        let mut state = self.state.lock().unwrap();
        let id = state.allocate_id();
        state.objects.push(FakeObject {
            id,
            owner: Some(owner),
            type_tag: type_tag.to_string(),
            version: 1,
            balance: None,
        });
        id
    }

    pub fn set_offline(&self, offline: bool) {
        self.state.lock().unwrap().offline = offline;
    }

    pub fn set_claim_yield(&self, amount: u64) {
        self.state.lock().unwrap().claim_yield = amount;
    }

    pub fn set_confirmations_fail(&self, fail: bool) {
        self.state.lock().unwrap().confirmations_fail = fail;
    }

    /// Make the next transaction naming `id` fail as if another transaction
    /// changed the object first.
    pub fn mark_stale(&self, id: ObjectId) {
        self.state.lock().unwrap().stale.insert(id);
    }

    pub fn clear_stale(&self) {
        self.state.lock().unwrap().stale.clear();
    }

    /// Move an owned object away, as another transaction of the owner would.
    pub fn remove_object(&self, id: ObjectId) {
        self.state.lock().unwrap().objects.retain(|o| o.id != id);
    }

    pub fn gas_balance(&self, owner: Address) -> u64 {
        let state = self.state.lock().unwrap();
        state.gas.get(&owner).copied().unwrap_or(DEFAULT_GAS_BALANCE)
    }

    /// Token coins held by `owner`, in ledger order.
    pub fn token_coins(&self, owner: Address) -> Vec<(ObjectId, u64)> {
        let state = self.state.lock().unwrap();
        state
            .objects
            .iter()
            .filter(|o| o.owner == Some(owner) && o.type_tag == state.token_type)
            .map(|o| (o.id, o.balance.unwrap_or_default()))
            .collect()
    }

    pub fn token_balance(&self, owner: Address) -> u64 {
        self.token_coins(owner).iter().map(|(_, b)| b).sum()
    }

    pub fn objects_of_type(&self, owner: Address, type_suffix: &str) -> Vec<ObjectId> {
        let state = self.state.lock().unwrap();
        state
            .objects
            .iter()
            .filter(|o| o.owner == Some(owner) && o.type_tag.ends_with(type_suffix))
            .map(|o| o.id)
            .collect()
    }

    pub fn executed(&self) -> Vec<TransactionDraft> {
        self.state.lock().unwrap().executed.clone()
    }

    pub fn purchases(&self) -> Vec<Purchase> {
        self.state.lock().unwrap().purchases.clone()
    }
}

impl LedgerClient for FakeLedger {
    async fn get_owned_objects(
        &self,
        owner: &Address,
        query: &OwnedObjectsQuery,
    ) -> Result<Vec<ObjectRef>> {
        let state = self.state.lock().unwrap();
        if state.offline {
            return Err(eyre!("connection refused"));
        }
        Ok(state
            .objects
            .iter()
            .filter(|o| o.owner == Some(*owner))
            .filter(|o| {
                query
                    .struct_type
                    .as_ref()
                    .is_none_or(|t| o.type_tag == *t)
            })
            .map(|o| ObjectRef {
                object_id: o.id,
                version: o.version,
                digest: format!("digest-{}", o.version),
                type_tag: o.type_tag.clone(),
            })
            .collect())
    }

    async fn execute_transaction_block(
        &self,
        signed: &SignedTransaction,
    ) -> Result<TransactionDigest> {
        let mut state = self.state.lock().unwrap();
        if state.offline {
            return Err(eyre!("connection refused"));
        }
        let draft: TransactionDraft = serde_json::from_str(&signed.bytes)
            .map_err(|e| eyre!("malformed transaction bytes: {e}"))?;
        if signed.signature != FakeWallet::signature_for(&draft.sender()) {
            return Err(eyre!("signature does not match sender"));
        }
        let mut run = Execution::new(&state, &draft);
        run.run().map_err(|e| eyre!("transaction aborted: {e}"))?;
        let Execution {
            objects,
            gas,
            next_id,
            purchases,
            ..
        } = run;
        state.objects = objects;
        state.gas.insert(draft.sender(), gas);
        state.next_id = next_id;
        state.purchases.extend(purchases);
        state.executed.push(draft);
        let sequence = state.executed.len() as u64;
        let digest = TransactionDigest(format!("fake-digest-{sequence}"));
        state.digests.insert(digest.clone(), sequence);
        Ok(digest)
    }

    async fn wait_for_transaction(
        &self,
        digest: &TransactionDigest,
    ) -> Result<TransactionConfirmation> {
        let state = self.state.lock().unwrap();
        if state.confirmations_fail {
            return Err(eyre!("timed out waiting for {digest}"));
        }
        let checkpoint = state
            .digests
            .get(digest)
            .copied()
            .ok_or_else(|| eyre!("unknown transaction {digest}"))?;
        Ok(TransactionConfirmation {
            digest: digest.clone(),
            checkpoint: Some(checkpoint),
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
enum Slot {
    Gas,
    Owned(ObjectId),
    Fresh(u16, u16),
}

/// Working copy of the ledger for one transaction. Dropped on failure.
struct Execution<'a> {
    draft: &'a TransactionDraft,
    sender: Address,
    objects: Vec<FakeObject>,
    gas: u64,
    next_id: u64,
    token_type: String,
    bake_yield: u64,
    claim_yield: u64,
    license_price: u64,
    stale: HashSet<ObjectId>,
    fresh: HashMap<(u16, u16), FreshCoin>,
    moved: HashSet<Slot>,
    purchases: Vec<Purchase>,
}

type Step<T> = std::result::Result<T, String>;

impl<'a> Execution<'a> {
    fn new(state: &LedgerState, draft: &'a TransactionDraft) -> Self {
        let sender = draft.sender();
        Self {
            draft,
            sender,
            objects: state.objects.clone(),
            gas: state.gas.get(&sender).copied().unwrap_or(DEFAULT_GAS_BALANCE),
            next_id: state.next_id,
            token_type: state.token_type.clone(),
            bake_yield: state.bake_yield,
            claim_yield: state.claim_yield,
            license_price: state.license_price,
            stale: state.stale.clone(),
            fresh: HashMap::new(),
            moved: HashSet::new(),
            purchases: Vec::new(),
        }
    }

    fn run(&mut self) -> Step<()> {
        let draft = self.draft;
        for (index, command) in draft.commands().iter().enumerate() {
            let index = index as u16;
            match command {
                Command::SplitCoins { coin, amounts } => {
                    let source = self.slot(*coin)?;
                    let (type_tag, balance) = self.coin(source)?;
                    let amounts = amounts
                        .iter()
                        .map(|a| self.pure_u64(*a))
                        .collect::<Step<Vec<_>>>()?;
                    let total: u64 = amounts.iter().sum();
                    if total > balance {
                        return Err(format!(
                            "InsufficientCoinBalance: split {total} from {balance}"
                        ));
                    }
                    self.set_balance(source, balance - total)?;
                    for (j, amount) in amounts.into_iter().enumerate() {
                        self.fresh.insert(
                            (index, j as u16),
                            FreshCoin {
                                type_tag: type_tag.clone(),
                                balance: amount,
                            },
                        );
                    }
                }
                Command::MergeCoins {
                    destination,
                    sources,
                } => {
                    let target = self.slot(*destination)?;
                    let (type_tag, mut balance) = self.coin(target)?;
                    for source in sources {
                        let source = self.slot(*source)?;
                        let (source_type, amount) = self.take_coin(source)?;
                        if source_type != type_tag {
                            return Err(format!(
                                "cannot merge {source_type} into {type_tag}"
                            ));
                        }
                        balance += amount;
                    }
                    self.set_balance(target, balance)?;
                }
                Command::TransferObjects { objects, address } => {
                    let recipient = self.pure_address(*address)?;
                    for object in objects {
                        let slot = self.slot(*object)?;
                        self.transfer(slot, recipient)?;
                    }
                }
                Command::MoveCall { target, arguments } => {
                    self.call(index, &target.function, arguments)?;
                }
            }
        }
        if !self.fresh.is_empty() {
            return Err(format!(
                "UnusedValueWithoutDrop: {} coin(s) left in transaction scope",
                self.fresh.len()
            ));
        }
        Ok(())
    }

    fn call(&mut self, index: u16, function: &str, arguments: &[Argument]) -> Step<()> {
        let arg = |i: usize| {
            arguments
                .get(i)
                .copied()
                .ok_or_else(|| format!("{function}: missing argument {i}"))
        };
        match function {
            GET_BAKING_ACCOUNT => {
                self.require_object(arg(0)?)?;
                let payment = self.slot(arg(1)?)?;
                let (_, paid) = self.take_coin(payment)?;
                if paid < self.license_price {
                    return Err(format!("{function}: paid {paid} of {}", self.license_price));
                }
                self.next_id += 1;
                let id = numbered_id(self.next_id);
                let account_type = self
                    .token_type
                    .trim_start_matches("0x2::coin::Coin<")
                    .trim_end_matches('>')
                    .replace("::BROWNIE", "::BakingAccount");
                self.objects.push(FakeObject {
                    id,
                    owner: Some(self.sender),
                    type_tag: account_type,
                    version: 1,
                    balance: None,
                });
            }
            BAKE_BY_HAND => {
                self.require_object(arg(0)?)?;
                self.require_object(arg(1)?)?;
                self.mint(index, self.bake_yield);
            }
            CLAIM_BROWNIES => {
                for i in 0..3 {
                    self.require_object(arg(i)?)?;
                }
                self.mint(index, self.claim_yield);
            }
            BUY_AUTO_BAKERS => {
                self.require_object(arg(0)?)?;
                self.require_object(arg(1)?)?;
                let baker_type_id = self.pure_u64(arg(2)?)?;
                let count = self.pure_u64(arg(3)?)?;
                let fee = self.slot(arg(4)?)?;
                let (_, fee_paid) = self.take_coin(fee)?;
                let brownies = self.slot(arg(5)?)?;
                let (brownie_type, brownies_paid) = self.take_coin(brownies)?;
                if brownie_type != self.token_type {
                    return Err(format!("{function}: paid with {brownie_type}"));
                }
                self.require_object(arg(6)?)?;
                self.purchases.push(Purchase {
                    baker_type_id,
                    count,
                    fee_paid,
                    brownies_paid,
                });
            }
            other => return Err(format!("unknown function {other}")),
        }
        Ok(())
    }

    fn mint(&mut self, index: u16, amount: u64) {
        self.fresh.insert(
            (index, 0),
            FreshCoin {
                type_tag: self.token_type.clone(),
                balance: amount,
            },
        );
    }

    fn slot(&self, argument: Argument) -> Step<Slot> {
        let slot = match argument {
            Argument::GasCoin => Slot::Gas,
            Argument::Result(i) => Slot::Fresh(i, 0),
            Argument::NestedResult(i, j) => Slot::Fresh(i, j),
            Argument::Input(_) => match self.draft.input(argument) {
                Some(CallArg::Object(id)) => {
                    if self.stale.contains(id) {
                        return Err(format!("object {id} version mismatch"));
                    }
                    Slot::Owned(*id)
                }
                _ => return Err(format!("{argument} is not an object")),
            },
        };
        if self.moved.contains(&slot) {
            return Err(format!("{argument} used after move"));
        }
        Ok(slot)
    }

    fn object(&self, id: ObjectId) -> Step<&FakeObject> {
        self.objects
            .iter()
            .find(|o| o.id == id && (o.owner.is_none() || o.owner == Some(self.sender)))
            .ok_or_else(|| format!("object {id} not available to sender"))
    }

    fn require_object(&self, argument: Argument) -> Step<()> {
        match self.slot(argument)? {
            Slot::Owned(id) => self.object(id).map(|_| ()),
            _ => Err(format!("{argument} is not an input object")),
        }
    }

    fn coin(&self, slot: Slot) -> Step<(String, u64)> {
        match slot {
            Slot::Gas => Ok((coin_type(NATIVE_COIN), self.gas)),
            Slot::Owned(id) => {
                let object = self.object(id)?;
                let balance = object
                    .balance
                    .ok_or_else(|| format!("object {id} is not a coin"))?;
                Ok((object.type_tag.clone(), balance))
            }
            Slot::Fresh(i, j) => self
                .fresh
                .get(&(i, j))
                .map(|c| (c.type_tag.clone(), c.balance))
                .ok_or_else(|| format!("result#{i}.{j} is not a coin")),
        }
    }

    fn set_balance(&mut self, slot: Slot, balance: u64) -> Step<()> {
        match slot {
            Slot::Gas => self.gas = balance,
            Slot::Owned(id) => {
                let object = self
                    .objects
                    .iter_mut()
                    .find(|o| o.id == id)
                    .ok_or_else(|| format!("object {id} vanished"))?;
                object.balance = Some(balance);
            }
            Slot::Fresh(i, j) => {
                let coin = self
                    .fresh
                    .get_mut(&(i, j))
                    .ok_or_else(|| format!("result#{i}.{j} vanished"))?;
                coin.balance = balance;
            }
        }
        Ok(())
    }

    fn take_coin(&mut self, slot: Slot) -> Step<(String, u64)> {
        let coin = self.coin(slot)?;
        match slot {
            Slot::Gas => return Err("the gas coin cannot be moved".to_string()),
            Slot::Owned(id) => self.objects.retain(|o| o.id != id),
            Slot::Fresh(i, j) => {
                self.fresh.remove(&(i, j));
            }
        }
        self.moved.insert(slot);
        Ok(coin)
    }

    fn transfer(&mut self, slot: Slot, recipient: Address) -> Step<()> {
        match slot {
            Slot::Gas => return Err("the gas coin cannot be transferred".to_string()),
            Slot::Owned(id) => {
                self.object(id)?;
                if let Some(object) = self.objects.iter_mut().find(|o| o.id == id) {
                    object.owner = Some(recipient);
                }
            }
            Slot::Fresh(i, j) => {
                let coin = self
                    .fresh
                    .remove(&(i, j))
                    .ok_or_else(|| format!("result#{i}.{j} is not an object"))?;
                self.next_id += 1;
                self.objects.push(FakeObject {
                    id: numbered_id(self.next_id),
                    owner: Some(recipient),
                    type_tag: coin.type_tag,
                    version: 1,
                    balance: Some(coin.balance),
                });
            }
        }
        self.moved.insert(slot);
        Ok(())
    }

    fn pure_u64(&self, argument: Argument) -> Step<u64> {
        match self.draft.input(argument) {
            Some(CallArg::Pure(PureValue::U64(value))) => Ok(*value),
            _ => Err(format!("{argument} is not a u64")),
        }
    }

    fn pure_address(&self, argument: Argument) -> Step<Address> {
        match self.draft.input(argument) {
            Some(CallArg::Pure(PureValue::Address(value))) => Ok(*value),
            _ => Err(format!("{argument} is not an address")),
        }
    }
}

/// Signs by serialising the draft; the signature names the signer.
#[derive(Clone, Debug)]
pub struct FakeWallet {
    name: String,
    features: Vec<String>,
    rejection: Arc<Mutex<Option<String>>>,
    requests: Arc<Mutex<usize>>,
}

impl Default for FakeWallet {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeWallet {
    pub fn new() -> Self {
        Self {
            name: "fake wallet".to_string(),
            features: vec![SIGN_TRANSACTION_FEATURE.to_string()],
            rejection: Arc::new(Mutex::new(None)),
            requests: Arc::new(Mutex::new(0)),
        }
    }

    pub fn without_signing() -> Self {
        Self {
            features: Vec::new(),
            ..Self::new()
        }
    }

    pub fn signature_for(address: &Address) -> String {
        format!("fake-signature:{address}")
    }

    pub fn reject_with(&self, reason: impl Into<String>) {
        *self.rejection.lock().unwrap() = Some(reason.into());
    }

    pub fn accept(&self) {
        *self.rejection.lock().unwrap() = None;
    }

    pub fn requests(&self) -> usize {
        *self.requests.lock().unwrap()
    }
}

impl Wallet for FakeWallet {
    fn name(&self) -> &str {
        &self.name
    }

    fn supports_feature(&self, feature: &str) -> bool {
        self.features.iter().any(|f| f == feature)
    }

    async fn sign_transaction(
        &self,
        request: SignTransactionRequest<'_>,
    ) -> std::result::Result<SignedTransaction, WalletError> {
        *self.requests.lock().unwrap() += 1;
        if let Some(reason) = self.rejection.lock().unwrap().clone() {
            return Err(WalletError::Rejected(reason));
        }
        if request.transaction.sender() != request.account.address {
            return Err(WalletError::Failed(eyre!(
                "account {} cannot sign for {}",
                request.account.address,
                request.transaction.sender()
            )));
        }
        let bytes = serde_json::to_string(request.transaction)
            .map_err(|e| WalletError::Failed(eyre!(e)))?;
        Ok(SignedTransaction {
            bytes,
            signature: Self::signature_for(&request.account.address),
        })
    }
}

pub struct TestContext {
    config: GameConfig,
    ledger: FakeLedger,
    wallet: FakeWallet,
    player: WalletAccount,
    baking_account: ObjectId,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    /// A deployment, a player with gas and a baking account, no brownies.
    pub fn new() -> Self {
        let config = GameConfig::new(
            "0x30a86d4f81fe8609ff7e4774b3fc281597e72c2911e805b3180b05c95baae36e"
                .parse()
                .unwrap(),
            "0x2e62d52ab37b4e2e30d9b3a0db67889fd3ec65ea9b0cf914ef1a4dfb9d4548e4"
                .parse()
                .unwrap(),
        );
        let ledger = FakeLedger::for_config(&config);
        let player = WalletAccount::new("0xa11ce".parse().unwrap());
        let baking_account = ledger.mint_object(
            player.address,
            &format!("{}::{}::BakingAccount", config.package_id, config.module),
        );
        Self {
            config,
            ledger,
            wallet: FakeWallet::new(),
            player,
            baking_account,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn ledger(&self) -> FakeLedger {
        self.ledger.clone()
    }

    pub fn wallet(&self) -> FakeWallet {
        self.wallet.clone()
    }

    pub fn player(&self) -> &WalletAccount {
        &self.player
    }

    pub fn baking_account(&self) -> ObjectId {
        self.baking_account
    }

    pub fn client(&self) -> BrownieClient<FakeLedger, FakeWallet> {
        BrownieClient::new(self.config.clone(), self.ledger(), self.wallet())
    }

    /// Give the player a brownie coin of `amount`.
    pub fn give_brownies(&self, amount: u64) -> ObjectId {
        self.ledger
            .mint_coin(self.player.address, &self.config.token_type(), amount)
    }

    pub fn brownie_coins(&self) -> Vec<(ObjectId, u64)> {
        self.ledger.token_coins(self.player.address)
    }

    pub fn brownie_balance(&self) -> u64 {
        self.ledger.token_balance(self.player.address)
    }
}
