use crate::{
    Error,
    ledger::ObjectId,
    transaction::MoveTarget,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use deployments::{
    DeploymentEnv,
    DeploymentRecord,
    DeploymentStore,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::path::Path;

/// Bumped whenever a field is added or its meaning changes.
pub const CONFIG_VERSION: u32 = 1;

pub const DEFAULT_MODULE: &str = "brownie";
pub const DEFAULT_GAS_BUDGET: u64 = 100_000_000;
pub const DEFAULT_LICENSE_PRICE_NANOS: u64 = 10_000_000_000;
pub const DEFAULT_AUTO_BAKER_BUY_FEE_NANOS: u64 = 10_000_000;
pub const DEFAULT_BAKE_BY_HAND_AMOUNT: u64 = 10;
pub const DEFAULT_PRICE_STEP_PERCENT: u64 = 5;

const TOKEN_STRUCT: &str = "BROWNIE";

/// Everything tied to one deployment of the brownie package. Must match the
/// contract it points at.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameConfig {
    pub version: u32,
    pub network: String,
    pub rpc_url: String,
    pub explorer_url: String,
    pub package_id: ObjectId,
    /// Shared `BrownieInc` object every call goes through.
    pub brownie_inc_id: ObjectId,
    pub module: String,
    pub gas_budget: u64,
    pub license_price_nanos: u64,
    pub auto_baker_buy_fee_nanos: u64,
    pub bake_by_hand_amount: u64,
    pub price_step_percent: u64,
}

impl GameConfig {
    pub fn new(package_id: ObjectId, brownie_inc_id: ObjectId) -> Self {
        let env = DeploymentEnv::Test;
        Self {
            version: CONFIG_VERSION,
            network: env.to_string(),
            rpc_url: env.default_rpc_url().to_string(),
            explorer_url: env.default_explorer_url().to_string(),
            package_id,
            brownie_inc_id,
            module: DEFAULT_MODULE.to_string(),
            gas_budget: DEFAULT_GAS_BUDGET,
            license_price_nanos: DEFAULT_LICENSE_PRICE_NANOS,
            auto_baker_buy_fee_nanos: DEFAULT_AUTO_BAKER_BUY_FEE_NANOS,
            bake_by_hand_amount: DEFAULT_BAKE_BY_HAND_AMOUNT,
            price_step_percent: DEFAULT_PRICE_STEP_PERCENT,
        }
    }

    pub fn from_record(env: DeploymentEnv, record: &DeploymentRecord) -> crate::Result<Self> {
        Self::parse_record(env, record).map_err(Error::Config)
    }

    /// Load the recorded deployment for `env` below `root`.
    pub fn load(root: impl AsRef<Path>, env: DeploymentEnv) -> crate::Result<Self> {
        Self::read_store(root.as_ref(), env).map_err(Error::Config)
    }

    fn parse_record(env: DeploymentEnv, record: &DeploymentRecord) -> Result<Self> {
        let package_id = record.package_id.parse::<ObjectId>().wrap_err_with(|| {
            format!("Deployment record for {env} has an invalid package id")
        })?;
        let brownie_inc_id = record.brownie_inc_id.parse::<ObjectId>().wrap_err_with(|| {
            format!("Deployment record for {env} has an invalid BrownieInc id")
        })?;
        Ok(Self {
            version: CONFIG_VERSION,
            network: env.to_string(),
            rpc_url: record.network_url.clone(),
            explorer_url: record
                .explorer_url
                .clone()
                .unwrap_or_else(|| env.default_explorer_url().to_string()),
            package_id,
            brownie_inc_id,
            module: record
                .module
                .clone()
                .unwrap_or_else(|| DEFAULT_MODULE.to_string()),
            gas_budget: record.gas_budget.unwrap_or(DEFAULT_GAS_BUDGET),
            license_price_nanos: record
                .license_price_nanos
                .unwrap_or(DEFAULT_LICENSE_PRICE_NANOS),
            auto_baker_buy_fee_nanos: record
                .auto_baker_buy_fee_nanos
                .unwrap_or(DEFAULT_AUTO_BAKER_BUY_FEE_NANOS),
            bake_by_hand_amount: record
                .bake_by_hand_amount
                .unwrap_or(DEFAULT_BAKE_BY_HAND_AMOUNT),
            price_step_percent: record
                .price_step_percent
                .unwrap_or(DEFAULT_PRICE_STEP_PERCENT),
        })
    }

    fn read_store(root: &Path, env: DeploymentEnv) -> Result<Self> {
        let store = DeploymentStore::at(root, env).map_err(|e| eyre!(e))?;
        let record = store
            .load()
            .map_err(|e| eyre!(e))?
            .ok_or_else(|| {
                eyre!(
                    "No {env} deployment recorded in {}",
                    store.path().display()
                )
            })?;
        Self::parse_record(env, &record)
    }

    /// Type tag of the production token, e.g. `0x…::brownie::BROWNIE`.
    pub fn token_type(&self) -> String {
        format!("{}::{}::{}", self.package_id, self.module, TOKEN_STRUCT)
    }

    pub fn target(&self, function: &str) -> MoveTarget {
        MoveTarget {
            package: self.package_id,
            module: self.module.clone(),
            function: function.to_string(),
        }
    }
}
