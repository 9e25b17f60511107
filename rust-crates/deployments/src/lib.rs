use anyhow::{
    Context,
    Result,
    anyhow,
};
use chrono::Utc;
use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    fs,
    io::Write,
    path::{
        Path,
        PathBuf,
    },
};

pub const DEPLOYMENTS_ROOT: &str = ".deployments";
const DEPLOYMENTS_FILE: &str = "deployments.json";

#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum DeploymentEnv {
    Dev,
    Test,
    Main,
    Local,
}

impl DeploymentEnv {
    pub const ALL: [DeploymentEnv; 4] = [
        DeploymentEnv::Dev,
        DeploymentEnv::Test,
        DeploymentEnv::Main,
        DeploymentEnv::Local,
    ];

    pub fn dir_name(self) -> &'static str {
        match self {
            DeploymentEnv::Dev => "dev",
            DeploymentEnv::Test => "test",
            DeploymentEnv::Main => "main",
            DeploymentEnv::Local => "local",
        }
    }

    pub fn default_rpc_url(self) -> &'static str {
        match self {
            DeploymentEnv::Dev => "https://api.devnet.iota.cafe",
            DeploymentEnv::Test => "https://api.testnet.iota.cafe",
            DeploymentEnv::Main => "https://api.mainnet.iota.cafe",
            DeploymentEnv::Local => "http://127.0.0.1:9000",
        }
    }

    pub fn default_explorer_url(self) -> &'static str {
        match self {
            DeploymentEnv::Dev => "https://explorer.iota.org/devnet",
            DeploymentEnv::Test => "https://explorer.iota.org/testnet",
            DeploymentEnv::Main => "https://explorer.iota.org",
            DeploymentEnv::Local => "http://127.0.0.1:3000",
        }
    }
}

impl fmt::Display for DeploymentEnv {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DeploymentEnv::Dev => "Devnet",
            DeploymentEnv::Test => "Testnet",
            DeploymentEnv::Main => "Mainnet",
            DeploymentEnv::Local => "Local",
        };
        write!(f, "{name}")
    }
}

/// One published instance of the brownie package.
///
/// Only the two identifiers are mandatory; the pricing and gas fields fall
/// back to the client defaults when absent, so a record written for an older
/// package still loads.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct DeploymentRecord {
    pub deployed_at: String,
    pub package_id: String,
    pub brownie_inc_id: String,
    pub network_url: String,
    #[serde(default)]
    pub explorer_url: Option<String>,
    #[serde(default)]
    pub module: Option<String>,
    #[serde(default)]
    pub gas_budget: Option<u64>,
    #[serde(default)]
    pub license_price_nanos: Option<u64>,
    #[serde(default)]
    pub auto_baker_buy_fee_nanos: Option<u64>,
    #[serde(default)]
    pub bake_by_hand_amount: Option<u64>,
    #[serde(default)]
    pub price_step_percent: Option<u64>,
}

impl DeploymentRecord {
    pub fn new(
        package_id: impl Into<String>,
        brownie_inc_id: impl Into<String>,
        network_url: impl Into<String>,
    ) -> Self {
        Self {
            deployed_at: Utc::now().to_rfc3339(),
            package_id: package_id.into(),
            brownie_inc_id: brownie_inc_id.into(),
            network_url: network_url.into(),
            explorer_url: None,
            module: None,
            gas_budget: None,
            license_price_nanos: None,
            auto_baker_buy_fee_nanos: None,
            bake_by_hand_amount: None,
            price_step_percent: None,
        }
    }

    pub fn is_same_package(&self, package_id: &str) -> bool {
        self.package_id.eq_ignore_ascii_case(package_id)
    }
}

#[derive(Debug)]
pub struct DeploymentStore {
    env: DeploymentEnv,
    path: PathBuf,
}

impl DeploymentStore {
    pub fn new(env: DeploymentEnv) -> Result<Self> {
        Self::at(DEPLOYMENTS_ROOT, env)
    }

    pub fn at(root: impl AsRef<Path>, env: DeploymentEnv) -> Result<Self> {
        let path = ensure_store(root.as_ref(), env)?;
        Ok(Self { env, path })
    }

    pub fn env(&self) -> DeploymentEnv {
        self.env
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Result<Option<DeploymentRecord>> {
        read_record(&self.path)
    }

    pub fn save(&self, record: &DeploymentRecord) -> Result<()> {
        write_record(&self.path, record)
    }
}

pub fn ensure_structure(root: impl AsRef<Path>) -> Result<()> {
    for env in DeploymentEnv::ALL {
        let _ = ensure_store(root.as_ref(), env)?;
    }
    Ok(())
}

pub fn record_deployment(
    root: impl AsRef<Path>,
    env: DeploymentEnv,
    package_id: impl AsRef<str>,
    brownie_inc_id: impl AsRef<str>,
    network_url: Option<impl AsRef<str>>,
) -> Result<DeploymentRecord> {
    let store = DeploymentStore::at(root, env)?;
    let network_url = network_url
        .map(|url| url.as_ref().to_string())
        .unwrap_or_else(|| env.default_rpc_url().to_string());
    let record = DeploymentRecord::new(
        package_id.as_ref(),
        brownie_inc_id.as_ref(),
        network_url,
    );
    store.save(&record)?;
    Ok(record)
}

fn ensure_store(root: &Path, env: DeploymentEnv) -> Result<PathBuf> {
    if !root.exists() {
        fs::create_dir_all(root).with_context(|| {
            format!("Failed to create deployments directory {}", root.display())
        })?;
    }

    let env_dir = root.join(env.dir_name());
    if !env_dir.exists() {
        fs::create_dir_all(&env_dir).with_context(|| {
            format!("Failed to create {}/{} directory", root.display(), env.dir_name())
        })?;
    }

    let file_path = env_dir.join(DEPLOYMENTS_FILE);
    if !file_path.exists() {
        let mut file = fs::File::create(&file_path).with_context(|| {
            format!(
                "Failed to create deployment record file for {} at {:?}",
                env, file_path
            )
        })?;
        file.write_all(b"").with_context(|| {
            format!("Failed to initialize deployment record file for {}", env)
        })?;
    }

    Ok(file_path)
}

fn read_record(path: impl AsRef<Path>) -> Result<Option<DeploymentRecord>> {
    let data = fs::read(path.as_ref()).context("Failed to read deployment records")?;
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    if let Ok(record) = serde_json::from_slice::<DeploymentRecord>(&data) {
        return Ok(Some(record));
    }
    if let Ok(mut records) = serde_json::from_slice::<Vec<DeploymentRecord>>(&data) {
        return Ok(records.pop());
    }
    Err(anyhow!(
        "Failed to parse deployment record JSON; expected a single deployment object"
    ))
}

fn write_record(path: impl AsRef<Path>, record: &DeploymentRecord) -> Result<()> {
    let json = serde_json::to_vec_pretty(record)
        .context("Failed to serialize deployment record")?;
    fs::write(path.as_ref(), json).context("Failed to write deployment record")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]

    use super::*;

    #[test]
    fn load__returns_none_for_fresh_store() {
        let dir = tempfile::tempdir().unwrap();

        let store = DeploymentStore::at(dir.path(), DeploymentEnv::Test).unwrap();

        assert!(store.path().exists());
        assert_eq!(None, store.load().unwrap());
    }

    #[test]
    fn record_deployment__persists_record_with_default_rpc_url() {
        let dir = tempfile::tempdir().unwrap();

        // when
        let written = record_deployment(
            dir.path(),
            DeploymentEnv::Test,
            "0x30a8",
            "0x2e62",
            None::<&str>,
        )
        .unwrap();

        // then
        let store = DeploymentStore::at(dir.path(), DeploymentEnv::Test).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(written, loaded);
        assert_eq!("https://api.testnet.iota.cafe", loaded.network_url);
        assert!(loaded.is_same_package("0x30A8"));
    }

    #[test]
    fn load__takes_latest_entry_from_legacy_list_format() {
        let dir = tempfile::tempdir().unwrap();
        let store = DeploymentStore::at(dir.path(), DeploymentEnv::Dev).unwrap();
        let first = DeploymentRecord::new("0x1", "0x2", "http://a");
        let second = DeploymentRecord::new("0x3", "0x4", "http://b");
        fs::write(store.path(), serde_json::to_vec(&vec![first, second]).unwrap())
            .unwrap();

        let loaded = store.load().unwrap().unwrap();

        assert_eq!("0x3", loaded.package_id);
    }

    #[test]
    fn load__rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let store = DeploymentStore::at(dir.path(), DeploymentEnv::Local).unwrap();
        fs::write(store.path(), b"{not json").unwrap();

        assert!(store.load().is_err());
    }

    #[test]
    fn ensure_structure__creates_every_environment() {
        let dir = tempfile::tempdir().unwrap();

        ensure_structure(dir.path()).unwrap();

        for env in DeploymentEnv::ALL {
            assert!(
                dir.path()
                    .join(env.dir_name())
                    .join(DEPLOYMENTS_FILE)
                    .exists()
            );
        }
    }
}
