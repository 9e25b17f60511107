use brownie_client::{
    config::GameConfig,
    format,
    ledger::Address,
    locator,
    logging,
    rpc::JsonRpcLedgerClient,
};
use color_eyre::eyre::{
    Result,
    WrapErr,
    bail,
    eyre,
};
use deployments::{
    DEPLOYMENTS_ROOT,
    DeploymentEnv,
};

const USAGE: &str = "usage: brownie [--devnet|--testnet|--mainnet|--local] [--rpc-url URL] --owner ADDRESS";

struct Args {
    env: DeploymentEnv,
    rpc_url: Option<String>,
    owner: Address,
}

fn parse_args(args: impl IntoIterator<Item = String>) -> Result<Args> {
    let mut env = DeploymentEnv::Test;
    let mut rpc_url = None;
    let mut owner = None;
    let mut args = args.into_iter();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--devnet" => env = DeploymentEnv::Dev,
            "--testnet" => env = DeploymentEnv::Test,
            "--mainnet" => env = DeploymentEnv::Main,
            "--local" => env = DeploymentEnv::Local,
            "--rpc-url" => {
                rpc_url = Some(args.next().ok_or_else(|| eyre!("--rpc-url needs a value"))?)
            }
            "--owner" => {
                let value = args.next().ok_or_else(|| eyre!("--owner needs a value"))?;
                owner = Some(
                    value
                        .parse()
                        .wrap_err_with(|| format!("invalid owner address {value}"))?,
                );
            }
            other => bail!("unknown argument {other}\n{USAGE}"),
        }
    }
    let owner = owner.ok_or_else(|| eyre!("missing --owner\n{USAGE}"))?;
    Ok(Args {
        env,
        rpc_url,
        owner,
    })
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    color_eyre::install()?;
    logging::init_tracing();

    let args = parse_args(std::env::args().skip(1))?;
    let mut config = GameConfig::load(DEPLOYMENTS_ROOT, args.env)?;
    if let Some(url) = args.rpc_url {
        config.rpc_url = url;
    }
    tracing::info!(network = %config.network, rpc = %config.rpc_url, "inspecting holdings");

    let ledger = JsonRpcLedgerClient::new(config.rpc_url.clone())?;
    let holdings = locator::locate(&ledger, &args.owner, &config.token_type())
        .await
        .wrap_err("failed to read holdings")?;

    println!(
        "{} holds {} BROWNIE coin object(s) on {}",
        args.owner,
        holdings.len(),
        config.network
    );
    for holding in &holdings {
        let id = holding.object_id().to_hex();
        println!(
            "  {}  v{}  {}",
            format::shorten_hex(&id, 4),
            holding.object_ref().version,
            format::object_explorer_url(&config.explorer_url, &id)
        );
    }
    Ok(())
}
