use std::cell::RefCell;
use std::rc::Rc;

use anyhow::{Context, Result};
use clap::Parser;
use freshen::host::{DirFs, HostOta, JsonFileKv};
use freshen::transport::tls_config;
use freshen::{Agent, AgentConfig, Cli, Session, TcpConnector};
use freshen_rpc::builtins::{register_all, DeviceInfo};
use freshen_rpc::{Ota, RpcContext};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = AgentConfig::load(&cli).context("loading configuration")?;

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(EnvFilter::try_new(&config.log).unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("installing log subscriber")?;

    let fs = DirFs::new(&config.fs_root)
        .with_context(|| format!("opening {}", config.fs_root.display()))?;
    let kv = JsonFileKv::open(config.state_dir.join("kv.json")).context("opening key-value store")?;
    let platform = HostOta::new(&config.state_dir)
        .context("preparing OTA state")?
        .with_commit_timeout(config.commit_timeout);

    let mut ota = Ota::new(Box::new(platform), Box::new(kv));
    ota.init().context("checking rollback marker")?;
    let ota = ota.into_shared();

    let mut rpc = RpcContext::new();
    register_all(
        &mut rpc,
        DeviceInfo::new(config.fw_version.clone()),
        Rc::new(RefCell::new(fs)),
        ota.clone(),
    )
    .context("registering methods")?;

    let tls = tls_config(config.ca_file.as_deref()).context("configuring TLS")?;
    let session_config = config.session_config().context("parsing server URL")?;
    let session = Session::new(session_config, Box::new(TcpConnector::new(tls)));

    if config.token.is_empty() {
        warn!("no token configured, the dashboard will reject the connection");
    }
    info!(url = %config.url, fw_version = %config.fw_version, "agent starting");
    Agent::new(rpc, ota, session).run_while(|| true);
    Ok(())
}
