use anyhow::{bail, Context, Result};
use clap::Parser;
use lib_didinfra::{did_registry::PubKeyIndex, ConfigurationOptions, NetworkConfiguration};

//
// system arguments and environment for the service
//

/// Account of the DID registry contract on the default network
pub const DID_INFRA_REGISTRY: &str = "fmapkumrotfc";

pub(crate) const DEFAULT_HOST: &str = "127.0.0.1";
pub(crate) const DEFAULT_PORT: u16 = 0;
pub(crate) const DEFAULT_NETWORKS: &str = "01,http://127.0.0.1:8888,fmapkumrotfc";

#[derive(Parser, Debug)]
#[command(name = "resolver", version = "0.1.0", about = "did:infra DID Resolver")]
pub struct Args {
    #[arg(short = 'p', long = "port", env = "RESOLVER_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,
    #[arg(short = 's', long = "host", env = "RESOLVER_HOST", default_value = DEFAULT_HOST)]
    pub host: String,
    /// `<network-id>,<rpc-endpoint>,<registry-contract>[,raw]` entries separated by `;`
    #[arg(short = 'n', long = "networks", env = "INFRA_NETWORKS", default_value = DEFAULT_NETWORKS)]
    pub networks: String,
    /// Resolve revoked public key DIDs as active
    #[arg(long = "no-revocation-check", env = "NO_REVOCATION_CHECK")]
    pub no_revocation_check: bool,
}

impl Args {
    pub fn configuration(&self) -> Result<ConfigurationOptions> {
        Ok(ConfigurationOptions {
            networks: parse_networks(&self.networks)?,
            no_revocation_check: self.no_revocation_check,
        })
    }
}

/// Parse the `;` separated network list
pub fn parse_networks(networks: &str) -> Result<Vec<NetworkConfiguration>> {
    networks
        .split(';')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(|entry| {
            let parts: Vec<&str> = entry.split(',').map(str::trim).collect();
            let mut network = match parts.as_slice() {
                [id, endpoint, contract] | [id, endpoint, contract, _] => {
                    NetworkConfiguration::new(*id, *endpoint, *contract)
                }
                _ => bail!(
                    "network `{entry}` should be <network-id>,<rpc-endpoint>,<registry-contract>"
                ),
            };
            match parts.get(3) {
                Some(&"raw") => network.pubkey_index = PubKeyIndex::Raw,
                Some(&"sha256") | None => {}
                Some(other) => bail!("unknown public key index `{other}` for network {}", parts[0]),
            }
            Ok(network)
        })
        .collect::<Result<Vec<_>>>()
        .context("Invalid network configuration")
}

pub fn parse_args() -> Args {
    let args = Args::parse();
    log::info!("Args: {:?}", args);
    args
}
