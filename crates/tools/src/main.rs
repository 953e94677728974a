use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use harness_tools::config::DEFAULT_CONFIG_FILE;
use harness_tools::{logging, probe, Configuration, JsonRpcHandle};
use serde_json::Value;
use std::path::{Path, PathBuf};
use url::Url;

#[derive(Parser)]
#[command(name = "harness")]
#[command(about = "Build configuration and integration probes for contract projects")]
struct Cli {
    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Resolve and print the build configuration
    Config {
        /// Configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        file: PathBuf,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Invoke one method on the deployed program and report the signature
    Probe {
        /// Configuration file
        #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
        file: PathBuf,
        /// Program method to call
        #[arg(short, long, default_value = "initialize")]
        method: String,
        /// Call argument as JSON, repeatable
        #[arg(short, long = "arg")]
        args: Vec<String>,
        /// Endpoint to call instead of the active network's URL
        #[arg(short, long)]
        endpoint: Option<Url>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.debug)?;

    match cli.command {
        Commands::Config { file, json } => {
            let config = load(&file)?;
            if json {
                println!("{}", config.to_json()?);
            } else {
                println!("{}", config.summary());
            }
            Ok(())
        }
        Commands::Probe {
            file,
            method,
            args,
            endpoint,
        } => {
            let config = load(&file)?;
            let network = config.network();
            let endpoint = match endpoint.or_else(|| network.url.clone()) {
                Some(url) => url,
                None => bail!(
                    "network {} has no url; pass --endpoint to probe an external node",
                    network.name
                ),
            };
            let args = args
                .iter()
                .map(|a| {
                    serde_json::from_str(a).with_context(|| format!("invalid JSON argument: {}", a))
                })
                .collect::<Result<Vec<Value>>>()?;

            let handle = JsonRpcHandle::new(&network.name, endpoint, config.test_runner().timeout())?;
            let result = probe(&handle, &method, &args).await;
            let signature = result
                .into_result()
                .with_context(|| format!("probe {} on {} failed", method, network.name))?;

            println!("Your transaction signature {}", signature);
            Ok(())
        }
    }
}

fn load(file: &Path) -> Result<Configuration> {
    Configuration::load_from(file)
        .with_context(|| format!("invalid configuration in {}", file.display()))
}
