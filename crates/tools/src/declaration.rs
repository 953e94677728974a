//! Raw `harness.toml` declaration
//!
//! These types mirror the file layout one-to-one and carry no guarantees.
//! [`crate::config::ConfigResolver`] turns them into a validated
//! [`crate::config::Configuration`].
//!
//! ```toml
//! [[compilers]]
//! version = "0.8.19"
//! optimizer = { enabled = true, runs = 200 }
//!
//! [compilers.settings]
//! viaIR = true
//!
//! [networks.hardhat]
//! default = true
//! gas = 12000000
//! gas_price = 20000000000
//! forking = { url = "https://eth-mainnet.alchemyapi.io/v2/demo", block_number = 18000000 }
//!
//! [paths]
//! sources = "./contracts"
//! tests = "./test"
//! cache = "./cache"
//! artifacts = "./artifacts"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

use crate::config::ConfigError;

/// Top-level document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HarnessToml {
    /// Compiler profiles, first-listed is the primary one
    #[serde(default)]
    pub compilers: Vec<CompilerDeclaration>,
    #[serde(default)]
    pub networks: BTreeMap<String, NetworkDeclaration>,
    #[serde(default)]
    pub gas_reporter: GasReporterDeclaration,
    #[serde(default)]
    pub contract_sizer: ContractSizerDeclaration,
    #[serde(default)]
    pub paths: PathsDeclaration,
    #[serde(default)]
    pub test_runner: TestRunnerDeclaration,
}

impl HarnessToml {
    /// Read and parse a declaration file without validating it
    pub fn read(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }
}

impl FromStr for HarnessToml {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        toml::from_str(s).map_err(ConfigError::TomlError)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompilerDeclaration {
    pub version: String,
    #[serde(default)]
    pub optimizer: Option<OptimizerDeclaration>,
    /// Any further compiler settings, passed through untouched
    #[serde(default)]
    pub settings: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OptimizerDeclaration {
    #[serde(default)]
    pub enabled: bool,
    /// Kept untyped so that negative or non-integer values reach validation
    #[serde(default)]
    pub runs: Option<toml::Value>,
    /// Optimizer step settings (e.g. `yul`, `yulDetails`), passed through untouched
    #[serde(default)]
    pub details: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NetworkDeclaration {
    #[serde(default)]
    pub default: bool,
    /// Endpoint of an external node; absent for in-process networks
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub gas: Option<u64>,
    #[serde(default)]
    pub gas_price: Option<u64>,
    #[serde(default)]
    pub block_gas_limit: Option<u64>,
    #[serde(default)]
    pub initial_base_fee_per_gas: Option<u64>,
    #[serde(default)]
    pub allow_unlimited_contract_size: bool,
    #[serde(default)]
    pub accounts: Option<AccountsDeclaration>,
    #[serde(default)]
    pub forking: Option<ForkDeclaration>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountsDeclaration {
    pub count: u32,
    /// Per-account balance in the chain's smallest unit, as a decimal string
    pub balance: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForkDeclaration {
    /// May be left out when `MAINNET_RPC_URL` supplies it
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub block_number: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GasReporterDeclaration {
    #[serde(default)]
    pub enabled: Option<bool>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub output_file: Option<String>,
    #[serde(default)]
    pub no_colors: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContractSizerDeclaration {
    #[serde(default)]
    pub alpha_sort: bool,
    #[serde(default)]
    pub disambiguate_paths: bool,
    #[serde(default)]
    pub run_on_compile: bool,
    #[serde(default)]
    pub strict: bool,
    #[serde(default)]
    pub only: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathsDeclaration {
    #[serde(default)]
    pub sources: Option<String>,
    #[serde(default)]
    pub tests: Option<String>,
    #[serde(default)]
    pub cache: Option<String>,
    #[serde(default)]
    pub artifacts: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestRunnerDeclaration {
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub reporter: Option<String>,
}
