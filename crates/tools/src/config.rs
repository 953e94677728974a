//! Build and network configuration for contract tooling
//!
//! This module turns a `harness.toml` declaration into a typed, validated
//! [`Configuration`]. Resolution happens in this order:
//!
//! 1. Parse `harness.toml` into a [`HarnessToml`] declaration
//! 2. Capture environment overrides (`MAINNET_RPC_URL`, `REPORT_GAS`, ...)
//! 3. Validate every section and pick the active network
//!
//! # Examples
//!
//! ```rust,no_run
//! use harness_tools::config::Configuration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = Configuration::load()?;
//! println!("Primary compiler: {}", config.primary_compiler().version);
//! println!("Network: {}", config.network().name);
//! # Ok(())
//! # }
//! ```

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::declaration::{
    CompilerDeclaration, ContractSizerDeclaration, ForkDeclaration, GasReporterDeclaration,
    HarnessToml, NetworkDeclaration, PathsDeclaration, TestRunnerDeclaration,
};

/// File searched for by [`Configuration::load`]
pub const DEFAULT_CONFIG_FILE: &str = "harness.toml";

/// Optimizer runs assumed when a profile enables the optimizer without a count
pub const DEFAULT_OPTIMIZER_RUNS: u32 = 200;

pub const DEFAULT_CURRENCY: &str = "USD";
pub const DEFAULT_TEST_TIMEOUT_MS: u64 = 100_000;
pub const DEFAULT_TEST_REPORTER: &str = "spec";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("harness.toml not found in the working directory")]
    MissingConfigFile,

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Missing required path: {0}")]
    MissingPath(String),

    #[error("No compiler profiles declared")]
    NoCompilers,

    #[error("Invalid compiler version in compilers[{index}]: {value:?}. Expected MAJOR.MINOR.PATCH")]
    InvalidVersion { index: usize, value: String },

    #[error("Compiler version {0} is declared more than once")]
    DuplicateVersion(String),

    #[error("Invalid optimizer runs for compiler {version}: {runs}. Must be an integer between 0 and {max}", max = u32::MAX)]
    InvalidOptimizerRuns { version: String, runs: String },

    #[error("No networks declared")]
    NoNetworks,

    #[error("More than one network is marked default: {}", .0.join(", "))]
    AmbiguousDefault(Vec<String>),

    #[error("Several networks are declared and none is marked default")]
    NoDefaultNetwork,

    #[error("Unknown network: {0}")]
    UnknownNetwork(String),

    #[error("Invalid URL in {field}: {value:?}")]
    InvalidUrl { field: String, value: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Dotted-numeric compiler version (`MAJOR.MINOR.PATCH`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct CompilerVersion(semver::Version);

impl CompilerVersion {
    /// Parse a version, rejecting pre-release and build suffixes
    pub fn parse(value: &str) -> Option<Self> {
        let version = semver::Version::parse(value).ok()?;
        if !version.pre.is_empty() || !version.build.is_empty() {
            return None;
        }
        Some(Self(version))
    }

    pub fn as_semver(&self) -> &semver::Version {
        &self.0
    }
}

impl fmt::Display for CompilerVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Optimizer {
    pub enabled: bool,
    pub runs: u32,
    /// Optimizer step settings, keyed by setting name
    pub details: BTreeMap<String, toml::Value>,
}

impl Default for Optimizer {
    fn default() -> Self {
        Self {
            enabled: false,
            runs: DEFAULT_OPTIMIZER_RUNS,
            details: BTreeMap::new(),
        }
    }
}

/// One compiler version with its optimizer settings
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompilerProfile {
    pub version: CompilerVersion,
    pub optimizer: Optimizer,
    /// Extra compiler settings, keyed by setting name
    pub flags: BTreeMap<String, toml::Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForkSource {
    pub url: Url,
    /// Pinned block; `None` forks from the latest block
    pub block_height: Option<u64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Accounts {
    pub count: u32,
    pub balance: u128,
}

/// Simulated, forked or external execution environment
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NetworkProfile {
    pub name: String,
    /// Node endpoint; `None` for in-process networks
    pub url: Option<Url>,
    pub gas_limit: u64,
    pub gas_price: u64,
    pub block_gas_limit: Option<u64>,
    pub initial_base_fee_per_gas: Option<u64>,
    pub allow_unlimited_contract_size: bool,
    pub accounts: Option<Accounts>,
    pub fork_source: Option<ForkSource>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GasReporter {
    pub enabled: bool,
    pub currency: String,
    /// Report destination; `None` writes to stdout
    pub output_file: Option<PathBuf>,
    pub no_colors: bool,
    /// Price-feed API key, never serialized
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractSizer {
    pub alpha_sort: bool,
    pub disambiguate_paths: bool,
    pub run_on_compile: bool,
    pub strict: bool,
    pub only: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Paths {
    pub sources: PathBuf,
    pub tests: PathBuf,
    pub cache: PathBuf,
    pub artifacts: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TestRunner {
    pub timeout_ms: u64,
    pub reporter: String,
}

impl TestRunner {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Values taken from the process environment instead of the declaration
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Overrides {
    /// Replaces every fork source URL (`MAINNET_RPC_URL`)
    pub fork_url: Option<String>,
    /// Gas reporter price-feed key (`COINMARKETCAP_API_KEY`)
    pub reporter_api_key: Option<String>,
    /// Forces the gas reporter on (`REPORT_GAS` set to anything)
    pub report_gas: bool,
    /// Active network name (`HARNESS_NETWORK`)
    pub network: Option<String>,
}

impl Overrides {
    /// Capture overrides from the environment, loading `.env` first if present
    pub fn from_env() -> Self {
        // Load .env file if it exists (non-fatal)
        let _ = dotenvy::dotenv();

        let non_empty = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        Self {
            fork_url: non_empty("MAINNET_RPC_URL"),
            reporter_api_key: non_empty("COINMARKETCAP_API_KEY"),
            report_gas: std::env::var_os("REPORT_GAS").is_some(),
            network: non_empty("HARNESS_NETWORK"),
        }
    }
}

/// Resolved, validated configuration. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Configuration {
    compilers: Vec<CompilerProfile>,
    networks: Vec<NetworkProfile>,
    active_network: usize,
    gas_reporter: GasReporter,
    contract_sizer: ContractSizer,
    paths: Paths,
    test_runner: TestRunner,
}

impl Configuration {
    /// Load `harness.toml` from the working directory
    pub fn load() -> Result<Self, ConfigError> {
        let path = Path::new(DEFAULT_CONFIG_FILE);
        if !path.exists() {
            return Err(ConfigError::MissingConfigFile);
        }
        Self::load_from(path)
    }

    /// Load a declaration file and resolve it against the environment
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading configuration");
        let declaration = HarnessToml::read(path)?;
        ConfigResolver::new(Overrides::from_env()).resolve(&declaration)
    }

    /// Compiler profiles in declaration order
    pub fn compilers(&self) -> &[CompilerProfile] {
        &self.compilers
    }

    /// First-listed compiler profile
    pub fn primary_compiler(&self) -> &CompilerProfile {
        // non-empty is checked by the resolver
        &self.compilers[0]
    }

    /// Active network profile
    pub fn network(&self) -> &NetworkProfile {
        &self.networks[self.active_network]
    }

    /// All networks, ordered by name
    pub fn networks(&self) -> &[NetworkProfile] {
        &self.networks
    }

    pub fn network_named(&self, name: &str) -> Option<&NetworkProfile> {
        self.networks.iter().find(|n| n.name == name)
    }

    pub fn paths(&self) -> &Paths {
        &self.paths
    }

    pub fn gas_reporter(&self) -> &GasReporter {
        &self.gas_reporter
    }

    pub fn contract_sizer(&self) -> &ContractSizer {
        &self.contract_sizer
    }

    pub fn test_runner(&self) -> &TestRunner {
        &self.test_runner
    }

    /// Human-readable summary of the resolved configuration
    pub fn summary(&self) -> String {
        let mut out = String::new();
        let network = self.network();

        let _ = writeln!(out, "╔════════════════════════════════════════════════════════════════╗");
        let _ = writeln!(out, "║           HARNESS BUILD CONFIGURATION RESOLVED                 ║");
        let _ = writeln!(out, "╚════════════════════════════════════════════════════════════════╝");
        for (i, compiler) in self.compilers.iter().enumerate() {
            let marker = if i == 0 { " (primary)" } else { "" };
            let optimizer = if compiler.optimizer.enabled {
                format!("optimizer on, {} runs", compiler.optimizer.runs)
            } else {
                "optimizer off".to_string()
            };
            let _ = writeln!(out, "  Compiler:            {}{} [{}]", compiler.version, marker, optimizer);
        }
        let _ = writeln!(out, "  Network:             {}", network.name);
        match &network.url {
            Some(url) => {
                let _ = writeln!(out, "  Endpoint:            {}", url);
            }
            None => {
                let _ = writeln!(out, "  Endpoint:            (in-process)");
            }
        }
        let _ = writeln!(out, "  Gas / Gas Price:     {} / {}", network.gas_limit, network.gas_price);
        if let Some(fork) = &network.fork_source {
            let block = fork
                .block_height
                .map(|b| b.to_string())
                .unwrap_or_else(|| "latest".to_string());
            let _ = writeln!(out, "  Fork:                {} @ {}", fork.url, block);
        }
        let _ = writeln!(out, "  Sources:             {}", self.paths.sources.display());
        let _ = writeln!(out, "  Artifacts:           {}", self.paths.artifacts.display());
        if self.gas_reporter.enabled {
            let destination = self
                .gas_reporter
                .output_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "stdout".to_string());
            let _ = writeln!(out, "  Gas Report:          {} ({})", destination, self.gas_reporter.currency);
        } else {
            let _ = writeln!(out, "  Gas Report:          disabled");
        }
        let _ = writeln!(out, "  Test Timeout:        {}ms", self.test_runner.timeout_ms);
        let _ = write!(out, "╚════════════════════════════════════════════════════════════════╝");
        out
    }

    /// Get configuration as JSON
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Validates a [`HarnessToml`] declaration into a [`Configuration`]
#[derive(Debug, Clone, Default)]
pub struct ConfigResolver {
    overrides: Overrides,
}

/// Resolve a declaration with no environment overrides
pub fn resolve(declaration: &HarnessToml) -> Result<Configuration, ConfigError> {
    ConfigResolver::default().resolve(declaration)
}

impl ConfigResolver {
    pub fn new(overrides: Overrides) -> Self {
        Self { overrides }
    }

    /// Validate a declaration. Pure: performs no I/O.
    pub fn resolve(&self, declaration: &HarnessToml) -> Result<Configuration, ConfigError> {
        let compilers = Self::resolve_compilers(&declaration.compilers)?;
        let networks = declaration
            .networks
            .iter()
            .map(|(name, network)| self.resolve_network(name, network))
            .collect::<Result<Vec<_>, _>>()?;
        let active_network = self.select_network(declaration)?;
        let gas_reporter = self.resolve_gas_reporter(&declaration.gas_reporter);
        let contract_sizer = Self::resolve_contract_sizer(&declaration.contract_sizer);
        let paths = Self::resolve_paths(&declaration.paths)?;
        let test_runner = Self::resolve_test_runner(&declaration.test_runner);

        debug!(
            compilers = compilers.len(),
            networks = networks.len(),
            network = %networks[active_network].name,
            "configuration resolved"
        );

        Ok(Configuration {
            compilers,
            networks,
            active_network,
            gas_reporter,
            contract_sizer,
            paths,
            test_runner,
        })
    }

    fn resolve_compilers(
        declarations: &[CompilerDeclaration],
    ) -> Result<Vec<CompilerProfile>, ConfigError> {
        if declarations.is_empty() {
            return Err(ConfigError::NoCompilers);
        }

        let mut profiles: Vec<CompilerProfile> = Vec::with_capacity(declarations.len());
        for (index, decl) in declarations.iter().enumerate() {
            let version =
                CompilerVersion::parse(&decl.version).ok_or_else(|| ConfigError::InvalidVersion {
                    index,
                    value: decl.version.clone(),
                })?;

            if profiles.iter().any(|p| p.version == version) {
                return Err(ConfigError::DuplicateVersion(version.to_string()));
            }

            let optimizer = match &decl.optimizer {
                None => Optimizer::default(),
                Some(opt) => {
                    let runs = match &opt.runs {
                        None => DEFAULT_OPTIMIZER_RUNS,
                        Some(value) => value
                            .as_integer()
                            .and_then(|runs| u32::try_from(runs).ok())
                            .ok_or_else(|| ConfigError::InvalidOptimizerRuns {
                                version: version.to_string(),
                                runs: value.to_string(),
                            })?,
                    };
                    Optimizer {
                        enabled: opt.enabled,
                        runs,
                        details: opt.details.clone(),
                    }
                }
            };

            profiles.push(CompilerProfile {
                version,
                optimizer,
                flags: decl.settings.clone(),
            });
        }

        Ok(profiles)
    }

    fn resolve_network(
        &self,
        name: &str,
        decl: &NetworkDeclaration,
    ) -> Result<NetworkProfile, ConfigError> {
        let field = |suffix: &str| format!("networks.{}.{}", name, suffix);

        let url = decl
            .url
            .as_deref()
            .map(|u| parse_endpoint(&field("url"), u))
            .transpose()?;
        let gas_limit = decl.gas.ok_or_else(|| ConfigError::MissingField(field("gas")))?;
        let gas_price = decl
            .gas_price
            .ok_or_else(|| ConfigError::MissingField(field("gas_price")))?;

        let accounts = decl
            .accounts
            .as_ref()
            .map(|a| {
                let balance = a.balance.trim().parse::<u128>().map_err(|e| {
                    ConfigError::InvalidValue {
                        field: field("accounts.balance"),
                        reason: format!("{:?} is not a decimal amount ({})", a.balance, e),
                    }
                })?;
                Ok::<_, ConfigError>(Accounts {
                    count: a.count,
                    balance,
                })
            })
            .transpose()?;

        let fork_source = decl
            .forking
            .as_ref()
            .map(|fork| self.resolve_fork(&field("forking.url"), fork))
            .transpose()?;

        Ok(NetworkProfile {
            name: name.to_string(),
            url,
            gas_limit,
            gas_price,
            block_gas_limit: decl.block_gas_limit,
            initial_base_fee_per_gas: decl.initial_base_fee_per_gas,
            allow_unlimited_contract_size: decl.allow_unlimited_contract_size,
            accounts,
            fork_source,
        })
    }

    fn resolve_fork(&self, field: &str, decl: &ForkDeclaration) -> Result<ForkSource, ConfigError> {
        let url = self
            .overrides
            .fork_url
            .as_deref()
            .or(decl.url.as_deref())
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingField(field.to_string()))?;

        Ok(ForkSource {
            url: parse_url(field, url)?,
            block_height: decl.block_number,
        })
    }

    /// Index into the name-ordered network list
    fn select_network(&self, declaration: &HarnessToml) -> Result<usize, ConfigError> {
        let networks = &declaration.networks;
        if networks.is_empty() {
            return Err(ConfigError::NoNetworks);
        }

        let defaults: Vec<String> = networks
            .iter()
            .filter(|(_, n)| n.default)
            .map(|(name, _)| name.clone())
            .collect();
        if defaults.len() > 1 {
            return Err(ConfigError::AmbiguousDefault(defaults));
        }

        let position = |name: &str| networks.keys().position(|k| k == name);

        if let Some(name) = &self.overrides.network {
            return position(name.as_str()).ok_or_else(|| ConfigError::UnknownNetwork(name.clone()));
        }

        match defaults.first() {
            Some(name) => Ok(position(name.as_str()).unwrap_or(0)),
            None if networks.len() == 1 => Ok(0),
            None => Err(ConfigError::NoDefaultNetwork),
        }
    }

    fn resolve_gas_reporter(&self, decl: &GasReporterDeclaration) -> GasReporter {
        GasReporter {
            enabled: self.overrides.report_gas || decl.enabled.unwrap_or(false),
            currency: decl
                .currency
                .clone()
                .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            output_file: decl
                .output_file
                .as_deref()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from),
            no_colors: decl.no_colors,
            api_key: self.overrides.reporter_api_key.clone(),
        }
    }

    fn resolve_contract_sizer(decl: &ContractSizerDeclaration) -> ContractSizer {
        ContractSizer {
            alpha_sort: decl.alpha_sort,
            disambiguate_paths: decl.disambiguate_paths,
            run_on_compile: decl.run_on_compile,
            strict: decl.strict,
            only: decl.only.clone(),
        }
    }

    fn resolve_paths(decl: &PathsDeclaration) -> Result<Paths, ConfigError> {
        let required = |value: &Option<String>, name: &str| {
            value
                .as_deref()
                .filter(|p| !p.trim().is_empty())
                .map(PathBuf::from)
                .ok_or_else(|| ConfigError::MissingPath(format!("paths.{}", name)))
        };

        Ok(Paths {
            sources: required(&decl.sources, "sources")?,
            tests: required(&decl.tests, "tests")?,
            cache: required(&decl.cache, "cache")?,
            artifacts: required(&decl.artifacts, "artifacts")?,
        })
    }

    fn resolve_test_runner(decl: &TestRunnerDeclaration) -> TestRunner {
        TestRunner {
            timeout_ms: decl.timeout_ms.unwrap_or(DEFAULT_TEST_TIMEOUT_MS),
            reporter: decl
                .reporter
                .clone()
                .unwrap_or_else(|| DEFAULT_TEST_REPORTER.to_string()),
        }
    }
}

/// Parse a URL that must carry both a scheme and a host
fn parse_url(field: &str, value: &str) -> Result<Url, ConfigError> {
    let invalid = || ConfigError::InvalidUrl {
        field: field.to_string(),
        value: value.to_string(),
    };

    let url = Url::parse(value.trim()).map_err(|_| invalid())?;
    match url.host_str() {
        Some(host) if !host.is_empty() => Ok(url),
        _ => Err(invalid()),
    }
}

/// Parse a node endpoint, which must be reachable over HTTP(S)
fn parse_endpoint(field: &str, value: &str) -> Result<Url, ConfigError> {
    let url = parse_url(field, value)?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        _ => Err(ConfigError::InvalidUrl {
            field: field.to_string(),
            value: value.to_string(),
        }),
    }
}
