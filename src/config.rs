//! Pipeline configuration resolved once from the process environment.
//!
//! [`EnvConfig`] snapshots the environment so nothing reads ambient global state
//! mid-run; [`PipelineConfig::from_env_config`] turns the snapshot into typed values
//! and reports every missing required variable in one error.

use crate::error::ConfigError;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// Git username used for clone and push
pub const ENV_GIT_USER_NAME: &str = "GIT_USER_NAME";
/// Git password or token used for clone, push and the releases API
pub const ENV_GIT_PASSWORD: &str = "GIT_PASSWORD";
/// Repository owner
pub const ENV_GIT_REPO_OWNER: &str = "GIT_REPO_OWNER";
/// Repository name
pub const ENV_GIT_REPO_NAME: &str = "GIT_REPO_NAME";
/// Branch to clone and push
pub const ENV_GIT_REPO_BRANCH: &str = "GIT_REPO_BRANCH";
/// Commit author name
pub const ENV_GIT_AUTHOR_NAME: &str = "GIT_AUTHOR_NAME";
/// Commit author email
pub const ENV_GIT_AUTHOR_EMAIL: &str = "GIT_AUTHOR_EMAIL";
/// Accepted release series prefix
pub const ENV_RELEASE_SERIES_PREFIX: &str = "RELEASE_SERIES_PREFIX";
/// Installation directory override
pub const ENV_RELEASE_INSTALL_DIR: &str = "RELEASE_INSTALL_DIR";
/// Overlay resources directory override
pub const ENV_RELEASE_RESOURCES_DIR: &str = "RELEASE_RESOURCES_DIR";
/// JSON object replacing the default descriptor fields
pub const ENV_RELEASE_DESCRIPTOR_FIELDS: &str = "RELEASE_DESCRIPTOR_FIELDS";
/// Remote URL override
pub const ENV_GIT_REMOTE_URL: &str = "GIT_REMOTE_URL";
/// Hosting API base URL override
pub const ENV_GITHUB_API_URL: &str = "GITHUB_API_URL";
/// Enables the per-branch release lock
pub const ENV_RELEASE_SINGLE_FLIGHT: &str = "RELEASE_SINGLE_FLIGHT";
/// Seconds to wait for the per-branch release lock
pub const ENV_RELEASE_LOCK_TIMEOUT_SECS: &str = "RELEASE_LOCK_TIMEOUT_SECS";
/// Directory holding per-branch lock files
pub const ENV_RELEASE_LOCK_DIR: &str = "RELEASE_LOCK_DIR";

const REQUIRED: [&str; 7] = [
    ENV_GIT_USER_NAME,
    ENV_GIT_PASSWORD,
    ENV_GIT_REPO_OWNER,
    ENV_GIT_REPO_NAME,
    ENV_GIT_REPO_BRANCH,
    ENV_GIT_AUTHOR_NAME,
    ENV_GIT_AUTHOR_EMAIL,
];

/// Default acceptance prefix
pub const DEFAULT_SERIES_PREFIX: &str = "2.";
/// Default hosting API base
pub const DEFAULT_API_URL: &str = "https://api.github.com";
/// Resources directory name under the installation directory
pub const DEFAULT_RESOURCES_DIR_NAME: &str = "deployment";
/// Descriptor rewritten by the transformer
pub const DEFAULT_DESCRIPTOR_FILE: &str = "package.json";
const DEFAULT_LOCK_TIMEOUT_SECS: u64 = 600;

/// Snapshot of environment variables
#[derive(Debug, Clone, Default)]
pub struct EnvConfig {
    vars: HashMap<String, String>,
}

impl EnvConfig {
    /// Capture the current process environment
    pub fn from_env() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Build a snapshot from explicit pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Get a non-empty variable
    pub fn get(&self, name: &str) -> Option<String> {
        self.vars
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }
}

/// Username/password pair shared by every authenticated git operation
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Username
    pub username: String,
    /// Password or personal access token
    pub password: String,
}

impl Credentials {
    /// Create a credential pair
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Commit identity used as both author and committer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Author {
    /// Display name
    pub name: String,
    /// Email address
    pub email: String,
}

/// Coordinates of the deployment repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryCoordinates {
    /// Repository owner
    pub owner: String,
    /// Repository name
    pub name: String,
    /// Branch to clone and push
    pub branch: String,
    /// Clone and push URL
    pub remote_url: String,
}

impl RepositoryCoordinates {
    /// Default GitHub https remote for an owner/name pair
    pub fn github_remote(owner: &str, name: &str) -> String {
        format!("https://github.com/{}/{}.git", owner, name)
    }

    /// Key identifying the branch for single-flight locking
    pub fn lock_key(&self) -> String {
        format!("{}/{}@{}", self.owner, self.name, self.branch)
    }
}

/// Release series filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptancePolicy {
    prefix: String,
}

impl AcceptancePolicy {
    /// Accept release names starting with `prefix` (ASCII case-insensitive)
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Configured prefix
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Whether this pipeline instance handles `release_name`
    pub fn accepts(&self, release_name: &str) -> bool {
        release_name
            .get(..self.prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(&self.prefix))
    }
}

impl Default for AcceptancePolicy {
    fn default() -> Self {
        Self::with_prefix(DEFAULT_SERIES_PREFIX)
    }
}

/// Per-branch lock settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SingleFlightConfig {
    /// Whether runs take the lock at all
    pub enabled: bool,
    /// How long to wait for a running release
    pub timeout: Duration,
    /// Where lock files live; kept apart from the working directories
    pub lock_dir: PathBuf,
}

impl Default for SingleFlightConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            timeout: Duration::from_secs(DEFAULT_LOCK_TIMEOUT_SECS),
            lock_dir: default_lock_dir(),
        }
    }
}

/// Shared lock directory under the system temp dir
pub fn default_lock_dir() -> PathBuf {
    std::env::temp_dir().join("ghost_release")
}

/// Complete configuration of one pipeline instance
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Credentials for clone, push and the releases API
    pub credentials: Credentials,
    /// Target repository
    pub repository: RepositoryCoordinates,
    /// Commit identity
    pub author: Author,
    /// Release series filter
    pub acceptance: AcceptancePolicy,
    /// Installation directory; working directories are created next to it
    pub install_dir: PathBuf,
    /// Files overlaid onto every published tree
    pub resources_dir: PathBuf,
    /// Descriptor file name at the tree root
    pub descriptor_file: String,
    /// Fields merged into the descriptor
    pub descriptor_fields: serde_json::Map<String, serde_json::Value>,
    /// Hosting API base URL
    pub api_url: String,
    /// Per-branch lock settings
    pub single_flight: SingleFlightConfig,
}

impl PipelineConfig {
    /// Resolve configuration from an environment snapshot
    ///
    /// Fails with every missing required variable listed at once.
    pub fn from_env_config(env: &EnvConfig) -> Result<Self, ConfigError> {
        let missing: Vec<String> = REQUIRED
            .iter()
            .filter(|name| env.get(name).is_none())
            .map(|name| name.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ConfigError::MissingVariables { names: missing });
        }

        let require = |name: &str| env.get(name).unwrap_or_default();

        let owner = require(ENV_GIT_REPO_OWNER);
        let name = require(ENV_GIT_REPO_NAME);
        let remote_url = env
            .get(ENV_GIT_REMOTE_URL)
            .unwrap_or_else(|| RepositoryCoordinates::github_remote(&owner, &name));

        let install_dir = match env.get(ENV_RELEASE_INSTALL_DIR) {
            Some(dir) => PathBuf::from(dir),
            None => default_install_dir()?,
        };
        let resources_dir = env
            .get(ENV_RELEASE_RESOURCES_DIR)
            .map(PathBuf::from)
            .unwrap_or_else(|| install_dir.join(DEFAULT_RESOURCES_DIR_NAME));

        let descriptor_fields = match env.get(ENV_RELEASE_DESCRIPTOR_FIELDS) {
            Some(raw) => parse_descriptor_fields(&raw)?,
            None => default_descriptor_fields(),
        };

        // An explicitly empty prefix means "accept every release"
        let acceptance = match env.vars.get(ENV_RELEASE_SERIES_PREFIX) {
            Some(prefix) => AcceptancePolicy::with_prefix(prefix.trim()),
            None => AcceptancePolicy::default(),
        };

        let single_flight = SingleFlightConfig {
            enabled: match env.get(ENV_RELEASE_SINGLE_FLIGHT) {
                Some(raw) => parse_bool(ENV_RELEASE_SINGLE_FLIGHT, &raw)?,
                None => true,
            },
            timeout: match env.get(ENV_RELEASE_LOCK_TIMEOUT_SECS) {
                Some(raw) => Duration::from_secs(raw.parse().map_err(|e| {
                    ConfigError::InvalidValue {
                        name: ENV_RELEASE_LOCK_TIMEOUT_SECS.to_string(),
                        reason: format!("{}", e),
                    }
                })?),
                None => Duration::from_secs(DEFAULT_LOCK_TIMEOUT_SECS),
            },
            lock_dir: env
                .get(ENV_RELEASE_LOCK_DIR)
                .map(PathBuf::from)
                .unwrap_or_else(default_lock_dir),
        };

        Ok(Self {
            credentials: Credentials::new(require(ENV_GIT_USER_NAME), require(ENV_GIT_PASSWORD)),
            repository: RepositoryCoordinates {
                owner,
                name,
                branch: require(ENV_GIT_REPO_BRANCH),
                remote_url,
            },
            author: Author {
                name: require(ENV_GIT_AUTHOR_NAME),
                email: require(ENV_GIT_AUTHOR_EMAIL),
            },
            acceptance,
            install_dir,
            resources_dir,
            descriptor_file: DEFAULT_DESCRIPTOR_FILE.to_string(),
            descriptor_fields,
            api_url: env
                .get(ENV_GITHUB_API_URL)
                .unwrap_or_else(|| DEFAULT_API_URL.to_string())
                .trim_end_matches('/')
                .to_string(),
            single_flight,
        })
    }
}

/// Deployment dependencies injected into every published package descriptor
pub fn default_descriptor_fields() -> serde_json::Map<String, serde_json::Value> {
    let fields = serde_json::json!({
        "dependencies": {
            "applicationinsights": "^1.0.0",
            "ghost-storage-azure": "^1.0.0"
        }
    });
    match fields {
        serde_json::Value::Object(map) => map,
        _ => serde_json::Map::new(),
    }
}

fn parse_descriptor_fields(
    raw: &str,
) -> Result<serde_json::Map<String, serde_json::Value>, ConfigError> {
    match serde_json::from_str(raw) {
        Ok(serde_json::Value::Object(map)) => Ok(map),
        Ok(_) => Err(ConfigError::InvalidValue {
            name: ENV_RELEASE_DESCRIPTOR_FIELDS.to_string(),
            reason: "expected a JSON object".to_string(),
        }),
        Err(e) => Err(ConfigError::InvalidValue {
            name: ENV_RELEASE_DESCRIPTOR_FIELDS.to_string(),
            reason: e.to_string(),
        }),
    }
}

fn parse_bool(name: &str, raw: &str) -> Result<bool, ConfigError> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(ConfigError::InvalidValue {
            name: name.to_string(),
            reason: format!("expected a boolean, got '{}'", other),
        }),
    }
}

fn default_install_dir() -> Result<PathBuf, ConfigError> {
    let exe = std::env::current_exe().map_err(|e| ConfigError::InvalidValue {
        name: ENV_RELEASE_INSTALL_DIR.to_string(),
        reason: format!("cannot locate executable: {}", e),
    })?;
    exe.parent()
        .map(|dir| dir.to_path_buf())
        .ok_or_else(|| ConfigError::InvalidValue {
            name: ENV_RELEASE_INSTALL_DIR.to_string(),
            reason: format!("executable {} has no parent directory", exe.display()),
        })
}
