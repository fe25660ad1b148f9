use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_CONFIG_FILE: &str = ".pr-files.toml";
pub const DEFAULT_API_URL: &str = "https://api.github.com";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Credential file not found: {}", .0.display())]
    CredentialFileMissing(PathBuf),

    #[error("No GitHub credentials for {machine}: set github.token, GITHUB_TOKEN, or add the machine to your .netrc")]
    CredentialMissing { machine: String },

    #[error("Invalid API URL: {0}")]
    InvalidApiUrl(String),
}

/// Top-level configuration loaded from .pr-files.toml.
/// All fields are optional — the tool works with zero config.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// GitHub-specific settings
    #[serde(default)]
    pub github: GitHubConfig,

    /// Diff download settings
    #[serde(default)]
    pub fetch: FetchConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GitHubConfig {
    /// GitHub API token. If None, falls back to GITHUB_TOKEN, then .netrc.
    pub token: Option<String>,

    /// REST API base URL (GitHub Enterprise installs differ)
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// netrc file to read the token from. Defaults to ~/.netrc.
    pub netrc: Option<PathBuf>,
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            token: None,
            api_url: default_api_url(),
            netrc: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Redirect hops followed per diff before giving up
    pub max_redirects: usize,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Pull requests fetched at once; 1 means strictly sequential
    pub jobs: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_redirects: 10,
            timeout_secs: 30,
            jobs: 1,
        }
    }
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

/// The token handed to the API client.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    token: String,
}

impl Credentials {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credentials(***)")
    }
}

impl Config {
    /// Load configuration from `path`, or from .pr-files.toml in the current
    /// directory when no path is given.
    /// A missing default file yields the default config; an explicitly
    /// named file must exist.
    pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
        match path {
            Some(path) => Self::load_from(path),
            None => {
                let path = Path::new(DEFAULT_CONFIG_FILE);
                if path.exists() {
                    Self::load_from(path)
                } else {
                    Ok(Config::default())
                }
            }
        }
    }

    /// Load from a specific path (useful for testing).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Resolve the GitHub token: config file value first, then the
    /// GITHUB_TOKEN env var, then the netrc entry for the API host.
    pub fn credentials(&self) -> Result<Credentials, ConfigError> {
        self.credentials_with(std::env::var("GITHUB_TOKEN").ok())
    }

    fn credentials_with(&self, env_token: Option<String>) -> Result<Credentials, ConfigError> {
        if let Some(token) = self.github.token.clone().or(env_token) {
            return Ok(Credentials::new(token));
        }

        let machine = self.api_host()?;
        let netrc_path = match &self.github.netrc {
            Some(path) => path.clone(),
            None => dirs::home_dir()
                .ok_or_else(|| ConfigError::CredentialMissing {
                    machine: machine.clone(),
                })?
                .join(".netrc"),
        };
        if !netrc_path.exists() {
            return Err(ConfigError::CredentialFileMissing(netrc_path));
        }

        let contents = fs::read_to_string(&netrc_path)?;
        netrc_token(&contents, &machine)
            .map(Credentials::new)
            .ok_or(ConfigError::CredentialMissing { machine })
    }

    fn api_host(&self) -> Result<String, ConfigError> {
        reqwest::Url::parse(&self.github.api_url)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .ok_or_else(|| ConfigError::InvalidApiUrl(self.github.api_url.clone()))
    }
}

/// Find the token for `machine` in netrc text: its `password`, or its
/// `login` when no password is given. A `default` entry matches any host.
fn netrc_token(contents: &str, machine: &str) -> Option<String> {
    #[derive(Default)]
    struct Entry {
        matches: bool,
        login: Option<String>,
        password: Option<String>,
    }

    let mut entries: Vec<Entry> = Vec::new();
    let mut tokens = netrc_tokens(contents).into_iter();

    while let Some(token) = tokens.next() {
        match token.as_str() {
            "machine" => entries.push(Entry {
                matches: tokens.next().as_deref() == Some(machine),
                ..Entry::default()
            }),
            "default" => entries.push(Entry {
                matches: true,
                ..Entry::default()
            }),
            "login" | "password" | "account" => {
                let value = tokens.next();
                if let Some(entry) = entries.last_mut() {
                    match token.as_str() {
                        "login" => entry.login = value,
                        "password" => entry.password = value,
                        _ => {}
                    }
                }
            }
            _ => {}
        }
    }

    entries
        .into_iter()
        .find(|entry| entry.matches)
        .and_then(|entry| entry.password.or(entry.login))
}

/// Split netrc text into tokens. `#` lines are comments, double-quoted
/// tokens may hold spaces and `\` escapes, and a `macdef` body runs to the
/// next blank line.
fn netrc_tokens(contents: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut in_macro = false;

    for line in contents.lines() {
        if in_macro {
            in_macro = !line.trim().is_empty();
            continue;
        }
        if line.trim_start().starts_with('#') {
            continue;
        }

        let mut chars = line.chars().peekable();
        loop {
            while chars.next_if(|c| c.is_whitespace()).is_some() {}
            let Some(first) = chars.next() else { break };

            let mut token = String::new();
            if first == '"' {
                while let Some(c) = chars.next() {
                    match c {
                        '"' => break,
                        '\\' => token.extend(chars.next()),
                        _ => token.push(c),
                    }
                }
            } else {
                token.push(first);
                while let Some(c) = chars.next_if(|c| !c.is_whitespace()) {
                    token.push(c);
                }
            }

            if token == "macdef" {
                in_macro = true;
                break;
            }
            tokens.push(token);
        }
    }

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.github.token.is_none());
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.fetch.max_redirects, 10);
        assert_eq!(config.fetch.jobs, 1);
    }

    #[test]
    fn test_parse_config_toml() {
        let toml_str = r#"
[github]
token = "abc"

[fetch]
max_redirects = 3
jobs = 4
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.github.token.as_deref(), Some("abc"));
        assert_eq!(config.github.api_url, "https://api.github.com");
        assert_eq!(config.fetch.max_redirects, 3);
        assert_eq!(config.fetch.timeout_secs, 30);
        assert_eq!(config.fetch.jobs, 4);
    }

    #[test]
    fn test_load_missing_explicit_file_fails() {
        let path = std::env::temp_dir().join("pr-files-does-not-exist.toml");
        assert!(matches!(Config::load(Some(&path)), Err(ConfigError::FileRead(_))));
    }

    #[test]
    fn test_load_from_file() {
        let path = std::env::temp_dir().join("pr-files-test-config.toml");
        fs::write(&path, "[fetch]\ntimeout_secs = 5\n").unwrap();
        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.fetch.timeout_secs, 5);
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_config_token_wins() {
        let mut config = Config::default();
        config.github.token = Some("from-config".to_string());
        let creds = config.credentials_with(Some("from-env".to_string())).unwrap();
        assert_eq!(creds.token(), "from-config");
    }

    #[test]
    fn test_env_token_used() {
        let creds = Config::default()
            .credentials_with(Some("from-env".to_string()))
            .unwrap();
        assert_eq!(creds.token(), "from-env");
    }

    #[test]
    fn test_missing_netrc_file() {
        let mut config = Config::default();
        config.github.netrc = Some(std::env::temp_dir().join("pr-files-no-such-netrc"));
        let err = config.credentials_with(None).unwrap_err();
        assert!(matches!(err, ConfigError::CredentialFileMissing(_)));
    }

    #[test]
    fn test_netrc_without_machine() {
        let path = std::env::temp_dir().join("pr-files-test-netrc-other");
        fs::write(&path, "machine example.com login me password secret\n").unwrap();
        let mut config = Config::default();
        config.github.netrc = Some(path.clone());
        let err = config.credentials_with(None).unwrap_err();
        assert!(matches!(err, ConfigError::CredentialMissing { ref machine } if machine == "api.github.com"));
        fs::remove_file(&path).ok();
    }

    #[test]
    fn test_netrc_token_lookup() {
        let netrc = "# comment\nmachine example.com login a password b\n\nmachine api.github.com\n  login alice\n  password ghp_123\n";
        assert_eq!(netrc_token(netrc, "api.github.com").as_deref(), Some("ghp_123"));
        assert_eq!(netrc_token(netrc, "example.com").as_deref(), Some("b"));
        assert_eq!(netrc_token(netrc, "gitlab.com"), None);
    }

    #[test]
    fn test_netrc_default_entry_and_login_fallback() {
        let netrc = "machine other.host password x\ndefault login only-login\n";
        assert_eq!(netrc_token(netrc, "api.github.com").as_deref(), Some("only-login"));
    }

    #[test]
    fn test_netrc_skips_macdef_body() {
        let netrc = "macdef init\nmachine api.github.com password from-macro\ncd /tmp\n\nmachine api.github.com login me password real\n";
        assert_eq!(netrc_token(netrc, "api.github.com").as_deref(), Some("real"));
    }

    #[test]
    fn test_netrc_quoted_password() {
        let netrc = "machine api.github.com login \"me\" password \"two words \\\"q\\\"\"\n";
        assert_eq!(netrc_token(netrc, "api.github.com").as_deref(), Some("two words \"q\""));
    }

    #[test]
    fn test_credentials_debug_hides_token() {
        let creds = Credentials::new("secret");
        assert_eq!(format!("{creds:?}"), "Credentials(***)");
    }
}
