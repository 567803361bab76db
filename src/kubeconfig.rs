//! Kubeconfig files.
//!
//! Reads the cluster, user and context lists of a kubeconfig and turns one
//! context into [`KubeClientConfig`] settings. Supported credentials: bearer
//! token (inline or `tokenFile`), basic auth, client certificate and key
//! (inline `-data` or file), and `exec` credential plugins returning a token.
//! Relative file paths resolve against the kubeconfig's directory.

use base64::{prelude::BASE64_STANDARD, Engine};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

use crate::error::FetchError;
use crate::kube::{Auth, KubeClientConfig, DEFAULT_REQUEST_TIMEOUT};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Kubeconfig {
    #[serde(default)]
    pub clusters: Vec<NamedCluster>,
    #[serde(default)]
    pub users: Vec<NamedUser>,
    #[serde(default)]
    pub contexts: Vec<NamedContext>,
    #[serde(default)]
    pub current_context: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct NamedCluster {
    pub name: String,
    pub cluster: Cluster,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Cluster {
    pub server: String,
    pub certificate_authority: Option<PathBuf>,
    pub certificate_authority_data: Option<String>,
    #[serde(default)]
    pub insecure_skip_tls_verify: bool,
}

#[derive(Debug, Deserialize)]
pub struct NamedUser {
    pub name: String,
    #[serde(default)]
    pub user: AuthInfo,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct AuthInfo {
    pub token: Option<String>,
    #[serde(rename = "tokenFile")]
    pub token_file: Option<PathBuf>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub client_certificate: Option<PathBuf>,
    pub client_certificate_data: Option<String>,
    pub client_key: Option<PathBuf>,
    pub client_key_data: Option<String>,
    pub exec: Option<ExecConfig>,
}

/// An `exec` credential plugin.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecConfig {
    pub api_version: Option<String>,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub env: Vec<ExecEnvVar>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecEnvVar {
    pub name: String,
    pub value: String,
}

#[derive(Debug, Deserialize)]
pub struct NamedContext {
    pub name: String,
    pub context: Context,
}

#[derive(Debug, Deserialize)]
pub struct Context {
    pub cluster: String,
    #[serde(default)]
    pub user: String,
    pub namespace: Option<String>,
}

impl Kubeconfig {
    pub fn read(path: &Path) -> Result<Self, FetchError> {
        let content = fs::read_to_string(path).map_err(|source| FetchError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&content).map_err(|e| FetchError::Parse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Connection settings for `context`, or for `current-context` when `None`.
    pub fn client_config(
        &self,
        context: Option<&str>,
        base_dir: &Path,
    ) -> Result<KubeClientConfig, FetchError> {
        let context_name = context
            .or(self.current_context.as_deref())
            .filter(|name| !name.is_empty())
            .ok_or_else(|| FetchError::Config("kubeconfig has no current-context".to_string()))?;
        let context = self
            .contexts
            .iter()
            .find(|c| c.name == context_name)
            .map(|c| &c.context)
            .ok_or_else(|| {
                FetchError::Config(format!("context {context_name:?} not found in kubeconfig"))
            })?;
        let cluster = self
            .clusters
            .iter()
            .find(|c| c.name == context.cluster)
            .map(|c| &c.cluster)
            .ok_or_else(|| {
                FetchError::Config(format!("cluster {:?} not found in kubeconfig", context.cluster))
            })?;
        let user = self
            .users
            .iter()
            .find(|u| u.name == context.user)
            .map(|u| &u.user);

        if cluster.server.is_empty() {
            return Err(FetchError::Config(format!(
                "cluster {:?} has no server",
                context.cluster
            )));
        }

        let ca_cert_pem = inline_or_file(
            cluster.certificate_authority_data.as_deref(),
            cluster.certificate_authority.as_deref(),
            base_dir,
        )?;

        let (auth, client_identity_pem) = match user {
            Some(user) => (user_auth(user, base_dir)?, client_identity(user, base_dir)?),
            None => (Auth::None, None),
        };

        debug!(context = context_name, server = %cluster.server, "Using kubeconfig context");
        Ok(KubeClientConfig {
            api_server: cluster.server.trim_end_matches('/').to_string(),
            auth,
            ca_cert_pem,
            client_identity_pem,
            insecure_skip_tls_verify: cluster.insecure_skip_tls_verify,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }
}

/// Reads and resolves `path` in one step.
pub fn load_kubeconfig(path: &Path, context: Option<&str>) -> Result<KubeClientConfig, FetchError> {
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    Kubeconfig::read(path)?.client_config(context, base_dir)
}

fn user_auth(user: &AuthInfo, base_dir: &Path) -> Result<Auth, FetchError> {
    if let Some(token) = user.token.as_deref().filter(|t| !t.is_empty()) {
        return Ok(Auth::Bearer(token.to_string()));
    }
    if let Some(path) = &user.token_file {
        let bytes = read(&resolve(base_dir, path))?;
        return Ok(Auth::Bearer(String::from_utf8_lossy(&bytes).trim().to_string()));
    }
    if let (Some(username), Some(password)) = (&user.username, &user.password) {
        return Ok(Auth::Basic {
            username: username.clone(),
            password: password.clone(),
        });
    }
    if let Some(exec) = &user.exec {
        return Ok(Auth::Exec(Arc::new(ExecCredentialProvider::new(exec.clone()))));
    }
    Ok(Auth::None)
}

/// Client certificate followed by its key, as one PEM bundle.
fn client_identity(user: &AuthInfo, base_dir: &Path) -> Result<Option<Vec<u8>>, FetchError> {
    let cert = inline_or_file(
        user.client_certificate_data.as_deref(),
        user.client_certificate.as_deref(),
        base_dir,
    )?;
    let key = inline_or_file(
        user.client_key_data.as_deref(),
        user.client_key.as_deref(),
        base_dir,
    )?;
    match (cert, key) {
        (Some(mut cert), Some(key)) => {
            if !cert.ends_with(b"\n") {
                cert.push(b'\n');
            }
            cert.extend_from_slice(&key);
            Ok(Some(cert))
        }
        (None, None) => Ok(None),
        _ => Err(FetchError::Config(
            "kubeconfig user sets only one of client certificate and client key".to_string(),
        )),
    }
}

fn inline_or_file(
    data: Option<&str>,
    file: Option<&Path>,
    base_dir: &Path,
) -> Result<Option<Vec<u8>>, FetchError> {
    if let Some(data) = data.filter(|d| !d.is_empty()) {
        let decoded = BASE64_STANDARD
            .decode(data.trim())
            .map_err(|e| FetchError::Config(format!("invalid base64 in kubeconfig: {e}")))?;
        return Ok(Some(decoded));
    }
    file.map(|path| read(&resolve(base_dir, path))).transpose()
}

fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

fn read(path: &Path) -> Result<Vec<u8>, FetchError> {
    fs::read(path).map_err(|source| FetchError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Deserialize)]
struct ExecCredential {
    status: Option<ExecCredentialStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecCredentialStatus {
    token: Option<String>,
    expiration_timestamp: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires: Option<DateTime<Utc>>,
}

/// Runs an `exec` plugin and caches its token until it expires.
#[derive(Debug)]
pub struct ExecCredentialProvider {
    config: ExecConfig,
    cached: Mutex<Option<CachedToken>>,
}

impl ExecCredentialProvider {
    pub fn new(config: ExecConfig) -> Self {
        Self {
            config,
            cached: Mutex::new(None),
        }
    }

    pub fn command(&self) -> &str {
        &self.config.command
    }

    /// A valid token, running the plugin when none is cached or the cached
    /// one has expired.
    pub fn token(&self) -> Result<String, FetchError> {
        let mut cached = self.cached.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(current) = cached.as_ref() {
            if current.expires.map_or(true, |at| at > Utc::now()) {
                return Ok(current.token.clone());
            }
        }
        let fresh = self.run()?;
        let token = fresh.token.clone();
        *cached = Some(fresh);
        Ok(token)
    }

    fn run(&self) -> Result<CachedToken, FetchError> {
        let api_version = self
            .config
            .api_version
            .as_deref()
            .unwrap_or("client.authentication.k8s.io/v1");
        let exec_info = format!(
            r#"{{"apiVersion":"{api_version}","kind":"ExecCredential","spec":{{"interactive":false}}}}"#
        );

        let mut command = Command::new(&self.config.command);
        command.args(&self.config.args).env("KUBERNETES_EXEC_INFO", exec_info);
        for var in &self.config.env {
            command.env(&var.name, &var.value);
        }

        let output = command.output().map_err(|e| {
            FetchError::Config(format!("failed to run credential plugin {:?}: {e}", self.config.command))
        })?;
        if !output.status.success() {
            return Err(FetchError::Config(format!(
                "credential plugin {:?} exited with {}: {}",
                self.config.command,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        parse_exec_output(&output.stdout, &self.config.command)
    }
}

fn parse_exec_output(stdout: &[u8], command: &str) -> Result<CachedToken, FetchError> {
    let credential: ExecCredential = serde_json::from_slice(stdout).map_err(|e| {
        FetchError::Config(format!("credential plugin {command:?} printed invalid JSON: {e}"))
    })?;
    let status = credential.status.ok_or_else(|| {
        FetchError::Config(format!("credential plugin {command:?} returned no status"))
    })?;
    let token = status.token.filter(|t| !t.is_empty()).ok_or_else(|| {
        FetchError::Config(format!("credential plugin {command:?} returned no token"))
    })?;
    Ok(CachedToken {
        token,
        expires: status.expiration_timestamp,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const KUBECONFIG: &str = r#"
apiVersion: v1
kind: Config
current-context: kind-dev
clusters:
  - name: kind-dev
    cluster:
      server: https://127.0.0.1:6443/
      certificate-authority-data: LS0tLS1CRUdJTiBDRVJUSUZJQ0FURS0tLS0tCg==
  - name: staging
    cluster:
      server: https://staging.example.io
      insecure-skip-tls-verify: true
users:
  - name: kind-dev
    user:
      client-certificate-data: Y2VydA==
      client-key-data: a2V5
  - name: robot
    user:
      token: abc123
contexts:
  - name: kind-dev
    context: {cluster: kind-dev, user: kind-dev}
  - name: staging
    context: {cluster: staging, user: robot, namespace: ops}
"#;

    fn parsed() -> Kubeconfig {
        serde_yaml::from_str(KUBECONFIG).unwrap()
    }

    #[test]
    fn test_current_context_with_client_certificate() {
        let config = parsed().client_config(None, Path::new("/tmp")).unwrap();
        assert_eq!(config.api_server, "https://127.0.0.1:6443");
        assert_eq!(
            config.ca_cert_pem.as_deref(),
            Some(&b"-----BEGIN CERTIFICATE-----\n"[..])
        );
        assert_eq!(config.client_identity_pem.as_deref(), Some(&b"cert\nkey"[..]));
        assert!(matches!(config.auth, Auth::None));
        assert!(!config.insecure_skip_tls_verify);
    }

    #[test]
    fn test_named_context_with_token() {
        let config = parsed()
            .client_config(Some("staging"), Path::new("/tmp"))
            .unwrap();
        assert_eq!(config.api_server, "https://staging.example.io");
        assert!(matches!(&config.auth, Auth::Bearer(t) if t == "abc123"));
        assert!(config.insecure_skip_tls_verify);
        assert!(config.client_identity_pem.is_none());
    }

    #[test]
    fn test_missing_context_is_config_error() {
        let err = parsed()
            .client_config(Some("prod"), Path::new("/tmp"))
            .unwrap_err();
        assert!(matches!(err, FetchError::Config(msg) if msg.contains("prod")));

        let err = Kubeconfig::default()
            .client_config(None, Path::new("/tmp"))
            .unwrap_err();
        assert!(matches!(err, FetchError::Config(_)));
    }

    #[test]
    fn test_relative_files_resolve_against_kubeconfig_dir() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("token"), "from-file\n").unwrap();
        fs::write(dir.path().join("ca.crt"), "ca").unwrap();

        let mut file = fs::File::create(dir.path().join("config")).unwrap();
        write!(
            file,
            r#"
current-context: c
clusters:
  - name: c
    cluster: {{server: "https://10.0.0.1", certificate-authority: ca.crt}}
users:
  - name: u
    user: {{tokenFile: token}}
contexts:
  - name: c
    context: {{cluster: c, user: u}}
"#
        )
        .unwrap();

        let config = load_kubeconfig(&dir.path().join("config"), None).unwrap();
        assert!(matches!(&config.auth, Auth::Bearer(t) if t == "from-file"));
        assert_eq!(config.ca_cert_pem.as_deref(), Some(&b"ca"[..]));
    }

    #[test]
    fn test_lone_client_key_is_rejected() {
        let user = AuthInfo {
            client_key_data: Some("a2V5".into()),
            ..Default::default()
        };
        assert!(client_identity(&user, Path::new("/")).is_err());
    }

    #[test]
    fn test_exec_output_parsing() {
        let parsed = parse_exec_output(
            br#"{"apiVersion":"client.authentication.k8s.io/v1","kind":"ExecCredential",
                "status":{"token":"t0k","expirationTimestamp":"2030-01-01T00:00:00Z"}}"#,
            "aws",
        )
        .unwrap();
        assert_eq!(parsed.token, "t0k");
        assert!(parsed.expires.is_some());

        assert!(parse_exec_output(br#"{"status":{}}"#, "aws").is_err());
        assert!(parse_exec_output(b"not json", "aws").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_exec_plugin_token_is_cached() {
        let provider = ExecCredentialProvider::new(ExecConfig {
            command: "sh".into(),
            args: vec![
                "-c".into(),
                r#"echo '{"status":{"token":"from-plugin"}}'"#.into(),
            ],
            ..Default::default()
        });
        assert_eq!(provider.token().unwrap(), "from-plugin");
        assert_eq!(provider.token().unwrap(), "from-plugin");
        assert_eq!(provider.command(), "sh");
    }
}
