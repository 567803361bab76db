//! Resource store backed by the Kubernetes REST API.
//!
//! Discovery walks `/api` and `/apis` to build the catalog; listing uses the
//! plain collection endpoints with chunked pagination. Requests are blocking
//! and every one carries the configured timeout.

use reqwest::blocking::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::error::FetchError;
use crate::kubeconfig::{load_kubeconfig, ExecCredentialProvider};
use crate::resolver::{CatalogEntry, ResourceKindDescriptor};
use crate::store::{ListQuery, ResourceStore};

/// Default request timeout for API calls.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const SERVICE_ACCOUNT_DIR: &str = "/var/run/secrets/kubernetes.io/serviceaccount";
const PAGE_SIZE: &str = "500";
const MAX_ERROR_BODY: usize = 512;

/// How requests authenticate.
#[derive(Clone, Default)]
pub enum Auth {
    #[default]
    None,
    Bearer(String),
    Basic {
        username: String,
        password: String,
    },
    Exec(Arc<ExecCredentialProvider>),
}

impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Auth::None => f.write_str("None"),
            Auth::Bearer(_) => f.write_str("Bearer(<redacted>)"),
            Auth::Basic { username, .. } => write!(f, "Basic({username}, <redacted>)"),
            Auth::Exec(provider) => write!(f, "Exec({})", provider.command()),
        }
    }
}

/// Connection settings for the API server.
#[derive(Clone)]
pub struct KubeClientConfig {
    pub api_server: String,
    pub auth: Auth,
    pub ca_cert_pem: Option<Vec<u8>>,
    /// Client certificate followed by its private key (PEM).
    pub client_identity_pem: Option<Vec<u8>>,
    pub insecure_skip_tls_verify: bool,
    pub timeout: Duration,
}

impl std::fmt::Debug for KubeClientConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeClientConfig")
            .field("api_server", &self.api_server)
            .field("auth", &self.auth)
            .field("ca_cert_pem", &self.ca_cert_pem.as_ref().map(Vec::len))
            .field("client_identity_pem", &self.client_identity_pem.as_ref().map(|_| "<redacted>"))
            .field("insecure_skip_tls_verify", &self.insecure_skip_tls_verify)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Where the connection settings come from.
///
/// With `api_server` set, the server is used as given, authenticated by the
/// service-account files when present. Otherwise the first of these wins:
/// `kubeconfig`, the first existing file in `$KUBECONFIG`, the in-cluster
/// service, `~/.kube/config`. `token_file`, `ca_file` and
/// `insecure_skip_tls_verify` then override whatever was found.
#[derive(Debug, Clone)]
pub struct ConnectOptions<'a> {
    pub api_server: Option<&'a str>,
    pub kubeconfig: Option<&'a Path>,
    pub context: Option<&'a str>,
    pub token_file: Option<&'a Path>,
    pub ca_file: Option<&'a Path>,
    pub insecure_skip_tls_verify: bool,
    pub timeout: Duration,
}

impl Default for ConnectOptions<'_> {
    fn default() -> Self {
        Self {
            api_server: None,
            kubeconfig: None,
            context: None,
            token_file: None,
            ca_file: None,
            insecure_skip_tls_verify: false,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl KubeClientConfig {
    pub fn load(options: &ConnectOptions<'_>) -> Result<Self, FetchError> {
        let mut config = match options.api_server {
            Some(server) => Self::service_account(server.trim_end_matches('/').to_string())?,
            None => Self::infer(options)?,
        };

        if let Some(path) = options.token_file {
            config.auth = Auth::Bearer(read_token(path)?);
        }
        if let Some(path) = options.ca_file {
            config.ca_cert_pem = Some(read_file(path)?);
        }
        config.insecure_skip_tls_verify |= options.insecure_skip_tls_verify;
        config.timeout = options.timeout;
        Ok(config)
    }

    fn infer(options: &ConnectOptions<'_>) -> Result<Self, FetchError> {
        if let Some(path) = options.kubeconfig {
            return load_kubeconfig(path, options.context);
        }
        if let Some(path) = env_kubeconfig() {
            debug!(path = %path.display(), "Using kubeconfig from KUBECONFIG");
            return load_kubeconfig(&path, options.context);
        }
        if let Some(server) = in_cluster_server() {
            return Self::service_account(server);
        }
        if let Some(path) = home_kubeconfig() {
            debug!(path = %path.display(), "Using kubeconfig from home directory");
            return load_kubeconfig(&path, options.context);
        }
        Err(FetchError::Config(
            "no API server found: set api_server or kubeconfig, export KUBECONFIG, or run in a cluster"
                .to_string(),
        ))
    }

    /// `server` authenticated by the mounted service-account files, if any.
    fn service_account(server: String) -> Result<Self, FetchError> {
        let dir = Path::new(SERVICE_ACCOUNT_DIR);
        let token_path = dir.join("token");
        let ca_path = dir.join("ca.crt");

        let auth = if token_path.exists() {
            Auth::Bearer(read_token(&token_path)?)
        } else {
            Auth::None
        };
        let ca_cert_pem = if ca_path.exists() {
            Some(read_file(&ca_path)?)
        } else {
            None
        };

        Ok(Self {
            api_server: server,
            auth,
            ca_cert_pem,
            client_identity_pem: None,
            insecure_skip_tls_verify: false,
            timeout: DEFAULT_REQUEST_TIMEOUT,
        })
    }
}

fn in_cluster_server() -> Option<String> {
    let host = std::env::var("KUBERNETES_SERVICE_HOST").ok()?;
    let port = std::env::var("KUBERNETES_SERVICE_PORT").unwrap_or_else(|_| "443".to_string());
    if host.contains(':') {
        Some(format!("https://[{host}]:{port}"))
    } else {
        Some(format!("https://{host}:{port}"))
    }
}

fn env_kubeconfig() -> Option<PathBuf> {
    let paths = std::env::var_os("KUBECONFIG")?;
    std::env::split_paths(&paths).find(|p| !p.as_os_str().is_empty() && p.is_file())
}

fn home_kubeconfig() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    Some(PathBuf::from(home).join(".kube").join("config")).filter(|p| p.is_file())
}

fn read_token(path: &Path) -> Result<String, FetchError> {
    read_file(path).map(|bytes| String::from_utf8_lossy(&bytes).trim().to_string())
}

fn read_file(path: &Path) -> Result<Vec<u8>, FetchError> {
    fs::read(path).map_err(|source| FetchError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[derive(Debug, Deserialize)]
struct ApiVersions {
    #[serde(default)]
    versions: Vec<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiGroupList {
    #[serde(default)]
    groups: Vec<ApiGroup>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiGroup {
    name: String,
    #[serde(default)]
    versions: Vec<GroupVersion>,
    preferred_version: Option<GroupVersion>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupVersion {
    version: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResourceList {
    #[serde(default)]
    resources: Vec<ApiResource>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiResource {
    name: String,
    kind: String,
    #[serde(default)]
    namespaced: bool,
    #[serde(default)]
    verbs: Vec<String>,
    #[serde(default)]
    short_names: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct ListPage {
    #[serde(default)]
    items: Vec<Value>,
    #[serde(default)]
    metadata: ListMeta,
}

#[derive(Debug, Default, Deserialize)]
struct ListMeta {
    #[serde(rename = "continue", default)]
    continue_token: Option<String>,
}

/// Listable, non-subresource entries of one group/version.
fn catalog_entries(group: &str, version: &str, list: ApiResourceList) -> Vec<CatalogEntry> {
    list.resources
        .into_iter()
        .filter(|r| !r.name.contains('/'))
        .filter(|r| r.verbs.iter().any(|v| v == "list"))
        .map(|r| CatalogEntry {
            group: group.to_string(),
            version: version.to_string(),
            kind: r.kind,
            plural: r.name,
            namespaced: r.namespaced,
            short_names: r.short_names,
        })
        .collect()
}

/// Group versions in discovery order with the preferred one first.
fn ordered_versions(group: &ApiGroup) -> Vec<String> {
    let mut versions: Vec<String> = Vec::with_capacity(group.versions.len());
    if let Some(preferred) = &group.preferred_version {
        versions.push(preferred.version.clone());
    }
    for gv in &group.versions {
        if !versions.contains(&gv.version) {
            versions.push(gv.version.clone());
        }
    }
    versions
}

fn list_path(kind: &ResourceKindDescriptor, namespace: Option<&str>) -> String {
    let base = if kind.group.is_empty() {
        format!("/api/{}", kind.version)
    } else {
        format!("/apis/{}/{}", kind.group, kind.version)
    };
    match namespace {
        Some(ns) if kind.namespaced => format!("{base}/namespaces/{ns}/{}", kind.plural),
        _ => format!("{base}/{}", kind.plural),
    }
}

/// List items usually omit their type metadata; restore it.
fn fill_type_meta(item: &mut Value, kind: &ResourceKindDescriptor) {
    if let Value::Object(map) = item {
        map.entry("apiVersion")
            .or_insert_with(|| Value::String(kind.api_version()));
        map.entry("kind")
            .or_insert_with(|| Value::String(kind.kind.clone()));
    }
}

/// Store talking to a live API server.
pub struct KubeApiStore {
    client: Client,
    config: KubeClientConfig,
}

impl KubeApiStore {
    pub fn new(config: KubeClientConfig) -> Result<Self, FetchError> {
        let mut builder = Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("kube-resource-exporter/", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(config.insecure_skip_tls_verify);

        if let Some(pem) = &config.ca_cert_pem {
            let cert = reqwest::Certificate::from_pem(pem)
                .map_err(|e| FetchError::Config(format!("invalid CA certificate: {e}")))?;
            builder = builder.add_root_certificate(cert);
        }
        if let Some(pem) = &config.client_identity_pem {
            let identity = reqwest::Identity::from_pem(pem)
                .map_err(|e| FetchError::Config(format!("invalid client certificate: {e}")))?;
            builder = builder.identity(identity);
        }

        let client = builder
            .build()
            .map_err(|e| FetchError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { client, config })
    }

    pub fn api_server(&self) -> &str {
        &self.config.api_server
    }

    fn request(&self, path: &str) -> Result<(String, RequestBuilder), FetchError> {
        let url = format!("{}{}", self.config.api_server, path);
        let request = self.client.get(&url);
        let request = match &self.config.auth {
            Auth::None => request,
            Auth::Bearer(token) => request.bearer_auth(token),
            Auth::Basic { username, password } => request.basic_auth(username, Some(password)),
            Auth::Exec(provider) => request.bearer_auth(provider.token()?),
        };
        Ok((url, request))
    }

    fn send<T: DeserializeOwned>(&self, url: String, request: RequestBuilder) -> Result<T, FetchError> {
        let response = request.send().map_err(|source| FetchError::Transport {
            url: url.clone(),
            source,
        })?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let mut cut = MAX_ERROR_BODY;
                while !body.is_char_boundary(cut) {
                    cut -= 1;
                }
                body.truncate(cut);
            }
            return Err(FetchError::Status {
                url,
                status: status.as_u16(),
                body,
            });
        }

        response.json::<T>().map_err(|e| FetchError::Decode {
            url,
            reason: e.to_string(),
        })
    }

    fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let (url, request) = self.request(path)?;
        self.send(url, request)
    }
}

impl ResourceStore for KubeApiStore {
    #[instrument(skip(self), fields(api_server = %self.config.api_server))]
    fn catalog(&self) -> Result<Vec<CatalogEntry>, FetchError> {
        let mut catalog = Vec::new();

        let core: ApiVersions = self.get("/api")?;
        for version in &core.versions {
            let list: ApiResourceList = self.get(&format!("/api/{version}"))?;
            catalog.extend(catalog_entries("", version, list));
        }

        let groups: ApiGroupList = self.get("/apis")?;
        for group in &groups.groups {
            for version in ordered_versions(group) {
                match self.get::<ApiResourceList>(&format!("/apis/{}/{}", group.name, version)) {
                    Ok(list) => catalog.extend(catalog_entries(&group.name, &version, list)),
                    Err(e) => warn!(
                        group = %group.name,
                        version = %version,
                        error = %e,
                        "Skipping API group version during discovery"
                    ),
                }
            }
        }

        debug!(entries = catalog.len(), "Resource discovery complete");
        Ok(catalog)
    }

    #[instrument(skip(self, kind), fields(kind = %kind.kind))]
    fn list(
        &self,
        kind: &ResourceKindDescriptor,
        query: &ListQuery<'_>,
    ) -> Result<Vec<Value>, FetchError> {
        let path = list_path(kind, query.namespace);
        let mut items = Vec::new();
        let mut continue_token: Option<String> = None;

        loop {
            let (url, mut request) = self.request(&path)?;
            request = request.query(&[("limit", PAGE_SIZE)]);
            if let Some(selector) = query.label_selector {
                request = request.query(&[("labelSelector", selector)]);
            }
            if let Some(selector) = query.field_selector {
                request = request.query(&[("fieldSelector", selector)]);
            }
            if let Some(token) = &continue_token {
                request = request.query(&[("continue", token.as_str())]);
            }

            let page: ListPage = self.send(url, request)?;
            items.extend(page.items.into_iter().map(|mut item| {
                fill_type_meta(&mut item, kind);
                item
            }));

            match page.metadata.continue_token.filter(|t| !t.is_empty()) {
                Some(token) => continue_token = Some(token),
                None => break,
            }
        }

        debug!(items = items.len(), "Listed resources");
        Ok(items)
    }
}
