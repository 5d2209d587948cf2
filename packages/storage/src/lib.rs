//! Object storage for generated certificates.
//!
//! Backends:
//! - S3-compatible storage in production/staging
//! - On-disk storage for local dev
//! - In-memory storage for tests
//!
//! Every upload returns a URL under the configured public base, which is what
//! ends up in the notification email and on the participation record.

use std::path::{Path as FsPath, PathBuf};
use std::sync::Arc;

use bytes::Bytes;
use certificate_core::env::var_non_empty;
use object_store::path::Path;
use object_store::{Attribute, Attributes, ObjectStore, ObjectStoreExt, PutOptions, PutPayload};

/// Content type for rendered certificates.
pub const PDF_CONTENT_TYPE: &str = "application/pdf";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid storage config: {0}")]
    InvalidConfig(String),

    #[error("invalid object key: {0}")]
    InvalidKey(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("object_store error: {0}")]
    ObjectStore(#[from] object_store::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageKind {
    S3,
    Filesystem,
    Memory,
}

impl StorageKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageKind::S3 => "s3",
            StorageKind::Filesystem => "filesystem",
            StorageKind::Memory => "memory",
        }
    }
}

#[derive(Debug, Clone)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub allow_http: bool,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub session_token: Option<String>,
    pub virtual_hosted_style: bool,
}

impl S3Config {
    /// Public URL objects in this bucket resolve under.
    ///
    /// Custom endpoints (MinIO, R2, ...) are addressed path-style, AWS itself
    /// through the bucket subdomain.
    ///
    /// Uploads carry no ACL, so these URLs only resolve when the bucket policy
    /// (or a CDN in front of it) grants public read on the certificate keys.
    /// Otherwise set `STORAGE_PUBLIC_URL` to a base that is readable.
    pub fn default_public_url(&self) -> String {
        match self.endpoint.as_deref() {
            Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), self.bucket),
            None => format!("https://{}.s3.amazonaws.com", self.bucket),
        }
    }
}

#[derive(Debug, Clone)]
pub enum StorageBackendConfig {
    S3(S3Config),
    Filesystem { root: PathBuf },
    Memory,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackendConfig,
    /// Optional key prefix applied to all object keys.
    pub prefix: Option<String>,
    /// Base URL objects are served from; derived from the backend when unset.
    pub public_url: Option<String>,
}

impl StorageConfig {
    pub fn memory() -> Self {
        Self {
            backend: StorageBackendConfig::Memory,
            prefix: None,
            public_url: None,
        }
    }

    pub fn filesystem(root: impl Into<PathBuf>) -> Self {
        Self {
            backend: StorageBackendConfig::Filesystem { root: root.into() },
            prefix: None,
            public_url: None,
        }
    }

    pub fn s3(cfg: S3Config) -> Self {
        Self {
            backend: StorageBackendConfig::S3(cfg),
            prefix: None,
            public_url: None,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }

    pub fn with_public_url(mut self, url: impl Into<String>) -> Self {
        self.public_url = Some(url.into());
        self
    }

    /// Build a config from environment variables.
    ///
    /// Selection rules:
    /// - If `STORAGE_BACKEND` is set: use it (`s3`, `filesystem`, `memory`)
    /// - Otherwise: default to filesystem (`./data/object_store`)
    ///
    /// S3 env vars (S3-compatible):
    /// - `S3_BUCKET` (required when backend is `s3`)
    /// - `AWS_REGION` (default: `us-east-1`)
    /// - `S3_ENDPOINT` (optional, e.g. `http://localhost:9000`)
    /// - `S3_ALLOW_HTTP` (`true`/`false`, default: auto true if endpoint is http://)
    /// - `S3_VIRTUAL_HOSTED_STYLE` (`true`/`false`, default: false)
    /// - `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_SESSION_TOKEN` (optional)
    ///
    /// Filesystem env vars:
    /// - `STORAGE_FS_ROOT` (default: `./data/object_store`)
    ///
    /// Common:
    /// - `STORAGE_PREFIX` (optional, e.g. `quiz-app/`)
    /// - `STORAGE_PUBLIC_URL` (optional, e.g. `https://cdn.example.com`)
    ///
    /// Without `STORAGE_PUBLIC_URL`, S3 URLs point straight at the bucket and
    /// work only if the bucket allows public reads; objects are not uploaded
    /// with a `public-read` ACL.
    pub fn from_env() -> Result<Self, StorageError> {
        let fs_root = || {
            var_non_empty("STORAGE_FS_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("./data/object_store"))
        };

        let cfg = match var_non_empty("STORAGE_BACKEND").as_deref() {
            Some("s3") => Self::s3(read_s3_config()?),
            Some("filesystem") | Some("fs") | None => Self::filesystem(fs_root()),
            Some("memory") | Some("mem") => Self::memory(),
            Some(other) => {
                return Err(StorageError::InvalidConfig(format!(
                    "unsupported STORAGE_BACKEND={other} (expected s3|filesystem|memory)"
                )));
            }
        };

        Ok(Self {
            prefix: var_non_empty("STORAGE_PREFIX"),
            public_url: var_non_empty("STORAGE_PUBLIC_URL"),
            ..cfg
        })
    }
}

/// Shared handle to the configured object store.
///
/// Constructed once at start-up and cloned into whoever uploads.
#[derive(Clone)]
pub struct Storage {
    kind: StorageKind,
    store: Arc<dyn ObjectStore>,
    prefix: Option<String>,
    public_url: String,
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("kind", &self.kind)
            .field("prefix", &self.prefix)
            .field("public_url", &self.public_url)
            .finish()
    }
}

impl Storage {
    pub fn kind(&self) -> StorageKind {
        self.kind
    }

    pub fn kind_str(&self) -> &'static str {
        self.kind.as_str()
    }

    pub async fn new(cfg: StorageConfig) -> Result<Self, StorageError> {
        let (kind, store, default_url): (StorageKind, Arc<dyn ObjectStore>, String) =
            match cfg.backend {
                StorageBackendConfig::S3(s3) => {
                    let url = s3.default_public_url();
                    (StorageKind::S3, Arc::new(build_s3(s3)?), url)
                }
                StorageBackendConfig::Filesystem { root } => {
                    ensure_dir(&root)?;
                    let root = std::fs::canonicalize(&root)?;
                    let fs = object_store::local::LocalFileSystem::new_with_prefix(&root)?;
                    let url = format!("file://{}", root.display());
                    (StorageKind::Filesystem, Arc::new(fs), url)
                }
                StorageBackendConfig::Memory => {
                    let mem = object_store::memory::InMemory::new();
                    (StorageKind::Memory, Arc::new(mem), "memory://".to_string())
                }
            };

        let public_url = cfg
            .public_url
            .and_then(non_empty)
            .unwrap_or(default_url)
            .trim_end_matches('/')
            .to_string();

        Ok(Self {
            kind,
            store,
            prefix: cfg.prefix.and_then(non_empty),
            public_url,
        })
    }

    pub async fn from_env() -> Result<Self, StorageError> {
        Self::new(StorageConfig::from_env()?).await
    }

    /// Full object key, prefix included.
    fn full_key(&self, key: &str) -> Result<String, StorageError> {
        let key = key.trim_start_matches('/');
        if key.is_empty() {
            return Err(StorageError::InvalidKey(
                "object key must not be empty".to_string(),
            ));
        }
        if key.split('/').any(|part| part.is_empty() || part == "." || part == "..") {
            return Err(StorageError::InvalidKey(format!(
                "object key has an empty or relative segment: {key}"
            )));
        }

        let prefix = self
            .prefix
            .as_deref()
            .map(|p| p.trim_matches('/'))
            .filter(|p| !p.is_empty());

        Ok(match prefix {
            Some(prefix) => format!("{prefix}/{key}"),
            None => key.to_string(),
        })
    }

    /// URL an object with this key resolves to.
    pub fn public_url(&self, key: &str) -> Result<String, StorageError> {
        Ok(format!("{}/{}", self.public_url, self.full_key(key)?))
    }

    /// Upload bytes and return the object's public URL.
    ///
    /// An existing object under the same key is overwritten.
    pub async fn put_object(
        &self,
        key: &str,
        bytes: Bytes,
        content_type: &'static str,
    ) -> Result<String, StorageError> {
        let path = Path::from(self.full_key(key)?);

        // The local filesystem backend refuses object attributes
        let mut attributes = Attributes::new();
        if self.kind != StorageKind::Filesystem {
            attributes.insert(Attribute::ContentType, content_type.into());
        }
        let opts = PutOptions {
            attributes,
            ..Default::default()
        };

        self.store
            .put_opts(&path, PutPayload::from(bytes), opts)
            .await?;

        self.public_url(key)
    }

    pub async fn get_bytes(&self, key: &str) -> Result<Bytes, StorageError> {
        let path = Path::from(self.full_key(key)?);
        let res = self.store.get(&path).await?;
        Ok(res.bytes().await?)
    }

    pub async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = Path::from(self.full_key(key)?);
        self.store.delete(&path).await?;
        Ok(())
    }
}

fn ensure_dir(root: &FsPath) -> Result<(), StorageError> {
    std::fs::create_dir_all(root)?;
    Ok(())
}

fn non_empty(s: String) -> Option<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_bool_env(var_name: &str) -> Result<Option<bool>, StorageError> {
    let Some(v) = var_non_empty(var_name) else {
        return Ok(None);
    };

    match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" => Ok(Some(true)),
        "0" | "false" | "no" | "n" => Ok(Some(false)),
        _ => Err(StorageError::InvalidConfig(format!(
            "invalid boolean for {var_name}={v} (expected true/false)"
        ))),
    }
}

fn read_s3_config() -> Result<S3Config, StorageError> {
    let bucket = var_non_empty("S3_BUCKET").ok_or_else(|| {
        StorageError::InvalidConfig("S3_BUCKET is required for s3 backend".into())
    })?;

    let endpoint = var_non_empty("S3_ENDPOINT");
    let allow_http = match parse_bool_env("S3_ALLOW_HTTP")? {
        Some(v) => v,
        None => endpoint
            .as_deref()
            .is_some_and(|e| e.to_ascii_lowercase().starts_with("http://")),
    };

    Ok(S3Config {
        bucket,
        region: var_non_empty("AWS_REGION").unwrap_or_else(|| "us-east-1".to_string()),
        endpoint,
        allow_http,
        access_key_id: var_non_empty("AWS_ACCESS_KEY_ID"),
        secret_access_key: var_non_empty("AWS_SECRET_ACCESS_KEY"),
        session_token: var_non_empty("AWS_SESSION_TOKEN"),
        virtual_hosted_style: parse_bool_env("S3_VIRTUAL_HOSTED_STYLE")?.unwrap_or(false),
    })
}

fn build_s3(cfg: S3Config) -> Result<object_store::aws::AmazonS3, StorageError> {
    let mut builder = object_store::aws::AmazonS3Builder::new()
        .with_bucket_name(cfg.bucket)
        .with_region(cfg.region)
        .with_virtual_hosted_style_request(cfg.virtual_hosted_style)
        .with_allow_http(cfg.allow_http);

    if let Some(endpoint) = cfg.endpoint {
        builder = builder.with_endpoint(endpoint);
    }
    if let Some(access_key_id) = cfg.access_key_id {
        builder = builder.with_access_key_id(access_key_id);
    }
    if let Some(secret_access_key) = cfg.secret_access_key {
        builder = builder.with_secret_access_key(secret_access_key);
    }
    if let Some(session_token) = cfg.session_token {
        builder = builder.with_token(session_token);
    }

    Ok(builder.build()?)
}
