//! Cluster and scheme registry.
//!
//! Built once at startup from the configuration directory:
//!
//! ```text
//! <config dir>/
//!   schemes/<any>.json      one quota scheme per file
//!   clusters/<id>.json      one cluster per file, id = file stem
//! ```
//!
//! Any invalid document aborts loading. After that the registry is never
//! mutated and is shared read-only between request handlers.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use qm_id::{ClusterId, IdError};
use qm_scheme::{CompiledScheme, SchemeError};
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

/// Errors raised while loading or querying the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("cannot read '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("scheme '{origin}': {source}")]
    Scheme {
        origin: String,
        #[source]
        source: SchemeError,
    },

    #[error("duplicate quota scheme '{name}' in '{origin}'")]
    DuplicateScheme { name: String, origin: String },

    #[error("cluster '{origin}': could not parse cluster document: {source}")]
    ClusterDocument {
        origin: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("cluster '{origin}': {source}")]
    InvalidClusterId {
        origin: String,
        #[source]
        source: IdError,
    },

    #[error("cluster '{cluster}': {reason}")]
    InvalidCluster { cluster: String, reason: String },

    #[error("duplicate cluster '{0}'")]
    DuplicateCluster(String),

    #[error("cluster '{cluster}' references unknown quota scheme '{scheme}'")]
    UnknownSchemeRef { cluster: String, scheme: String },

    #[error("no clusters are configured")]
    NoClusters,

    /// Request-time: the caller named a cluster that is not registered.
    #[error("unknown cluster '{0}'")]
    UnknownCluster(String),
}

/// A named configuration document.
#[derive(Debug, Clone)]
pub struct Source {
    /// File name or other label; cluster ids are taken from its stem.
    pub origin: String,
    pub contents: String,
}

impl Source {
    pub fn new(origin: impl Into<String>, contents: impl Into<String>) -> Self {
        Self {
            origin: origin.into(),
            contents: contents.into(),
        }
    }
}

/// On-disk shape of a cluster document.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct ClusterDocument {
    display_name: String,
    api_endpoint: String,
    is_production: bool,
    credential_token: String,
    scheme_ref: String,
    #[serde(default)]
    ca_cert_path: Option<PathBuf>,
}

/// A managed cluster.
#[derive(Clone)]
pub struct Cluster {
    pub id: ClusterId,
    pub display_name: String,
    pub api_endpoint: String,
    pub is_production: bool,
    pub scheme_ref: String,
    pub ca_cert_path: Option<PathBuf>,
    credential_token: String,
}

impl Cluster {
    /// Bearer token the quota manager uses against this cluster.
    pub fn credential_token(&self) -> &str {
        &self.credential_token
    }

    fn from_document(id: ClusterId, doc: ClusterDocument) -> Result<Self, RegistryError> {
        let invalid = |reason: &str| RegistryError::InvalidCluster {
            cluster: id.to_string(),
            reason: reason.to_string(),
        };

        if doc.display_name.trim().is_empty() {
            return Err(invalid("displayName must not be empty"));
        }
        if doc.credential_token.trim().is_empty() {
            return Err(invalid("credentialToken must not be empty"));
        }
        match reqwest::Url::parse(&doc.api_endpoint) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => return Err(invalid("apiEndpoint must be an http(s) URL")),
        }

        Ok(Self {
            id,
            display_name: doc.display_name,
            api_endpoint: doc.api_endpoint.trim_end_matches('/').to_string(),
            is_production: doc.is_production,
            scheme_ref: doc.scheme_ref,
            ca_cert_path: doc.ca_cert_path,
            credential_token: doc.credential_token.trim().to_string(),
        })
    }
}

impl fmt::Debug for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cluster")
            .field("id", &self.id)
            .field("display_name", &self.display_name)
            .field("api_endpoint", &self.api_endpoint)
            .field("is_production", &self.is_production)
            .field("scheme_ref", &self.scheme_ref)
            .field("ca_cert_path", &self.ca_cert_path)
            .field("credential_token", &"[redacted]")
            .finish()
    }
}

/// A cluster together with the scheme that governs it.
#[derive(Debug, Clone)]
pub struct ResolvedCluster {
    pub cluster: Arc<Cluster>,
    pub scheme: Arc<CompiledScheme>,
}

/// Immutable index of clusters and compiled schemes.
#[derive(Debug)]
pub struct Registry {
    schemes: BTreeMap<String, Arc<CompiledScheme>>,
    clusters: BTreeMap<ClusterId, ResolvedCluster>,
}

impl Registry {
    /// Compiles every scheme, then loads every cluster against them.
    pub fn load(
        schemes: impl IntoIterator<Item = Source>,
        clusters: impl IntoIterator<Item = Source>,
    ) -> Result<Self, RegistryError> {
        let mut compiled = BTreeMap::new();
        for source in schemes {
            let scheme = qm_scheme::compile_str(&source.contents).map_err(|source_err| {
                RegistryError::Scheme {
                    origin: source.origin.clone(),
                    source: source_err,
                }
            })?;
            let name = scheme.name().to_string();
            if compiled.contains_key(&name) {
                return Err(RegistryError::DuplicateScheme {
                    name,
                    origin: source.origin,
                });
            }
            info!(
                scheme = %name,
                version = scheme.version(),
                objects = scheme.objects().len(),
                "quota scheme compiled"
            );
            compiled.insert(name, Arc::new(scheme));
        }

        let mut resolved = BTreeMap::new();
        for source in clusters {
            let stem = Path::new(&source.origin)
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or(&source.origin);
            let id = ClusterId::parse(stem).map_err(|e| RegistryError::InvalidClusterId {
                origin: source.origin.clone(),
                source: e,
            })?;
            let doc: ClusterDocument = serde_json::from_str(&source.contents).map_err(|e| {
                RegistryError::ClusterDocument {
                    origin: source.origin.clone(),
                    source: e,
                }
            })?;
            let cluster = Cluster::from_document(id.clone(), doc)?;

            let scheme = compiled
                .get(&cluster.scheme_ref)
                .cloned()
                .ok_or_else(|| RegistryError::UnknownSchemeRef {
                    cluster: id.to_string(),
                    scheme: cluster.scheme_ref.clone(),
                })?;

            if resolved.contains_key(&id) {
                return Err(RegistryError::DuplicateCluster(id.to_string()));
            }
            info!(
                cluster = %id,
                endpoint = %cluster.api_endpoint,
                production = cluster.is_production,
                scheme = %cluster.scheme_ref,
                "cluster registered"
            );
            resolved.insert(
                id,
                ResolvedCluster {
                    cluster: Arc::new(cluster),
                    scheme,
                },
            );
        }

        if resolved.is_empty() {
            return Err(RegistryError::NoClusters);
        }

        Ok(Self {
            schemes: compiled,
            clusters: resolved,
        })
    }

    /// Loads `dir/schemes/*.json` and `dir/clusters/*.json`.
    pub fn load_dir(dir: &Path) -> Result<Self, RegistryError> {
        let schemes = read_sources(&dir.join("schemes"))?;
        let clusters = read_sources(&dir.join("clusters"))?;
        Self::load(schemes, clusters)
    }

    /// Looks up a cluster by id.
    pub fn resolve(&self, id: &str) -> Result<ResolvedCluster, RegistryError> {
        ClusterId::parse(id)
            .ok()
            .and_then(|cluster_id| self.clusters.get(&cluster_id))
            .cloned()
            .ok_or_else(|| RegistryError::UnknownCluster(id.to_string()))
    }

    /// Registered clusters ordered by id.
    pub fn clusters(&self) -> impl Iterator<Item = &Cluster> {
        self.clusters.values().map(|r| r.cluster.as_ref())
    }

    pub fn scheme(&self, name: &str) -> Option<&Arc<CompiledScheme>> {
        self.schemes.get(name)
    }

    pub fn scheme_count(&self) -> usize {
        self.schemes.len()
    }

    pub fn cluster_count(&self) -> usize {
        self.clusters.len()
    }
}

/// Reads every `*.json` file in `dir`, sorted by file name.
fn read_sources(dir: &Path) -> Result<Vec<Source>, RegistryError> {
    let io_err = |path: &Path, source| RegistryError::Io {
        path: path.to_path_buf(),
        source,
    };

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| io_err(dir, e))? {
        let path = entry.map_err(|e| io_err(dir, e))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    paths
        .into_iter()
        .map(|path| {
            let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
            let origin = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            debug!(path = %path.display(), "read configuration document");
            Ok(Source { origin, contents })
        })
        .collect()
}
