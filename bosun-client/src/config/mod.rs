//! Cluster connection descriptors from `~/.kube/config`, `$KUBECONFIG`, or the cluster environment.
//!
//! # Usage
//! The [`ClusterConfig`] has several constructors plus logic to infer the environment.
//!
//! Unless you have issues, prefer [`ClusterConfig::infer`], and pass the result
//! to an [`Api`][crate::Api] facade or an individual [`ApiGroup`][crate::ApiGroup].
mod file_config;
mod incluster_config;
pub(crate) mod utils;

use std::{path::Path, time::Duration};

use secrecy::SecretString;

use crate::error::{ConfigError, Error, Result};

pub use file_config::{AuthInfo, Cluster, Context, Kubeconfig, NamedAuthInfo, NamedCluster, NamedContext};

// https://github.com/kubernetes/kubernetes/issues/6513 bounds watches near 295s
const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(295);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// The active authentication mode of a resolved configuration
///
/// Exactly one mode is active. A config source that supplies both a bearer
/// token and basic credentials fails resolution rather than guessing.
#[derive(Debug, Clone)]
pub enum AuthMode {
    /// No `Authorization` header; client certificates may still authenticate
    Anonymous,
    /// `Authorization: Bearer <token>`
    Bearer(SecretString),
    /// `Authorization: Basic <credentials>`
    Basic(String, SecretString),
}

impl AuthMode {
    /// Whether this mode sends an `Authorization` header
    pub fn is_authenticated(&self) -> bool {
        !matches!(self, AuthMode::Anonymous)
    }
}

/// A resolved cluster connection descriptor
///
/// Details the cluster url, default namespace, root certificates, client
/// identity, and auth credentials. Immutable once resolved; construct a new
/// one to talk to a different cluster.
#[derive(Debug, Clone)]
pub struct ClusterConfig {
    /// The configured cluster url
    pub cluster_url: http::Uri,
    /// The configured default namespace
    pub default_namespace: String,
    /// The configured root certificates, as DER chains
    pub root_cert: Option<Vec<Vec<u8>>>,
    /// Whether to accept invalid certificates
    pub accept_invalid_certs: bool,
    /// Timeout for connection establishment
    pub connect_timeout: Option<Duration>,
    /// Timeout for reads on an established connection
    ///
    /// A value of `None` means no timeout; the default stays above the watch
    /// window so long polls are not cut short.
    pub read_timeout: Option<Duration>,
    /// Timeout for writes on an established connection
    pub write_timeout: Option<Duration>,
    /// The active auth mode
    pub auth: AuthMode,
    /// Client certificate and private key in PEM.
    pub(crate) identity_pem: Option<Vec<u8>>,
}

impl ClusterConfig {
    /// Construct a new config where only the `cluster_url` is set by the user
    /// and everything else receives a default value.
    ///
    /// Most likely you want to use [`ClusterConfig::infer`] instead.
    pub fn new(cluster_url: http::Uri) -> Self {
        Self {
            cluster_url,
            default_namespace: String::from("default"),
            root_cert: None,
            accept_invalid_certs: false,
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            read_timeout: Some(DEFAULT_READ_TIMEOUT),
            write_timeout: None,
            auth: AuthMode::Anonymous,
            identity_pem: None,
        }
    }

    /// Infer the configuration from the environment
    ///
    /// Attempts the local kubeconfig first (`$KUBECONFIG`, else
    /// `~/.kube/config`), falling back to in-cluster environment discovery.
    /// Fails if inference from both sources fails.
    pub fn infer() -> Result<Self> {
        match Self::from_kubeconfig(&ConfigOptions::default()) {
            Err(kubeconfig_err) => {
                tracing::trace!("no usable kubeconfig found: {kubeconfig_err}");
                tracing::trace!("falling back to in-cluster environment");
                Self::from_cluster_env().map_err(|incluster_err| {
                    Error::Config(ConfigError::InferenceExhausted {
                        kubeconfig: Box::new(kubeconfig_err),
                        incluster: Box::new(incluster_err),
                    })
                })
            }
            success => success,
        }
    }

    /// Create configuration from the default local config file
    ///
    /// This will respect `$KUBECONFIG`, but otherwise default to
    /// `~/.kube/config`. Context/cluster selection defaults to the file's
    /// `current-context`.
    pub fn from_kubeconfig(options: &ConfigOptions) -> Result<Self> {
        let config = Kubeconfig::read()?;
        Self::from_custom_kubeconfig(config, options)
    }

    /// Create configuration from a config file at an explicit path
    pub fn from_kubeconfig_file<P: AsRef<Path>>(path: P, options: &ConfigOptions) -> Result<Self> {
        let config = Kubeconfig::read_from(path)?;
        Self::from_custom_kubeconfig(config, options)
    }

    /// Create configuration from an already-parsed [`Kubeconfig`] document
    ///
    /// Note that relative certificate paths are only rebased when the document
    /// is read through [`Kubeconfig::read_from`].
    pub fn from_custom_kubeconfig(config: Kubeconfig, options: &ConfigOptions) -> Result<Self> {
        let (context, cluster, user) = config.resolve_context(options.context.as_deref())?;

        let server = cluster
            .server
            .clone()
            .ok_or(Error::Config(ConfigError::MissingClusterUrl))?;
        let cluster_url = server
            .parse::<http::Uri>()
            .map_err(|e| Error::Config(ConfigError::InvalidClusterUrl(e)))?;

        let default_namespace = context
            .namespace
            .clone()
            .unwrap_or_else(|| String::from("default"));

        let root_cert = match cluster.load_certificate_authority()? {
            Some(bundle) => Some(utils::certs(&bundle)?),
            None => None,
        };

        Ok(Self {
            cluster_url,
            default_namespace,
            root_cert,
            accept_invalid_certs: cluster.insecure_skip_tls_verify.unwrap_or(false),
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            read_timeout: Some(DEFAULT_READ_TIMEOUT),
            write_timeout: None,
            auth: auth_mode(&user)?,
            identity_pem: user.identity_pem()?,
        })
    }

    /// Create configuration from the cluster's own environment
    ///
    /// This follows the standard API-access-from-a-pod setup and relies on the
    /// service account's token and certificate bundle being mounted.
    pub fn from_cluster_env() -> Result<Self> {
        let server =
            incluster_config::cluster_server().ok_or(Error::Config(ConfigError::MissingInClusterVariables {
                hostenv: incluster_config::SERVICE_HOSTENV,
                portenv: incluster_config::SERVICE_PORTENV,
            }))?;
        let cluster_url = server
            .parse::<http::Uri>()
            .map_err(|e| Error::Config(ConfigError::InvalidClusterUrl(e)))?;

        let default_namespace = incluster_config::load_default_ns()?;
        let root_cert = incluster_config::load_cert()?;
        let token = incluster_config::load_token()?;

        Ok(Self {
            cluster_url,
            default_namespace,
            root_cert: Some(root_cert),
            accept_invalid_certs: false,
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            read_timeout: Some(DEFAULT_READ_TIMEOUT),
            write_timeout: None,
            auth: AuthMode::Bearer(token),
            identity_pem: None,
        })
    }

    /// The client certificate and key material, when configured
    pub fn identity_pem(&self) -> Option<&[u8]> {
        self.identity_pem.as_deref()
    }
}

/// Options used when loading a kubeconfig file.
#[derive(Default, Clone, Debug)]
pub struct ConfigOptions {
    /// The named context to load; defaults to the file's `current-context`
    pub context: Option<String>,
}

// Resolve the active auth mode from user credentials.
// Both a token source and basic credentials present is a hard error.
fn auth_mode(user: &AuthInfo) -> Result<AuthMode> {
    let token = user.load_token()?;
    let basic = match (&user.username, &user.password) {
        (Some(u), Some(p)) => Some((u.clone(), p.clone())),
        (None, None) => None,
        _ => return Err(Error::Config(ConfigError::PartialBasicAuth)),
    };

    match (token, basic) {
        (Some(_), Some(_)) => Err(Error::Config(ConfigError::AmbiguousAuthMode)),
        (Some(token), None) => Ok(AuthMode::Bearer(token)),
        (None, Some((user, pass))) => Ok(AuthMode::Basic(user, pass)),
        (None, None) => Ok(AuthMode::Anonymous),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn fixture(user: &str) -> String {
        format!(
            r#"
apiVersion: v1
kind: Config
clusters:
- name: remote
  cluster:
    server: https://cluster.example.com:6443
    insecure-skip-tls-verify: true
contexts:
- name: ctx-a
  context:
    cluster: remote
    user: tester
    namespace: team-a
current-context: ctx-a
users:
- name: tester
  user:
{user}
"#
        )
    }

    #[test]
    fn bearer_only_user_resolves_to_bearer_auth() {
        let config = Kubeconfig::from_yaml(&fixture("    token: sekrit")).unwrap();
        let resolved = ClusterConfig::from_custom_kubeconfig(config, &ConfigOptions::default()).unwrap();

        assert_eq!(resolved.cluster_url, "https://cluster.example.com:6443/");
        assert_eq!(resolved.default_namespace, "team-a");
        assert!(resolved.accept_invalid_certs);
        match &resolved.auth {
            AuthMode::Bearer(token) => assert_eq!(token.expose_secret(), "sekrit"),
            other => panic!("expected bearer auth, got {other:?}"),
        }
    }

    #[test]
    fn basic_only_user_resolves_to_basic_auth() {
        let config =
            Kubeconfig::from_yaml(&fixture("    username: admin\n    password: hunter2")).unwrap();
        let resolved = ClusterConfig::from_custom_kubeconfig(config, &ConfigOptions::default()).unwrap();
        match &resolved.auth {
            AuthMode::Basic(user, pass) => {
                assert_eq!(user, "admin");
                assert_eq!(pass.expose_secret(), "hunter2");
            }
            other => panic!("expected basic auth, got {other:?}"),
        }
    }

    #[test]
    fn both_auth_modes_is_a_hard_error() {
        let config = Kubeconfig::from_yaml(&fixture(
            "    token: sekrit\n    username: admin\n    password: hunter2",
        ))
        .unwrap();
        let err = ClusterConfig::from_custom_kubeconfig(config, &ConfigOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::AmbiguousAuthMode)));
    }

    #[test]
    fn half_supplied_basic_auth_is_rejected() {
        let config = Kubeconfig::from_yaml(&fixture("    username: admin")).unwrap();
        let err = ClusterConfig::from_custom_kubeconfig(config, &ConfigOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::PartialBasicAuth)));
    }

    #[test]
    fn no_credentials_resolves_to_anonymous() {
        let config = Kubeconfig::from_yaml(&fixture("    {}")).unwrap();
        let resolved = ClusterConfig::from_custom_kubeconfig(config, &ConfigOptions::default()).unwrap();
        assert!(!resolved.auth.is_authenticated());
    }

    #[test]
    fn explicit_context_selection() {
        let mut config = Kubeconfig::from_yaml(&fixture("    token: sekrit")).unwrap();
        config.current_context = Some("missing".into());
        let err =
            ClusterConfig::from_custom_kubeconfig(config.clone(), &ConfigOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::LoadContext { .. })));

        let options = ConfigOptions {
            context: Some("ctx-a".into()),
        };
        let resolved = ClusterConfig::from_custom_kubeconfig(config, &options).unwrap();
        assert_eq!(resolved.default_namespace, "team-a");
    }
}
