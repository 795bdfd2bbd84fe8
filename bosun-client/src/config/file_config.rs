use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use super::utils;
use crate::error::{ConfigError, Error, Result};

/// [`Kubeconfig`] represents information on how to connect to a remote cluster
///
/// Stored in `~/.kube/config` by default, with the active path overridable
/// through `$KUBECONFIG`. An analogue of the config type from client-go.
///
/// This type is exposed for convenience; [`ClusterConfig`][crate::ClusterConfig]
/// is the intended developer interface, and handles the difference between
/// in-cluster deployment and local development.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[cfg_attr(test, derive(PartialEq))]
pub struct Kubeconfig {
    /// Referencable names to cluster configs
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub clusters: Vec<NamedCluster>,
    /// Referencable names to user configs
    #[serde(rename = "users")]
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub auth_infos: Vec<NamedAuthInfo>,
    /// Referencable names to context configs
    #[serde(default, deserialize_with = "deserialize_null_as_default")]
    pub contexts: Vec<NamedContext>,
    /// The name of the context used by default
    #[serde(rename = "current-context")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_context: Option<String>,

    /// Legacy field from TypeMeta
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    /// Legacy field from TypeMeta
    #[serde(rename = "apiVersion")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_version: Option<String>,
}

/// NamedCluster associates name with cluster.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct NamedCluster {
    /// Name of cluster
    pub name: String,
    /// Information about how to communicate with a cluster
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster: Option<Cluster>,
}

/// Cluster stores information to connect to a cluster.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct Cluster {
    /// The address of the cluster (https://hostname:port).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,
    /// Skips the validity check for the server's certificate. This will make your HTTPS connections insecure.
    #[serde(rename = "insecure-skip-tls-verify")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub insecure_skip_tls_verify: Option<bool>,
    /// The path to a cert file for the certificate authority.
    #[serde(rename = "certificate-authority")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_authority: Option<String>,
    /// PEM-encoded certificate authority certificates. Overrides `certificate_authority`
    #[serde(rename = "certificate-authority-data")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_authority_data: Option<String>,
}

/// NamedAuthInfo associates name with authentication.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[cfg_attr(test, derive(PartialEq))]
pub struct NamedAuthInfo {
    /// Name of the user
    pub name: String,
    /// Information that describes identity of the user
    #[serde(rename = "user")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_info: Option<AuthInfo>,
}

/// AuthInfo stores information to tell the cluster who you are.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct AuthInfo {
    /// The username for basic authentication.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    /// The password for basic authentication.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    #[serde(
        serialize_with = "serialize_secretstring",
        deserialize_with = "deserialize_secretstring"
    )]
    pub password: Option<SecretString>,

    /// The bearer token for authentication.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    #[serde(
        serialize_with = "serialize_secretstring",
        deserialize_with = "deserialize_secretstring"
    )]
    pub token: Option<SecretString>,
    /// Pointer to a file that contains a bearer token. If both `token` and
    /// `token_file` are present, `token` takes precedence.
    #[serde(rename = "tokenFile")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_file: Option<String>,

    /// Path to a client cert file for TLS.
    #[serde(rename = "client-certificate")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_certificate: Option<String>,
    /// PEM-encoded data from a client cert file for TLS. Overrides `client_certificate`
    #[serde(rename = "client-certificate-data")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_certificate_data: Option<String>,

    /// Path to a client key file for TLS.
    #[serde(rename = "client-key")]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_key: Option<String>,
    /// PEM-encoded data from a client key file for TLS. Overrides `client_key`
    #[serde(rename = "client-key-data")]
    #[serde(skip_serializing_if = "Option::is_none", default)]
    #[serde(
        serialize_with = "serialize_secretstring",
        deserialize_with = "deserialize_secretstring"
    )]
    pub client_key_data: Option<SecretString>,
}

#[cfg(test)]
impl PartialEq for AuthInfo {
    fn eq(&self, other: &Self) -> bool {
        serde_json::to_value(self).unwrap() == serde_json::to_value(other).unwrap()
    }
}

/// NamedContext associates name with context.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct NamedContext {
    /// Name of the context
    pub name: String,
    /// Associations for the context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<Context>,
}

/// Context stores tuple of references to a cluster and a user.
#[derive(Clone, Debug, Serialize, Deserialize, Default)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub struct Context {
    /// Name of the cluster for this context
    pub cluster: String,
    /// Name of the user for this context
    #[serde(default)]
    pub user: String,
    /// The default namespace to use on unspecified requests
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

fn serialize_secretstring<S>(pw: &Option<SecretString>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    match pw {
        Some(secret) => serializer.serialize_str(secret.expose_secret()),
        None => serializer.serialize_none(),
    }
}

fn deserialize_secretstring<'de, D>(deserializer: D) -> std::result::Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer) {
        Ok(Some(secret)) => Ok(Some(SecretString::from(secret))),
        Ok(None) => Ok(None),
        Err(e) => Err(e),
    }
}

fn deserialize_null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    T: Default + Deserialize<'de>,
    D: Deserializer<'de>,
{
    let opt = Option::deserialize(deserializer)?;
    Ok(opt.unwrap_or_default())
}

impl Kubeconfig {
    /// Parse a kubeconfig document from YAML text
    pub fn from_yaml(text: &str) -> Result<Self> {
        serde_yaml::from_str(text)
            .map_err(ConfigError::ParseYaml)
            .map_err(Error::Config)
    }

    /// Read a kubeconfig from a file
    ///
    /// Relative certificate, key, and token paths inside the file are resolved
    /// against the file's directory.
    pub fn read_from<P: AsRef<Path>>(path: P) -> Result<Self> {
        let data = utils::read_file_to_string(&path)?;
        let mut config = Self::from_yaml(&data)?;

        if let Some(dir) = path.as_ref().parent() {
            config.rebase_paths(dir);
        }
        Ok(config)
    }

    /// Read a kubeconfig from the default location
    ///
    /// Respects `$KUBECONFIG`, otherwise `~/.kube/config`.
    pub fn read() -> Result<Self> {
        let path = Self::default_path().ok_or(Error::Config(ConfigError::NoKubeconfigPath))?;
        Self::read_from(path)
    }

    pub(crate) fn default_path() -> Option<PathBuf> {
        match std::env::var_os("KUBECONFIG") {
            Some(value) if !value.is_empty() => Some(PathBuf::from(value)),
            _ => utils::default_kubeconfig_path(),
        }
    }

    // Make relative file references absolute against the config's directory.
    fn rebase_paths(&mut self, dir: &Path) {
        let rebase = |value: &mut Option<String>| {
            if let Some(path) = value {
                if Path::new(path.as_str()).is_relative() {
                    *value = Some(dir.join(path.as_str()).to_string_lossy().into_owned());
                }
            }
        };
        for named in &mut self.clusters {
            if let Some(cluster) = &mut named.cluster {
                rebase(&mut cluster.certificate_authority);
            }
        }
        for named in &mut self.auth_infos {
            if let Some(user) = &mut named.auth_info {
                rebase(&mut user.client_certificate);
                rebase(&mut user.client_key);
                rebase(&mut user.token_file);
            }
        }
    }

    /// Select the context, cluster, and user for a request scope
    ///
    /// Honours an explicit context name, otherwise `current-context`; fails
    /// with a [`ConfigError`] when the context or anything it references is
    /// missing.
    pub fn resolve_context(
        &self,
        context: Option<&str>,
    ) -> Result<(Context, Cluster, AuthInfo)> {
        let context_name = match context {
            Some(name) => name,
            None => self
                .current_context
                .as_deref()
                .ok_or(Error::Config(ConfigError::CurrentContextNotSet))?,
        };

        let current_context = self
            .contexts
            .iter()
            .find(|named_context| named_context.name == context_name)
            .and_then(|named_context| named_context.context.clone())
            .ok_or_else(|| {
                Error::Config(ConfigError::LoadContext {
                    context_name: context_name.to_owned(),
                })
            })?;

        let cluster = self
            .clusters
            .iter()
            .find(|named_cluster| named_cluster.name == current_context.cluster)
            .and_then(|named_cluster| named_cluster.cluster.clone())
            .ok_or_else(|| {
                Error::Config(ConfigError::LoadClusterOfContext {
                    cluster_name: current_context.cluster.clone(),
                })
            })?;

        let user = self
            .auth_infos
            .iter()
            .find(|named_user| named_user.name == current_context.user)
            .and_then(|named_user| named_user.auth_info.clone())
            .ok_or_else(|| {
                Error::Config(ConfigError::FindUser {
                    user_name: current_context.user.clone(),
                })
            })?;

        Ok((current_context, cluster, user))
    }
}

impl Cluster {
    /// The CA bundle for this cluster as a PEM blob, if configured
    pub fn load_certificate_authority(&self) -> Result<Option<Vec<u8>>> {
        if self.certificate_authority_data.is_none() && self.certificate_authority.is_none() {
            return Ok(None);
        }
        utils::data_or_file(&self.certificate_authority_data, &self.certificate_authority).map(Some)
    }
}

impl AuthInfo {
    /// The client identity (certificate + key) as a concatenated PEM blob
    ///
    /// Fails when only one half of the identity is configured.
    pub fn identity_pem(&self) -> Result<Option<Vec<u8>>> {
        let has_cert = self.client_certificate_data.is_some() || self.client_certificate.is_some();
        let has_key = self.client_key_data.is_some() || self.client_key.is_some();
        match (has_cert, has_key) {
            (false, false) => Ok(None),
            (true, true) => {
                let mut buf =
                    utils::data_or_file(&self.client_certificate_data, &self.client_certificate)?;
                let key_data = self
                    .client_key_data
                    .as_ref()
                    .map(|s| s.expose_secret().to_owned());
                let mut key = utils::data_or_file(&key_data, &self.client_key)?;
                if buf.last() != Some(&b'\n') {
                    buf.push(b'\n');
                }
                buf.append(&mut key);
                Ok(Some(buf))
            }
            _ => Err(Error::Config(ConfigError::PartialClientIdentity)),
        }
    }

    /// The bearer token for this user, reading `token_file` if needed
    pub fn load_token(&self) -> Result<Option<SecretString>> {
        if let Some(token) = &self.token {
            return Ok(Some(token.clone()));
        }
        if let Some(file) = &self.token_file {
            let text = utils::read_file_to_string(file)?;
            return Ok(Some(SecretString::from(text.trim_end().to_owned())));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG: &str = r#"
apiVersion: v1
kind: Config
clusters:
- name: k3d-dev
  cluster:
    server: https://127.0.0.1:6443
    insecure-skip-tls-verify: true
contexts:
- name: dev
  context:
    cluster: k3d-dev
    user: admin
    namespace: apps
current-context: dev
users:
- name: admin
  user:
    token: opensesame
"#;

    #[test]
    fn resolves_current_context() {
        let config = Kubeconfig::from_yaml(CONFIG).unwrap();
        let (context, cluster, user) = config.resolve_context(None).unwrap();
        assert_eq!(context.namespace.as_deref(), Some("apps"));
        assert_eq!(cluster.server.as_deref(), Some("https://127.0.0.1:6443"));
        assert_eq!(cluster.insecure_skip_tls_verify, Some(true));
        assert_eq!(user.load_token().unwrap().unwrap().expose_secret(), "opensesame");
    }

    #[test]
    fn missing_context_fails() {
        let config = Kubeconfig::from_yaml(CONFIG).unwrap();
        let err = config.resolve_context(Some("staging")).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::LoadContext { .. })
        ));
    }

    #[test]
    fn missing_cluster_fails() {
        let mut config = Kubeconfig::from_yaml(CONFIG).unwrap();
        config.clusters.clear();
        let err = config.resolve_context(None).unwrap_err();
        assert!(matches!(
            err,
            Error::Config(ConfigError::LoadClusterOfContext { .. })
        ));
    }

    #[test]
    fn missing_user_fails() {
        let mut config = Kubeconfig::from_yaml(CONFIG).unwrap();
        config.auth_infos.clear();
        let err = config.resolve_context(None).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::FindUser { .. })));
    }

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("config");
        let ca_path = dir.path().join("ca.crt");
        std::fs::write(&ca_path, "certificate material").unwrap();
        std::fs::write(
            &config_path,
            r#"
clusters:
- name: local
  cluster:
    server: https://localhost:6443
    certificate-authority: ca.crt
contexts:
- name: local
  context:
    cluster: local
    user: dev
current-context: local
users:
- name: dev
  user: {}
"#,
        )
        .unwrap();

        let config = Kubeconfig::read_from(&config_path).unwrap();
        let (_, cluster, _) = config.resolve_context(None).unwrap();
        assert_eq!(
            cluster.certificate_authority.as_deref(),
            Some(ca_path.to_str().unwrap())
        );
    }

    #[test]
    fn null_sections_default() {
        let config = Kubeconfig::from_yaml("clusters: null\ncurrent-context: x\n").unwrap();
        assert!(config.clusters.is_empty());
        assert_eq!(config.current_context.as_deref(), Some("x"));
    }
}
