//! Versioned API groups owning a transport and a registry of resource kinds.
use std::{collections::HashMap, sync::Arc};

use either::Either;
use futures::Stream;
use serde::de::DeserializeOwned;

use bosun_core::{
    catalog::{GroupManifest, ResourceDescriptor},
    response::Status,
    watch::WatchEvent,
};

use crate::{
    config::{utils, ClusterConfig},
    error::{ConfigError, Error, RegistrationError, Result, TransportError},
    resource::Resource,
    transport::Transport,
};

/// Caller-facing construction options for one API group
///
/// Everything is optional; missing fields are defaulted during resolution,
/// inheriting TLS material and auth from an ambient [`ClusterConfig`] when one
/// is supplied.
#[derive(Debug, Clone, Default)]
pub struct ApiGroupOptions {
    /// Base url of the API server; required unless an ambient config supplies one
    pub url: Option<String>,
    /// Version within the group; defaults to the manifest's default version
    pub version: Option<String>,
    /// Default namespace for namespaced kinds
    pub namespace: Option<String>,
    /// PEM bundle of root certificates
    pub ca: Option<Vec<u8>>,
    /// PEM client certificate
    pub client_cert: Option<Vec<u8>>,
    /// PEM client key
    pub client_key: Option<Vec<u8>>,
    /// Whether to skip server certificate verification
    pub insecure_skip_tls_verify: Option<bool>,
}

/// Group options after resolution: every field defaulted and non-optional
///
/// Empty certificate vectors mean "not configured".
#[derive(Debug, Clone)]
pub struct InternalApiGroupOptions {
    /// Base url of the API server
    pub url: String,
    /// Version within the group
    pub version: String,
    /// Default namespace for namespaced kinds
    pub namespace: String,
    /// Root certificates as DER chains
    pub ca: Vec<Vec<u8>>,
    /// Client certificate and key as a concatenated PEM blob
    pub identity_pem: Vec<u8>,
    /// Whether to skip server certificate verification
    pub insecure_skip_tls_verify: bool,
}

impl ApiGroupOptions {
    /// Resolve these options against a manifest and an optional ambient config
    ///
    /// Totality: no field of the result is left unset.
    pub fn resolve(
        &self,
        manifest: &GroupManifest,
        ambient: Option<&ClusterConfig>,
    ) -> Result<InternalApiGroupOptions> {
        let url = match (&self.url, ambient) {
            (Some(url), _) => url.clone(),
            (None, Some(config)) => config.cluster_url.to_string(),
            (None, None) => return Err(Error::Config(ConfigError::MissingClusterUrl)),
        };

        let version = self
            .version
            .clone()
            .unwrap_or_else(|| manifest.default_version.clone());

        let namespace = self
            .namespace
            .clone()
            .or_else(|| ambient.map(|c| c.default_namespace.clone()))
            .unwrap_or_else(|| String::from("default"));

        let ca = match &self.ca {
            Some(bundle) => utils::certs(bundle)?,
            None => ambient
                .and_then(|c| c.root_cert.clone())
                .unwrap_or_default(),
        };

        let identity_pem = match (&self.client_cert, &self.client_key) {
            (Some(cert), Some(key)) => {
                let mut buf = cert.clone();
                if buf.last() != Some(&b'\n') {
                    buf.push(b'\n');
                }
                buf.extend_from_slice(key);
                buf
            }
            (None, None) => ambient
                .and_then(|c| c.identity_pem.clone())
                .unwrap_or_default(),
            _ => return Err(Error::Config(ConfigError::PartialClientIdentity)),
        };

        let insecure_skip_tls_verify = self
            .insecure_skip_tls_verify
            .or_else(|| ambient.map(|c| c.accept_invalid_certs))
            .unwrap_or(false);

        Ok(InternalApiGroupOptions {
            url,
            version,
            namespace,
            ca,
            identity_pem,
            insecure_skip_tls_verify,
        })
    }
}

// Shared state every resource handle of a group points at.
pub(crate) struct GroupCore {
    pub(crate) name: String,
    pub(crate) base_url: http::Uri,
    pub(crate) prefix: String,
    pub(crate) namespace: String,
    pub(crate) transport: Transport,
}

impl GroupCore {
    // Rewrite a root-relative request into an absolute one against the group's base url.
    fn absolute(&self, req: http::Request<Vec<u8>>) -> Result<http::Request<Vec<u8>>> {
        let (mut parts, body) = req.into_parts();
        let pandq = parts
            .uri
            .path_and_query()
            .cloned()
            .ok_or_else(|| Error::Validation("request uri has no path".into()))?;
        // pandq always starts with a slash; the base may carry its own path segments
        let base = self.base_url.to_string();
        let absolute = format!("{}{}", base.trim_end_matches('/'), pandq);
        parts.uri = absolute
            .parse()
            .map_err(|e| Error::Transport(TransportError::InvalidUri(e)))?;
        Ok(http::Request::from_parts(parts, body))
    }

    // The single choke point every verb funnels through.
    pub(crate) async fn dispatch<T>(&self, req: http::Request<Vec<u8>>) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.transport.request(self.absolute(req)?).await
    }

    pub(crate) async fn dispatch_status<T>(&self, req: http::Request<Vec<u8>>) -> Result<Either<T, Status>>
    where
        T: DeserializeOwned,
    {
        self.transport.request_status(self.absolute(req)?).await
    }

    pub(crate) async fn dispatch_events<T>(
        &self,
        req: http::Request<Vec<u8>>,
    ) -> Result<impl Stream<Item = Result<WatchEvent<T>>> + Send>
    where
        T: Clone + DeserializeOwned + Send + 'static,
    {
        self.transport.request_events(self.absolute(req)?).await
    }
}

/// A versioned collection of related kinds sharing a url prefix and transport
///
/// The registry is append-only: kinds register once under their canonical
/// name and all declared aliases, and collisions are hard errors. Groups are
/// unaware of each other; only the [`Api`][crate::Api] facade aggregates.
pub struct ApiGroup {
    core: Arc<GroupCore>,
    resources: Vec<Resource>,
    registry: HashMap<String, usize>,
}

impl ApiGroup {
    /// Construct a group from a manifest and a shared cluster config
    pub fn new(manifest: GroupManifest, config: &ClusterConfig) -> Result<Self> {
        Self::with_options(manifest, &ApiGroupOptions::default(), Some(config))
    }

    /// Construct a group from caller-supplied options alone
    pub fn from_options(manifest: GroupManifest, options: &ApiGroupOptions) -> Result<Self> {
        Self::with_options(manifest, options, None)
    }

    /// Construct a group from options resolved against an ambient config
    pub fn with_options(
        manifest: GroupManifest,
        options: &ApiGroupOptions,
        ambient: Option<&ClusterConfig>,
    ) -> Result<Self> {
        let internal = options.resolve(&manifest, ambient)?;

        // the group always owns its transport so per-group TLS overrides stay isolated
        let mut transport_config = match ambient {
            Some(config) => config.clone(),
            None => ClusterConfig::new(
                internal
                    .url
                    .parse()
                    .map_err(|e| Error::Config(ConfigError::InvalidClusterUrl(e)))?,
            ),
        };
        transport_config.root_cert = (!internal.ca.is_empty()).then(|| internal.ca.clone());
        transport_config.identity_pem =
            (!internal.identity_pem.is_empty()).then(|| internal.identity_pem.clone());
        transport_config.accept_invalid_certs = internal.insecure_skip_tls_verify;

        let transport = Transport::try_from(&transport_config)?;
        Self::with_transport(manifest, internal, transport)
    }

    /// Construct a group over an existing transport
    ///
    /// Useful for custom service stacks and tests.
    pub fn with_transport(
        manifest: GroupManifest,
        options: InternalApiGroupOptions,
        transport: Transport,
    ) -> Result<Self> {
        let base_url = options
            .url
            .parse::<http::Uri>()
            .map_err(|e| Error::Config(ConfigError::InvalidClusterUrl(e)))?;
        let prefix = manifest.version_prefix(&options.version);
        let core = Arc::new(GroupCore {
            name: manifest.name.clone(),
            base_url,
            prefix,
            namespace: options.namespace,
            transport,
        });

        let mut group = Self {
            core,
            resources: Vec::new(),
            registry: HashMap::new(),
        };
        for descriptor in manifest.resources {
            group.add_resource(descriptor)?;
        }
        Ok(group)
    }

    /// Register a resource kind on this group
    ///
    /// Creates and binds a [`Resource`] handle, registering it under its
    /// canonical kind name and all declared aliases. Any collision with an
    /// existing registration fails; the registry is left untouched on error.
    pub fn add_resource(&mut self, descriptor: ResourceDescriptor) -> Result<&Resource> {
        if self.registry.contains_key(&descriptor.kind) {
            return Err(Error::Registration(RegistrationError::DuplicateKind {
                group: self.core.name.clone(),
                kind: descriptor.kind,
            }));
        }
        let mut names = vec![descriptor.kind.clone()];
        for alias in &descriptor.aliases {
            if self.registry.contains_key(alias) || names.contains(alias) {
                return Err(Error::Registration(RegistrationError::DuplicateAlias {
                    group: self.core.name.clone(),
                    kind: descriptor.kind.clone(),
                    alias: alias.clone(),
                }));
            }
            names.push(alias.clone());
        }

        let idx = self.resources.len();
        self.resources
            .push(Resource::new(descriptor, Arc::clone(&self.core)));
        for name in names {
            self.registry.insert(name, idx);
        }
        Ok(&self.resources[idx])
    }

    /// Look up the resource registered under a kind name or alias
    pub fn resource(&self, kind: &str) -> Result<&Resource> {
        self.registry
            .get(kind)
            .map(|&idx| &self.resources[idx])
            .ok_or_else(|| Error::NotFound(kind.to_string()))
    }

    /// Whether a kind name or alias is registered on this group
    pub fn contains(&self, kind: &str) -> bool {
        self.registry.contains_key(kind)
    }

    /// The registry name of this group
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// The `/api/{v}` or `/apis/{group}/{v}` prefix every path starts with
    pub fn version_prefix(&self) -> &str {
        &self.core.prefix
    }

    /// The namespace used when a request scope does not override one
    pub fn default_namespace(&self) -> &str {
        &self.core.namespace
    }

    /// Compose the absolute url for a root-relative path
    pub fn url(&self, path: &str) -> String {
        let base = self.core.base_url.to_string();
        format!("{}{}{}", base.trim_end_matches('/'), self.core.prefix, path)
    }

    /// Iterate over the registered resources in registration order
    pub fn resources(&self) -> impl Iterator<Item = &Resource> {
        self.resources.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::Body;
    use http::{Request, Response};
    use tower_test::mock;

    fn manifest() -> GroupManifest {
        GroupManifest::new("widgets", "widgets.example.io", "v1")
            .resource(ResourceDescriptor::namespaced("widgets").alias("wd"))
            .resource(ResourceDescriptor::cluster_scoped("gadgets"))
    }

    fn mock_group() -> ApiGroup {
        let (mock_service, _handle) = mock::pair::<Request<Body>, Response<Body>>();
        let options = ApiGroupOptions {
            url: Some("https://widgets.example.io:6443".into()),
            ..Default::default()
        };
        let internal = options.resolve(&manifest(), None).unwrap();
        ApiGroup::with_transport(manifest(), internal, Transport::new(mock_service)).unwrap()
    }

    #[test]
    fn resolution_is_total() {
        let options = ApiGroupOptions {
            url: Some("https://widgets.example.io:6443".into()),
            ..Default::default()
        };
        let internal = options.resolve(&manifest(), None).unwrap();
        assert_eq!(internal.url, "https://widgets.example.io:6443");
        assert_eq!(internal.version, "v1");
        assert_eq!(internal.namespace, "default");
        assert!(internal.ca.is_empty());
        assert!(internal.identity_pem.is_empty());
        assert!(!internal.insecure_skip_tls_verify);
    }

    #[test]
    fn resolution_inherits_from_ambient_config() {
        let mut config = ClusterConfig::new("https://ambient.example.io:6443".parse().unwrap());
        config.default_namespace = "team-a".into();
        config.root_cert = Some(vec![vec![1, 2, 3]]);
        config.accept_invalid_certs = true;

        let internal = ApiGroupOptions::default()
            .resolve(&manifest(), Some(&config))
            .unwrap();
        assert_eq!(internal.url, "https://ambient.example.io:6443/");
        assert_eq!(internal.namespace, "team-a");
        assert_eq!(internal.ca, vec![vec![1, 2, 3]]);
        assert!(internal.insecure_skip_tls_verify);
    }

    #[test]
    fn resolution_without_any_url_fails() {
        let err = ApiGroupOptions::default().resolve(&manifest(), None).unwrap_err();
        assert!(matches!(err, Error::Config(ConfigError::MissingClusterUrl)));
    }

    #[test]
    fn version_override_wins_over_manifest_default() {
        let options = ApiGroupOptions {
            url: Some("https://widgets.example.io".into()),
            version: Some("v2beta1".into()),
            ..Default::default()
        };
        let internal = options.resolve(&manifest(), None).unwrap();
        assert_eq!(internal.version, "v2beta1");
    }

    #[tokio::test]
    async fn aliases_route_to_the_same_resource_instance() {
        let group = mock_group();
        let canonical = group.resource("widgets").unwrap();
        let aliased = group.resource("wd").unwrap();
        assert!(std::ptr::eq(canonical, aliased));
    }

    #[tokio::test]
    async fn duplicate_kind_registration_fails() {
        let mut group = mock_group();
        let err = group
            .add_resource(ResourceDescriptor::namespaced("widgets"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Registration(RegistrationError::DuplicateKind { .. })
        ));
    }

    #[tokio::test]
    async fn alias_collision_fails_and_leaves_registry_untouched() {
        let mut group = mock_group();
        let err = group
            .add_resource(ResourceDescriptor::namespaced("doodads").alias("wd"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Registration(RegistrationError::DuplicateAlias { .. })
        ));
        assert!(!group.contains("doodads"));
    }

    #[tokio::test]
    async fn unknown_kind_is_not_found() {
        let group = mock_group();
        let err = group.resource("sprockets").unwrap_err();
        assert!(matches!(err, Error::NotFound(kind) if kind == "sprockets"));
    }

    #[tokio::test]
    async fn url_composition() {
        let group = mock_group();
        assert_eq!(
            group.url("/namespaces/ns1/widgets/w1"),
            "https://widgets.example.io:6443/apis/widgets.example.io/v1/namespaces/ns1/widgets/w1"
        );
    }
}
