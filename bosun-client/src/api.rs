//! The facade composing built-in and custom API groups behind one entry point.
use bosun_core::catalog::GroupManifest;

use crate::{
    config::ClusterConfig,
    error::{Error, Result},
    group::{ApiGroup, ApiGroupOptions},
    resource::Resource,
};

/// Per-group construction overrides for the [`Api`] facade
///
/// Any group left as `None` is built from the shared [`ClusterConfig`] alone.
/// `custom` manifests are built the same way as the built-ins; for full
/// control over a custom group's transport, construct an [`ApiGroup`]
/// yourself and attach it with [`Api::add_group`].
#[derive(Default)]
pub struct ApiOptions {
    /// Overrides for the legacy core group
    pub core: Option<ApiGroupOptions>,
    /// Overrides for the `apps` group
    pub apps: Option<ApiGroupOptions>,
    /// Overrides for the `batch` group
    pub batch: Option<ApiGroupOptions>,
    /// Overrides for the `rbac` group
    pub rbac: Option<ApiGroupOptions>,
    /// Overrides for the `extensions` group
    pub extensions: Option<ApiGroupOptions>,
    /// Additional third-party group manifests
    pub custom: Vec<GroupManifest>,
}

/// The single entry point composing one cluster's API groups
///
/// Owns exactly one [`ClusterConfig`] for its lifetime; every group is
/// constructed from it at facade construction (unless individually
/// overridden) and lives as long as the facade. Only the facade aggregates
/// across groups.
pub struct Api {
    config: ClusterConfig,
    groups: Vec<ApiGroup>,
}

impl Api {
    /// Compose the built-in groups (core, apps, batch, rbac, extensions)
    /// from one shared cluster config
    pub fn new(config: ClusterConfig) -> Result<Self> {
        Self::with_options(config, ApiOptions::default())
    }

    /// Compose the built-in groups with per-group overrides and custom groups
    pub fn with_options(config: ClusterConfig, options: ApiOptions) -> Result<Self> {
        let builtins = [
            (GroupManifest::core(), options.core),
            (GroupManifest::apps(), options.apps),
            (GroupManifest::batch(), options.batch),
            (GroupManifest::rbac(), options.rbac),
            (GroupManifest::extensions(), options.extensions),
        ];

        let mut groups = Vec::new();
        for (manifest, overrides) in builtins {
            let overrides = overrides.unwrap_or_default();
            groups.push(ApiGroup::with_options(manifest, &overrides, Some(&config))?);
        }
        for manifest in options.custom {
            groups.push(ApiGroup::new(manifest, &config)?);
        }

        Ok(Self { config, groups })
    }

    /// Attach an independently constructed group (e.g. a third-party group
    /// with its own transport)
    pub fn add_group(&mut self, group: ApiGroup) {
        self.groups.push(group);
    }

    /// The active cluster config
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Resolve the group owning a kind name or alias
    ///
    /// Scans each composed group's registry in composition order; an unknown
    /// kind is a hard [`Error::NotFound`], never an empty success.
    pub fn group(&self, kind: &str) -> Result<&ApiGroup> {
        self.groups
            .iter()
            .find(|group| group.contains(kind))
            .ok_or_else(|| Error::NotFound(kind.to_string()))
    }

    /// Resolve the bound resource handle for a kind name or alias
    pub fn resource(&self, kind: &str) -> Result<&Resource> {
        self.group(kind)?.resource(kind)
    }

    /// Iterate over the composed groups in composition order
    pub fn groups(&self) -> impl Iterator<Item = &ApiGroup> {
        self.groups.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bosun_core::catalog::ResourceDescriptor;

    fn test_config() -> ClusterConfig {
        ClusterConfig::new("https://cluster.example.io:6443".parse().unwrap())
    }

    #[tokio::test]
    async fn kinds_route_to_their_groups() {
        let api = Api::new(test_config()).unwrap();
        assert_eq!(api.group("pods").unwrap().name(), "core");
        assert_eq!(api.group("deployments").unwrap().name(), "apps");
        assert_eq!(api.group("jobs").unwrap().name(), "batch");
        assert_eq!(api.group("clusterroles").unwrap().name(), "rbac");
        assert_eq!(api.group("ingresses").unwrap().name(), "extensions");
    }

    #[tokio::test]
    async fn aliases_route_like_canonical_names() {
        let api = Api::new(test_config()).unwrap();
        assert_eq!(api.group("po").unwrap().name(), "core");
        assert_eq!(api.group("deploy").unwrap().name(), "apps");
        assert_eq!(api.group("ing").unwrap().name(), "extensions");

        let canonical = api.resource("pods").unwrap();
        let aliased = api.resource("po").unwrap();
        assert!(std::ptr::eq(canonical, aliased));
    }

    #[tokio::test]
    async fn unknown_kind_is_not_found() {
        let api = Api::new(test_config()).unwrap();
        match api.group("flux-capacitors") {
            Err(Error::NotFound(kind)) => assert_eq!(kind, "flux-capacitors"),
            other => panic!("expected NotFound, got {:?}", other.map(ApiGroup::name)),
        }
    }

    #[tokio::test]
    async fn custom_groups_route_like_builtins() {
        let custom = GroupManifest::new("widgets", "widgets.example.io", "v1alpha1")
            .resource(ResourceDescriptor::namespaced("widgets").alias("wd"));
        let api = Api::with_options(
            test_config(),
            ApiOptions {
                custom: vec![custom],
                ..Default::default()
            },
        )
        .unwrap();

        let group = api.group("wd").unwrap();
        assert_eq!(group.name(), "widgets");
        assert_eq!(group.version_prefix(), "/apis/widgets.example.io/v1alpha1");
    }

    #[tokio::test]
    async fn per_group_version_overrides() {
        let api = Api::with_options(
            test_config(),
            ApiOptions {
                extensions: Some(ApiGroupOptions {
                    version: Some("v1".into()),
                    ..Default::default()
                }),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(
            api.group("ingresses").unwrap().version_prefix(),
            "/apis/extensions/v1"
        );
    }

    #[tokio::test]
    async fn facade_keeps_one_active_config() {
        let api = Api::new(test_config()).unwrap();
        assert_eq!(api.config().default_namespace, "default");
        assert_eq!(api.groups().count(), 5);
    }
}
