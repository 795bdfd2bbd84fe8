//! Static resource catalogs describing which kinds a group serves.
//!
//! Catalogs are plain data passed at construction time; nothing in this
//! module is process-global. The built-in manifests mirror the classic
//! group layout (core/apps/batch/rbac/extensions) with the usual
//! kubectl-style short-name aliases.

/// A registry entry describing one addressable resource collection
///
/// `kind` is the lowercase plural collection name used in URL paths
/// (`pods`, `deployments`). Descriptors are never mutated after
/// registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceDescriptor {
    /// Plural collection name, as it appears in paths
    pub kind: String,
    /// Whether objects of this kind live inside a namespace
    pub namespaced: bool,
    /// Short-name aliases resolving to this kind
    pub aliases: Vec<String>,
}

impl ResourceDescriptor {
    /// A namespaced resource kind without aliases
    pub fn namespaced(kind: &str) -> Self {
        Self {
            kind: kind.into(),
            namespaced: true,
            aliases: vec![],
        }
    }

    /// A cluster-scoped resource kind without aliases
    pub fn cluster_scoped(kind: &str) -> Self {
        Self {
            kind: kind.into(),
            namespaced: false,
            aliases: vec![],
        }
    }

    /// Attach a short-name alias
    #[must_use]
    pub fn alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.into());
        self
    }
}

/// Constructor input for an API group: its name, URL group, default
/// version, and the kinds it serves
///
/// Built-in manifests are provided for the classic groups; third-party
/// groups supply their own `GroupManifest` and are treated identically.
#[derive(Debug, Clone)]
pub struct GroupManifest {
    /// Registry name of the group (`core`, `apps`, ...)
    pub name: String,
    /// URL group segment; empty for the legacy core group
    pub group: String,
    /// Version used when the caller does not specify one
    pub default_version: String,
    /// The kinds this group serves
    pub resources: Vec<ResourceDescriptor>,
}

impl GroupManifest {
    /// An empty manifest for a custom group
    pub fn new(name: &str, group: &str, default_version: &str) -> Self {
        Self {
            name: name.into(),
            group: group.into(),
            default_version: default_version.into(),
            resources: vec![],
        }
    }

    /// Append a resource descriptor
    #[must_use]
    pub fn resource(mut self, resource: ResourceDescriptor) -> Self {
        self.resources.push(resource);
        self
    }

    /// The URL prefix for this group at a given version
    ///
    /// The legacy core group lives under `/api`, every other group under
    /// `/apis/{group}`.
    pub fn version_prefix(&self, version: &str) -> String {
        if self.group.is_empty() {
            format!("/api/{version}")
        } else {
            format!("/apis/{}/{version}", self.group)
        }
    }

    /// The legacy core group (`/api/v1`)
    pub fn core() -> Self {
        Self::new("core", "", "v1")
            .resource(ResourceDescriptor::cluster_scoped("componentstatuses").alias("cs"))
            .resource(ResourceDescriptor::namespaced("configmaps").alias("cm"))
            .resource(ResourceDescriptor::namespaced("endpoints").alias("ep"))
            .resource(ResourceDescriptor::namespaced("events").alias("ev"))
            .resource(ResourceDescriptor::namespaced("limitranges").alias("limits"))
            .resource(ResourceDescriptor::cluster_scoped("namespaces").alias("ns"))
            .resource(ResourceDescriptor::cluster_scoped("nodes").alias("no"))
            .resource(ResourceDescriptor::cluster_scoped("persistentvolumes").alias("pv"))
            .resource(ResourceDescriptor::namespaced("persistentvolumeclaims").alias("pvc"))
            .resource(ResourceDescriptor::namespaced("pods").alias("po"))
            .resource(ResourceDescriptor::namespaced("replicationcontrollers").alias("rc"))
            .resource(ResourceDescriptor::namespaced("resourcequotas").alias("quota"))
            .resource(ResourceDescriptor::namespaced("secrets"))
            .resource(ResourceDescriptor::namespaced("serviceaccounts"))
            .resource(ResourceDescriptor::namespaced("services").alias("svc"))
    }

    /// The `apps` group
    pub fn apps() -> Self {
        Self::new("apps", "apps", "v1")
            .resource(ResourceDescriptor::namespaced("daemonsets").alias("ds"))
            .resource(ResourceDescriptor::namespaced("deployments").alias("deploy"))
            .resource(ResourceDescriptor::namespaced("replicasets").alias("rs"))
            .resource(ResourceDescriptor::namespaced("statefulsets"))
    }

    /// The `batch` group
    pub fn batch() -> Self {
        Self::new("batch", "batch", "v1")
            .resource(ResourceDescriptor::namespaced("cronjobs"))
            .resource(ResourceDescriptor::namespaced("jobs"))
    }

    /// The `rbac.authorization.k8s.io` group
    pub fn rbac() -> Self {
        Self::new("rbac", "rbac.authorization.k8s.io", "v1")
            .resource(ResourceDescriptor::cluster_scoped("clusterroles"))
            .resource(ResourceDescriptor::cluster_scoped("clusterrolebindings"))
            .resource(ResourceDescriptor::namespaced("roles"))
            .resource(ResourceDescriptor::namespaced("rolebindings"))
    }

    /// The legacy `extensions` group
    pub fn extensions() -> Self {
        Self::new("extensions", "extensions", "v1beta1")
            .resource(ResourceDescriptor::namespaced("horizontalpodautoscalers").alias("hpa"))
            .resource(ResourceDescriptor::namespaced("ingresses").alias("ing"))
            .resource(ResourceDescriptor::namespaced("networkpolicies"))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn version_prefixes() {
        assert_eq!(GroupManifest::core().version_prefix("v1"), "/api/v1");
        assert_eq!(GroupManifest::apps().version_prefix("v1"), "/apis/apps/v1");
        assert_eq!(
            GroupManifest::rbac().version_prefix("v1"),
            "/apis/rbac.authorization.k8s.io/v1"
        );
        assert_eq!(
            GroupManifest::new("metrics", "metrics.example.io", "v1alpha1").version_prefix("v1alpha1"),
            "/apis/metrics.example.io/v1alpha1"
        );
    }

    #[test]
    fn core_scoping() {
        let core = GroupManifest::core();
        let find = |kind: &str| core.resources.iter().find(|r| r.kind == kind).unwrap();
        assert!(find("pods").namespaced);
        assert!(!find("nodes").namespaced);
        assert!(!find("namespaces").namespaced);
        assert_eq!(find("pods").aliases, vec!["po".to_string()]);
    }

    #[test]
    fn custom_manifest_builds_like_builtins() {
        let manifest = GroupManifest::new("crd", "widgets.example.io", "v1")
            .resource(ResourceDescriptor::namespaced("widgets").alias("wd"));
        assert_eq!(manifest.resources.len(), 1);
        assert_eq!(manifest.resources[0].aliases, vec!["wd".to_string()]);
    }
}
