//! Request builder type for assembling verbs on a resource path.
use thiserror::Error;

use crate::params::{DeleteParams, ListParams, Patch, PatchParams, PostParams, WatchParams};

/// Possible errors when building a request.
#[derive(Debug, Error)]
pub enum Error {
    /// Failed to build a request.
    #[error("failed to build request: {0}")]
    BuildRequest(#[source] http::Error),

    /// Failed to serialize body.
    #[error("failed to serialize body: {0}")]
    SerializeBody(#[source] serde_json::Error),

    /// Failed to validate request parameters.
    #[error("validation failed: {0}")]
    Validation(String),
}

/// A request builder
///
/// Takes a complete resource collection path (everything before an object
/// name) and supplies constructors for the supported verbs.
/// All operations return `http::Request<Vec<u8>>` objects addressed relative
/// to the API root; the owning group makes them absolute before dispatch.
#[derive(Debug, Clone)]
pub struct Request {
    /// The path component of a url
    pub url_path: String,
}

impl Request {
    /// New request with a resource's url path
    pub fn new<S: Into<String>>(url_path: S) -> Self {
        Self {
            url_path: url_path.into(),
        }
    }

    /// Compose a collection path from a version prefix, an optional namespace, and a kind
    ///
    /// `/api/v1` + `ns1` + `pods` becomes `/api/v1/namespaces/ns1/pods`;
    /// cluster-scoped kinds omit the namespace segment.
    pub fn collection_path(prefix: &str, namespace: Option<&str>, kind: &str) -> String {
        match namespace {
            Some(ns) => format!("{prefix}/namespaces/{ns}/{kind}"),
            None => format!("{prefix}/{kind}"),
        }
    }

    // Join a target path with its serialized query parameters.
    // An empty parameter set yields the bare path, not a dangling `?`.
    fn finalize(target: String, qp: form_urlencoded::Serializer<String>) -> String {
        let mut qp = qp;
        let query = qp.finish();
        if query.is_empty() {
            target
        } else {
            format!("{target}?{query}")
        }
    }
}

/// Convenience methods found from API conventions
impl Request {
    /// List a collection of a resource
    pub fn list(&self, lp: &ListParams) -> Result<http::Request<Vec<u8>>, Error> {
        let mut qp = form_urlencoded::Serializer::new(String::new());
        lp.populate_qp(&mut qp);
        let urlstr = Self::finalize(self.url_path.clone(), qp);
        let req = http::Request::get(urlstr);
        req.body(vec![]).map_err(Error::BuildRequest)
    }

    /// Watch a collection at a given resource version
    pub fn watch(&self, wp: &WatchParams, ver: &str) -> Result<http::Request<Vec<u8>>, Error> {
        wp.validate()?;
        let mut qp = form_urlencoded::Serializer::new(String::new());
        wp.populate_qp(&mut qp);
        qp.append_pair("resourceVersion", ver);
        let urlstr = Self::finalize(self.url_path.clone(), qp);
        let req = http::Request::get(urlstr);
        req.body(vec![]).map_err(Error::BuildRequest)
    }

    /// Get a single instance
    pub fn get(&self, name: &str) -> Result<http::Request<Vec<u8>>, Error> {
        let target = format!("{}/{}", self.url_path, name);
        let req = http::Request::get(target);
        req.body(vec![]).map_err(Error::BuildRequest)
    }

    /// Create an instance of a resource
    pub fn create(&self, pp: &PostParams, data: Vec<u8>) -> Result<http::Request<Vec<u8>>, Error> {
        pp.validate()?;
        let mut qp = form_urlencoded::Serializer::new(String::new());
        pp.populate_qp(&mut qp);
        let urlstr = Self::finalize(self.url_path.clone(), qp);
        let req = http::Request::post(urlstr).header(http::header::CONTENT_TYPE, "application/json");
        req.body(data).map_err(Error::BuildRequest)
    }

    /// Replace an instance of a resource
    ///
    /// Requires `metadata.resourceVersion` set in data
    pub fn replace(&self, name: &str, pp: &PostParams, data: Vec<u8>) -> Result<http::Request<Vec<u8>>, Error> {
        pp.validate()?;
        let mut qp = form_urlencoded::Serializer::new(String::new());
        pp.populate_qp(&mut qp);
        let urlstr = Self::finalize(format!("{}/{}", self.url_path, name), qp);
        let req = http::Request::put(urlstr).header(http::header::CONTENT_TYPE, "application/json");
        req.body(data).map_err(Error::BuildRequest)
    }

    /// Patch an instance of a resource
    pub fn patch<P: serde::Serialize>(
        &self,
        name: &str,
        pp: &PatchParams,
        patch: &Patch<P>,
    ) -> Result<http::Request<Vec<u8>>, Error> {
        pp.validate(patch)?;
        let mut qp = form_urlencoded::Serializer::new(String::new());
        pp.populate_qp(&mut qp);
        let urlstr = Self::finalize(format!("{}/{}", self.url_path, name), qp);

        http::Request::patch(urlstr)
            .header(http::header::ACCEPT, "application/json")
            .header(http::header::CONTENT_TYPE, patch.content_type())
            .body(patch.serialize().map_err(Error::SerializeBody)?)
            .map_err(Error::BuildRequest)
    }

    /// Delete an instance of a resource
    pub fn delete(&self, name: &str, dp: &DeleteParams) -> Result<http::Request<Vec<u8>>, Error> {
        let target = format!("{}/{}", self.url_path, name);
        let body = serde_json::to_vec(&dp).map_err(Error::SerializeBody)?;
        let req = http::Request::delete(target).header(http::header::CONTENT_TYPE, "application/json");
        req.body(body).map_err(Error::BuildRequest)
    }

    /// Delete a collection of a resource
    pub fn delete_collection(
        &self,
        dp: &DeleteParams,
        lp: &ListParams,
    ) -> Result<http::Request<Vec<u8>>, Error> {
        let mut qp = form_urlencoded::Serializer::new(String::new());
        lp.populate_qp(&mut qp);
        let urlstr = Self::finalize(self.url_path.clone(), qp);
        let body = serde_json::to_vec(&dp).map_err(Error::SerializeBody)?;
        let req = http::Request::delete(urlstr).header(http::header::CONTENT_TYPE, "application/json");
        req.body(body).map_err(Error::BuildRequest)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::params::{DeleteParams, ListParams, Patch, PatchParams, PostParams, WatchParams};

    #[test]
    fn collection_paths() {
        assert_eq!(
            Request::collection_path("/api/v1", Some("ns1"), "pods"),
            "/api/v1/namespaces/ns1/pods"
        );
        assert_eq!(Request::collection_path("/api/v1", None, "nodes"), "/api/v1/nodes");
        assert_eq!(
            Request::collection_path("/apis/apps/v1", Some("ns"), "deployments"),
            "/apis/apps/v1/namespaces/ns/deployments"
        );
    }

    #[test]
    fn get_path() {
        let req = Request::new("/api/v1/namespaces/ns1/pods").get("p1").unwrap();
        assert_eq!(req.uri(), "/api/v1/namespaces/ns1/pods/p1");
        assert_eq!(req.method(), "GET");
    }

    #[test]
    fn cluster_scoped_get_path() {
        let req = Request::new("/api/v1/nodes").get("n1").unwrap();
        assert_eq!(req.uri(), "/api/v1/nodes/n1");
    }

    #[test]
    fn list_path_with_selectors() {
        let lp = ListParams::default().labels("app=web").fields("status.phase=Running");
        let req = Request::new("/api/v1/namespaces/ns/pods").list(&lp).unwrap();
        assert_eq!(
            req.uri(),
            "/api/v1/namespaces/ns/pods?fieldSelector=status.phase%3DRunning&labelSelector=app%3Dweb"
        );
    }

    #[test]
    fn plain_list_has_no_query() {
        let req = Request::new("/api/v1/namespaces/ns/pods")
            .list(&ListParams::default())
            .unwrap();
        assert_eq!(req.uri(), "/api/v1/namespaces/ns/pods");
    }

    #[test]
    fn watch_path() {
        let req = Request::new("/api/v1/namespaces/ns/pods")
            .watch(&WatchParams::default(), "0")
            .unwrap();
        assert_eq!(
            req.uri(),
            "/api/v1/namespaces/ns/pods?watch=true&timeoutSeconds=290&allowWatchBookmarks=true&resourceVersion=0"
        );
    }

    #[test]
    fn watch_rejects_excessive_timeout() {
        let err = Request::new("/api/v1/namespaces/ns/pods").watch(&WatchParams::default().timeout(400), "0");
        assert!(matches!(err, Err(Error::Validation(_))));
    }

    #[test]
    fn create_path() {
        let pp = PostParams {
            dry_run: true,
            ..Default::default()
        };
        let req = Request::new("/apis/apps/v1/daemonsets").create(&pp, vec![]).unwrap();
        assert_eq!(req.uri(), "/apis/apps/v1/daemonsets?dryRun=All");
        assert_eq!(req.method(), "POST");
    }

    #[test]
    fn replace_path() {
        let req = Request::new("/apis/apps/v1/daemonsets")
            .replace("myds", &PostParams::default(), vec![])
            .unwrap();
        assert_eq!(req.uri(), "/apis/apps/v1/daemonsets/myds");
        assert_eq!(req.method(), "PUT");
    }

    #[test]
    fn patch_path_and_headers() {
        let req = Request::new("/api/v1/namespaces/ns/pods")
            .patch("p1", &PatchParams::default(), &Patch::Merge(()))
            .unwrap();
        assert_eq!(req.uri(), "/api/v1/namespaces/ns/pods/p1");
        assert_eq!(req.method(), "PATCH");
        assert_eq!(
            req.headers().get(http::header::CONTENT_TYPE).unwrap(),
            "application/merge-patch+json"
        );
    }

    #[test]
    fn force_patch_requires_apply() {
        let err = Request::new("/api/v1/namespaces/ns/pods").patch(
            "p1",
            &PatchParams::default().force(),
            &Patch::Merge(()),
        );
        assert!(matches!(err, Err(Error::Validation(_))));
    }

    #[test]
    fn delete_path() {
        let req = Request::new("/apis/apps/v1/namespaces/ns/replicasets")
            .delete("myrs", &DeleteParams::default())
            .unwrap();
        assert_eq!(req.uri(), "/apis/apps/v1/namespaces/ns/replicasets/myrs");
        assert_eq!(req.method(), "DELETE");
    }

    #[test]
    fn delete_collection_path() {
        let lp = ListParams::default().labels("app=myapp");
        let req = Request::new("/apis/apps/v1/namespaces/ns/replicasets")
            .delete_collection(&DeleteParams::default(), &lp)
            .unwrap();
        assert_eq!(
            req.uri(),
            "/apis/apps/v1/namespaces/ns/replicasets?labelSelector=app%3Dmyapp"
        );
        assert_eq!(req.method(), "DELETE");
    }
}
