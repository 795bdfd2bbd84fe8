//! Resource handles and request-scoped verb builders.
use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use either::Either;
use futures::{
    stream::{AbortHandle, Abortable, BoxStream},
    Stream, StreamExt,
};
use serde::Serialize;

use bosun_core::{
    catalog::ResourceDescriptor,
    dynamic::{DynamicObject, ObjectList},
    params::{DeleteParams, ListParams, Patch, PatchParams, PostParams, WatchParams},
    request::Request,
    response::Status,
    selector::Selector,
    watch::WatchEvent,
};

use crate::{
    error::{Error, Result},
    group::GroupCore,
};

/// A handle to one addressable resource collection of a single kind
///
/// Handles are bound to their owning group's transport and resolved options
/// at registration time and hold no per-request state; selector and
/// namespace qualification live on the [`ResourceRequest`] values the
/// chaining methods return.
#[derive(Clone)]
pub struct Resource {
    descriptor: ResourceDescriptor,
    core: Arc<GroupCore>,
}

impl Resource {
    pub(crate) fn new(descriptor: ResourceDescriptor, core: Arc<GroupCore>) -> Self {
        Self { descriptor, core }
    }

    /// The canonical plural kind name of this resource
    pub fn kind(&self) -> &str {
        &self.descriptor.kind
    }

    /// Whether objects of this kind live inside a namespace
    pub fn namespaced(&self) -> bool {
        self.descriptor.namespaced
    }

    /// The short-name aliases registered for this kind
    pub fn aliases(&self) -> &[String] {
        &self.descriptor.aliases
    }

    /// A fresh request scope with no qualifiers
    ///
    /// Every chaining method below starts from one of these; scopes are
    /// independent values, so concurrent callers can never observe each
    /// other's selector state.
    pub fn scoped(&self) -> ResourceRequest {
        ResourceRequest {
            resource: self.clone(),
            namespace: None,
            labels: None,
            fields: None,
        }
    }

    /// A request scope addressing an explicit namespace
    pub fn within(&self, namespace: &str) -> ResourceRequest {
        self.scoped().within(namespace)
    }

    /// A request scope restricted by label expressions
    pub fn matching(&self, selector: Selector) -> ResourceRequest {
        self.scoped().matching(selector)
    }

    /// A request scope restricted by label equality pairs, in insertion order
    pub fn match_labels<I, K, V>(&self, labels: I) -> ResourceRequest
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.scoped().match_labels(labels)
    }

    /// Get a named object
    pub async fn get(&self, name: &str) -> Result<DynamicObject> {
        self.scoped().get(name).await
    }

    /// List the collection
    pub async fn list(&self, lp: &ListParams) -> Result<ObjectList<DynamicObject>> {
        self.scoped().list(lp).await
    }

    /// Create an object
    pub async fn create<D: Serialize>(&self, pp: &PostParams, data: &D) -> Result<DynamicObject> {
        self.scoped().create(pp, data).await
    }

    /// Replace a named object
    pub async fn replace<D: Serialize>(
        &self,
        name: &str,
        pp: &PostParams,
        data: &D,
    ) -> Result<DynamicObject> {
        self.scoped().replace(name, pp, data).await
    }

    /// Patch a named object
    pub async fn patch<P: Serialize>(
        &self,
        name: &str,
        pp: &PatchParams,
        patch: &Patch<P>,
    ) -> Result<DynamicObject> {
        self.scoped().patch(name, pp, patch).await
    }

    /// Delete a named object
    pub async fn delete(&self, name: &str, dp: &DeleteParams) -> Result<Either<DynamicObject, Status>> {
        self.scoped().delete(name, dp).await
    }

    /// Delete the matching part of the collection
    pub async fn delete_collection(
        &self,
        dp: &DeleteParams,
        lp: &ListParams,
    ) -> Result<Either<ObjectList<DynamicObject>, Status>> {
        self.scoped().delete_collection(dp, lp).await
    }

    /// Open a watch on the collection from a resource version
    pub async fn watch(&self, wp: &WatchParams, version: &str) -> Result<WatchStream<DynamicObject>> {
        self.scoped().watch(wp, version).await
    }
}

impl std::fmt::Debug for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Resource")
            .field("kind", &self.descriptor.kind)
            .field("namespaced", &self.descriptor.namespaced)
            .field("prefix", &self.core.prefix)
            .finish()
    }
}

/// One logical request scope against a resource collection
///
/// An immutable builder value: each chaining call consumes the scope and
/// returns a new one, so selector fragments accumulated for one request can
/// never leak into another. Dropping a scope without issuing a request has no
/// effect.
#[derive(Clone)]
pub struct ResourceRequest {
    resource: Resource,
    namespace: Option<String>,
    labels: Option<Selector>,
    fields: Option<Selector>,
}

impl ResourceRequest {
    /// Address an explicit namespace instead of the group default
    ///
    /// Ignored for cluster-scoped kinds.
    #[must_use]
    pub fn within(mut self, namespace: &str) -> Self {
        self.namespace = Some(namespace.to_string());
        self
    }

    /// Restrict by label expressions; chained calls accumulate
    #[must_use]
    pub fn matching(mut self, selector: Selector) -> Self {
        self.labels = Some(match self.labels.take() {
            Some(existing) => existing.merge(selector),
            None => selector,
        });
        self
    }

    /// Restrict by label equality pairs, in insertion order
    #[must_use]
    pub fn match_labels<I, K, V>(self, labels: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.matching(
            labels
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Restrict by field expressions; chained calls accumulate
    #[must_use]
    pub fn match_fields(mut self, selector: Selector) -> Self {
        self.fields = Some(match self.fields.take() {
            Some(existing) => existing.merge(selector),
            None => selector,
        });
        self
    }

    // Path of the collection this scope addresses.
    fn request(&self) -> Request {
        let core = &self.resource.core;
        let namespace = if self.resource.namespaced() {
            Some(self.namespace.as_deref().unwrap_or(&core.namespace))
        } else {
            None
        };
        Request::new(Request::collection_path(&core.prefix, namespace, self.resource.kind()))
    }

    // Scope selectors fill any params the caller left unset.
    fn merged_list_params(&self, lp: &ListParams) -> ListParams {
        let mut lp = lp.clone();
        if lp.label_selector.is_none() {
            if let Some(labels) = &self.labels {
                if !labels.selects_all() {
                    lp.label_selector = Some(labels.to_query_string());
                }
            }
        }
        if lp.field_selector.is_none() {
            if let Some(fields) = &self.fields {
                if !fields.selects_all() {
                    lp.field_selector = Some(fields.to_query_string());
                }
            }
        }
        lp
    }

    fn merged_watch_params(&self, wp: &WatchParams) -> WatchParams {
        let mut wp = wp.clone();
        if wp.label_selector.is_none() {
            if let Some(labels) = &self.labels {
                if !labels.selects_all() {
                    wp.label_selector = Some(labels.to_query_string());
                }
            }
        }
        if wp.field_selector.is_none() {
            if let Some(fields) = &self.fields {
                if !fields.selects_all() {
                    wp.field_selector = Some(fields.to_query_string());
                }
            }
        }
        wp
    }

    /// Get a named object
    pub async fn get(&self, name: &str) -> Result<DynamicObject> {
        let req = self.request().get(name)?;
        self.resource.core.dispatch(req).await
    }

    /// List the collection
    pub async fn list(&self, lp: &ListParams) -> Result<ObjectList<DynamicObject>> {
        let lp = self.merged_list_params(lp);
        let req = self.request().list(&lp)?;
        self.resource.core.dispatch(req).await
    }

    /// Create an object
    pub async fn create<D: Serialize>(&self, pp: &PostParams, data: &D) -> Result<DynamicObject> {
        let bytes = serde_json::to_vec(data)
            .map_err(|e| Error::Validation(format!("failed to serialize request body: {e}")))?;
        let req = self.request().create(pp, bytes)?;
        self.resource.core.dispatch(req).await
    }

    /// Replace a named object
    ///
    /// Requires `metadata.resourceVersion` set in `data`.
    pub async fn replace<D: Serialize>(
        &self,
        name: &str,
        pp: &PostParams,
        data: &D,
    ) -> Result<DynamicObject> {
        let bytes = serde_json::to_vec(data)
            .map_err(|e| Error::Validation(format!("failed to serialize request body: {e}")))?;
        let req = self.request().replace(name, pp, bytes)?;
        self.resource.core.dispatch(req).await
    }

    /// Patch a named object
    pub async fn patch<P: Serialize>(
        &self,
        name: &str,
        pp: &PatchParams,
        patch: &Patch<P>,
    ) -> Result<DynamicObject> {
        let req = self.request().patch(name, pp, patch)?;
        self.resource.core.dispatch(req).await
    }

    /// Delete a named object
    ///
    /// Returns the deleted object or a [`Status`] document depending on
    /// server timing; both are successes.
    pub async fn delete(&self, name: &str, dp: &DeleteParams) -> Result<Either<DynamicObject, Status>> {
        let req = self.request().delete(name, dp)?;
        self.resource.core.dispatch_status(req).await
    }

    /// Delete the matching part of the collection
    pub async fn delete_collection(
        &self,
        dp: &DeleteParams,
        lp: &ListParams,
    ) -> Result<Either<ObjectList<DynamicObject>, Status>> {
        let lp = self.merged_list_params(lp);
        let req = self.request().delete_collection(dp, &lp)?;
        self.resource.core.dispatch_status(req).await
    }

    /// Open a watch on the collection from a resource version
    ///
    /// The returned stream decodes events lazily until the server closes the
    /// connection or the stream is aborted; it is not restartable. Callers
    /// wanting continuity re-open from the last observed resource version.
    pub async fn watch(&self, wp: &WatchParams, version: &str) -> Result<WatchStream<DynamicObject>> {
        let wp = self.merged_watch_params(wp);
        let req = self.request().watch(&wp, version)?;
        let events = self.resource.core.dispatch_events::<DynamicObject>(req).await?;
        Ok(WatchStream::new(events.boxed()))
    }
}

/// A lazy, cancellable stream of watch events
///
/// Aborting (or dropping) the stream closes the underlying connection; after
/// an abort the stream yields `None` without producing further events.
pub struct WatchStream<K> {
    events: Abortable<BoxStream<'static, Result<WatchEvent<K>>>>,
    handle: AbortHandle,
}

impl<K> WatchStream<K> {
    fn new(stream: BoxStream<'static, Result<WatchEvent<K>>>) -> Self {
        let (handle, registration) = AbortHandle::new_pair();
        Self {
            events: Abortable::new(stream, registration),
            handle,
        }
    }

    /// A handle that cancels the watch when aborted
    ///
    /// The handle is detached: it can be moved to another task and outlives
    /// the stream harmlessly.
    pub fn abort_handle(&self) -> AbortHandle {
        self.handle.clone()
    }
}

impl<K> Stream for WatchStream<K> {
    type Item = Result<WatchEvent<K>>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.get_mut().events).poll_next(cx)
    }
}
