//! Types for the watch api
//!
//! A watch response is a stream of newline-separated JSON events.
use crate::{metadata::TypeMeta, response::ErrorResponse};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// A raw event returned from a watch query
///
/// Note that a watch query returns many of these as newline separated JSON.
#[derive(Deserialize, Serialize, Clone)]
#[serde(tag = "type", content = "object", rename_all = "UPPERCASE")]
pub enum WatchEvent<K> {
    /// Resource was added
    Added(K),
    /// Resource was modified
    Modified(K),
    /// Resource was deleted
    Deleted(K),
    /// Resource bookmark carrying only a fresh resource version
    ///
    /// Only sent when requested via the watch parameters, and even then at the
    /// server's discretion.
    Bookmark(Bookmark),
    /// There was some kind of error
    Error(ErrorResponse),
}

impl<K> Debug for WatchEvent<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match &self {
            WatchEvent::Added(_) => write!(f, "Added event"),
            WatchEvent::Modified(_) => write!(f, "Modified event"),
            WatchEvent::Deleted(_) => write!(f, "Deleted event"),
            WatchEvent::Bookmark(_) => write!(f, "Bookmark event"),
            WatchEvent::Error(e) => write!(f, "Error event: {e:?}"),
        }
    }
}

/// Slimmed down object for [`WatchEvent::Bookmark`]
///
/// Can only be relied upon to have metadata with a resource version.
#[derive(Serialize, Deserialize, Clone)]
pub struct Bookmark {
    /// apiVersion + kind
    #[serde(flatten)]
    pub types: TypeMeta,

    /// Basically empty metadata
    pub metadata: BookmarkMeta,
}

/// Slimmed down metadata for [`WatchEvent::Bookmark`]
#[derive(Serialize, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct BookmarkMeta {
    /// The only field we need from a Bookmark event.
    pub resource_version: String,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dynamic::DynamicObject;

    #[test]
    fn watch_event_lines_decode() {
        let added = r#"{"type":"ADDED","object":{"apiVersion":"v1","kind":"Pod","metadata":{"name":"p1"}}}"#;
        match serde_json::from_str::<WatchEvent<DynamicObject>>(added).unwrap() {
            WatchEvent::Added(obj) => assert_eq!(obj.name(), Some("p1")),
            other => panic!("decoded {other:?}"),
        }

        let bookmark =
            r#"{"type":"BOOKMARK","object":{"apiVersion":"v1","kind":"Pod","metadata":{"resourceVersion":"123"}}}"#;
        match serde_json::from_str::<WatchEvent<DynamicObject>>(bookmark).unwrap() {
            WatchEvent::Bookmark(b) => assert_eq!(b.metadata.resource_version, "123"),
            other => panic!("decoded {other:?}"),
        }

        let error = r#"{"type":"ERROR","object":{"status":"Failure","message":"too old","reason":"Expired","code":410}}"#;
        match serde_json::from_str::<WatchEvent<DynamicObject>>(error).unwrap() {
            WatchEvent::Error(e) => assert_eq!(e.code, 410),
            other => panic!("decoded {other:?}"),
        }
    }
}
