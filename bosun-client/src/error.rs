//! Error handling in [`bosun_client`][crate]
use std::path::PathBuf;

use thiserror::Error;

pub use bosun_core::ErrorResponse;

/// Possible errors from the client
///
/// Every failure is surfaced through one of these typed variants; nothing is
/// swallowed or retried inside the client.
#[derive(Error, Debug)]
pub enum Error {
    /// The server returned a non-success status
    ///
    /// Carries the structured error payload, including the HTTP code and
    /// machine-readable reason. It's quite common to get a `410 Gone` from a
    /// watch when the `resourceVersion` is too old.
    #[error("api error: {0}")]
    Api(#[source] ErrorResponse),

    /// The cluster configuration could not be resolved, or is ambiguous
    #[error("configuration error: {0}")]
    Config(#[source] ConfigError),

    /// Malformed selector or request options, detected before dispatch
    #[error("validation error: {0}")]
    Validation(String),

    /// Duplicate or conflicting resource registration
    #[error("registration error: {0}")]
    Registration(#[source] RegistrationError),

    /// Network, TLS, or timeout failure below the HTTP semantics layer
    #[error("transport error: {0}")]
    Transport(#[source] TransportError),

    /// The response body did not parse as expected
    #[error("decode error: {0}")]
    Decode(#[source] DecodeError),

    /// No composed API group registers the requested kind
    #[error("no API group registers kind {0:?}")]
    NotFound(String),
}

/// Convenient alias for `Result<T, Error>`
pub type Result<T, E = Error> = std::result::Result<T, E>;

impl From<bosun_core::request::Error> for Error {
    fn from(err: bosun_core::request::Error) -> Self {
        use bosun_core::request::Error as RequestError;
        match err {
            RequestError::Validation(msg) => Error::Validation(msg),
            RequestError::BuildRequest(e) => Error::Transport(TransportError::Http(e)),
            RequestError::SerializeBody(e) => {
                Error::Validation(format!("failed to serialize request body: {e}"))
            }
        }
    }
}

impl From<bosun_core::selector::InvalidExpression> for Error {
    fn from(err: bosun_core::selector::InvalidExpression) -> Self {
        Error::Validation(err.to_string())
    }
}

/// Possible errors when resolving cluster configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Neither the kubeconfig nor the in-cluster environment produced a config
    #[error("failed to infer configuration: kubeconfig: ({kubeconfig}), in-cluster: ({incluster})")]
    InferenceExhausted {
        /// Why the kubeconfig source failed
        kubeconfig: Box<Error>,
        // the kubeconfig failure is more likely to be a user error
        /// Why the in-cluster source failed
        #[source]
        incluster: Box<Error>,
    },

    /// The config file names no current context and none was supplied
    #[error("failed to determine current context")]
    CurrentContextNotSet,

    /// The selected context is not present in the config file
    #[error("unable to load context: {context_name}")]
    LoadContext {
        /// The name that failed to resolve
        context_name: String,
    },

    /// The context references a cluster that is not present
    #[error("unable to load cluster of context: {cluster_name}")]
    LoadClusterOfContext {
        /// The name that failed to resolve
        cluster_name: String,
    },

    /// The context references credentials that are not present
    #[error("unable to find named user: {user_name}")]
    FindUser {
        /// The name that failed to resolve
        user_name: String,
    },

    /// No kubeconfig path could be determined
    #[error("unable to find path of kubeconfig")]
    NoKubeconfigPath,

    /// Failed to parse the kubeconfig document
    #[error("failed to parse kubeconfig YAML: {0}")]
    ParseYaml(#[source] serde_yaml::Error),

    /// Failed to read a referenced file
    #[error("failed to read {path:?}: {source}")]
    ReadFile {
        /// The path that could not be read
        path: PathBuf,
        /// The underlying io error
        #[source]
        source: std::io::Error,
    },

    /// Failed to decode inline base64 certificate material
    #[error("failed to decode base64: {0}")]
    Base64Decode(#[source] base64::DecodeError),

    /// A certificate field carried neither inline data nor a file reference
    #[error("failed to get data or file for certificate material")]
    NoBase64FileOrData,

    /// Certificate material did not parse as PEM
    #[error("failed to parse PEM-encoded certificates: {0}")]
    ParseCertificates(#[source] pem::PemError),

    /// The cluster entry carries no server url
    #[error("selected cluster defines no server url")]
    MissingClusterUrl,

    /// The cluster url does not parse
    #[error("cluster url is invalid: {0}")]
    InvalidClusterUrl(#[source] http::uri::InvalidUri),

    /// A config source supplied both a bearer token and basic credentials
    #[error("exactly one auth mode must be configured; found both a token and basic credentials")]
    AmbiguousAuthMode,

    /// Basic credentials were only half-supplied
    #[error("basic auth requires both a username and a password")]
    PartialBasicAuth,

    /// Client identity was only half-supplied
    #[error("client identity requires both a certificate and a key")]
    PartialClientIdentity,

    /// A configured bearer token is not a valid header value
    #[error("invalid bearer token: {0}")]
    InvalidBearerToken(#[source] http::header::InvalidHeaderValue),

    /// One or more required in-cluster environment variables are missing
    #[error("unable to load in-cluster config, {hostenv} and {portenv} must be defined")]
    MissingInClusterVariables {
        /// The name of the expected service host env var
        hostenv: &'static str,
        /// The name of the expected service port env var
        portenv: &'static str,
    },
}

/// Possible errors when registering resource kinds on a group
#[derive(Error, Debug)]
pub enum RegistrationError {
    /// A kind was registered twice on one group
    #[error("kind {kind:?} is already registered in group {group:?}")]
    DuplicateKind {
        /// The registry name of the group
        group: String,
        /// The colliding canonical kind
        kind: String,
    },

    /// An alias collided with an existing canonical name or alias
    #[error("alias {alias:?} for kind {kind:?} collides with an existing registration in group {group:?}")]
    DuplicateAlias {
        /// The registry name of the group
        group: String,
        /// The kind declaring the alias
        kind: String,
        /// The colliding alias
        alias: String,
    },
}

/// Possible transport-level errors
#[derive(Error, Debug)]
pub enum TransportError {
    /// Connection-level failure from the HTTP client
    #[error("connection error: {0}")]
    Hyper(#[source] hyper::Error),

    /// Failure from the service stack (includes connect and i/o timeouts)
    #[error("service error: {0}")]
    Service(#[source] tower::BoxError),

    /// A request could not be assembled
    #[error("http error: {0}")]
    Http(#[source] http::Error),

    /// An absolute request uri could not be constructed
    #[error("invalid uri: {0}")]
    InvalidUri(#[source] http::uri::InvalidUri),

    /// TLS material could not be assembled into a client configuration
    #[error("tls error: {0}")]
    Tls(String),

    /// Reading an event stream failed
    #[error("error reading events stream: {0}")]
    ReadEvents(#[source] std::io::Error),

    /// Returned when failing to find a newline in a framed event stream
    ///
    /// Should never happen as the frame size is unbounded.
    #[error("error finding newline character in events stream")]
    LineLengthExceeded,
}

/// Possible response decoding errors
#[derive(Error, Debug)]
pub enum DecodeError {
    /// A response body did not deserialize into the expected shape
    #[error("error deserializing response: {0}")]
    Json(#[source] serde_json::Error),

    /// A response body was not valid UTF-8
    #[error("utf-8 error: {0}")]
    Utf8(#[source] std::string::FromUtf8Error),
}
