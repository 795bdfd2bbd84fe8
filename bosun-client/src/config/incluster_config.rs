use secrecy::SecretString;

use super::utils;
use crate::error::Result;

// Well-known in-cluster environment
pub(crate) const SERVICE_HOSTENV: &str = "KUBERNETES_SERVICE_HOST";
pub(crate) const SERVICE_PORTENV: &str = "KUBERNETES_SERVICE_PORT";

// Mounted credential files
const SERVICE_TOKENFILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/token";
const SERVICE_CERTFILE: &str = "/var/run/secrets/kubernetes.io/serviceaccount/ca.crt";
const SERVICE_DEFAULT_NS: &str = "/var/run/secrets/kubernetes.io/serviceaccount/namespace";

/// Returns the internal server url from the ambient environment, if present.
pub(crate) fn cluster_server() -> Option<String> {
    let host = std::env::var(SERVICE_HOSTENV).ok().filter(|v| !v.is_empty())?;
    let port = std::env::var(SERVICE_PORTENV).ok().filter(|v| !v.is_empty())?;
    Some(format!("https://{host}:{port}"))
}

/// Returns the mounted service account token.
pub(crate) fn load_token() -> Result<SecretString> {
    let token = utils::read_file_to_string(SERVICE_TOKENFILE)?;
    Ok(SecretString::from(token.trim_end().to_owned()))
}

/// Returns the mounted certificate bundle as DER certificates.
pub(crate) fn load_cert() -> Result<Vec<Vec<u8>>> {
    let bundle = utils::read_file(SERVICE_CERTFILE)?;
    utils::certs(&bundle)
}

/// Returns the namespace the service account runs in.
pub(crate) fn load_default_ns() -> Result<String> {
    Ok(utils::read_file_to_string(SERVICE_DEFAULT_NS)?.trim_end().to_owned())
}
