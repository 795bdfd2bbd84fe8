//! Group/version addressing for custom resource groups.
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
#[error("failed to parse group version: {0}")]
/// Failed to parse group version.
pub struct ParseGroupVersionError(pub String);

/// Core information about a family of API resources
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Hash)]
pub struct GroupVersion {
    /// API group
    pub group: String,
    /// Version
    pub version: String,
}

impl GroupVersion {
    /// Construct from explicit group and version
    pub fn gv(group_: &str, version_: &str) -> Self {
        let version = version_.to_string();
        let group = group_.to_string();
        Self { group, version }
    }

    /// Generate the apiVersion string used in a kind's yaml
    pub fn api_version(&self) -> String {
        if self.group.is_empty() {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl FromStr for GroupVersion {
    type Err = ParseGroupVersionError;

    fn from_str(gv: &str) -> Result<Self, Self::Err> {
        let gvsplit = gv.splitn(2, '/').collect::<Vec<_>>();
        let (group, version) = match *gvsplit.as_slice() {
            [g, v] => (g.to_string(), v.to_string()), // standard case
            [v] => ("".to_string(), v.to_string()),   // core v1 case
            _ => return Err(ParseGroupVersionError(gv.into())),
        };
        if version.is_empty() {
            return Err(ParseGroupVersionError(gv.into()));
        }
        Ok(Self { group, version })
    }
}

#[cfg(test)]
mod test {
    use super::GroupVersion;
    use std::str::FromStr;

    #[test]
    fn group_version_parsing() {
        let gv = GroupVersion::from_str("apps/v1").unwrap();
        assert_eq!(gv.group, "apps");
        assert_eq!(gv.version, "v1");
        assert_eq!(gv.api_version(), "apps/v1");

        let core = GroupVersion::from_str("v1").unwrap();
        assert_eq!(core.group, "");
        assert_eq!(core.api_version(), "v1");

        assert!(GroupVersion::from_str("apps/").is_err());
    }
}
