//! CNI network configuration list (conflist) types and the default conflist
//! written for a Space when none exists on disk yet.

use anyhow::{Context, Result};
use derive_builder::Builder;
use getset::Getters;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, fs::File, path::Path};

#[derive(Clone, Serialize, Deserialize, Debug, Default, Builder, Getters)]
#[builder(default, pattern = "owned", setter(into, strip_option))]
pub struct ConfigFile {
    #[getset(get = "pub")]
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "cniVersion"
    )]
    cni_version: Option<String>,

    #[getset(get = "pub")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,

    #[getset(get = "pub")]
    #[serde(rename = "type")]
    typ: String,

    #[getset(get = "pub")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    capabilities: Option<HashMap<String, bool>>,

    #[getset(get = "pub")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ipam: Option<IPAM>,

    #[getset(get = "pub")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bridge: Option<String>,

    #[getset(get = "pub")]
    #[serde(default, rename = "isGateway", skip_serializing_if = "Option::is_none")]
    is_gateway: Option<bool>,

    #[getset(get = "pub")]
    #[serde(default, rename = "ipMasq", skip_serializing_if = "Option::is_none")]
    ip_masq: Option<bool>,

    #[getset(get = "pub")]
    #[serde(default)]
    dns: DNS,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, Builder, Getters)]
#[builder(default, pattern = "owned", setter(into, strip_option))]
pub struct ConfigListFile {
    #[getset(get = "pub")]
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        rename = "cniVersion"
    )]
    cni_version: Option<String>,

    #[getset(get = "pub")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,

    #[getset(get = "pub")]
    plugins: Vec<ConfigFile>,
}

impl ConfigListFile {
    /// Load a conflist from disk.
    pub fn from_path(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("open file {}", path.display()))?;
        serde_json::from_reader(file)
            .with_context(|| format!("deserialize CNI config list from file {}", path.display()))
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, Builder, Getters)]
#[builder(default, pattern = "owned", setter(into, strip_option))]
pub struct IPAM {
    #[getset(get = "pub")]
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "type")]
    typ: Option<String>,

    #[getset(get = "pub")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    subnet: Option<String>,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, Builder, Getters)]
#[builder(default, pattern = "owned", setter(into, strip_option))]
pub struct DNS {
    #[getset(get = "pub")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nameservers: Option<Vec<String>>,
}

/// The conflist written for a Space the first time it is provisioned: a
/// bridge plugin with host-local IPAM, followed by portmap, matching the
/// example config shipped by the upstream CNI reference plugins.
pub fn default_conflist(name: &str, subnet: &str) -> ConfigListFile {
    let bridge = ConfigFileBuilder::default()
        .typ("bridge")
        .bridge(format!("cni-{}", name))
        .is_gateway(true)
        .ip_masq(true)
        .ipam(
            IPAMBuilder::default()
                .typ("host-local")
                .subnet(subnet)
                .build()
                .expect("build host-local ipam"),
        )
        .build()
        .expect("build bridge plugin config");

    let portmap = ConfigFileBuilder::default()
        .typ("portmap")
        .capabilities(HashMap::from([("portMappings".to_string(), true)]))
        .build()
        .expect("build portmap plugin config");

    ConfigListFileBuilder::default()
        .cni_version("0.4.0")
        .name(name)
        .plugins(vec![bridge, portmap])
        .build()
        .expect("build default conflist")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn default_conflist_has_bridge_and_portmap() {
        let list = default_conflist("rA-sA", "10.88.0.0/16");
        assert_eq!(list.name(), &Some("rA-sA".to_string()));
        assert_eq!(list.plugins().len(), 2);
        assert_eq!(list.plugins()[0].typ(), "bridge");
        assert_eq!(list.plugins()[1].typ(), "portmap");
    }

    #[test]
    fn config_list_file_from_path_roundtrips() -> Result<()> {
        let list = default_conflist("rA-sA", "10.88.0.0/16");
        let mut temp_file = NamedTempFile::new()?;
        temp_file.write_all(serde_json::to_string(&list)?.as_bytes())?;

        let loaded = ConfigListFile::from_path(temp_file.path())?;
        assert_eq!(loaded.name(), &Some("rA-sA".to_string()));
        assert_eq!(loaded.plugins().len(), 2);
        Ok(())
    }

    #[test]
    fn config_list_file_from_path_failure_not_exists() {
        assert!(ConfigListFile::from_path(Path::new("/does/not/exist.conflist")).is_err());
    }
}
