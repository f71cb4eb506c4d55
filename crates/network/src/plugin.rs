//! A single CNI plugin binary and its ADD/DEL/VERSION invocation.

use crate::cni::exec::{ArgsBuilder, DefaultExec, Exec};
use crate::config::DNS;
use crate::error::CniError;
use anyhow::{format_err, Context, Result};
use derive_builder::Builder;
use getset::{Getters, Setters};
use ipnetwork::IpNetwork;
use log::trace;
use serde::{Deserialize, Serialize};
use std::{env, net::IpAddr, path::PathBuf};
use strum::AsRefStr;

#[derive(Builder, Getters, Setters)]
#[builder(pattern = "owned", setter(into))]
pub struct Plugin {
    #[get]
    /// Path to the plugin binary.
    binary: PathBuf,

    #[getset(get, set = "pub")]
    #[builder(default = "Box::new(DefaultExec)")]
    /// CNI command execution helper.
    exec: Box<dyn Exec>,
}

#[derive(AsRefStr, Copy, Clone, Debug, Eq, PartialEq)]
#[strum(serialize_all = "shouty_snake_case")]
enum Command {
    Add,
    Del,
}

impl Plugin {
    /// Resolve the binary name against the configured plugin bin directory.
    pub fn find_binary(mut self, bin_dir: &str) -> Result<Self> {
        self.binary = which::which_in(
            self.binary(),
            Some(bin_dir),
            env::current_dir().context("get current working directory")?,
        )
        .with_context(|| {
            format!(
                "find plugin binary {} in {}",
                self.binary().display(),
                bin_dir
            )
        })?;
        trace!("Using plugin binary {}", self.binary.display());
        Ok(self)
    }

    /// Attach a container's network namespace to the network.
    pub async fn add(
        &self,
        container_id: &str,
        network_namespace_path: &str,
        raw_plugin_config: &[u8],
    ) -> Result<CNIResult, CniError> {
        self.cmd(Command::Add, container_id, network_namespace_path, raw_plugin_config)
            .await?
            .context("no CNI result for ADD")
            .map_err(|source| self.plugin_error(source))
    }

    /// Detach a container's network namespace from the network.
    pub async fn del(
        &self,
        container_id: &str,
        network_namespace_path: &str,
        raw_plugin_config: &[u8],
    ) -> Result<(), CniError> {
        self.cmd(Command::Del, container_id, network_namespace_path, raw_plugin_config)
            .await?;
        Ok(())
    }

    fn plugin_error(&self, source: anyhow::Error) -> CniError {
        CniError::Plugin {
            plugin: self.binary().display().to_string(),
            source,
        }
    }

    async fn cmd(
        &self,
        command: Command,
        container_id: &str,
        network_namespace_path: &str,
        raw_plugin_config: &[u8],
    ) -> Result<Option<CNIResult>, CniError> {
        let args = ArgsBuilder::default()
            .command(command.as_ref())
            .container_id(container_id)
            .network_namespace(network_namespace_path)
            .interface_name("eth0")
            .path(
                self.binary()
                    .parent()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default(),
            )
            .build()
            .map_err(|e| self.plugin_error(format_err!("build CNI exec args: {}", e)))?;
        trace!("Using CNI args {:?}", args);

        match self
            .exec()
            .run_with_stdin(self.binary(), &args, raw_plugin_config)
            .await
        {
            Ok(output) if command == Command::Add => {
                let result = serde_json::from_str::<CNIResult>(&output)
                    .map_err(|e| self.plugin_error(format_err!("unmarshal CNI result: {}", e)))?;
                trace!("Got CNI output {:?}", result);
                Ok(Some(result))
            }
            Ok(_) => Ok(None),
            Err(e) => {
                if let Ok(cni_error) = serde_json::from_str::<ErrorResult>(&e.to_string()) {
                    if cni_error.message().contains("already exists") {
                        return Err(CniError::AlreadyAttached);
                    }
                    return Err(self.plugin_error(format_err!("CNI error: {}", cni_error.message())));
                }
                Err(self.plugin_error(e))
            }
        }
    }
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, Getters)]
/// CNIResult gets returned from the plugin (via stdout) to the caller.
pub struct CNIResult {
    #[get = "pub"]
    #[serde(rename = "cniVersion")]
    cni_version: String,

    #[get = "pub"]
    #[serde(default)]
    interfaces: Vec<NetworkInterface>,

    #[get = "pub"]
    #[serde(default)]
    ips: Vec<IP>,

    #[get = "pub"]
    #[serde(default)]
    routes: Vec<Route>,

    #[get = "pub"]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    dns: Option<DNS>,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, Getters)]
pub struct NetworkInterface {
    #[get = "pub"]
    name: String,

    #[get = "pub"]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    mac: Option<String>,

    #[get = "pub"]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sandbox: Option<String>,
}

#[derive(Clone, Serialize, Deserialize, Debug, Getters)]
pub struct IP {
    #[get = "pub"]
    version: String,

    #[get = "pub"]
    interface: usize,

    #[get = "pub"]
    address: IpNetwork,

    #[get = "pub"]
    gateway: IpAddr,
}

#[derive(Clone, Serialize, Deserialize, Debug, Getters)]
pub struct Route {
    #[get = "pub"]
    dst: IpNetwork,

    #[get = "pub"]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    gw: Option<IpAddr>,
}

#[derive(Clone, Serialize, Deserialize, Debug, Default, Getters)]
/// Error gets returned in case the CNI plugin command fails.
pub struct ErrorResult {
    #[get = "pub"]
    code: u64,

    #[get = "pub"]
    #[serde(rename = "msg")]
    message: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cni::exec::Args;
    use anyhow::bail;
    use async_trait::async_trait;
    use std::path::Path;

    #[derive(Clone)]
    struct ExecMock {
        result: std::result::Result<String, String>,
    }

    #[async_trait]
    impl Exec for ExecMock {
        async fn run(&self, _binary: &Path, _args: &Args) -> Result<String> {
            self.result()
        }

        async fn run_with_stdin(&self, _binary: &Path, _args: &Args, _stdin: &[u8]) -> Result<String> {
            self.result()
        }
    }

    impl ExecMock {
        fn ok(output: impl Into<String>) -> Box<Self> {
            Box::new(Self { result: Ok(output.into()) })
        }

        fn err(message: impl Into<String>) -> Box<Self> {
            Box::new(Self { result: Err(message.into()) })
        }

        fn result(&self) -> Result<String> {
            match &self.result {
                Ok(s) => Ok(s.clone()),
                Err(e) => bail!("{}", e),
            }
        }
    }

    fn add_result_json() -> String {
        r#"{
            "cniVersion": "0.4.0",
            "interfaces": [{ "name": "eth0" }],
            "ips": [{ "version": "4", "interface": 0, "address": "10.88.0.4/16", "gateway": "10.88.0.1" }],
            "routes": [{ "dst": "0.0.0.0/0" }]
        }"#
        .to_string()
    }

    #[tokio::test]
    async fn add_success() -> Result<()> {
        let mut plugin = PluginBuilder::default().binary("bridge").build()?;
        plugin.set_exec(ExecMock::ok(add_result_json()));

        let result = plugin.add("cell-a", "/proc/1/ns/net", &[]).await.unwrap();
        assert_eq!(result.ips().len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn add_already_attached_maps_to_typed_error() -> Result<()> {
        let mut plugin = PluginBuilder::default().binary("bridge").build()?;
        plugin.set_exec(ExecMock::err(
            r#"{ "code": 7, "msg": "network already exists" }"#,
        ));

        let err = plugin.add("cell-a", "/proc/1/ns/net", &[]).await.unwrap_err();
        assert!(matches!(err, CniError::AlreadyAttached));
        Ok(())
    }

    #[tokio::test]
    async fn add_failure_malformed_output() -> Result<()> {
        let mut plugin = PluginBuilder::default().binary("bridge").build()?;
        plugin.set_exec(ExecMock::ok("not json"));
        assert!(plugin.add("cell-a", "/proc/1/ns/net", &[]).await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn del_success() -> Result<()> {
        let mut plugin = PluginBuilder::default().binary("bridge").build()?;
        plugin.set_exec(ExecMock::ok(""));
        plugin.del("cell-a", "/proc/1/ns/net", &[]).await.unwrap();
        Ok(())
    }
}
