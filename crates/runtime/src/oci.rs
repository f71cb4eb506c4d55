//! Minimal OCI runtime-spec embedding for the `Container.spec` field.
//!
//! containerd stores a container's runtime spec as a type-url-tagged blob
//! (`prost_types::Any`); when the blob isn't a known protobuf message,
//! containerd accepts a JSON encoding under the same type url real
//! containerd clients use. This module builds just enough of that JSON
//! shape to express namespace joining for workload containers, without
//! pulling in a full OCI runtime-spec crate that the rest of this facade
//! has no other use for.

use common::SharedNamespaces;
use prost_types::Any;
use serde::Serialize;

const RUNTIME_SPEC_TYPE_URL: &str = "types.containerd.io/opencontainers/runtime-spec/1/Spec";

#[derive(Serialize)]
struct RuntimeSpec {
    linux: LinuxSpec,
}

#[derive(Serialize)]
struct LinuxSpec {
    namespaces: Vec<LinuxNamespace>,
}

#[derive(Serialize)]
struct LinuxNamespace {
    #[serde(rename = "type")]
    typ: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
}

/// Build the `Any`-wrapped runtime spec for a container. When
/// `join_namespaces` is `Some`, the net/ipc/uts namespaces carry the root
/// container's `/proc/<pid>/ns/*` paths so the workload joins them instead
/// of getting its own; `None` yields a spec with fresh namespaces (the root
/// container itself).
pub fn runtime_spec_any(join_namespaces: Option<&SharedNamespaces>) -> Any {
    let namespaces = match join_namespaces {
        Some(shared) => vec![
            LinuxNamespace { typ: "network", path: Some(shared.net.path.display().to_string()) },
            LinuxNamespace { typ: "ipc", path: Some(shared.ipc.path.display().to_string()) },
            LinuxNamespace { typ: "uts", path: Some(shared.uts.path.display().to_string()) },
        ],
        None => vec![
            LinuxNamespace { typ: "network", path: None },
            LinuxNamespace { typ: "ipc", path: None },
            LinuxNamespace { typ: "uts", path: None },
        ],
    };
    let spec = RuntimeSpec { linux: LinuxSpec { namespaces } };
    Any {
        type_url: RUNTIME_SPEC_TYPE_URL.to_string(),
        value: serde_json::to_vec(&spec).expect("serialize runtime spec"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Namespace, NamespaceType};

    #[test]
    fn root_spec_has_no_namespace_paths() {
        let any = runtime_spec_any(None);
        let spec: serde_json::Value = serde_json::from_slice(&any.value).unwrap();
        let namespaces = spec["linux"]["namespaces"].as_array().unwrap();
        assert_eq!(namespaces.len(), 3);
        assert!(namespaces.iter().all(|ns| ns.get("path").is_none()));
    }

    #[test]
    fn workload_spec_joins_root_namespaces() {
        let shared = SharedNamespaces {
            net: Namespace::for_pid(NamespaceType::Net, 7),
            ipc: Namespace::for_pid(NamespaceType::Ipc, 7),
            uts: Namespace::for_pid(NamespaceType::Uts, 7),
        };
        let any = runtime_spec_any(Some(&shared));
        let spec: serde_json::Value = serde_json::from_slice(&any.value).unwrap();
        let namespaces = spec["linux"]["namespaces"].as_array().unwrap();
        let net = namespaces.iter().find(|ns| ns["type"] == "network").unwrap();
        assert_eq!(net["path"], "/proc/7/ns/net");
    }
}
