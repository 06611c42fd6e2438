//! kubectl CLI wrapper
//!
//! Wraps the kubectl commands the Kubernetes resources need.

use crate::api::{KubeApi, KubeConnector, ObjectRef, selector_string};
use crate::error::{KubeError, Result};
use crate::kubeconfig::Kubeconfig;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use pragma_gcp::GkeOutputs;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

const FIELD_MANAGER: &str = "pragma-kubernetes";

enum KubeconfigSource {
    Path(PathBuf),
    /// Removed when the last handle drops
    Generated(NamedTempFile),
}

impl KubeconfigSource {
    fn path(&self) -> &Path {
        match self {
            KubeconfigSource::Path(path) => path,
            KubeconfigSource::Generated(file) => file.path(),
        }
    }
}

/// kubectl CLI wrapper bound to one kubeconfig
pub struct Kubectl {
    kubeconfig: KubeconfigSource,
    binary: String,
}

#[derive(Debug, Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<PodItem>,
}

#[derive(Debug, Deserialize)]
struct PodItem {
    metadata: PodMetadata,
}

#[derive(Debug, Deserialize)]
struct PodMetadata {
    name: String,
}

impl Kubectl {
    pub fn new(kubeconfig: impl Into<PathBuf>) -> Self {
        Self {
            kubeconfig: KubeconfigSource::Path(kubeconfig.into()),
            binary: "kubectl".into(),
        }
    }

    /// Write a temporary kubeconfig for a GKE cluster
    pub fn for_cluster(cluster: &GkeOutputs) -> Result<Self> {
        let mut file = NamedTempFile::new()?;
        file.write_all(Kubeconfig::for_gke(cluster).to_yaml()?.as_bytes())?;
        file.flush()?;
        Ok(Self {
            kubeconfig: KubeconfigSource::Generated(file),
            binary: "kubectl".into(),
        })
    }

    /// Use a different kubectl executable
    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn kubeconfig_path(&self) -> &Path {
        self.kubeconfig.path()
    }

    /// Run a kubectl command, optionally feeding stdin, and return stdout
    async fn run_command(&self, args: &[&str], stdin: Option<&[u8]>) -> Result<String> {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("--kubeconfig").arg(self.kubeconfig.path());
        cmd.args(args);
        cmd.stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        // a cancelled reconcile must not leave kubectl running
        cmd.kill_on_drop(true);

        tracing::debug!("Running: {} {}", self.binary, args.join(" "));

        let mut child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => KubeError::KubectlNotFound,
            _ => KubeError::Io(e),
        })?;

        if let Some(input) = stdin {
            if let Some(mut pipe) = child.stdin.take() {
                pipe.write_all(input).await?;
                // closing stdin lets kubectl finish reading
                drop(pipe);
            }
        }

        let output = child.wait_with_output().await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let command = args.first().copied().unwrap_or_default();
            return Err(KubeError::from_stderr(command, stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn object_args<'a>(object: &'a ObjectRef, args: &mut Vec<&'a str>) {
        args.push(object.kind.as_str());
        args.push(object.name.as_str());
        if let Some(namespace) = &object.namespace {
            args.push("--namespace");
            args.push(namespace.as_str());
        }
    }
}

#[async_trait]
impl KubeApi for Kubectl {
    async fn apply(&self, manifest: &Value) -> Result<Value> {
        let body = serde_json::to_vec(manifest)?;
        let output = self
            .run_command(
                &[
                    "apply",
                    "--server-side",
                    "--force-conflicts",
                    "--field-manager",
                    FIELD_MANAGER,
                    "-f",
                    "-",
                    "-o",
                    "json",
                ],
                Some(&body),
            )
            .await?;
        Ok(serde_json::from_str(&output)?)
    }

    async fn get(&self, object: &ObjectRef) -> Result<Option<Value>> {
        let mut args = vec!["get"];
        Self::object_args(object, &mut args);
        args.extend(["-o", "json"]);

        match self.run_command(&args, None).await {
            Ok(output) => Ok(Some(serde_json::from_str(&output)?)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, object: &ObjectRef) -> Result<()> {
        let mut args = vec!["delete"];
        Self::object_args(object, &mut args);
        args.push("--wait=false");

        self.run_command(&args, None).await?;
        Ok(())
    }

    async fn list_pods(
        &self,
        namespace: &str,
        selector: &BTreeMap<String, String>,
    ) -> Result<Vec<String>> {
        let selector = selector_string(selector);
        let output = self
            .run_command(
                &[
                    "get",
                    "pods",
                    "--namespace",
                    namespace,
                    "-l",
                    selector.as_str(),
                    "-o",
                    "json",
                ],
                None,
            )
            .await?;

        if output.trim().is_empty() {
            return Ok(Vec::new());
        }

        let pods: PodList = serde_json::from_str(&output)?;
        Ok(pods.items.into_iter().map(|p| p.metadata.name).collect())
    }

    async fn pod_logs(
        &self,
        namespace: &str,
        pod: &str,
        since: Option<DateTime<Utc>>,
        tail: usize,
    ) -> Result<String> {
        let tail_arg = format!("--tail={tail}");
        let since_arg = since.map(|t| {
            format!(
                "--since-time={}",
                t.to_rfc3339_opts(SecondsFormat::Secs, true)
            )
        });

        let mut args = vec![
            "logs",
            pod,
            "--namespace",
            namespace,
            "--timestamps",
            tail_arg.as_str(),
        ];
        if let Some(ref since_arg) = since_arg {
            args.push(since_arg.as_str());
        }

        self.run_command(&args, None).await
    }
}

/// Connects with kubectl through a generated kubeconfig
#[derive(Debug, Default, Clone, Copy)]
pub struct KubectlConnector;

impl KubeConnector for KubectlConnector {
    fn connect(&self, cluster: &GkeOutputs) -> Result<Arc<dyn KubeApi>> {
        Ok(Arc::new(Kubectl::for_cluster(cluster)?))
    }
}
