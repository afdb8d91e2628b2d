//! Fault injection backend configurations: Docker, Kubernetes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Fault injection backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// Local containers through the docker CLI (default)
    #[default]
    Docker,
    /// Pods through kubectl
    Kubernetes,
    /// Log and track faults without touching anything
    DryRun,
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Docker => write!(f, "docker"),
            Self::Kubernetes => write!(f, "kubernetes"),
            Self::DryRun => write!(f, "dry-run"),
        }
    }
}

impl std::str::FromStr for BackendKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "docker" => Ok(Self::Docker),
            "kubernetes" | "k8s" => Ok(Self::Kubernetes),
            "dry-run" | "dryrun" | "none" => Ok(Self::DryRun),
            _ => Err(format!(
                "Invalid target: {s}. Use 'docker', 'kubernetes' or 'dry-run'"
            )),
        }
    }
}

// ==============================
// Docker Configuration
// ==============================

/// Docker backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DockerConfig {
    /// Docker CLI binary
    #[serde(default = "default_docker_binary")]
    pub binary: String,

    /// Binary used to enter a container's network namespace
    #[serde(default = "default_nsenter_binary")]
    pub nsenter_binary: String,

    /// Interface inside the container that traffic shaping applies to
    #[serde(default = "default_interface")]
    pub interface: String,
}

fn default_docker_binary() -> String {
    "docker".to_string()
}

fn default_nsenter_binary() -> String {
    "nsenter".to_string()
}

fn default_interface() -> String {
    "eth0".to_string()
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            binary: default_docker_binary(),
            nsenter_binary: default_nsenter_binary(),
            interface: default_interface(),
        }
    }
}

// ==============================
// Kubernetes Configuration
// ==============================

/// Kubernetes backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KubernetesConfig {
    /// kubectl binary
    #[serde(default = "default_kubectl_binary")]
    pub binary: String,

    /// Namespace that scenarios act on
    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Pod label that carries the service name
    #[serde(default = "default_service_label")]
    pub service_label: String,

    /// Interface inside the pod that traffic shaping applies to
    #[serde(default = "default_interface")]
    pub interface: String,

    /// kubeconfig context; the current context when unset
    #[serde(default)]
    pub context: Option<String>,
}

fn default_kubectl_binary() -> String {
    "kubectl".to_string()
}

fn default_namespace() -> String {
    "default".to_string()
}

fn default_service_label() -> String {
    "service".to_string()
}

impl Default for KubernetesConfig {
    fn default() -> Self {
        Self {
            binary: default_kubectl_binary(),
            namespace: default_namespace(),
            service_label: default_service_label(),
            interface: default_interface(),
            context: None,
        }
    }
}
