//! Kubernetes fault injector
//!
//! Drives `kubectl` against one namespace. Traffic shaping runs `tc` inside the
//! pod through `kubectl exec` (the image needs `tc` and `NET_ADMIN`); partitions
//! are a pair of generated NetworkPolicies.

use std::fmt;
use std::sync::Arc;

use application::{ApplicationError, FaultInjectorPort};
use async_trait::async_trait;
use domain::{Fault, FaultHandle, FaultTarget, Filter, Target, TargetSelector};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::command_runner::{CommandRunner, CommandSpec, TokioCommandRunner};
use super::traffic_control::{self, Argv};
use super::undo_log::{Step, UndoLog};
use crate::config::KubernetesConfig;

#[derive(Debug, Deserialize)]
struct PodList {
    #[serde(default)]
    items: Vec<Pod>,
}

#[derive(Debug, Deserialize)]
struct Pod {
    metadata: PodMetadata,
    #[serde(default)]
    status: PodStatus,
}

#[derive(Debug, Deserialize)]
struct PodMetadata {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PodStatus {
    phase: Option<String>,
    #[serde(rename = "podIP")]
    pod_ip: Option<String>,
}

/// Fault injector for pods in a Kubernetes namespace
pub struct KubernetesFaultInjector {
    runner: Arc<dyn CommandRunner>,
    config: KubernetesConfig,
    undo: UndoLog,
}

impl fmt::Debug for KubernetesFaultInjector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KubernetesFaultInjector")
            .field("config", &self.config)
            .field("live", &self.undo.live_count())
            .finish_non_exhaustive()
    }
}

impl KubernetesFaultInjector {
    #[must_use]
    pub fn new(config: KubernetesConfig) -> Self {
        Self::with_runner(config, Arc::new(TokioCommandRunner))
    }

    #[must_use]
    pub fn with_runner(config: KubernetesConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            config,
            undo: UndoLog::new(),
        }
    }

    fn kubectl<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut all = Vec::new();
        if let Some(context) = &self.config.context {
            all.push("--context".to_string());
            all.push(context.clone());
        }
        all.push("--namespace".to_string());
        all.push(self.config.namespace.clone());
        all.extend(args.into_iter().map(Into::into));
        CommandSpec::new(self.config.binary.clone(), all)
    }

    fn exec(&self, pod: &str, argv: Argv) -> CommandSpec {
        let mut args = vec!["exec".to_string(), pod.to_string(), "--".to_string()];
        args.extend(argv);
        self.kubectl(args)
    }

    fn exec_all(&self, pod: &str, commands: Vec<Argv>) -> Vec<CommandSpec> {
        commands.into_iter().map(|argv| self.exec(pod, argv)).collect()
    }

    fn label_selector(&self, selector: &TargetSelector) -> String {
        match selector {
            TargetSelector::Service(name) => format!("{}={name}", self.config.service_label),
            TargetSelector::Filter(filter) => filter.to_label_selector(),
        }
    }

    /// NetworkPolicy isolating pods matching `selected` from pods matching `peer`
    ///
    /// Policies only allow, so "everything except peer" is expressed as one
    /// `NotIn` peer per filter term; peers in a rule are ORed.
    fn network_policy(&self, name: &str, selected: &Filter, peer: &Filter) -> Value {
        let match_labels: serde_json::Map<String, Value> = selected
            .terms()
            .iter()
            .map(|t| (t.key.clone(), Value::String(t.value.clone())))
            .collect();
        let others: Vec<Value> = peer
            .terms()
            .iter()
            .map(|t| {
                json!({
                    "podSelector": {
                        "matchExpressions": [
                            { "key": t.key, "operator": "NotIn", "values": [t.value] }
                        ]
                    }
                })
            })
            .collect();

        json!({
            "apiVersion": "networking.k8s.io/v1",
            "kind": "NetworkPolicy",
            "metadata": {
                "name": name,
                "namespace": self.config.namespace,
                "labels": { "app.kubernetes.io/managed-by": "faultline" }
            },
            "spec": {
                "podSelector": { "matchLabels": match_labels },
                "policyTypes": ["Ingress", "Egress"],
                "ingress": [{ "from": others }],
                "egress": [{ "to": others }]
            }
        })
    }

    fn policy_step(&self, name: &str, selected: &Filter, peer: &Filter) -> Step {
        let manifest = self.network_policy(name, selected, peer).to_string();
        Step::new(
            vec![self.kubectl(["apply", "-f", "-"]).with_stdin(manifest)],
            vec![self.kubectl(["delete", "networkpolicy", name, "--ignore-not-found"])],
        )
    }

    fn unsupported(target: &FaultTarget, fault: &Fault) -> ApplicationError {
        ApplicationError::Injection(format!("cannot apply {fault} to {target}"))
    }

    fn steps(&self, id: Uuid, target: &FaultTarget, fault: &Fault) -> Result<Vec<Step>, ApplicationError> {
        let interface = self.config.interface.as_str();

        match (target, fault) {
            (FaultTarget::Node(pod), Fault::Crash) => Ok(vec![Step::irreversible(vec![
                self.kubectl(["delete", "pod", pod.id.as_str(), "--wait=false"]),
            ])]),
            (FaultTarget::Node(pod), Fault::Restart) => {
                let deployment = format!("deployment/{}", pod.selected_by);
                Ok(vec![Step::irreversible(vec![
                    self.kubectl(["rollout", "restart", deployment.as_str()]),
                ])])
            },
            (FaultTarget::Node(pod), _) => {
                let shape = traffic_control::shape_interface(interface, fault)
                    .ok_or_else(|| Self::unsupported(target, fault))?;
                Ok(vec![Step::new(
                    self.exec_all(&pod.id, shape),
                    self.exec_all(&pod.id, traffic_control::clear_interface(interface)),
                )])
            },
            (FaultTarget::Link { from, to }, _) => {
                let peers: Vec<String> = to.iter().filter_map(|t| t.address.clone()).collect();
                if peers.is_empty() {
                    return Err(ApplicationError::Injection(format!(
                        "no pod IP known for peers of {from}"
                    )));
                }
                let shape = traffic_control::shape_towards(interface, fault, &peers)
                    .ok_or_else(|| Self::unsupported(target, fault))?;
                Ok(vec![Step::new(
                    self.exec_all(&from.id, shape),
                    self.exec_all(&from.id, traffic_control::clear_interface(interface)),
                )])
            },
            (
                FaultTarget::Partition {
                    left_filter,
                    right_filter,
                    ..
                },
                Fault::Partition,
            ) => {
                let short = id.simple().to_string();
                let base = format!("faultline-partition-{}", &short[..8]);
                Ok(vec![
                    self.policy_step(&format!("{base}-a"), left_filter, right_filter),
                    self.policy_step(&format!("{base}-b"), right_filter, left_filter),
                ])
            },
            (FaultTarget::Partition { .. }, _) => Err(Self::unsupported(target, fault)),
        }
    }
}

#[async_trait]
impl FaultInjectorPort for KubernetesFaultInjector {
    fn name(&self) -> &'static str {
        "kubernetes"
    }

    #[instrument(skip(self))]
    async fn is_available(&self) -> bool {
        let probe = self.kubectl([
            "get".to_string(),
            "namespace".to_string(),
            self.config.namespace.clone(),
            "-o".to_string(),
            "name".to_string(),
        ]);
        match self.runner.run(&probe).await {
            Ok(_) => true,
            Err(err) => {
                warn!(error = %err, "kubectl probe failed");
                false
            },
        }
    }

    #[instrument(skip(self), fields(selector = %selector))]
    async fn resolve(&self, selector: &TargetSelector) -> Result<Vec<Target>, ApplicationError> {
        let labels = self.label_selector(selector);
        let out = self
            .runner
            .run(&self.kubectl(["get", "pods", "-l", labels.as_str(), "-o", "json"]))
            .await
            .map_err(|e| ApplicationError::Resolution(e.to_string()))?;

        let pods: PodList = serde_json::from_str(&out)
            .map_err(|e| ApplicationError::Resolution(format!("invalid pod list: {e}")))?;

        let selected_by = match selector {
            TargetSelector::Service(name) => name.clone(),
            TargetSelector::Filter(filter) => filter.to_string(),
        };

        let targets: Vec<Target> = pods
            .items
            .into_iter()
            .filter(|pod| pod.status.phase.as_deref() == Some("Running"))
            .map(|pod| {
                let target = Target::new(pod.metadata.name, selected_by.clone());
                match pod.status.pod_ip {
                    Some(ip) => target.with_address(ip),
                    None => target,
                }
            })
            .collect();

        debug!(count = targets.len(), labels = %labels, "Resolved pods");
        Ok(targets)
    }

    #[instrument(skip(self), fields(target = %target, fault = %fault))]
    async fn apply(&self, target: &FaultTarget, fault: &Fault) -> Result<FaultHandle, ApplicationError> {
        let handle = FaultHandle::new(target.clone(), fault.clone());
        let steps = self.steps(handle.id, target, fault)?;
        let undo = UndoLog::execute(self.runner.as_ref(), steps).await?;

        self.undo.store(handle.id, undo);
        info!(handle = %handle.id, "Fault applied");
        Ok(handle)
    }

    #[instrument(skip(self), fields(handle = %handle.id))]
    async fn revert(&self, handle: &FaultHandle) -> Result<(), ApplicationError> {
        self.undo.revert(self.runner.as_ref(), handle.id).await?;
        info!("Fault reverted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::command_runner::scripted::ScriptedRunner;
    use domain::Percentage;

    const PODS: &str = r#"{
        "items": [
            {"metadata": {"name": "api-7d9f-abc"}, "status": {"phase": "Running", "podIP": "10.1.0.5"}},
            {"metadata": {"name": "api-7d9f-def"}, "status": {"phase": "Pending"}},
            {"metadata": {"name": "api-7d9f-ghi"}, "status": {"phase": "Running", "podIP": "10.1.0.7"}}
        ]
    }"#;

    fn injector(runner: &Arc<ScriptedRunner>) -> KubernetesFaultInjector {
        KubernetesFaultInjector::with_runner(KubernetesConfig::default(), runner.clone())
    }

    #[tokio::test]
    async fn resolves_running_pods_by_service_label() {
        let runner = Arc::new(ScriptedRunner::new().on("get pods", PODS));
        let targets = injector(&runner)
            .resolve(&TargetSelector::Service("api".into()))
            .await
            .unwrap();

        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].address.as_deref(), Some("10.1.0.5"));
        assert_eq!(targets[1].id, "api-7d9f-ghi");
        assert_eq!(
            runner.calls(),
            vec!["kubectl --namespace default get pods -l service=api -o json"]
        );
    }

    #[tokio::test]
    async fn malformed_pod_list_is_a_resolution_error() {
        let runner = Arc::new(ScriptedRunner::new().on("get pods", "not json"));
        let result = injector(&runner)
            .resolve(&TargetSelector::Service("api".into()))
            .await;
        assert!(matches!(result, Err(ApplicationError::Resolution(_))));
    }

    #[tokio::test]
    async fn context_flag_is_passed_through() {
        let runner = Arc::new(ScriptedRunner::new());
        let config = KubernetesConfig {
            context: Some("staging".into()),
            ..KubernetesConfig::default()
        };
        let injector = KubernetesFaultInjector::with_runner(config, runner.clone());
        assert!(injector.is_available().await);
        assert_eq!(
            runner.calls(),
            vec!["kubectl --context staging --namespace default get namespace default -o name"]
        );
    }

    #[tokio::test]
    async fn node_loss_execs_tc_in_pod() {
        let runner = Arc::new(ScriptedRunner::new());
        let injector = injector(&runner);
        let fault = Fault::Loss {
            percentage: Percentage::from_literal(20.0),
        };

        let handle = injector
            .apply(&FaultTarget::Node(Target::new("api-1", "api")), &fault)
            .await
            .unwrap();
        injector.revert(&handle).await.unwrap();

        assert_eq!(
            runner.calls(),
            vec![
                "kubectl --namespace default exec api-1 -- tc qdisc replace dev eth0 root netem loss 20%",
                "kubectl --namespace default exec api-1 -- tc qdisc del dev eth0 root",
            ]
        );
    }

    #[tokio::test]
    async fn restart_rolls_the_deployment() {
        let runner = Arc::new(ScriptedRunner::new());
        injector(&runner)
            .apply(&FaultTarget::Node(Target::new("api-1", "api")), &Fault::Restart)
            .await
            .unwrap();
        assert_eq!(
            runner.calls(),
            vec!["kubectl --namespace default rollout restart deployment/api"]
        );
    }

    #[tokio::test]
    async fn partition_applies_and_deletes_two_policies() {
        let runner = Arc::new(ScriptedRunner::new());
        let injector = injector(&runner);
        let target = FaultTarget::Partition {
            left_filter: Filter::single("env", "staging"),
            right_filter: Filter::single("env", "prod"),
            left: vec![Target::new("s1", "env=staging")],
            right: vec![Target::new("p1", "env=prod")],
        };

        let handle = injector.apply(&target, &Fault::Partition).await.unwrap();
        injector.revert(&handle).await.unwrap();

        let specs = runner.specs();
        assert_eq!(specs.len(), 4);

        let manifest: Value = serde_json::from_str(specs[0].stdin.as_deref().unwrap()).unwrap();
        assert_eq!(manifest["kind"], "NetworkPolicy");
        assert_eq!(manifest["spec"]["podSelector"]["matchLabels"]["env"], "staging");
        let expr = &manifest["spec"]["egress"][0]["to"][0]["podSelector"]["matchExpressions"][0];
        assert_eq!(expr["operator"], "NotIn");
        assert_eq!(expr["values"][0], "prod");

        let name = manifest["metadata"]["name"].as_str().unwrap().to_string();
        assert!(name.starts_with("faultline-partition-"));
        assert!(specs[2].to_string().contains("delete networkpolicy"));
        assert!(specs.iter().any(|s| s.to_string().contains(&name) && s.args.contains(&"delete".to_string())));
    }
}
