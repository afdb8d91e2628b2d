//! Docker fault injector
//!
//! Drives the `docker` CLI. Traffic shaping and partitions run inside the
//! container's network namespace through `nsenter`, so the container image
//! needs neither `tc` nor `iptables`.

use std::fmt;
use std::sync::Arc;

use application::{ApplicationError, FaultInjectorPort};
use async_trait::async_trait;
use domain::{Fault, FaultHandle, FaultTarget, Target, TargetSelector};
use tracing::{debug, info, instrument};

use super::command_runner::{CommandRunner, CommandSpec, TokioCommandRunner};
use super::traffic_control::{self, Argv};
use super::undo_log::{Step, UndoLog};
use crate::config::DockerConfig;

/// Label docker compose puts on every service container
const COMPOSE_SERVICE_LABEL: &str = "com.docker.compose.service";

/// Fault injector for containers managed by a local Docker daemon
pub struct DockerFaultInjector {
    runner: Arc<dyn CommandRunner>,
    config: DockerConfig,
    undo: UndoLog,
}

impl fmt::Debug for DockerFaultInjector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DockerFaultInjector")
            .field("config", &self.config)
            .field("live", &self.undo.live_count())
            .finish_non_exhaustive()
    }
}

impl DockerFaultInjector {
    /// Create an injector that runs real processes
    #[must_use]
    pub fn new(config: DockerConfig) -> Self {
        Self::with_runner(config, Arc::new(TokioCommandRunner))
    }

    #[must_use]
    pub fn with_runner(config: DockerConfig, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            runner,
            config,
            undo: UndoLog::new(),
        }
    }

    fn docker<I, S>(&self, args: I) -> CommandSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        CommandSpec::new(self.config.binary.clone(), args)
    }

    fn in_netns(&self, pid: u32, argv: Argv) -> CommandSpec {
        let mut args = vec!["-t".to_string(), pid.to_string(), "-n".to_string()];
        args.extend(argv);
        CommandSpec::new(self.config.nsenter_binary.clone(), args)
    }

    fn all_in_netns(&self, pid: u32, commands: Vec<Argv>) -> Vec<CommandSpec> {
        commands
            .into_iter()
            .map(|argv| self.in_netns(pid, argv))
            .collect()
    }

    async fn container_names(&self, filters: &[String]) -> Result<Vec<String>, ApplicationError> {
        let mut args = vec!["ps".to_string()];
        for filter in filters {
            args.push("--filter".to_string());
            args.push(filter.clone());
        }
        args.push("--format".to_string());
        args.push("{{.Names}}".to_string());

        let out = self
            .runner
            .run(&self.docker(args))
            .await
            .map_err(|e| ApplicationError::Resolution(e.to_string()))?;

        Ok(out
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(ToString::to_string)
            .collect())
    }

    async fn address(&self, container: &str) -> Result<Option<String>, ApplicationError> {
        let out = self
            .runner
            .run(&self.docker([
                "inspect",
                "-f",
                "{{range .NetworkSettings.Networks}}{{.IPAddress}} {{end}}",
                container,
            ]))
            .await
            .map_err(|e| ApplicationError::Resolution(e.to_string()))?;

        Ok(out.split_whitespace().next().map(ToString::to_string))
    }

    async fn pid(&self, container: &str) -> Result<u32, ApplicationError> {
        let out = self
            .runner
            .run(&self.docker(["inspect", "-f", "{{.State.Pid}}", container]))
            .await?;

        match out.trim().parse::<u32>() {
            Ok(0) => Err(ApplicationError::Injection(format!(
                "container `{container}` is not running"
            ))),
            Ok(pid) => Ok(pid),
            Err(_) => Err(ApplicationError::Injection(format!(
                "unexpected pid for `{container}`: {}",
                out.trim()
            ))),
        }
    }

    fn peer_addresses(peers: &[Target]) -> Result<Vec<String>, ApplicationError> {
        let addresses: Vec<String> = peers.iter().filter_map(|t| t.address.clone()).collect();
        if addresses.is_empty() {
            let ids: Vec<&str> = peers.iter().map(|t| t.id.as_str()).collect();
            return Err(ApplicationError::Injection(format!(
                "no network address known for {}",
                ids.join(", ")
            )));
        }
        Ok(addresses)
    }

    fn unsupported(target: &FaultTarget, fault: &Fault) -> ApplicationError {
        ApplicationError::Injection(format!("cannot apply {fault} to {target}"))
    }

    async fn steps(&self, target: &FaultTarget, fault: &Fault) -> Result<Vec<Step>, ApplicationError> {
        let interface = self.config.interface.as_str();

        match (target, fault) {
            (FaultTarget::Node(t), Fault::Crash) => {
                Ok(vec![Step::irreversible(vec![self.docker(["stop", t.id.as_str()])])])
            },
            (FaultTarget::Node(t), Fault::Restart) => Ok(vec![Step::irreversible(vec![
                self.docker(["restart", t.id.as_str()]),
            ])]),
            (FaultTarget::Node(t), _) => {
                let shape = traffic_control::shape_interface(interface, fault)
                    .ok_or_else(|| Self::unsupported(target, fault))?;
                let pid = self.pid(&t.id).await?;
                Ok(vec![Step::new(
                    self.all_in_netns(pid, shape),
                    self.all_in_netns(pid, traffic_control::clear_interface(interface)),
                )])
            },
            (FaultTarget::Link { from, to }, _) => {
                let peers = Self::peer_addresses(to)?;
                let shape = traffic_control::shape_towards(interface, fault, &peers)
                    .ok_or_else(|| Self::unsupported(target, fault))?;
                let pid = self.pid(&from.id).await?;
                Ok(vec![Step::new(
                    self.all_in_netns(pid, shape),
                    self.all_in_netns(pid, traffic_control::clear_interface(interface)),
                )])
            },
            (FaultTarget::Partition { left, right, .. }, Fault::Partition) => {
                let peers = Self::peer_addresses(right)?;
                let mut steps = Vec::new();
                for source in left {
                    let pid = self.pid(&source.id).await?;
                    for peer in &peers {
                        steps.push(Step::new(
                            self.all_in_netns(pid, traffic_control::block_peer(peer)),
                            self.all_in_netns(pid, traffic_control::unblock_peer(peer)),
                        ));
                    }
                }
                Ok(steps)
            },
            (FaultTarget::Partition { .. }, _) => Err(Self::unsupported(target, fault)),
        }
    }
}

#[async_trait]
impl FaultInjectorPort for DockerFaultInjector {
    fn name(&self) -> &'static str {
        "docker"
    }

    #[instrument(skip(self))]
    async fn is_available(&self) -> bool {
        let available = self
            .runner
            .run(&self.docker(["version", "--format", "{{.Server.Version}}"]))
            .await
            .is_ok();
        debug!(available, "Docker availability probe");
        available
    }

    #[instrument(skip(self), fields(selector = %selector))]
    async fn resolve(&self, selector: &TargetSelector) -> Result<Vec<Target>, ApplicationError> {
        let names = match selector {
            TargetSelector::Service(name) => {
                let by_label = self
                    .container_names(&[format!("label={COMPOSE_SERVICE_LABEL}={name}")])
                    .await?;
                if by_label.is_empty() {
                    self.container_names(&[format!("name=^{name}$")]).await?
                } else {
                    by_label
                }
            },
            TargetSelector::Filter(filter) => {
                let filters: Vec<String> = filter
                    .terms()
                    .iter()
                    .map(|term| format!("label={term}"))
                    .collect();
                self.container_names(&filters).await?
            },
        };

        let selected_by = selector.to_string();
        let mut targets = Vec::with_capacity(names.len());
        for name in names {
            let target = Target::new(name.clone(), selected_by.clone());
            targets.push(match self.address(&name).await? {
                Some(ip) => target.with_address(ip),
                None => target,
            });
        }

        debug!(count = targets.len(), "Resolved containers");
        Ok(targets)
    }

    #[instrument(skip(self), fields(target = %target, fault = %fault))]
    async fn apply(&self, target: &FaultTarget, fault: &Fault) -> Result<FaultHandle, ApplicationError> {
        let steps = self.steps(target, fault).await?;
        let undo = UndoLog::execute(self.runner.as_ref(), steps).await?;

        let handle = FaultHandle::new(target.clone(), fault.clone());
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
    use domain::{Filter, Percentage, TimeSpan, TimeUnit};

    fn injector(runner: &Arc<ScriptedRunner>) -> DockerFaultInjector {
        DockerFaultInjector::with_runner(DockerConfig::default(), runner.clone())
    }

    fn loss(p: f64) -> Fault {
        Fault::Loss {
            percentage: Percentage::from_literal(p),
        }
    }

    #[tokio::test]
    async fn resolves_compose_service_with_address() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .on("label=com.docker.compose.service=api", "shop-api-1\nshop-api-2\n")
                .on("{{.IPAddress}}", "172.18.0.4 "),
        );
        let targets = injector(&runner)
            .resolve(&TargetSelector::Service("api".into()))
            .await
            .unwrap();

        assert_eq!(targets.len(), 2);
        assert_eq!(targets[0].id, "shop-api-1");
        assert_eq!(targets[0].address.as_deref(), Some("172.18.0.4"));
        assert_eq!(targets[1].selected_by, "api");
    }

    #[tokio::test]
    async fn falls_back_to_container_name() {
        let runner = Arc::new(ScriptedRunner::new().on("name=^db$", "db\n"));
        let targets = injector(&runner)
            .resolve(&TargetSelector::Service("db".into()))
            .await
            .unwrap();

        assert_eq!(targets.len(), 1);
        assert!(targets[0].address.is_none());
        assert!(runner.calls()[1].contains("--filter name=^db$"));
    }

    #[tokio::test]
    async fn filter_terms_become_label_filters() {
        let runner = Arc::new(ScriptedRunner::new());
        let filter = Filter::from_terms(vec![
            domain::FilterTerm::new("env", "prod"),
            domain::FilterTerm::new("tier", "web"),
        ]);
        let targets = injector(&runner)
            .resolve(&TargetSelector::Filter(filter))
            .await
            .unwrap();

        assert!(targets.is_empty());
        assert_eq!(
            runner.calls(),
            vec!["docker ps --filter label=env=prod --filter label=tier=web --format {{.Names}}"]
        );
    }

    #[tokio::test]
    async fn node_delay_runs_in_network_namespace_and_reverts() {
        let runner = Arc::new(ScriptedRunner::new().on("{{.State.Pid}}", "4242\n"));
        let injector = injector(&runner);
        let fault = Fault::Delay {
            latency: TimeSpan::from_literal(100.0, TimeUnit::Milliseconds),
            jitter: None,
        };

        let handle = injector
            .apply(&FaultTarget::Node(Target::new("api", "api")), &fault)
            .await
            .unwrap();
        injector.revert(&handle).await.unwrap();

        let calls = runner.calls();
        assert_eq!(
            calls[1],
            "nsenter -t 4242 -n tc qdisc replace dev eth0 root netem delay 100ms"
        );
        assert_eq!(calls[2], "nsenter -t 4242 -n tc qdisc del dev eth0 root");
    }

    #[tokio::test]
    async fn stopped_container_cannot_be_shaped() {
        let runner = Arc::new(ScriptedRunner::new().on("{{.State.Pid}}", "0"));
        let result = injector(&runner)
            .apply(&FaultTarget::Node(Target::new("api", "api")), &loss(5.0))
            .await;

        assert!(matches!(result, Err(ApplicationError::Injection(ref m)) if m.contains("not running")));
    }

    #[tokio::test]
    async fn crash_stops_container_and_leaves_nothing_to_revert() {
        let runner = Arc::new(ScriptedRunner::new());
        let injector = injector(&runner);

        let handle = injector
            .apply(&FaultTarget::Node(Target::new("api", "api")), &Fault::Crash)
            .await
            .unwrap();
        injector.revert(&handle).await.unwrap();

        assert_eq!(runner.calls(), vec!["docker stop api"]);
    }

    #[tokio::test]
    async fn link_needs_peer_addresses() {
        let runner = Arc::new(ScriptedRunner::new().on("{{.State.Pid}}", "7"));
        let target = FaultTarget::Link {
            from: Target::new("api", "api"),
            to: vec![Target::new("db", "db")],
        };

        let result = injector(&runner).apply(&target, &loss(10.0)).await;
        assert!(matches!(result, Err(ApplicationError::Injection(_))));
    }

    #[tokio::test]
    async fn partition_blocks_every_pair_and_rolls_back_on_failure() {
        let runner = Arc::new(
            ScriptedRunner::new()
                .on("{{.State.Pid}}", "11")
                .failing("-A INPUT -s 10.0.0.3", "iptables: busy"),
        );
        let target = FaultTarget::Partition {
            left_filter: Filter::single("env", "staging"),
            right_filter: Filter::single("env", "prod"),
            left: vec![Target::new("s1", "env=staging")],
            right: vec![
                Target::new("p1", "env=prod").with_address("10.0.0.2"),
                Target::new("p2", "env=prod").with_address("10.0.0.3"),
            ],
        };

        let injector = injector(&runner);
        let result = injector.apply(&target, &Fault::Partition).await;
        assert!(result.is_err());

        let calls = runner.calls();
        assert!(calls.contains(&"nsenter -t 11 -n iptables -D INPUT -s 10.0.0.2 -j DROP".to_string()));
        assert!(calls.contains(&"nsenter -t 11 -n iptables -D OUTPUT -d 10.0.0.3 -j DROP".to_string()));
        assert_eq!(injector.undo.live_count(), 0);
    }

    #[tokio::test]
    async fn availability_follows_docker_version() {
        let up = Arc::new(ScriptedRunner::new().on("version", "27.1.0"));
        assert!(injector(&up).is_available().await);

        let down = Arc::new(ScriptedRunner::new().failing("version", "Cannot connect"));
        assert!(!injector(&down).is_available().await);
    }
}
