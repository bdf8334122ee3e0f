//! Terraform provisioner
//!
//! Runs Terraform from its official image against the scaffolded module:
//! `init`, `plan`, and with auto-approve a state backup followed by
//! `apply`. Each phase runs in its own container; only the `apply`
//! container is retained. Container names carry a fresh attempt tag, so a
//! container stranded by an earlier attempt never blocks a retry.

use crate::engine::ContainerRuntime;
use crate::provider::Provisioner;
use anyhow::{Context, Result};
use async_trait::async_trait;
use forgeline_core::RunOptions;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Working directory inside the container
const WORKSPACE_DIR: &str = "/workspace";

/// Where the host's AWS configuration is mounted
const CONTAINER_AWS_DIR: &str = "/home/terraform/.aws";

const STATE_FILE: &str = "terraform.tfstate";

/// One provisioning invocation
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    /// The scaffolded module
    pub working_dir: PathBuf,
    pub region: String,
    /// Apply the plan instead of only validating it
    pub auto_approve: bool,
    /// Short tag shared by every container of this run
    pub run_tag: String,
}

/// Container name for one Terraform phase of one provisioning attempt
pub fn phase_container_name(run_tag: &str, phase: &str, attempt: &str) -> String {
    format!("forgeline-tf-{}-{}-{}", run_tag, phase, attempt)
}

fn attempt_tag() -> String {
    let mut tag = Uuid::new_v4().simple().to_string();
    tag.truncate(8);
    tag
}

/// Terraform in a container
pub struct TerraformProvisioner {
    runtime: Arc<dyn ContainerRuntime>,
    image: String,
    credentials_dir: Option<PathBuf>,
}

impl TerraformProvisioner {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, image: impl Into<String>) -> Self {
        Self {
            runtime,
            image: image.into(),
            credentials_dir: None,
        }
    }

    /// Uses `dir` as the AWS configuration directory instead of `~/.aws`
    pub fn with_credentials_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.credentials_dir = Some(dir.into());
        self
    }

    fn credentials_dir(&self) -> Result<PathBuf> {
        let dir = match &self.credentials_dir {
            Some(dir) => dir.clone(),
            None => crate::engine::endpoint::home_dir().join(".aws"),
        };

        if !dir.is_dir() {
            anyhow::bail!(
                "AWS credentials directory not found: {}. Please configure AWS credentials",
                dir.display()
            );
        }
        Ok(dir)
    }

    fn base_options(&self, workspace: &Path, aws_dir: &Path, region: &str) -> RunOptions {
        let mut opts = RunOptions::new(self.image.clone())
            .with_mount(workspace, WORKSPACE_DIR)
            .with_read_only_mount(aws_dir, CONTAINER_AWS_DIR)
            .with_env("AWS_SHARED_CREDENTIALS_FILE", format!("{}/credentials", CONTAINER_AWS_DIR))
            .with_env("AWS_CONFIG_FILE", format!("{}/config", CONTAINER_AWS_DIR))
            .with_env("AWS_DEFAULT_REGION", region)
            .with_env("AWS_REGION", region)
            .with_working_dir(WORKSPACE_DIR);

        if let Some(user) = host_user() {
            opts = opts.with_user(user);
        }
        opts
    }

    /// Runs one Terraform command to completion, forwarding its output
    async fn run_phase(&self, phase: &str, opts: RunOptions) -> Result<()> {
        let command = format!("terraform {}", opts.command.join(" "));
        info!("Executing {}", command);

        let mut handle = self
            .runtime
            .run_container(opts)
            .await
            .with_context(|| format!("Failed to start terraform {}", phase))?;

        let mut read_error = None;
        while let Some(line) = handle.next_line().await {
            match line {
                Ok(line) => info!(target: "terraform", "{}", line),
                Err(e) => {
                    read_error = Some(e);
                    break;
                }
            }
        }

        handle
            .finish()
            .await
            .with_context(|| format!("terraform {} failed", phase))?;

        if let Some(e) = read_error {
            return Err(e).context("Error reading container output");
        }

        info!("{} completed successfully", command);
        Ok(())
    }
}

#[async_trait]
impl Provisioner for TerraformProvisioner {
    async fn provision(&self, request: &ProvisionRequest) -> Result<()> {
        if !request.working_dir.is_dir() {
            anyhow::bail!(
                "scaffold directory does not exist: {}",
                request.working_dir.display()
            );
        }

        info!("Starting infrastructure provisioning in {}", request.working_dir.display());

        self.runtime
            .pull_image(&self.image)
            .await
            .context("Failed to pull Terraform image")?;

        let workspace = std::path::absolute(&request.working_dir).with_context(|| {
            format!("Failed to resolve {}", request.working_dir.display())
        })?;
        let aws_dir = self.credentials_dir()?;
        let base = self.base_options(&workspace, &aws_dir, &request.region);
        let attempt = attempt_tag();
        debug!(run_tag = %request.run_tag, attempt = %attempt, "Naming containers for this attempt");

        let init = base
            .clone()
            .with_command(["init", "-input=false"])
            .with_name(phase_container_name(&request.run_tag, "init", &attempt));
        self.run_phase("init", init).await?;

        let plan = base
            .clone()
            .with_command(["plan", "-input=false"])
            .with_name(phase_container_name(&request.run_tag, "plan", &attempt));
        self.run_phase("plan", plan).await?;

        if !request.auto_approve {
            info!("Infrastructure validated, use auto-approve to provision");
            return Ok(());
        }

        if let Err(e) = backup_state_file(&workspace) {
            warn!("Failed to back up state file before apply: {:#}", e);
        }

        let apply = base
            .with_command(["apply", "-auto-approve", "-input=false"])
            .with_name(phase_container_name(&request.run_tag, "apply", &attempt))
            .retained(true);
        self.run_phase("apply", apply).await?;

        info!("Infrastructure provisioning completed successfully");
        Ok(())
    }
}

/// Copies `terraform.tfstate` to a timestamped backup next to it
///
/// # Returns
/// The backup path, or `None` when there is no state yet
fn backup_state_file(workspace: &Path) -> Result<Option<PathBuf>> {
    let state = workspace.join(STATE_FILE);
    if !state.exists() {
        debug!("No state file to back up at {}", state.display());
        return Ok(None);
    }

    let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
    let backup = workspace.join(format!("{}.backup.{}", STATE_FILE, stamp));
    std::fs::copy(&state, &backup)
        .with_context(|| format!("Failed to copy {} to {}", state.display(), backup.display()))?;

    info!("State file backed up to {}", backup.display());
    Ok(Some(backup))
}

/// `uid:gid` of this process, so files Terraform writes stay owned by the host user
#[cfg(unix)]
fn host_user() -> Option<String> {
    let (uid, gid) = unsafe { (libc::getuid(), libc::getgid()) };
    Some(format!("{}:{}", uid, gid))
}

#[cfg(not(unix))]
fn host_user() -> Option<String> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::testing::FakeEngine;
    use crate::engine::{ContainerEngine, EngineRuntime};
    use std::time::Duration;
    use tempfile::TempDir;

    struct Fixture {
        engine: Arc<FakeEngine>,
        provisioner: TerraformProvisioner,
        workspace: TempDir,
        _aws: TempDir,
    }

    fn fixture(engine: FakeEngine) -> Fixture {
        let engine = Arc::new(engine);
        let runtime = EngineRuntime::new(engine.clone(), Duration::from_secs(5), Duration::from_secs(1));
        let aws = TempDir::new().unwrap();
        let provisioner = TerraformProvisioner::new(Arc::new(runtime), "hashicorp/terraform:1.8.0")
            .with_credentials_dir(aws.path());

        Fixture {
            engine,
            provisioner,
            workspace: TempDir::new().unwrap(),
            _aws: aws,
        }
    }

    fn request(dir: &Path, auto_approve: bool) -> ProvisionRequest {
        ProvisionRequest {
            working_dir: dir.to_path_buf(),
            region: "eu-west-1".to_string(),
            auto_approve,
            run_tag: "0b6c1f5e".to_string(),
        }
    }

    #[tokio::test]
    async fn test_plan_only_without_auto_approve() {
        let fx = fixture(FakeEngine::new());
        fx.provisioner
            .provision(&request(fx.workspace.path(), false))
            .await
            .unwrap();

        assert_eq!(fx.engine.pulled(), vec!["hashicorp/terraform:1.8.0"]);
        let created = fx.engine.created();
        let commands: Vec<&str> = created.iter().map(|o| o.command[0].as_str()).collect();
        assert_eq!(commands, vec!["init", "plan"]);
        assert!(created.iter().all(|o| !o.retain));
        assert_eq!(fx.engine.removed().len(), 2);
    }

    #[tokio::test]
    async fn test_apply_is_the_only_retained_phase() {
        let fx = fixture(FakeEngine::new());
        fx.provisioner
            .provision(&request(fx.workspace.path(), true))
            .await
            .unwrap();

        let created = fx.engine.created();
        assert_eq!(created.len(), 3);
        assert_eq!(created[2].command, vec!["apply", "-auto-approve", "-input=false"]);
        assert_eq!(
            created.iter().map(|o| o.retain).collect::<Vec<_>>(),
            vec![false, false, true]
        );

        let names: Vec<String> = created.iter().filter_map(|o| o.name.clone()).collect();
        assert!(names[0].starts_with("forgeline-tf-0b6c1f5e-init-"));
        let attempt = names[0].rsplit('-').next().unwrap();
        assert_eq!(names[1], format!("forgeline-tf-0b6c1f5e-plan-{}", attempt));
        assert_eq!(names[2], format!("forgeline-tf-0b6c1f5e-apply-{}", attempt));

        assert_eq!(fx.engine.removed().len(), 2);
    }

    #[tokio::test]
    async fn test_container_environment() {
        let fx = fixture(FakeEngine::new());
        fx.provisioner
            .provision(&request(fx.workspace.path(), false))
            .await
            .unwrap();

        let init = &fx.engine.created()[0];
        assert_eq!(init.working_dir.as_deref(), Some(WORKSPACE_DIR));
        assert_eq!(init.env["AWS_REGION"], "eu-west-1");
        assert_eq!(init.env["AWS_DEFAULT_REGION"], "eu-west-1");
        assert_eq!(
            init.env["AWS_SHARED_CREDENTIALS_FILE"],
            "/home/terraform/.aws/credentials"
        );
        assert_eq!(init.mounts[0].container_path, WORKSPACE_DIR);
        assert!(init.mounts[0].host_path.is_absolute());
        assert!(init.mounts[1].read_only);
        #[cfg(unix)]
        assert!(init.user.is_some());
    }

    #[tokio::test]
    async fn test_failed_plan_stops_before_apply() {
        let fx = fixture(FakeEngine::new().exiting_with([0, 1]));
        let err = fx
            .provisioner
            .provision(&request(fx.workspace.path(), true))
            .await
            .unwrap_err();

        assert!(format!("{:#}", err).contains("terraform plan failed"));
        assert_eq!(fx.engine.created().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_workspace_fails_before_pull() {
        let fx = fixture(FakeEngine::new());
        let missing = fx.workspace.path().join("absent");
        let err = fx.provisioner.provision(&request(&missing, false)).await.unwrap_err();

        assert!(err.to_string().contains("scaffold directory does not exist"));
        assert!(fx.engine.pulled().is_empty());
    }

    #[tokio::test]
    async fn test_missing_credentials_dir() {
        let fx = fixture(FakeEngine::new());
        let provisioner = TerraformProvisioner::new(
            Arc::new(EngineRuntime::new(
                fx.engine.clone(),
                Duration::from_secs(1),
                Duration::from_secs(1),
            )),
            "hashicorp/terraform:1.8.0",
        )
        .with_credentials_dir(fx.workspace.path().join("no-aws"));

        let err = provisioner
            .provision(&request(fx.workspace.path(), false))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("AWS credentials directory not found"));
        assert!(fx.engine.created().is_empty());
    }

    #[tokio::test]
    async fn test_pull_failure_is_wrapped() {
        let fx = fixture(FakeEngine::new().failing_pull());
        let err = fx
            .provisioner
            .provision(&request(fx.workspace.path(), false))
            .await
            .unwrap_err();

        assert!(err.to_string().contains("Failed to pull Terraform image"));
    }

    #[tokio::test]
    async fn test_retry_is_not_blocked_by_stranded_container() {
        let engine = Arc::new(
            FakeEngine::new()
                .with_wait_delay(Duration::from_secs(3600))
                .failing_remove(),
        );
        let runtime = EngineRuntime::new(engine.clone(), Duration::from_millis(50), Duration::from_millis(50));
        let aws = TempDir::new().unwrap();
        let workspace = TempDir::new().unwrap();
        let provisioner = TerraformProvisioner::new(Arc::new(runtime), "tf").with_credentials_dir(aws.path());

        let first = provisioner
            .provision(&request(workspace.path(), false))
            .await
            .unwrap_err();
        assert!(format!("{:#}", first).contains("timed out"));

        // The init container of the first attempt is still present
        let second = provisioner
            .provision(&request(workspace.path(), false))
            .await
            .unwrap_err();
        let message = format!("{:#}", second);
        assert!(!message.contains("already in use"), "{}", message);
        assert!(message.contains("timed out"));

        let created = engine.created();
        assert_eq!(created.len(), 2);
        assert_ne!(created[0].name, created[1].name);
    }

    #[tokio::test]
    async fn test_engine_rejects_reused_name() {
        let engine = FakeEngine::new().failing_remove();
        let opts = RunOptions::new("tf").with_name(phase_container_name("0b6c1f5e", "init", "aaaa"));

        engine.create_container(&opts).await.unwrap();
        let err = engine.create_container(&opts).await.unwrap_err();
        assert!(err.to_string().contains("already in use"));
    }

    #[test]
    fn test_backup_state_file() {
        let dir = TempDir::new().unwrap();
        assert!(backup_state_file(dir.path()).unwrap().is_none());

        std::fs::write(dir.path().join(STATE_FILE), b"{\"version\": 4}").unwrap();
        let backup = backup_state_file(dir.path()).unwrap().unwrap();

        let name = backup.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("terraform.tfstate.backup."));
        assert_eq!(std::fs::read(&backup).unwrap(), b"{\"version\": 4}");
    }
}
