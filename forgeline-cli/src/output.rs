//! Console output helpers

use colored::*;
use forgeline_runner::{PipelineError, RuntimeError, StateError};
use std::error::Error as StdError;

/// Prints an error chain and, when one applies, a hint on what to do next
pub fn print_error(err: &anyhow::Error) {
    eprintln!("{} {:#}", "✗ Error:".red().bold(), err);
    if let Some(hint) = hint_for(err) {
        eprintln!("  {} {}", "hint:".yellow().bold(), hint);
    }
}

/// Picks a hint for the most specific recognised cause
fn hint_for(err: &anyhow::Error) -> Option<String> {
    let mut stage_failed = false;

    for cause in err.chain() {
        if let Some(hint) = hint_for_cause(cause) {
            return Some(hint);
        }
        if matches!(cause.downcast_ref::<PipelineError>(), Some(PipelineError::Stage { .. })) {
            stage_failed = true;
        }
    }

    stage_failed.then(|| {
        "fix the problem and rerun `forgeline apply`; completed stages will be skipped".to_string()
    })
}

fn hint_for_cause(cause: &(dyn StdError + 'static)) -> Option<String> {
    if let Some(e) = cause.downcast_ref::<RuntimeError>() {
        return match e {
            RuntimeError::EngineUnavailable { .. } => Some(
                "start Docker, Colima, Podman or another Docker-compatible engine, \
                 or point FORGELINE_ENGINE_SOCKET at its socket"
                    .to_string(),
            ),
            RuntimeError::WaitTimeout { .. } => {
                Some("raise FORGELINE_WAIT_TIMEOUT if the command needs longer".to_string())
            }
            _ => None,
        };
    }

    if let Some(e) = cause.downcast_ref::<StateError>() {
        return match e {
            StateError::Locked { .. } => {
                Some("another forgeline run is using this checkpoint; wait for it to finish".to_string())
            }
            StateError::Corrupt { path, .. } | StateError::UnsupportedSchema { path, .. } => Some(format!(
                "inspect {} or discard it with `forgeline state clear`",
                path.display()
            )),
            _ => None,
        };
    }

    match cause.downcast_ref::<PipelineError>() {
        // `State` is transparent, so its inner error never appears in the chain
        Some(PipelineError::State(inner)) => return hint_for_cause(inner),
        Some(PipelineError::UnknownCheckpointStage { .. }) => {
            return Some("the checkpoint belongs to a different workflow; run `forgeline state clear`".to_string());
        }
        _ => {}
    }

    let message = cause.to_string();
    if message.contains(forgeline_runner::provider::TOKEN_ENV) {
        return Some(format!(
            "export {} with a personal access token that has the `api` scope",
            forgeline_runner::provider::TOKEN_ENV
        ));
    }
    if message.contains("AWS credentials directory not found") {
        return Some(
            "run `aws configure` to create ~/.aws, or point FORGELINE_AWS_CONFIG_DIR elsewhere".to_string(),
        );
    }

    None
}

/// Prints a labelled value line
pub fn field(label: &str, value: impl std::fmt::Display) {
    println!("  {:<10} {}", format!("{}:", label), value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_hint_for_locked_checkpoint() {
        let err = anyhow::Error::new(PipelineError::State(StateError::Locked {
            path: PathBuf::from(".forgeline.state.json"),
            lock_path: PathBuf::from(".forgeline.state.json.lock"),
        }));
        assert!(hint_for(&err).unwrap().contains("another forgeline run"));
    }

    #[test]
    fn test_hint_for_corrupt_checkpoint() {
        let source = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err = anyhow::Error::new(PipelineError::State(StateError::Corrupt {
            path: PathBuf::from("run.json"),
            source,
        }));
        assert!(hint_for(&err).unwrap().contains("forgeline state clear"));
    }

    #[test]
    fn test_hint_for_engine_inside_stage_failure() {
        let inner = anyhow::Error::new(RuntimeError::EngineUnavailable {
            tried: vec!["environment".to_string()],
            last: Box::new(RuntimeError::Connect {
                endpoint: "environment".to_string(),
                message: "refused".to_string(),
            }),
        })
        .context("Failed to connect to a container engine");
        let err = anyhow::Error::new(PipelineError::Stage {
            stage: "provision".to_string(),
            source: inner.into(),
        });

        assert!(hint_for(&err).unwrap().contains("FORGELINE_ENGINE_SOCKET"));
    }

    #[test]
    fn test_hint_for_plain_stage_failure() {
        let err = anyhow::Error::new(PipelineError::Stage {
            stage: "scaffold".to_string(),
            source: anyhow::anyhow!("disk full").into(),
        });
        assert!(hint_for(&err).unwrap().contains("rerun"));
    }

    #[test]
    fn test_no_hint_for_unrelated_error() {
        assert!(hint_for(&anyhow::anyhow!("something else")).is_none());
    }
}
