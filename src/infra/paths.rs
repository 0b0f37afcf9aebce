// src/infra/paths.rs — Config discovery and artifact layout
//
// Config lookup respects SELFEVOLVE_HOME for isolation. Artifact paths are
// derived from the experiment root and never from global state, so tests can
// point a run at a temp directory.

use directories::ProjectDirs;
use std::path::{Path, PathBuf};

use crate::core::types::{ProblemId, Stage, Task};

pub const CONFIG_FILE_NAME: &str = "selfevolve.toml";
pub const EXPERIMENT_CONFIG_FILE: &str = "config.json";
pub const EXPERIMENT_RESULT_FILE: &str = "result.json";
pub const RESULT_RECORD_FILE: &str = "result.txt";
pub const LOG_FILE: &str = "log.json";

/// Returns the SELFEVOLVE_HOME override, if set.
fn selfevolve_home() -> Option<PathBuf> {
    std::env::var_os("SELFEVOLVE_HOME").map(PathBuf::from)
}

/// Per-user config directory: $SELFEVOLVE_HOME or the platform config dir.
pub fn config_dir() -> Option<PathBuf> {
    if let Some(home) = selfevolve_home() {
        return Some(home);
    }
    ProjectDirs::from("", "", "selfevolve").map(|d| d.config_dir().to_path_buf())
}

/// First existing config file: ./selfevolve.toml, then the per-user config.toml.
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from(CONFIG_FILE_NAME);
    if local.is_file() {
        return Some(local);
    }
    config_dir()
        .map(|d| d.join("config.toml"))
        .filter(|p| p.is_file())
}

/// `{artifacts_dir}/{experiment}` and the files directly under it.
#[derive(Debug, Clone)]
pub struct ExperimentLayout {
    root: PathBuf,
}

impl ExperimentLayout {
    pub fn new(artifacts_dir: impl AsRef<Path>, experiment_name: &str) -> Self {
        Self {
            root: artifacts_dir.as_ref().join(experiment_name),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_file(&self) -> PathBuf {
        self.root.join(EXPERIMENT_CONFIG_FILE)
    }

    pub fn result_file(&self) -> PathBuf {
        self.root.join(EXPERIMENT_RESULT_FILE)
    }

    pub fn problem(&self, id: &ProblemId) -> ProblemLayout {
        ProblemLayout {
            root: self.root.join(id.to_string()),
        }
    }
}

/// `{experiment}/{category}_{NNN}` and its log tree.
#[derive(Debug, Clone)]
pub struct ProblemLayout {
    root: PathBuf,
}

impl ProblemLayout {
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn result_record(&self) -> PathBuf {
        self.root.join(RESULT_RECORD_FILE)
    }

    /// `logs/initial` for index 0, `logs/correction/{index:02}` otherwise.
    pub fn attempt_dir(&self, stage: Stage, index: u32) -> PathBuf {
        let logs = self.root.join("logs");
        match stage {
            Stage::Initial => logs.join("initial"),
            Stage::Correction => logs.join("correction").join(format!("{:02}", index)),
        }
    }
}

/// `{attempt_dir}/{cot|code}/log.json`
pub fn request_log_file(attempt_dir: &Path, task: Task) -> PathBuf {
    attempt_dir.join(task.log_subdir()).join(LOG_FILE)
}
