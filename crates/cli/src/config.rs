//! `~/.driftscope.yaml` loading and flag overrides.

use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use driftscope_core::reconcile::DEFAULT_STUCK_AFTER_SECS;
use driftscope_store::DEFAULT_PAGE_SIZE;

pub const CONFIG_FILE: &str = ".driftscope.yaml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Config {
    pub kubeconfig: Option<String>,
    pub context: Option<String>,
    pub namespace: Option<String>,
    pub all_namespaces: bool,
    pub page_size: u32,
    /// In-flight reconciliations older than this are reported as stuck.
    pub stuck_after_secs: i64,
    /// Skip per-kind object counts in `crds` (one list call per kind).
    pub disable_counts: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kubeconfig: None,
            context: None,
            namespace: None,
            all_namespaces: false,
            page_size: DEFAULT_PAGE_SIZE,
            stuck_after_secs: DEFAULT_STUCK_AFTER_SECS,
            disable_counts: true,
        }
    }
}

/// Command-line values that take precedence over the file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub kubeconfig: Option<String>,
    pub context: Option<String>,
    pub namespace: Option<String>,
    pub all_namespaces: bool,
    pub page_size: Option<u32>,
    pub counts: bool,
}

pub fn default_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(CONFIG_FILE))
}

impl Config {
    pub fn from_yaml(s: &str) -> Result<Self, serde_yaml::Error> {
        if s.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(s)
    }

    /// Missing file gives defaults; an unreadable or malformed one is logged
    /// and ignored.
    pub fn load(path: Option<&Path>) -> Self {
        let Some(path) = path.map(Path::to_path_buf).or_else(default_path) else {
            return Self::default();
        };
        let text = match std::fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "no config file");
                return Self::default();
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "cannot read config; using defaults");
                return Self::default();
            }
        };
        match Self::from_yaml(&text) {
            Ok(cfg) => {
                debug!(path = %path.display(), "config loaded");
                cfg
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "malformed config; using defaults");
                Self::default()
            }
        }
    }

    pub fn apply(&mut self, o: Overrides) {
        if o.kubeconfig.is_some() {
            self.kubeconfig = o.kubeconfig;
        }
        if o.context.is_some() {
            self.context = o.context;
        }
        if o.namespace.is_some() {
            self.namespace = o.namespace;
            self.all_namespaces = false;
        }
        if o.all_namespaces {
            self.all_namespaces = true;
        }
        if let Some(p) = o.page_size.filter(|p| *p > 0) {
            self.page_size = p;
        }
        if o.counts {
            self.disable_counts = false;
        }
    }

    /// Namespace to list in; `None` means all namespaces.
    pub fn scope(&self, context_default: &str) -> Option<String> {
        if self.all_namespaces {
            return None;
        }
        Some(self.namespace.clone().unwrap_or_else(|| context_default.to_string()))
    }

    pub fn stuck_after(&self) -> Duration {
        Duration::seconds(self.stuck_after_secs.max(0))
    }
}
