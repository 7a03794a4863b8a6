//! Research Graph Engine
//!
//! Off-thread analytics for research knowledge graphs (claims, evidence,
//! hypotheses and their relations):
//! - Degree, betweenness and closeness centrality
//! - Topology metrics (density, components, clustering, path length)
//! - Force-directed layout with Barnes-Hut repulsion for large graphs
//! - Community detection (connected components or Louvain) with modularity
//! - Shortest paths
//!
//! Requests are served by an [`worker::AnalyticsWorker`] running on a
//! dedicated thread, either in-process or as a JSON-lines subprocess.

pub mod error;
pub mod graph;
pub mod worker;

pub use error::EngineError;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

use graph::models::{CentralityOptions, LayoutOptions, Validate};
use worker::{AnalysisDefaults, WorkerConfig};

// ============================================================================
// YAML config structs (deserialization targets)
// ============================================================================

/// Top-level YAML configuration file structure
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub worker: WorkerYamlConfig,
    pub layout: LayoutYamlConfig,
    pub centrality: CentralityYamlConfig,
}

/// Worker thread section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerYamlConfig {
    pub queue_capacity: usize,
    pub thread_name: String,
}

impl Default for WorkerYamlConfig {
    fn default() -> Self {
        let worker = WorkerConfig::default();
        Self {
            queue_capacity: worker.queue_capacity,
            thread_name: worker.thread_name,
        }
    }
}

/// Layout defaults section, applied when a request omits an option
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LayoutYamlConfig {
    pub iterations: usize,
    pub repulsion_strength: f64,
    pub attraction_strength: f64,
    pub barnes_hut_threshold: usize,
    pub theta: f64,
}

impl Default for LayoutYamlConfig {
    fn default() -> Self {
        let layout = LayoutOptions::default();
        Self {
            iterations: layout.iterations,
            repulsion_strength: layout.repulsion_strength,
            attraction_strength: layout.attraction_strength,
            barnes_hut_threshold: layout.barnes_hut_threshold,
            theta: layout.theta,
        }
    }
}

/// Centrality section
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CentralityYamlConfig {
    /// Node count from which per-node passes run on the rayon pool
    pub parallel_threshold: usize,
    /// Node count above which betweenness is estimated from sampled sources
    pub betweenness_sample_threshold: usize,
}

impl Default for CentralityYamlConfig {
    fn default() -> Self {
        let centrality = CentralityOptions::default();
        Self {
            parallel_threshold: centrality.parallel_threshold,
            betweenness_sample_threshold: centrality.sample_threshold,
        }
    }
}

// ============================================================================
// Runtime config (what the application actually uses)
// ============================================================================

/// Application configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub worker: WorkerConfig,
    pub defaults: AnalysisDefaults,
}

impl Config {
    /// Load configuration from an optional YAML file, then override with env vars.
    ///
    /// Priority: env var > YAML > default
    ///
    /// If `yaml_path` is None, tries "config.yaml" in CWD. If the file doesn't
    /// exist, falls back to pure env var / defaults.
    pub fn from_yaml_and_env(yaml_path: Option<&Path>) -> Result<Self> {
        // 1. Load YAML config (or defaults if file not found)
        let yaml = Self::load_yaml(yaml_path);

        // 2. Apply env var overrides
        let queue_capacity = env_parse("GRAPH_ENGINE_QUEUE_CAPACITY")?
            .unwrap_or(yaml.worker.queue_capacity);
        if queue_capacity == 0 {
            bail!("worker.queue_capacity must be at least 1");
        }
        let barnes_hut_threshold = env_parse("GRAPH_ENGINE_BARNES_HUT_THRESHOLD")?
            .unwrap_or(yaml.layout.barnes_hut_threshold);

        let layout = LayoutOptions {
            iterations: yaml.layout.iterations,
            repulsion_strength: yaml.layout.repulsion_strength,
            attraction_strength: yaml.layout.attraction_strength,
            seed: None,
            theta: yaml.layout.theta,
            barnes_hut_threshold,
        };
        layout
            .validate()
            .context("Invalid layout section in configuration")?;

        let centrality = CentralityOptions {
            sample_sources: None,
            parallel_threshold: yaml.centrality.parallel_threshold,
            sample_threshold: yaml.centrality.betweenness_sample_threshold,
        };

        Ok(Self {
            worker: WorkerConfig {
                queue_capacity,
                thread_name: yaml.worker.thread_name,
            },
            defaults: AnalysisDefaults {
                centrality,
                layout,
                community: Default::default(),
            },
        })
    }

    /// Try to load and parse a YAML config file. Returns defaults on any failure.
    fn load_yaml(yaml_path: Option<&Path>) -> YamlConfig {
        let default_path = Path::new("config.yaml");
        let path = yaml_path.unwrap_or(default_path);

        match std::fs::read_to_string(path) {
            Ok(contents) => match serde_yaml::from_str(&contents) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}. Using defaults.", path.display(), e);
                    YamlConfig::default()
                }
            },
            Err(_) => {
                tracing::debug!(
                    "No config file at {}, using env vars / defaults",
                    path.display()
                );
                YamlConfig::default()
            }
        }
    }
}

/// Parse an optional numeric env var; a set but malformed value is an error.
fn env_parse(name: &str) -> Result<Option<usize>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<usize>()
            .map(Some)
            .with_context(|| format!("{} must be a non-negative integer, got '{}'", name, raw)),
        Err(_) => Ok(None),
    }
}

// ============================================================================
// Tests
// ============================================================================
