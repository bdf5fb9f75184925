//! Solver launch configuration: where the binary lives and how each
//! algorithm turns into positional arguments.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::supervisor::SupervisorConfig;
use crate::validator::Phase;

pub const NEH_TOKEN: &str = "neh";
pub const ANNEALING_TOKEN: &str = "simulated_annealing";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("unknown algorithm `{0}`")]
    UnknownAlgorithm(String),
    #[error("algorithm `{algorithm}` has no parameter `{label}`")]
    UnknownParam { algorithm: String, label: String },
    #[error("parameter `{label}`: {value:?} is not a valid number")]
    InvalidValue { label: String, value: String },
    #[error("parameter `{label}`: {value} is outside [{min}, {max}]")]
    OutOfRange {
        label: String,
        value: String,
        min: String,
        max: String,
    },
}

/// One positional argument of an algorithm.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParamSpec {
    Fixed {
        value: String,
    },
    Int {
        label: String,
        default: i64,
        #[serde(default)]
        min: Option<i64>,
    },
    Float {
        label: String,
        default: f64,
        #[serde(default)]
        min: Option<f64>,
        #[serde(default)]
        max: Option<f64>,
    },
}

impl ParamSpec {
    pub fn label(&self) -> Option<&str> {
        match self {
            Self::Fixed { .. } => None,
            Self::Int { label, .. } | Self::Float { label, .. } => Some(label),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum ArgValue {
    Token(String),
    Int(i64),
    Float(f64),
}

impl ArgValue {
    fn render(&self) -> String {
        match self {
            Self::Token(token) => token.clone(),
            Self::Int(value) => value.to_string(),
            // `{:?}` keeps the decimal point on whole numbers.
            Self::Float(value) => format!("{value:?}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmSchema {
    pub name: String,
    pub params: Vec<ParamSpec>,
}

impl AlgorithmSchema {
    /// Positional arguments for the solver: `data` first, then one value per
    /// parameter. `overrides` maps parameter labels to user-supplied values.
    pub fn command_args(
        &self,
        data: &Path,
        overrides: &HashMap<String, String>,
    ) -> Result<Vec<String>, ConfigError> {
        let values = self.resolve(overrides)?;
        let mut args = Vec::with_capacity(values.len() + 1);
        args.push(data.display().to_string());
        args.extend(values.iter().map(ArgValue::render));
        Ok(args)
    }

    /// Algorithm phases the arguments select, for workload estimates. An
    /// annealing phase takes its iteration count from the next integer
    /// parameter.
    pub fn phases(&self, overrides: &HashMap<String, String>) -> Result<Vec<Phase>, ConfigError> {
        let values = self.resolve(overrides)?;
        let mut phases = Vec::new();
        for (index, value) in values.iter().enumerate() {
            match value {
                ArgValue::Token(token) if token == NEH_TOKEN => phases.push(Phase::Neh),
                ArgValue::Token(token) if token == ANNEALING_TOKEN => {
                    let iterations = values[index + 1..]
                        .iter()
                        .find_map(|v| match v {
                            ArgValue::Int(n) => u64::try_from(*n).ok(),
                            _ => None,
                        })
                        .unwrap_or(0);
                    phases.push(Phase::Annealing { iterations });
                }
                _ => {}
            }
        }
        Ok(phases)
    }

    fn resolve(&self, overrides: &HashMap<String, String>) -> Result<Vec<ArgValue>, ConfigError> {
        if let Some(label) = overrides
            .keys()
            .find(|label| !self.params.iter().any(|p| p.label() == Some(label.as_str())))
        {
            return Err(ConfigError::UnknownParam {
                algorithm: self.name.clone(),
                label: label.clone(),
            });
        }

        self.params
            .iter()
            .map(|param| match param {
                ParamSpec::Fixed { value } => Ok(ArgValue::Token(value.clone())),
                ParamSpec::Int {
                    label,
                    default,
                    min,
                } => {
                    let value = match overrides.get(label) {
                        Some(raw) => raw.trim().parse().map_err(|_| invalid(label, raw))?,
                        None => *default,
                    };
                    if min.is_some_and(|min| value < min) {
                        return Err(out_of_range(label, value, *min, None::<i64>));
                    }
                    Ok(ArgValue::Int(value))
                }
                ParamSpec::Float {
                    label,
                    default,
                    min,
                    max,
                } => {
                    let value = match overrides.get(label) {
                        Some(raw) => raw
                            .trim()
                            .parse::<f64>()
                            .ok()
                            .filter(|v| v.is_finite())
                            .ok_or_else(|| invalid(label, raw))?,
                        None => *default,
                    };
                    if min.is_some_and(|min| value < min) || max.is_some_and(|max| value > max) {
                        return Err(out_of_range(label, value, *min, *max));
                    }
                    Ok(ArgValue::Float(value))
                }
            })
            .collect()
    }
}

fn invalid(label: &str, raw: &str) -> ConfigError {
    ConfigError::InvalidValue {
        label: label.to_string(),
        value: raw.to_string(),
    }
}

fn out_of_range<T: ToString>(label: &str, value: T, min: Option<T>, max: Option<T>) -> ConfigError {
    let bound = |b: Option<T>, open: &str| b.map_or_else(|| open.to_string(), |b| b.to_string());
    ConfigError::OutOfRange {
        label: label.to_string(),
        value: value.to_string(),
        min: bound(min, "-inf"),
        max: bound(max, "inf"),
    }
}

/// Contents of the JSON config file. Every field has a default, so an empty
/// object is a valid config.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    pub solver: PathBuf,
    pub grace_period_ms: u64,
    pub follow_after_end: bool,
    pub algorithms: Vec<AlgorithmSchema>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            solver: PathBuf::from("pfsp_sdst"),
            grace_period_ms: 2000,
            follow_after_end: true,
            algorithms: default_algorithms(),
        }
    }
}

impl SolverConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Look up an algorithm by exact name, falling back to a
    /// case-insensitive match.
    pub fn algorithm(&self, name: &str) -> Result<&AlgorithmSchema, ConfigError> {
        self.algorithms
            .iter()
            .find(|a| a.name == name)
            .or_else(|| {
                self.algorithms
                    .iter()
                    .find(|a| a.name.eq_ignore_ascii_case(name))
            })
            .ok_or_else(|| ConfigError::UnknownAlgorithm(name.to_string()))
    }

    pub fn supervisor(&self) -> SupervisorConfig {
        SupervisorConfig {
            grace_period: Duration::from_millis(self.grace_period_ms),
            follow_after_end: self.follow_after_end,
        }
    }
}

fn fixed(value: &str) -> ParamSpec {
    ParamSpec::Fixed {
        value: value.to_string(),
    }
}

fn iterations(label: &str, default: i64) -> ParamSpec {
    ParamSpec::Int {
        label: label.to_string(),
        default,
        min: Some(1),
    }
}

fn float(label: &str, default: f64, min: f64, max: Option<f64>) -> ParamSpec {
    ParamSpec::Float {
        label: label.to_string(),
        default,
        min: Some(min),
        max,
    }
}

pub fn default_algorithms() -> Vec<AlgorithmSchema> {
    vec![
        AlgorithmSchema {
            name: "NEH".into(),
            params: vec![fixed(NEH_TOKEN)],
        },
        AlgorithmSchema {
            name: "Simulated Annealing".into(),
            params: vec![
                fixed(ANNEALING_TOKEN),
                iterations("Iterations", 50_000),
                float("T start", 100.0, 0.0, None),
                float("Cooling", 0.9975, 0.0, Some(1.0)),
            ],
        },
        AlgorithmSchema {
            name: "NEH + Simulated Annealing".into(),
            params: vec![
                fixed(NEH_TOKEN),
                fixed(ANNEALING_TOKEN),
                iterations("SA iterations", 25_000),
                float("SA T start", 80.0, 0.0, None),
                float("SA cooling", 0.995, 0.0, Some(1.0)),
            ],
        },
    ]
}
