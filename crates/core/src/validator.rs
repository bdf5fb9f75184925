//! Pre-flight check of an instance file before the solver is launched.
//!
//! The file starts with `jobs = <n>` and `machines = <m>` headers, followed by
//! a `proc_time =` section and a `setup_time =` section holding one
//! `# machine <k>` matrix per machine. Only the structure is checked here;
//! the matrices themselves are left to the solver.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Above this many jobs the constructive phase gets slow.
pub const NEH_JOB_LIMIT: u32 = 800;
/// Above this many jobs annealing gets slow regardless of iterations.
pub const ANNEALING_JOB_LIMIT: u32 = 500;
/// Upper bound on `iterations * jobs * machines` for annealing.
pub const ANNEALING_WORK_LIMIT: u64 = 100_000_000;

const MACHINE_HEADER: &str = "# machine";

/// Why an instance file was rejected. The `Display` text is meant to be shown
/// to the user as is.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Error: not a file: {}", .0.display())]
    NotAFile(PathBuf),
    #[error("Error: missing '=' in '{0}'.")]
    MissingEquals(&'static str),
    #[error("Error: '{header}' is not a number: {value:?}.")]
    InvalidNumber { header: &'static str, value: String },
    #[error("Error: jobs/machines must be > 0.")]
    NonPositiveDimensions,
    #[error("Error: missing section 'proc_time ='.")]
    MissingProcTime,
    #[error("Error: missing section 'setup_time ='.")]
    MissingSetupTime,
    #[error("Error: missing matrix for machine {0}.")]
    MissingMachineMatrix(u32),
    #[error("Read error: {0}")]
    Io(#[from] io::Error),
}

/// Dimensions of a structurally valid instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceSummary {
    pub jobs: u32,
    pub machines: u32,
}

/// An algorithm phase the solver will run, for workload estimates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Neh,
    Annealing { iterations: u64 },
}

/// A run that is likely to take a long time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadWarning {
    LargeNeh { jobs: u32 },
    HeavyAnnealing { work: u64, jobs: u32 },
}

impl fmt::Display for WorkloadWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LargeNeh { jobs } => write!(f, "NEH phase: large number of jobs ({jobs})."),
            Self::HeavyAnnealing { work, jobs } => write!(
                f,
                "SA phase: high complexity ({work} iteration-operations, {jobs} jobs)."
            ),
        }
    }
}

impl InstanceSummary {
    pub fn workload_warnings(&self, phases: &[Phase]) -> Vec<WorkloadWarning> {
        let mut warnings = Vec::new();
        for phase in phases {
            match *phase {
                Phase::Neh if self.jobs > NEH_JOB_LIMIT => {
                    warnings.push(WorkloadWarning::LargeNeh { jobs: self.jobs });
                }
                Phase::Annealing { iterations } => {
                    let work = iterations
                        .saturating_mul(u64::from(self.jobs))
                        .saturating_mul(u64::from(self.machines));
                    if work > ANNEALING_WORK_LIMIT || self.jobs > ANNEALING_JOB_LIMIT {
                        warnings.push(WorkloadWarning::HeavyAnnealing {
                            work,
                            jobs: self.jobs,
                        });
                    }
                }
                Phase::Neh => {}
            }
        }
        warnings
    }
}

pub fn validate_instance(path: impl AsRef<Path>) -> Result<InstanceSummary, ValidationError> {
    let path = path.as_ref();
    if !path.is_file() {
        return Err(ValidationError::NotAFile(path.to_path_buf()));
    }
    let text = fs::read_to_string(path)?;
    validate_text(&text)
}

/// Same checks as [`validate_instance`] on in-memory contents.
pub fn validate_text(text: &str) -> Result<InstanceSummary, ValidationError> {
    let mut jobs: i64 = 0;
    let mut machines: i64 = 0;
    let mut has_proc_time = false;
    let mut has_setup_time = false;
    let mut machine_headers = HashSet::new();

    for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with("jobs") {
            jobs = header_value(line, "jobs")?;
        } else if line.starts_with("machines") {
            machines = header_value(line, "machines")?;
        } else if line.starts_with("proc_time") {
            has_proc_time = line.contains('=');
        } else if line.starts_with("setup_time") {
            has_setup_time = line.contains('=');
        } else if let Some(rest) = line.strip_prefix(MACHINE_HEADER) {
            if let Ok(index) = rest.trim().parse::<u32>() {
                machine_headers.insert(index);
            }
        }
    }

    if jobs <= 0 || machines <= 0 {
        return Err(ValidationError::NonPositiveDimensions);
    }
    if !has_proc_time {
        return Err(ValidationError::MissingProcTime);
    }
    if !has_setup_time {
        return Err(ValidationError::MissingSetupTime);
    }

    let jobs = to_count(jobs, "jobs")?;
    let machines = to_count(machines, "machines")?;
    if let Some(missing) = (1..=machines).find(|k| !machine_headers.contains(k)) {
        return Err(ValidationError::MissingMachineMatrix(missing));
    }

    Ok(InstanceSummary { jobs, machines })
}

fn header_value(line: &str, header: &'static str) -> Result<i64, ValidationError> {
    let Some((_, rest)) = line.split_once('=') else {
        return Err(ValidationError::MissingEquals(header));
    };
    let value = rest.split('=').next().unwrap_or_default().trim();
    value.parse().map_err(|_| ValidationError::InvalidNumber {
        header,
        value: value.to_string(),
    })
}

fn to_count(value: i64, header: &'static str) -> Result<u32, ValidationError> {
    u32::try_from(value).map_err(|_| ValidationError::InvalidNumber {
        header,
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    const VALID: &str = "\
jobs = 3
machines = 2

proc_time =
4 5
3 6
7 2

setup_time =
# machine 1
0 1 2
1 0 3
2 3 0
# machine 2
0 2 2
1 0 1
2 1 0
";

    #[test]
    fn accepts_well_formed_instance() {
        let summary = validate_text(VALID).unwrap();
        assert_eq!(summary, InstanceSummary { jobs: 3, machines: 2 });
    }

    #[test]
    fn reads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(VALID.as_bytes()).unwrap();
        assert_eq!(validate_instance(file.path()).unwrap().machines, 2);
    }

    #[test]
    fn missing_path_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = validate_instance(dir.path().join("nope.txt")).unwrap_err();
        assert!(matches!(err, ValidationError::NotAFile(_)));
        // A directory is not a file either.
        assert!(matches!(
            validate_instance(dir.path()).unwrap_err(),
            ValidationError::NotAFile(_)
        ));
    }

    #[test]
    fn header_without_equals() {
        let err = validate_text("jobs 3\nmachines = 2").unwrap_err();
        assert!(matches!(err, ValidationError::MissingEquals("jobs")));
        assert_eq!(err.to_string(), "Error: missing '=' in 'jobs'.");
    }

    #[test]
    fn non_numeric_header() {
        let err = validate_text("jobs = three\nmachines = 2").unwrap_err();
        assert!(matches!(err, ValidationError::InvalidNumber { header: "jobs", .. }));
    }

    #[test]
    fn zero_dimensions() {
        let text = VALID.replace("machines = 2", "machines = 0");
        assert!(matches!(
            validate_text(&text).unwrap_err(),
            ValidationError::NonPositiveDimensions
        ));
    }

    #[test]
    fn missing_sections() {
        let no_proc = VALID.replace("proc_time =", "proc_time");
        assert!(matches!(
            validate_text(&no_proc).unwrap_err(),
            ValidationError::MissingProcTime
        ));
        let no_setup = VALID.replace("setup_time =", "");
        assert!(matches!(
            validate_text(&no_setup).unwrap_err(),
            ValidationError::MissingSetupTime
        ));
    }

    #[test]
    fn missing_machine_matrix_names_the_machine() {
        let text = VALID.replace("# machine 2", "# machine 7");
        let err = validate_text(&text).unwrap_err();
        assert_eq!(err.to_string(), "Error: missing matrix for machine 2.");
    }

    #[test]
    fn workload_warnings_follow_thresholds() {
        let small = InstanceSummary { jobs: 50, machines: 10 };
        assert!(small
            .workload_warnings(&[Phase::Neh, Phase::Annealing { iterations: 50_000 }])
            .is_empty());

        let wide = InstanceSummary { jobs: 900, machines: 5 };
        let warnings = wide.workload_warnings(&[Phase::Neh, Phase::Annealing { iterations: 1 }]);
        assert_eq!(warnings.len(), 2);
        assert_eq!(warnings[0], WorkloadWarning::LargeNeh { jobs: 900 });

        let long = InstanceSummary { jobs: 200, machines: 20 };
        let warnings = long.workload_warnings(&[Phase::Annealing { iterations: 50_000 }]);
        assert!(matches!(
            warnings.as_slice(),
            [WorkloadWarning::HeavyAnnealing { work: 200_000_000, .. }]
        ));
    }
}
