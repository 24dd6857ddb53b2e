//! Load-aware pool sizing and run phases

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use sysinfo::{CpuExt, System, SystemExt};
use tracing::{debug, info};

/// Window between the two CPU refreshes that make up one load sample
const CPU_SAMPLE_WINDOW: Duration = Duration::from_millis(250);

/// Phases a run moves through, in order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    Idle,
    Sizing,
    Dispatching,
    Draining,
    Done,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Sizing => "sizing",
            Self::Dispatching => "dispatching",
            Self::Draining => "draining",
            Self::Done => "done",
        };
        f.write_str(name)
    }
}

/// How jobs will be executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum ExecutionMode {
    /// One logical worker, strict discovery order
    Serial,
    /// Fixed pool of `workers` threads
    Parallel { workers: usize },
}

impl ExecutionMode {
    pub fn workers(self) -> usize {
        match self {
            Self::Serial => 1,
            Self::Parallel { workers } => workers,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Serial => "serial",
            Self::Parallel { .. } => "parallel",
        }
    }
}

/// Source of the machine facts used to size the pool
pub trait LoadSampler {
    fn cpu_count(&self) -> usize;

    /// Current system-wide CPU load in percent (0-100)
    fn cpu_load_percent(&self) -> f32;
}

/// Live sampler backed by `sysinfo` and `num_cpus`
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLoad;

impl LoadSampler for SystemLoad {
    fn cpu_count(&self) -> usize {
        num_cpus::get()
    }

    fn cpu_load_percent(&self) -> f32 {
        let mut system = System::new();
        system.refresh_cpu();
        std::thread::sleep(CPU_SAMPLE_WINDOW);
        system.refresh_cpu();

        system.global_cpu_info().cpu_usage()
    }
}

/// Fixed answers, for callers that already know the machine state
#[derive(Debug, Clone, Copy)]
pub struct StaticLoad {
    pub cpus: usize,
    pub load_percent: f32,
}

impl LoadSampler for StaticLoad {
    fn cpu_count(&self) -> usize {
        self.cpus
    }

    fn cpu_load_percent(&self) -> f32 {
        self.load_percent
    }
}

/// Worker count for a given core count and load
///
/// Step function: up to 25% load gets half the cores plus one, up to 50%
/// gets half the cores, anything above gets a single worker. Never zero.
pub fn workers_for_load(cpus: usize, load_percent: f32) -> usize {
    let half = cpus / 2;
    let workers = if load_percent <= 25.0 {
        half + 1
    } else if load_percent <= 50.0 {
        half
    } else {
        1
    };
    workers.max(1)
}

/// Sample the load once and pick the execution mode
///
/// Called once before dispatch; the result is never revisited mid-run.
pub fn size_pool(parallel: bool, sampler: &dyn LoadSampler) -> ExecutionMode {
    if !parallel {
        return ExecutionMode::Serial;
    }

    debug!("Entering {} phase", RunPhase::Sizing);
    let cpus = sampler.cpu_count();
    let load = sampler.cpu_load_percent();
    let workers = workers_for_load(cpus, load);

    info!(
        "CPU load {:.1}% on {} cores, using {} workers",
        load, cpus, workers
    );
    ExecutionMode::Parallel { workers }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_policy_on_eight_cores() {
        assert_eq!(workers_for_load(8, 20.0), 5);
        assert_eq!(workers_for_load(8, 40.0), 4);
        assert_eq!(workers_for_load(8, 70.0), 1);
    }

    #[test]
    fn test_worker_policy_boundaries() {
        assert_eq!(workers_for_load(8, 25.0), 5);
        assert_eq!(workers_for_load(8, 50.0), 4);
        assert_eq!(workers_for_load(8, 50.1), 1);
        assert_eq!(workers_for_load(3, 0.0), 2);
    }

    #[test]
    fn test_worker_policy_never_zero() {
        assert_eq!(workers_for_load(1, 40.0), 1);
        assert_eq!(workers_for_load(0, 10.0), 1);
        assert_eq!(workers_for_load(0, 99.0), 1);
    }

    #[test]
    fn test_size_pool() {
        let sampler = StaticLoad {
            cpus: 8,
            load_percent: 40.0,
        };
        assert_eq!(size_pool(false, &sampler), ExecutionMode::Serial);
        assert_eq!(size_pool(true, &sampler), ExecutionMode::Parallel { workers: 4 });
        assert_eq!(size_pool(true, &sampler).workers(), 4);
        assert_eq!(size_pool(true, &sampler).label(), "parallel");
        assert_eq!(ExecutionMode::Serial.workers(), 1);
    }

    #[test]
    fn test_system_load_reports_sane_values() {
        let sampler = SystemLoad;
        assert!(sampler.cpu_count() >= 1);

        let load = sampler.cpu_load_percent();
        assert!(load >= 0.0 || load.is_nan());
    }

    #[test]
    fn test_phase_names() {
        assert_eq!(RunPhase::Draining.to_string(), "draining");
        assert_eq!(RunPhase::Idle.to_string(), "idle");
    }
}
