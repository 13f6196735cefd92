use once_cell::sync::Lazy;
use sysinfo::{CpuRefreshKind, RefreshKind, System};

#[derive(Debug, Clone)]
pub struct StrategicConfig {
    pub ideal_worker_count: usize,
    pub max_worker_count: usize,
    pub physical_cores: Option<usize>,
}

impl StrategicConfig {
    /// Clamps a requested worker count into `1..=max_worker_count`.
    pub fn clamp_worker_count(&self, requested: usize) -> usize {
        requested.clamp(1, self.max_worker_count.max(1))
    }

    /// Worker count for a batch: the request if given, otherwise the ideal count.
    pub fn worker_count_or_ideal(&self, requested: Option<usize>) -> usize {
        match requested {
            Some(n) => self.clamp_worker_count(n),
            None => self.ideal_worker_count,
        }
    }
}

pub static CONFIG: Lazy<StrategicConfig> = Lazy::new(strategic_config);

fn strategic_config() -> StrategicConfig {
    let refresh = RefreshKind::nothing().with_cpu(CpuRefreshKind::everything());
    let sys = System::new_with_specifics(refresh);

    // logiska kärnor, samma som en "ideal thread count"
    let logical = sys.cpus().len().max(1);
    let physical_cores = System::physical_core_count();

    log::debug!(
        "[strategic_config] detected {} logical cores ({:?} physical)",
        logical,
        physical_cores
    );

    StrategicConfig {
        ideal_worker_count: logical,
        max_worker_count: logical,
        physical_cores,
    }
}
