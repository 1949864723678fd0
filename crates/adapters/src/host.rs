// Copyright 2026 Streambench Contributors
// SPDX-License-Identifier: Apache-2.0

//! Host utilization sampling.
//!
//! CPU and memory figures are host-wide point samples taken with `sysinfo`.
//! They are not attributed to the trial's processes or container: anything
//! else running on the host shows up in them too. Treat them as a coarse
//! proxy for how loaded the machine was while a trial ran.

use chrono::Utc;
use streambench_benchmarks::{Percentage, SystemInfo};
use sysinfo::{CpuRefreshKind, MemoryRefreshKind, RefreshKind, System};

/// One host-wide utilization sample.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct HostUsage {
    /// CPU utilization across all cores.
    pub cpu: Percentage,
    /// Used memory relative to installed memory.
    pub memory: Percentage,
}

/// Source of host utilization samples.
#[cfg_attr(test, mockall::automock)]
pub trait HostSampler: Send {
    /// Take a point sample.
    fn sample(&mut self) -> HostUsage;
}

/// [`HostSampler`] backed by `sysinfo`.
///
/// CPU usage is computed by sysinfo as the delta between two refreshes, so
/// the first sample after construction covers the time since `new`.
pub struct SysinfoSampler {
    system: System,
}

impl SysinfoSampler {
    /// Create a sampler and prime the CPU counters.
    pub fn new() -> Self {
        let mut system = System::new_with_specifics(
            RefreshKind::nothing()
                .with_cpu(CpuRefreshKind::nothing().with_cpu_usage())
                .with_memory(MemoryRefreshKind::nothing().with_ram()),
        );
        system.refresh_cpu_usage();
        Self { system }
    }
}

impl Default for SysinfoSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl HostSampler for SysinfoSampler {
    fn sample(&mut self) -> HostUsage {
        self.system.refresh_cpu_usage();
        self.system.refresh_memory();

        let total = self.system.total_memory();
        let memory = if total == 0 {
            0.0
        } else {
            self.system.used_memory() as f64 / total as f64 * 100.0
        };

        HostUsage {
            cpu: Percentage::new(f64::from(self.system.global_cpu_usage())),
            memory: Percentage::new(memory),
        }
    }
}

/// Describe the host for the report.
pub fn system_info() -> SystemInfo {
    let system = System::new_with_specifics(
        RefreshKind::nothing()
            .with_cpu(CpuRefreshKind::everything())
            .with_memory(MemoryRefreshKind::nothing().with_ram()),
    );
    let unknown = || "unknown".to_string();

    SystemInfo {
        host_name: System::host_name().unwrap_or_else(unknown),
        os: System::long_os_version().unwrap_or_else(unknown),
        kernel: System::kernel_version().unwrap_or_else(unknown),
        cpu_brand: system
            .cpus()
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .filter(|brand| !brand.is_empty())
            .unwrap_or_else(unknown),
        physical_cores: system.physical_core_count(),
        logical_cores: system.cpus().len(),
        cpu_frequency_mhz: system.cpus().first().map_or(0, |cpu| cpu.frequency()),
        total_memory_bytes: system.total_memory(),
        available_memory_bytes: system.available_memory(),
        collected_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sysinfo_sample_is_a_percentage() {
        let mut sampler = SysinfoSampler::new();
        std::thread::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL);
        let usage = sampler.sample();
        assert!((0.0..=100.0).contains(&usage.cpu.value()));
        assert!((0.0..=100.0).contains(&usage.memory.value()));
    }

    #[test]
    fn test_system_info_reports_cores() {
        let info = system_info();
        assert!(info.logical_cores >= 1);
        assert!(info.physical_cores.map_or(true, |cores| cores <= info.logical_cores));
        assert!(info.available_memory_bytes <= info.total_memory_bytes);
        assert!(!info.host_name.is_empty());
    }
}
