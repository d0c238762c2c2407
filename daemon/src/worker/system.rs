//! Host resource snapshot

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sysinfo::{Disks, System};

use crate::errors::HarborError;
use crate::filesys::file::File;

/// System metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    /// CPU usage percentage (0-100)
    pub cpu_usage: f32,

    /// Number of CPU cores
    pub cpu_count: usize,

    /// Memory usage in bytes
    pub memory_used: u64,

    /// Total memory in bytes
    pub memory_total: u64,

    /// Disk usage in bytes
    pub disk_used: u64,

    /// Total disk space in bytes
    pub disk_total: u64,

    /// System uptime in seconds
    pub uptime_secs: u64,

    pub hostname: String,

    pub collected_at: DateTime<Utc>,
}

impl SystemInfo {
    pub fn memory_percent(&self) -> f32 {
        percent(self.memory_used, self.memory_total)
    }

    pub fn disk_percent(&self) -> f32 {
        percent(self.disk_used, self.disk_total)
    }
}

fn percent(used: u64, total: u64) -> f32 {
    if total > 0 {
        (used as f32 / total as f32) * 100.0
    } else {
        0.0
    }
}

/// Collect system metrics
pub fn collect_system_info() -> SystemInfo {
    let mut sys = System::new_all();
    sys.refresh_all();

    let disks = Disks::new_with_refreshed_list();
    let (disk_used, disk_total) = disks.iter().fold((0u64, 0u64), |(used, total), disk| {
        (
            used + disk.total_space().saturating_sub(disk.available_space()),
            total + disk.total_space(),
        )
    });

    SystemInfo {
        cpu_usage: sys.global_cpu_usage(),
        cpu_count: sys.cpus().len(),
        memory_used: sys.used_memory(),
        memory_total: sys.total_memory(),
        disk_used,
        disk_total,
        uptime_secs: System::uptime(),
        hostname: System::host_name().unwrap_or_else(|| "unknown".to_string()),
        collected_at: Utc::now(),
    }
}

/// Collect metrics off the runtime threads and persist them
pub async fn refresh_system_info(file: &File) -> Result<String, HarborError> {
    let info = tokio::task::spawn_blocking(collect_system_info)
        .await
        .map_err(|e| HarborError::Internal(e.to_string()))?;
    file.write_json(&info).await?;
    Ok(format!(
        "cpu {:.1}%, memory {:.1}%, disk {:.1}%",
        info.cpu_usage,
        info.memory_percent(),
        info.disk_percent()
    ))
}
