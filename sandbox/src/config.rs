//! Sandbox configuration.

use tether_hostapi::HostConfig;

/// Configuration for the wasmtime-backed host runtime.
///
/// Controls kernel memory size, instruction fuel, and region limits.
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Kernel memory pages allocated up front (1 page = 64 KiB).
    pub initial_memory_pages: u32,

    /// Maximum kernel memory pages.
    /// Default: 256 pages = 16 MiB.
    pub max_memory_pages: u32,

    /// Wasmtime fuel granted to each plugin call.
    /// Prevents infinite loops in guest code.
    pub fuel_limit: u64,

    /// Region size limits.
    pub host: HostConfig,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            initial_memory_pages: 1,
            max_memory_pages: 256, // 16 MiB
            fuel_limit: 100_000_000,
            host: HostConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SandboxConfig::default();
        assert_eq!(config.initial_memory_pages, 1);
        assert_eq!(config.max_memory_pages, 256);
        assert_eq!(config.fuel_limit, 100_000_000);
        assert_eq!(config.host, HostConfig::default());
    }
}
