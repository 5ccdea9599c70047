//! SFU Configuration

use serde::{Deserialize, Serialize};

/// SFU configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SfuConfig {
    /// Number of media workers to spawn (0 = one per available CPU core)
    pub num_workers: usize,
    /// Maximum number of concurrent rooms (0 = unlimited)
    pub max_rooms: usize,
    /// Maximum participants per room (0 = unlimited)
    pub max_participants_per_room: usize,
    /// IP address announced in ICE candidates
    pub announced_ip: String,
    /// Lower bound of the RTC UDP port range
    pub rtc_min_port: u16,
    /// Upper bound of the RTC UDP port range
    pub rtc_max_port: u16,
}

impl Default for SfuConfig {
    fn default() -> Self {
        Self {
            num_workers: 0,
            max_rooms: 0,
            max_participants_per_room: 100,
            announced_ip: "127.0.0.1".to_string(),
            rtc_min_port: 40000,
            rtc_max_port: 49999,
        }
    }
}

impl SfuConfig {
    /// Validate the configuration, returning every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.rtc_min_port > self.rtc_max_port {
            errors.push(format!(
                "rtc_min_port ({}) must not exceed rtc_max_port ({})",
                self.rtc_min_port, self.rtc_max_port
            ));
        }
        if self.announced_ip.is_empty() {
            errors.push("announced_ip must not be empty".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
