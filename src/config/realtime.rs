//! Realtime delivery configuration

use serde::Deserialize;

use super::error::ValidationError;

/// Tuning for WebSocket delivery and message paging
#[derive(Debug, Clone, Deserialize)]
pub struct RealtimeConfig {
    /// Capacity of each connection's outbound queue
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer: usize,

    /// Page size when a history request gives no limit
    #[serde(default = "default_page_size")]
    pub default_page_size: u32,

    /// Upper bound applied to any requested page size
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

impl RealtimeConfig {
    /// Validate realtime configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.outbound_buffer == 0 {
            return Err(ValidationError::InvalidOutboundBuffer);
        }
        if self.max_page_size == 0
            || self.default_page_size == 0
            || self.default_page_size > self.max_page_size
        {
            return Err(ValidationError::InvalidPageSize);
        }
        Ok(())
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            outbound_buffer: default_outbound_buffer(),
            default_page_size: default_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

fn default_outbound_buffer() -> usize {
    64
}

fn default_page_size() -> u32 {
    50
}

fn default_max_page_size() -> u32 {
    100
}
