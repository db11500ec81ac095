// src/engine/firewall.rs
//
// Image Firewall: input limits checked before and during decoding.

use crate::error::{Result, TransformError};
use std::str::FromStr;
use std::time::Instant;

const STRICT_MAX_PIXELS: u64 = 40_000_000; // ~8K x 5K
const LENIENT_MAX_PIXELS: u64 = 75_000_000; // below the global MAX_PIXELS
const STRICT_MAX_BYTES: u64 = 32 * 1024 * 1024;
const LENIENT_MAX_BYTES: u64 = 48 * 1024 * 1024;
const STRICT_TIMEOUT_MS: u64 = 5_000;
const LENIENT_TIMEOUT_MS: u64 = 30_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FirewallPolicy {
    Disabled,
    Strict,
    Lenient,
    Custom,
}

impl FromStr for FirewallPolicy {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "disabled" | "off" | "" => Ok(Self::Disabled),
            "strict" => Ok(Self::Strict),
            "lenient" => Ok(Self::Lenient),
            "custom" => Ok(Self::Custom),
            other => Err(TransformError::invalid_argument(
                "firewall policy",
                other.to_string(),
                "expected one of: strict, lenient, disabled",
            )),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FirewallConfig {
    pub enabled: bool,
    pub policy: FirewallPolicy,
    pub max_pixels: Option<u64>,
    pub max_bytes: Option<u64>,
    pub timeout_ms: Option<u64>,
}

impl Default for FirewallConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

impl FirewallConfig {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            policy: FirewallPolicy::Disabled,
            max_pixels: None,
            max_bytes: None,
            timeout_ms: None,
        }
    }

    pub fn strict() -> Self {
        Self {
            enabled: true,
            policy: FirewallPolicy::Strict,
            max_pixels: Some(STRICT_MAX_PIXELS),
            max_bytes: Some(STRICT_MAX_BYTES),
            timeout_ms: Some(STRICT_TIMEOUT_MS),
        }
    }

    pub fn lenient() -> Self {
        Self {
            enabled: true,
            policy: FirewallPolicy::Lenient,
            max_pixels: Some(LENIENT_MAX_PIXELS),
            max_bytes: Some(LENIENT_MAX_BYTES),
            timeout_ms: Some(LENIENT_TIMEOUT_MS),
        }
    }

    /// Enabled with no limits; set the fields you need.
    pub fn custom() -> Self {
        Self {
            enabled: true,
            policy: FirewallPolicy::Custom,
            ..Self::disabled()
        }
    }

    pub fn apply_policy(policy: FirewallPolicy) -> Self {
        match policy {
            FirewallPolicy::Disabled => Self::disabled(),
            FirewallPolicy::Strict => Self::strict(),
            FirewallPolicy::Lenient => Self::lenient(),
            FirewallPolicy::Custom => Self::custom(),
        }
    }

    pub fn enforce_source_len(&self, len: usize) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if let Some(limit) = self.max_bytes {
            let len = len as u64;
            if len > limit {
                return Err(TransformError::firewall_violation(format!(
                    "input size {len} bytes exceeds limit of {limit} bytes"
                )));
            }
        }
        Ok(())
    }

    pub fn enforce_pixels(&self, width: u32, height: u32) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if let Some(limit) = self.max_pixels {
            let pixels = width as u64 * height as u64;
            if pixels > limit {
                return Err(TransformError::firewall_violation(format!(
                    "{width}x{height} ({pixels} pixels) exceeds limit of {limit} pixels"
                )));
            }
        }
        Ok(())
    }

    pub fn enforce_timeout(&self, started_at: Instant, stage: &'static str) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        if let Some(limit_ms) = self.timeout_ms {
            let elapsed_ms = started_at.elapsed().as_millis() as u64;
            if elapsed_ms > limit_ms {
                return Err(TransformError::firewall_violation(format!(
                    "processing exceeded {limit_ms}ms at {stage} stage (elapsed: {elapsed_ms}ms)"
                )));
            }
        }
        Ok(())
    }
}
