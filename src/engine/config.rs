// src/engine/config.rs
//
// Engine configuration: request defaults, encoder capabilities and firewall.
//
// Environment overrides:
// - TR_IMAGE_DEFAULT_QUALITY     0-100
// - TR_IMAGE_DEFAULT_BACKGROUND  RRGGBB
// - TR_IMAGE_DISABLE_WEBP        1/true/yes
// - TR_IMAGE_DISABLE_AVIF        1/true/yes
// - TR_IMAGE_FIREWALL            strict | lenient | disabled
//
// TR_IMAGE_THREADS (batch pool size) is read by pool.rs.

use crate::engine::directive::{TransformRequest, DEFAULT_QUALITY};
use crate::engine::firewall::{FirewallConfig, FirewallPolicy};
use crate::ops::{EncoderCapabilities, Rgb};
use tracing::warn;

pub const ENV_DEFAULT_QUALITY: &str = "TR_IMAGE_DEFAULT_QUALITY";
pub const ENV_DEFAULT_BACKGROUND: &str = "TR_IMAGE_DEFAULT_BACKGROUND";
pub const ENV_DISABLE_WEBP: &str = "TR_IMAGE_DISABLE_WEBP";
pub const ENV_DISABLE_AVIF: &str = "TR_IMAGE_DISABLE_AVIF";
pub const ENV_FIREWALL: &str = "TR_IMAGE_FIREWALL";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    pub default_quality: u8,
    pub default_background: Rgb,
    /// Encoders `auto` may pick from
    pub capabilities: EncoderCapabilities,
    pub firewall: FirewallConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_quality: DEFAULT_QUALITY,
            default_background: Rgb::DEFAULT_BACKGROUND,
            capabilities: EncoderCapabilities::detect(),
            firewall: FirewallConfig::disabled(),
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparseable values are logged and
    /// the default is kept.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_DEFAULT_QUALITY) {
            match raw.trim().parse::<u8>() {
                Ok(q) if q <= 100 => config.default_quality = q,
                _ => warn!(key = ENV_DEFAULT_QUALITY, value = %raw, "ignoring invalid quality"),
            }
        }

        if let Some(raw) = lookup(ENV_DEFAULT_BACKGROUND) {
            match Rgb::parse_hex(raw.trim()) {
                Some(bg) => config.default_background = bg,
                None => warn!(key = ENV_DEFAULT_BACKGROUND, value = %raw, "ignoring invalid colour"),
            }
        }

        if lookup(ENV_DISABLE_WEBP).is_some_and(|v| is_truthy(&v)) {
            config.capabilities.remove(EncoderCapabilities::WEBP);
        }
        if lookup(ENV_DISABLE_AVIF).is_some_and(|v| is_truthy(&v)) {
            config.capabilities.remove(EncoderCapabilities::AVIF);
        }

        if let Some(raw) = lookup(ENV_FIREWALL) {
            match raw.parse::<FirewallPolicy>() {
                Ok(policy) => config.firewall = FirewallConfig::apply_policy(policy),
                Err(err) => warn!(key = ENV_FIREWALL, error = %err, "ignoring firewall policy"),
            }
        }

        config
    }

    /// Encoders missing from this build are dropped from `capabilities`.
    pub fn with_capabilities(mut self, capabilities: EncoderCapabilities) -> Self {
        self.capabilities = capabilities & EncoderCapabilities::detect();
        self
    }

    pub fn with_firewall(mut self, firewall: FirewallConfig) -> Self {
        self.firewall = firewall;
        self
    }

    /// The request a directive is folded onto.
    pub fn base_request(&self) -> TransformRequest {
        TransformRequest {
            quality: self.default_quality,
            background: self.default_background,
            ..TransformRequest::default()
        }
    }
}

fn is_truthy(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
