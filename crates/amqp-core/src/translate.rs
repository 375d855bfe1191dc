//! Field translation between local and remote vocabularies
//!
//! Every lookup is total: a value missing from its table passes through
//! unchanged, so enumeration values added on the provider side surface
//! as-is instead of failing a read.

use crate::config::TranslationConfig;

/// Stateless translator built from a [`TranslationConfig`]
#[derive(Debug, Clone)]
pub struct FieldTranslator {
    tiers: Vec<(String, String)>,
    renewal_units: Vec<(String, String)>,
    eip_enabled: String,
    eip_disabled: String,
}

impl FieldTranslator {
    /// Build a translator from its tables
    pub fn new(config: &TranslationConfig) -> Self {
        Self {
            tiers: config.tiers.clone(),
            renewal_units: config.renewal_units.clone(),
            eip_enabled: config.eip_enabled.clone(),
            eip_disabled: config.eip_disabled.clone(),
        }
    }

    /// Tier in request direction
    ///
    /// The provider accepts the local lowercase spelling, so this is the
    /// identity.
    pub fn tier_request(&self, local: &str) -> String {
        local.to_string()
    }

    /// Tier in response direction (`VIP` -> `vip`)
    pub fn tier_response(&self, remote: &str) -> String {
        to_local(&self.tiers, remote)
    }

    /// Renewal unit in request direction (`Month` -> `M`)
    pub fn renewal_unit_request(&self, local: &str) -> String {
        to_remote(&self.renewal_units, local)
    }

    /// Renewal unit in response direction (`M` -> `Month`)
    pub fn renewal_unit_response(&self, remote: &str) -> String {
        to_local(&self.renewal_units, remote)
    }

    /// EIP support flag in request direction (`true` -> `eip_true`)
    pub fn support_eip_request(&self, enabled: bool) -> String {
        if enabled {
            self.eip_enabled.clone()
        } else {
            self.eip_disabled.clone()
        }
    }
}

impl Default for FieldTranslator {
    fn default() -> Self {
        Self::new(&TranslationConfig::default())
    }
}

fn to_remote(table: &[(String, String)], local: &str) -> String {
    table
        .iter()
        .find(|(l, _)| l == local)
        .map(|(_, r)| r.clone())
        .unwrap_or_else(|| local.to_string())
}

fn to_local(table: &[(String, String)], remote: &str) -> String {
    table
        .iter()
        .find(|(_, r)| r == remote)
        .map(|(l, _)| l.clone())
        .unwrap_or_else(|| remote.to_string())
}
