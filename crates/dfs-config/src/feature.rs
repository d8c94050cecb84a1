use serde::{Deserialize, Serialize};

/// A feature flag, gating a piece of decorator/transfer behavior per-domain.
/// Ported from the upstream `feature-flags` model: a flag can be globally
/// enabled, enabled for specific domains or groups, or rolled out to a
/// percentage of domains via a stable hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureFlag {
    pub key: String,
    pub enabled: bool,
    #[serde(default)]
    pub domains: Vec<u32>,
    #[serde(default)]
    pub groups: Vec<String>,
    #[serde(default)]
    pub percentage: u32,
}

impl FeatureFlag {
    pub fn disabled(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            enabled: false,
            domains: Vec::new(),
            groups: Vec::new(),
            percentage: 0,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.percentage > 100 {
            return Err("percentage must be between 0 and 100".to_string());
        }
        if self.key.len() < 3 || self.key.len() > 50 {
            return Err("feature key must be between 3 and 50 characters".to_string());
        }
        if !self
            .key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
        {
            return Err("feature key must only contain digits, lowercase letters and underscores".to_string());
        }
        Ok(())
    }

    fn is_enabled(&self) -> bool {
        self.enabled || self.percentage == 100
    }

    fn is_partially_enabled(&self) -> bool {
        !self.is_enabled() && (!self.domains.is_empty() || !self.groups.is_empty() || self.percentage > 0)
    }

    /// A domain has access iff the flag is fully enabled, OR it's partially
    /// enabled and the domain is explicitly listed, OR it falls within the
    /// rolled-out percentage by a stable crc32 hash.
    pub fn domain_has_access(&self, domain: u32) -> bool {
        self.is_enabled()
            || (self.is_partially_enabled()
                && (self.domains.contains(&domain) || self.domain_allowed_by_percentage(domain)))
    }

    pub fn group_has_access(&self, group: &str) -> bool {
        self.is_enabled() || (self.is_partially_enabled() && self.groups.iter().any(|g| g == group))
    }

    fn domain_allowed_by_percentage(&self, domain: u32) -> bool {
        crc32fast::hash(&domain.to_be_bytes()) % 100 < self.percentage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enabled_flag_grants_every_domain() {
        let f = FeatureFlag {
            key: "cachefile".into(),
            enabled: true,
            domains: vec![],
            groups: vec![],
            percentage: 0,
        };
        assert!(f.domain_has_access(1));
        assert!(f.domain_has_access(u32::MAX));
    }

    #[test]
    fn disabled_flag_with_no_rollout_grants_nothing() {
        let f = FeatureFlag::disabled("backstore");
        assert!(!f.domain_has_access(1));
    }

    #[test]
    fn explicit_domain_list_grants_only_listed_domains() {
        let mut f = FeatureFlag::disabled("backstore");
        f.domains = vec![42];
        assert!(f.domain_has_access(42));
        assert!(!f.domain_has_access(43));
    }

    #[test]
    fn hundred_percent_behaves_like_enabled() {
        let mut f = FeatureFlag::disabled("backstore");
        f.percentage = 100;
        for d in 0..50 {
            assert!(f.domain_has_access(d));
        }
    }

    // Testable property #7: DomainHasAccess is monotonic in Percentage at
    // fixed other fields -- raising the percentage never revokes access.
    #[test]
    fn domain_access_is_monotonic_in_percentage() {
        let domain = 777u32;
        let mut granted_at: Option<u32> = None;
        for pct in 0..=100u32 {
            let f = FeatureFlag {
                key: "rollout".into(),
                enabled: false,
                domains: vec![],
                groups: vec![],
                percentage: pct,
            };
            let has_access = f.domain_has_access(domain);
            if has_access && granted_at.is_none() {
                granted_at = Some(pct);
            }
            if let Some(first) = granted_at {
                if pct >= first {
                    assert!(
                        has_access,
                        "domain {domain} lost access at percentage {pct} after gaining it at {first}"
                    );
                }
            }
        }
    }

    #[test]
    fn validate_rejects_bad_keys_and_percentages() {
        assert!(FeatureFlag::disabled("ab").validate().is_err()); // too short
        let mut f = FeatureFlag::disabled("Has-Upper");
        assert!(f.validate().is_err());
        f.key = "ok_key".into();
        f.percentage = 101;
        assert!(f.validate().is_err());
    }
}
