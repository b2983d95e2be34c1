use crate::domain_utils::DomainUtils;
use crate::error::HeadersError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_SINGULAR: &str =
    "Date,From,Sender,Reply-To,To,Cc,Bcc,Message-Id,In-Reply-To,References,Subject";
pub const DEFAULT_REQUIRED: &str = "Date,From";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadersConfig {
    pub socket_path: String,
    pub main: MainConfig,
    pub check: CheckToggles,
    pub reject: RejectToggles,
    /// brand -> protected organizational domain
    pub phish_targets: BTreeMap<String, String>,
    /// Deprecated domain-keyed form, folded into `phish_targets` at load.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phish_domains: Option<BTreeMap<String, bool>>,
    pub milter: MilterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MainConfig {
    pub singular: HeaderList,
    pub required: HeaderList,
    pub date_future_days: i64,
    pub date_past_days: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckToggles {
    pub duplicate_singular: bool,
    pub missing_required: bool,
    pub invalid_return_path: bool,
    pub invalid_date: bool,
    pub user_agent: bool,
    pub direct_to_mx: bool,
    pub from_match: bool,
    pub delivered_to: bool,
    pub mailing_list: bool,
    pub from_phish: bool,
}

/// Only these checks may block delivery; the rest are advisory.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RejectToggles {
    pub duplicate_singular: bool,
    pub missing_required: bool,
    pub invalid_return_path: bool,
    pub invalid_date: bool,
    pub delivered_to: bool,
    pub from_phish: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MilterConfig {
    /// Authentication-Results headers are only trusted when stamped with this id.
    pub authserv_id: Option<String>,
    /// Summary header added at end of message. Empty disables it.
    pub result_header: String,
}

/// Header name list, written either as a comma-joined string or a YAML sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "HeaderListRepr", into = "HeaderListRepr")]
pub struct HeaderList(Vec<String>);

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
enum HeaderListRepr {
    Joined(String),
    List(Vec<String>),
}

impl HeaderList {
    pub fn parse(joined: &str) -> Self {
        Self(
            joined
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn names(&self) -> &[String] {
        &self.0
    }
}

impl From<HeaderListRepr> for HeaderList {
    fn from(repr: HeaderListRepr) -> Self {
        match repr {
            HeaderListRepr::Joined(joined) => HeaderList::parse(&joined),
            HeaderListRepr::List(names) => HeaderList::parse(&names.join(",")),
        }
    }
}

impl From<HeaderList> for HeaderListRepr {
    fn from(list: HeaderList) -> Self {
        HeaderListRepr::Joined(list.0.join(","))
    }
}

impl Default for HeadersConfig {
    fn default() -> Self {
        Self {
            socket_path: "/var/run/headers-milter.sock".to_string(),
            main: MainConfig::default(),
            check: CheckToggles::default(),
            reject: RejectToggles::default(),
            phish_targets: BTreeMap::new(),
            phish_domains: None,
            milter: MilterConfig::default(),
        }
    }
}

impl Default for MainConfig {
    fn default() -> Self {
        Self {
            singular: HeaderList::parse(DEFAULT_SINGULAR),
            required: HeaderList::parse(DEFAULT_REQUIRED),
            date_future_days: 2,
            date_past_days: 15,
        }
    }
}

impl Default for CheckToggles {
    fn default() -> Self {
        Self {
            duplicate_singular: true,
            missing_required: true,
            invalid_return_path: true,
            invalid_date: true,
            user_agent: true,
            direct_to_mx: true,
            from_match: true,
            delivered_to: true,
            mailing_list: true,
            from_phish: true,
        }
    }
}

impl Default for RejectToggles {
    fn default() -> Self {
        Self {
            duplicate_singular: false,
            missing_required: false,
            invalid_return_path: false,
            invalid_date: false,
            delivered_to: true,
            from_phish: false,
        }
    }
}

impl Default for MilterConfig {
    fn default() -> Self {
        Self {
            authserv_id: None,
            result_header: "X-Headers-Check".to_string(),
        }
    }
}

impl HeadersConfig {
    pub fn from_file(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> anyhow::Result<Self> {
        let config: HeadersConfig = serde_yaml::from_str(content)?;
        Ok(config.validated()?)
    }

    pub fn to_file(&self, path: &str) -> anyhow::Result<()> {
        let content = serde_yaml::to_string(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Folds the legacy `phish_domains` map into `phish_targets`, lower-cases
    /// brand keys and rejects empty domains. Safe to call more than once.
    pub fn validated(mut self) -> Result<Self, HeadersError> {
        let mut targets: BTreeMap<String, String> = BTreeMap::new();

        for (brand, domain) in std::mem::take(&mut self.phish_targets) {
            let brand = brand.trim().to_lowercase();
            let domain = domain.trim().to_lowercase();
            if brand.is_empty() {
                return Err(HeadersError::Config("phish target with empty brand".into()));
            }
            if domain.is_empty() {
                return Err(HeadersError::EmptyPhishDomain(brand));
            }
            let domain = registrable(&brand, domain);
            if targets.contains_key(&brand) {
                log::warn!("Duplicate phish target '{}', keeping the first entry", brand);
                continue;
            }
            targets.insert(brand, domain);
        }

        if let Some(legacy) = self.phish_domains.take() {
            log::warn!(
                "phish_domains is deprecated, migrating {} entries to phish_targets",
                legacy.len()
            );
            for (domain, enabled) in legacy {
                let domain = domain.trim().to_lowercase();
                if !enabled || domain.is_empty() {
                    continue;
                }
                let domain = DomainUtils::organizational_domain(&domain);
                let brand = domain.split('.').next().unwrap_or_default().to_string();
                if brand.is_empty() {
                    continue;
                }
                targets.entry(brand).or_insert(domain);
            }
        }

        self.phish_targets = targets;
        Ok(self)
    }
}

/// Senders are compared by organizational domain, so targets must be one too.
fn registrable(brand: &str, domain: String) -> String {
    let org = DomainUtils::organizational_domain(&domain);
    if org != domain {
        log::warn!(
            "Phish target '{}': using organizational domain {} instead of {}",
            brand,
            org,
            domain
        );
    }
    org
}
