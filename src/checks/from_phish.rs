//! Brand impersonation in the From header.
//!
//! A protected brand named anywhere in the From value (display name, local
//! part, domain text) must come from the brand's own organizational domain,
//! unless SPF, DKIM or reverse DNS already vouch for that domain. Brand names
//! are matched on word boundaries after folding common lookalike characters,
//! so "C0stc0" hits `costco` while "purchase" never hits `chase`.

use super::{Action, HeaderCheck};
use crate::address::AddressParser;
use crate::auth_results::{AuthResults, Mechanism};
use crate::domain_utils::DomainUtils;
use crate::error::HeadersError;
use crate::results::{ResultEntry, RESULT_SOURCE};
use crate::transaction::Transaction;
use regex::{Regex, RegexBuilder};
use std::sync::Arc;

/// A protected brand, compiled once per configuration load.
#[derive(Debug, Clone)]
pub struct PhishTarget {
    pub brand: String,
    pub domain: String,
    pattern: Regex,
    auth_pattern: Regex,
}

impl PhishTarget {
    pub fn new(brand: &str, domain: &str) -> Result<Self, HeadersError> {
        let brand = brand.trim().to_lowercase();
        let domain = domain.trim().to_lowercase();
        if domain.is_empty() {
            return Err(HeadersError::EmptyPhishDomain(brand));
        }

        // the From text is folded before matching, so the brand must be too
        let folded = normalize_lookalikes(&brand);
        let pattern = RegexBuilder::new(&format!(r"\b{}\b", regex::escape(&folded)))
            .case_insensitive(true)
            .build()?;
        // the domain itself or any sub-domain of it
        let auth_pattern = RegexBuilder::new(&format!(r"(^|\.){}$", regex::escape(&domain)))
            .case_insensitive(true)
            .build()?;

        Ok(Self {
            brand,
            domain,
            pattern,
            auth_pattern,
        })
    }

    pub fn matches(&self, normalized: &str) -> bool {
        self.pattern.is_match(normalized)
    }

    /// True when SPF, DKIM or forward-confirmed reverse DNS passed for the
    /// protected domain.
    pub fn has_auth_match(&self, auth: &AuthResults) -> bool {
        let passes = |mechanism| {
            auth.get(mechanism).is_some_and(|r| {
                r.pass
                    .iter()
                    .any(|name| self.auth_pattern.is_match(name.trim()))
            })
        };

        if passes(Mechanism::Spf) {
            log::debug!("from_phish: SPF pass for {}", self.domain);
            return true;
        }
        if passes(Mechanism::Dkim) {
            log::debug!("from_phish: DKIM pass for {}", self.domain);
            return true;
        }
        if auth
            .dkim_notes()
            .iter()
            .any(|note| note.result == "pass" && self.auth_pattern.is_match(&note.domain))
        {
            log::debug!("from_phish: DKIM note pass for {}", self.domain);
            return true;
        }
        has_fcrdns_match(&self.domain, auth)
    }
}

pub fn has_fcrdns_match(domain: &str, auth: &AuthResults) -> bool {
    auth.get(Mechanism::Fcrdns).is_some_and(|r| {
        r.pass
            .iter()
            .any(|name| DomainUtils::same_organization(name, domain))
    })
}

/// Lower-cases and folds digits and symbols commonly used as letter
/// lookalikes. Only used for brand matching, never for domain extraction.
pub fn normalize_lookalikes(value: &str) -> String {
    value
        .to_lowercase()
        .chars()
        .map(|c| match c {
            '0' => 'o',
            '1' => 'i',
            '3' => 'e',
            '4' => 'a',
            '5' => 's',
            '7' => 't',
            '8' => 'b',
            ')' => 'g',
            '|' => 'l',
            '$' => 's',
            other => other,
        })
        .collect()
}

pub struct FromPhish {
    targets: Arc<[PhishTarget]>,
    parser: Arc<dyn AddressParser>,
    reject: bool,
}

impl FromPhish {
    pub fn new(targets: Arc<[PhishTarget]>, parser: Arc<dyn AddressParser>, reject: bool) -> Self {
        Self {
            targets,
            parser,
            reject,
        }
    }

    fn evaluate(
        &self,
        from: &str,
        txn: &mut Transaction,
        auth: &AuthResults,
    ) -> Result<Action, HeadersError> {
        let first = self
            .parser
            .parse_list(from)?
            .into_iter()
            .next()
            .ok_or_else(|| HeadersError::Address(from.to_string()))?;
        let host = first
            .host()
            .ok_or_else(|| HeadersError::MissingHost(first.address.clone()))?;
        let hdr_from_domain = DomainUtils::organizational_domain(&host);

        let normalized = normalize_lookalikes(from);

        for target in self.targets.iter() {
            if !target.matches(&normalized) {
                continue;
            }
            if target.has_auth_match(auth) {
                continue;
            }
            if hdr_from_domain == target.domain {
                continue;
            }

            txn.results.add(
                RESULT_SOURCE,
                ResultEntry::fail(format!("from_phish({})", target.brand))
                    .with_msg(format!(
                        "brand {} in From header, domain {} is not {}",
                        target.brand, hdr_from_domain, target.domain
                    ))
                    .emit(),
            );
            if self.reject {
                return Ok(Action::reject(format!(
                    "Phishing message detected, attempt to impersonate {}",
                    target.domain
                )));
            }
            return Ok(Action::Continue);
        }

        txn.results.add(RESULT_SOURCE, ResultEntry::pass("from_phish"));
        Ok(Action::Continue)
    }
}

impl HeaderCheck for FromPhish {
    fn run(&self, txn: &mut Transaction, auth: &AuthResults) -> Action {
        let Some(from) = txn.headers.get_decoded("From") else {
            txn.results
                .add(RESULT_SOURCE, ResultEntry::skip("from_phish(missing)"));
            return Action::Continue;
        };

        match self.evaluate(&from, txn, auth) {
            Ok(action) => action,
            Err(e) => {
                log::error!("from_phish: {}", e);
                txn.results
                    .add(RESULT_SOURCE, ResultEntry::err(format!("from_phish: {}", e)));
                Action::Continue
            }
        }
    }

    fn name(&self) -> &'static str {
        "from_phish"
    }
}
