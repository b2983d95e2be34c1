//! Domain helpers shared by the checks.
//!
//! Organizational domains are resolved against the Public Suffix List, so
//! `mail.costco.com` and `costco.com` compare equal while `costco.com.evil.net`
//! does not.

pub struct DomainUtils;

impl DomainUtils {
    /// Host part of an address (after the last `@`), lower-cased.
    pub fn extract_domain(email: &str) -> Option<String> {
        email
            .rsplit_once('@')
            .map(|(_, host)| host.trim().trim_end_matches('>').to_lowercase())
            .filter(|host| !host.is_empty())
    }

    /// Registrable domain of `host`, falling back to the host itself when the
    /// suffix list has no answer (bare TLDs, IP literals, unknown suffixes).
    pub fn organizational_domain(host: &str) -> String {
        let host = host
            .trim()
            .trim_start_matches('[')
            .trim_end_matches(']')
            .trim_end_matches('.')
            .to_lowercase();
        match psl::domain_str(&host) {
            Some(domain) => domain.to_string(),
            None => host,
        }
    }

    pub fn same_organization(a: &str, b: &str) -> bool {
        !a.is_empty() && Self::organizational_domain(a) == Self::organizational_domain(b)
    }
}
