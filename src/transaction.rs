use crate::headers::HeaderStore;
use crate::results::ResultSink;
use std::fmt;

/// SMTP envelope address (MAIL FROM / RCPT TO argument).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeAddress {
    user: String,
    host: Option<String>,
}

impl EnvelopeAddress {
    /// Accepts `<user@host>` or bare `user@host`. The null sender `<>` yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let raw = raw.strip_prefix('<').unwrap_or(raw);
        let raw = raw.strip_suffix('>').unwrap_or(raw).trim();
        if raw.is_empty() {
            return None;
        }
        match raw.rsplit_once('@') {
            Some((user, host)) if !host.is_empty() => Some(Self {
                user: user.to_string(),
                host: Some(host.to_lowercase()),
            }),
            _ => Some(Self {
                user: raw.trim_end_matches('@').to_string(),
                host: None,
            }),
        }
    }

    pub fn address(&self) -> String {
        match &self.host {
            Some(host) => format!("{}@{}", self.user, host),
            None => self.user.clone(),
        }
    }

    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }
}

impl fmt::Display for EnvelopeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.address())
    }
}

/// One message under evaluation. Owned by the host for the lifetime of the
/// DATA phase; the checks only read it, append results, and may drop headers.
#[derive(Debug, Clone, Default)]
pub struct Transaction {
    pub headers: HeaderStore,
    pub mail_from: Option<EnvelopeAddress>,
    pub rcpt_to: Vec<EnvelopeAddress>,
    /// Originated by one of our users (authenticated submission or trusted relay).
    pub relaying: bool,
    pub auth_user: Option<String>,
    pub helo: Option<String>,
    pub results: ResultSink,
    removed_headers: Vec<(String, usize)>,
}

impl Transaction {
    pub fn new(headers: HeaderStore) -> Self {
        Self {
            headers,
            ..Default::default()
        }
    }

    pub fn with_mail_from(mut self, sender: &str) -> Self {
        self.mail_from = EnvelopeAddress::parse(sender);
        self
    }

    pub fn with_rcpt(mut self, recipient: &str) -> Self {
        self.rcpt_to.extend(EnvelopeAddress::parse(recipient));
        self
    }

    pub fn with_auth_user(mut self, user: &str) -> Self {
        self.auth_user = Some(user.to_string());
        self.relaying = true;
        self
    }

    /// Removes a header and remembers it so the host can replay the removal
    /// on the queued copy.
    pub fn remove_header(&mut self, name: &str) -> usize {
        let removed = self.headers.remove(name);
        if removed > 0 {
            self.removed_headers.push((name.to_string(), removed));
        }
        removed
    }

    /// Header names removed during evaluation, with the number of fields dropped.
    pub fn removed_headers(&self) -> &[(String, usize)] {
        &self.removed_headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_address_parse() {
        let addr = EnvelopeAddress::parse("<Test@Example.COM>").unwrap();
        assert_eq!(addr.address(), "Test@example.com");
        assert_eq!(addr.host(), Some("example.com"));
        assert_eq!(addr.to_string(), "<Test@example.com>");

        assert!(EnvelopeAddress::parse("<>").is_none());
        assert!(EnvelopeAddress::parse("").is_none());

        let local = EnvelopeAddress::parse("postmaster").unwrap();
        assert_eq!(local.host(), None);
        assert_eq!(local.address(), "postmaster");
    }

    #[test]
    fn test_remove_header_is_recorded() {
        let mut headers = HeaderStore::new();
        headers.add("Return-Path", "<a@example.com>");
        let mut txn = Transaction::new(headers);

        assert_eq!(txn.remove_header("Return-Path"), 1);
        assert_eq!(txn.remove_header("Return-Path"), 0);
        assert_eq!(txn.removed_headers(), [("Return-Path".to_string(), 1)]);
        assert!(txn.headers.is_empty());
    }
}
