use super::{Action, HeaderCheck};
use crate::address::AddressParser;
use crate::auth_results::{AuthResults, Mechanism};
use crate::domain_utils::DomainUtils;
use crate::results::{ResultEntry, RESULT_SOURCE};
use crate::transaction::Transaction;
use std::sync::Arc;

/// Compares the envelope sender with the From header. Advisory only: plenty
/// of legitimate mail (lists, forwarders, ESPs) differs here.
pub struct FromMatch {
    parser: Arc<dyn AddressParser>,
}

impl FromMatch {
    pub fn new(parser: Arc<dyn AddressParser>) -> Self {
        Self { parser }
    }
}

impl HeaderCheck for FromMatch {
    fn run(&self, txn: &mut Transaction, auth: &AuthResults) -> Action {
        let Some(env_addr) = txn.mail_from.clone() else {
            txn.results.add(RESULT_SOURCE, ResultEntry::fail("from_match(null)"));
            return Action::Continue;
        };

        let Some(from) = txn.headers.get_decoded("From") else {
            txn.results
                .add(RESULT_SOURCE, ResultEntry::fail("from_match(missing)"));
            return Action::Continue;
        };

        let hdr_addr = match self.parser.parse_list(&from) {
            Ok(list) => match list.into_iter().next() {
                Some(addr) => addr,
                None => {
                    txn.results
                        .add(RESULT_SOURCE, ResultEntry::fail("from_match(unparsable)"));
                    return Action::Continue;
                }
            },
            Err(e) => {
                log::debug!("From header not RFC 5322: {}", e);
                txn.results
                    .add(RESULT_SOURCE, ResultEntry::fail("from_match(rfc_violation)"));
                return Action::Continue;
            }
        };

        if env_addr.address().eq_ignore_ascii_case(&hdr_addr.address) {
            txn.results.add(RESULT_SOURCE, ResultEntry::pass("from_match"));
            return Action::Continue;
        }

        let env_dom = env_addr
            .host()
            .map(DomainUtils::organizational_domain)
            .unwrap_or_default();
        let msg_dom = hdr_addr
            .host()
            .map(|host| DomainUtils::organizational_domain(&host))
            .unwrap_or_default();

        if !env_dom.is_empty() && env_dom == msg_dom {
            let mut extra = vec!["domain"];
            let fcrdns_matches = auth.get(Mechanism::Fcrdns).is_some_and(|r| {
                r.pass
                    .iter()
                    .any(|name| DomainUtils::organizational_domain(name) == msg_dom)
            });
            if fcrdns_matches {
                extra.push("fcrdns");
            }
            if txn
                .helo
                .as_deref()
                .is_some_and(|helo| DomainUtils::organizational_domain(helo) == msg_dom)
            {
                extra.push("helo");
            }
            txn.results.add(
                RESULT_SOURCE,
                ResultEntry::pass(format!("from_match({})", extra.join(","))),
            );
            return Action::Continue;
        }

        txn.results.add(
            RESULT_SOURCE,
            ResultEntry::fail(format!("from_match({} / {})", env_dom, msg_dom)).emit(),
        );
        Action::Continue
    }

    fn name(&self) -> &'static str {
        "from_match"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::MailParserAddresses;
    use crate::checks::test_support::{results, txn};

    fn check() -> FromMatch {
        FromMatch::new(Arc::new(MailParserAddresses))
    }

    #[test]
    fn test_match_bare() {
        let mut txn = txn(&[("From", "test@example.com")]).with_mail_from("<test@example.com>");
        check().run(&mut txn, &AuthResults::new());
        assert!(results(&txn).pass.contains(&"from_match".to_string()));
    }

    #[test]
    fn test_match_typical() {
        let mut txn = txn(&[("From", "\"Test User\" <Test@Example.com>")])
            .with_mail_from("<test@example.com>");
        check().run(&mut txn, &AuthResults::new());
        assert_eq!(results(&txn).pass, ["from_match"]);
    }

    #[test]
    fn test_match_subdomain_with_evidence() {
        let mut txn =
            txn(&[("From", "news@example.com")]).with_mail_from("<bounce@mail.example.com>");
        txn.helo = Some("mx1.example.com".into());
        let mut auth = AuthResults::new();
        auth.record_pass(Mechanism::Fcrdns, "out.example.com");

        check().run(&mut txn, &auth);
        assert_eq!(results(&txn).pass, ["from_match(domain,fcrdns,helo)"]);
    }

    #[test]
    fn test_mismatch() {
        let mut txn = txn(&[("From", "test@example.net")]).with_mail_from("<test@example.com>");
        check().run(&mut txn, &AuthResults::new());
        let fail = &results(&txn).fail;
        assert_eq!(fail.len(), 1);
        assert!(fail[0].starts_with("from_match"));
        assert_eq!(fail[0], "from_match(example.com / example.net)");
    }

    #[test]
    fn test_null_and_missing() {
        let mut bounce = txn(&[("From", "test@example.com")]);
        check().run(&mut bounce, &AuthResults::new());
        assert_eq!(results(&bounce).fail, ["from_match(null)"]);

        let mut missing = txn(&[]).with_mail_from("<test@example.com>");
        check().run(&mut missing, &AuthResults::new());
        assert_eq!(results(&missing).fail, ["from_match(missing)"]);
    }

    #[test]
    fn test_group_without_mailboxes() {
        let mut txn =
            txn(&[("From", "undisclosed-recipients:;")]).with_mail_from("<test@example.com>");
        check().run(&mut txn, &AuthResults::new());
        let fail = &results(&txn).fail;
        assert!(
            fail[0] == "from_match(unparsable)" || fail[0] == "from_match(rfc_violation)",
            "unexpected {:?}",
            fail
        );
    }
}
