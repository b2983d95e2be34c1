use super::{Action, HeaderCheck};
use crate::auth_results::AuthResults;
use crate::error::HeadersError;
use crate::results::{ResultEntry, RESULT_SOURCE};
use crate::transaction::Transaction;
use regex::{Regex, RegexBuilder};

enum Matcher {
    /// Header presence alone identifies the manager.
    Present,
    Prefix(String),
    Pattern(Regex),
}

struct MlmRule {
    mlm: &'static str,
    matcher: Matcher,
}

/// Recognises mail sent through a mailing-list manager. Classification only.
pub struct MailingList {
    rules: Vec<(&'static str, Vec<MlmRule>)>,
}

impl MailingList {
    pub fn new() -> Result<Self, HeadersError> {
        let pattern = |mlm: &'static str, re: &str| -> Result<MlmRule, HeadersError> {
            Ok(MlmRule {
                mlm,
                matcher: Matcher::Pattern(RegexBuilder::new(re).case_insensitive(true).build()?),
            })
        };
        let present = |mlm: &'static str| MlmRule {
            mlm,
            matcher: Matcher::Present,
        };

        Ok(Self {
            rules: vec![
                (
                    "Mailing-List",
                    vec![
                        pattern("ezmlm", "ezmlm")?,
                        pattern("yahoogroups", "yahoogroups")?,
                        pattern("googlegroups", "googlegroups")?,
                    ],
                ),
                (
                    "Sender",
                    vec![MlmRule {
                        mlm: "majordomo",
                        matcher: Matcher::Prefix("owner-".to_string()),
                    }],
                ),
                ("X-Mailman-Version", vec![present("mailman")]),
                ("X-Majordomo-Version", vec![present("majordomo")]),
                ("X-Google-Loop", vec![present("googlegroups")]),
            ],
        })
    }
}

impl HeaderCheck for MailingList {
    fn run(&self, txn: &mut Transaction, _auth: &AuthResults) -> Action {
        let mut found: Vec<&'static str> = Vec::new();

        for (header, rules) in &self.rules {
            let values: Vec<&str> = txn.headers.get_all(header).collect();
            if values.is_empty() {
                continue;
            }
            for rule in rules {
                let hit = match &rule.matcher {
                    Matcher::Present => true,
                    Matcher::Prefix(prefix) => {
                        values.iter().any(|v| v.trim().starts_with(prefix.as_str()))
                    }
                    Matcher::Pattern(re) => values.iter().any(|v| re.is_match(v)),
                };
                if hit && !found.contains(&rule.mlm) {
                    found.push(rule.mlm);
                }
            }
        }

        if found.is_empty() {
            txn.results.add(RESULT_SOURCE, ResultEntry::msg("not MLM"));
        }
        for mlm in found {
            txn.results
                .add(RESULT_SOURCE, ResultEntry::pass(format!("MLM({})", mlm)));
        }
        Action::Continue
    }

    fn name(&self) -> &'static str {
        "mailing_list"
    }
}
