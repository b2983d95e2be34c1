use super::{Action, HeaderCheck};
use crate::auth_results::AuthResults;
use crate::results::{ResultEntry, RESULT_SOURCE};
use crate::transaction::Transaction;

/// Headers RFC 5322 §3.6 allows at most once.
pub struct DuplicateSingular {
    headers: Vec<String>,
    reject: bool,
}

impl DuplicateSingular {
    pub fn new(headers: &[String], reject: bool) -> Self {
        Self {
            headers: headers.to_vec(),
            reject,
        }
    }
}

impl HeaderCheck for DuplicateSingular {
    fn run(&self, txn: &mut Transaction, _auth: &AuthResults) -> Action {
        let mut failures = Vec::new();
        for name in &self.headers {
            if txn.headers.count(name) > 1 {
                txn.results
                    .add(RESULT_SOURCE, ResultEntry::fail(format!("duplicate:{}", name)));
                failures.push(name);
            }
        }

        let Some(first) = failures.first() else {
            txn.results.add(RESULT_SOURCE, ResultEntry::pass("duplicate"));
            return Action::Continue;
        };

        if !self.reject {
            return Action::Continue;
        }
        Action::reject(format!(
            "Only one {} header allowed. See RFC 5322, Section 3.6",
            first
        ))
    }

    fn name(&self) -> &'static str {
        "duplicate_singular"
    }
}
