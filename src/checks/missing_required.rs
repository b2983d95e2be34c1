use super::{Action, HeaderCheck};
use crate::auth_results::AuthResults;
use crate::results::{ResultEntry, RESULT_SOURCE};
use crate::transaction::Transaction;

pub struct MissingRequired {
    headers: Vec<String>,
    reject: bool,
}

impl MissingRequired {
    pub fn new(headers: &[String], reject: bool) -> Self {
        Self {
            headers: headers.to_vec(),
            reject,
        }
    }
}

impl HeaderCheck for MissingRequired {
    fn run(&self, txn: &mut Transaction, _auth: &AuthResults) -> Action {
        let mut failures = Vec::new();
        for name in &self.headers {
            if !txn.headers.contains(name) {
                txn.results
                    .add(RESULT_SOURCE, ResultEntry::fail(format!("missing:{}", name)));
                failures.push(name);
            }
        }

        let Some(first) = failures.first() else {
            txn.results.add(RESULT_SOURCE, ResultEntry::pass("missing"));
            return Action::Continue;
        };

        if !self.reject {
            return Action::Continue;
        }
        Action::reject(format!("Required header '{}' missing", first))
    }

    fn name(&self) -> &'static str {
        "missing_required"
    }
}
