use super::{Action, HeaderCheck};
use crate::auth_results::AuthResults;
use crate::results::{ResultEntry, RESULT_SOURCE};
use crate::transaction::Transaction;

const UA_HEADERS: [&str; 5] = [
    "user-agent",
    "x-mailer",
    "x-mua",
    "x-yahoo-newman-property",
    "x-ms-has-attach",
];

/// Mail user agents normally identify themselves; bulk and bot mail often
/// does not. Advisory only.
pub struct UserAgent;

impl HeaderCheck for UserAgent {
    fn run(&self, txn: &mut Transaction, _auth: &AuthResults) -> Action {
        let mut found = 0;
        for name in UA_HEADERS {
            let Some(value) = txn.headers.get_first(name) else {
                continue;
            };
            let prefix: String = value.trim().chars().take(12).collect();
            txn.results
                .add(RESULT_SOURCE, ResultEntry::pass(format!("UA({})", prefix)));
            found += 1;
        }

        if found == 0 {
            txn.results.add(RESULT_SOURCE, ResultEntry::fail("UA"));
        }
        Action::Continue
    }

    fn name(&self) -> &'static str {
        "user_agent"
    }
}
