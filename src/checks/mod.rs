pub mod delivered_to;
pub mod direct_to_mx;
pub mod duplicate_singular;
pub mod from_match;
pub mod from_phish;
pub mod invalid_date;
pub mod invalid_return_path;
pub mod mailing_list;
pub mod missing_required;
pub mod user_agent;

use crate::auth_results::AuthResults;
use crate::transaction::Transaction;

/// What the host should do after a check (or the whole pipeline) ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Continue,
    Reject { message: String },
}

impl Action {
    pub fn reject(message: impl Into<String>) -> Self {
        Action::Reject {
            message: message.into(),
        }
    }

    pub fn is_reject(&self) -> bool {
        matches!(self, Action::Reject { .. })
    }
}

pub trait HeaderCheck: Send + Sync {
    fn run(&self, txn: &mut Transaction, auth: &AuthResults) -> Action;
    fn name(&self) -> &'static str;
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::headers::HeaderStore;
    use crate::results::{CheckResults, RESULT_SOURCE};
    use crate::transaction::Transaction;

    pub fn txn(headers: &[(&str, &str)]) -> Transaction {
        let mut store = HeaderStore::new();
        for (name, value) in headers {
            store.add(*name, *value);
        }
        Transaction::new(store)
    }

    pub fn results(txn: &Transaction) -> CheckResults {
        txn.results.get(RESULT_SOURCE)
    }
}
