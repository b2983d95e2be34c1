use super::{Action, HeaderCheck};
use crate::auth_results::AuthResults;
use crate::results::{ResultEntry, RESULT_SOURCE};
use crate::transaction::Transaction;

const RETURN_PATH: &str = "Return-Path";

/// Return-Path is added by the final delivery agent (RFC 5321 §4.4). Our own
/// users must not send one; inbound copies are stripped.
pub struct InvalidReturnPath {
    reject: bool,
}

impl InvalidReturnPath {
    pub fn new(reject: bool) -> Self {
        Self { reject }
    }
}

impl HeaderCheck for InvalidReturnPath {
    fn run(&self, txn: &mut Transaction, _auth: &AuthResults) -> Action {
        if !txn.headers.contains(RETURN_PATH) {
            txn.results
                .add(RESULT_SOURCE, ResultEntry::pass("invalid_return_path"));
            return Action::Continue;
        }

        if !txn.relaying {
            let removed = txn.remove_header(RETURN_PATH);
            log::debug!("Stripped {} inbound Return-Path header(s)", removed);
            txn.results
                .add(RESULT_SOURCE, ResultEntry::pass("invalid_return_path"));
            return Action::Continue;
        }

        txn.results
            .add(RESULT_SOURCE, ResultEntry::fail("invalid_return_path"));
        if !self.reject {
            return Action::Continue;
        }
        Action::reject("outgoing mail must not have a Return-Path header (RFC 5321)")
    }

    fn name(&self) -> &'static str {
        "invalid_return_path"
    }
}
