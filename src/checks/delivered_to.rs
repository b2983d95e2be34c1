use super::{Action, HeaderCheck};
use crate::auth_results::AuthResults;
use crate::results::{ResultEntry, RESULT_SOURCE};
use crate::transaction::Transaction;

/// A Delivered-To naming one of our own recipients on inbound mail is a
/// forgery (or a loop).
pub struct DeliveredTo {
    reject: bool,
}

impl DeliveredTo {
    pub fn new(reject: bool) -> Self {
        Self { reject }
    }
}

impl HeaderCheck for DeliveredTo {
    fn run(&self, txn: &mut Transaction, _auth: &AuthResults) -> Action {
        let Some(delivered_to) = txn.headers.get_decoded("Delivered-To") else {
            return Action::Continue;
        };
        let delivered_to = delivered_to.trim();

        let matches = txn
            .rcpt_to
            .iter()
            .filter(|rcpt| rcpt.address().eq_ignore_ascii_case(delivered_to))
            .count();
        for _ in 0..matches {
            txn.results
                .add(RESULT_SOURCE, ResultEntry::fail("delivered_to").emit());
            if self.reject {
                return Action::reject("Invalid Delivered-To header content");
            }
        }
        Action::Continue
    }

    fn name(&self) -> &'static str {
        "delivered_to"
    }
}
