use super::{Action, HeaderCheck};
use crate::auth_results::AuthResults;
use crate::results::{ResultEntry, RESULT_SOURCE};
use crate::transaction::Transaction;

/// Mail from a real MUA passes at least its submission server and our MX, so
/// fewer than two Received headers hints at a bot talking to the MX directly.
pub struct DirectToMx;

impl HeaderCheck for DirectToMx {
    fn run(&self, txn: &mut Transaction, _auth: &AuthResults) -> Action {
        if txn.auth_user.is_some() {
            txn.results
                .add(RESULT_SOURCE, ResultEntry::skip("direct-to-mx(auth)"));
            return Action::Continue;
        }

        let entry = match txn.headers.count("Received") {
            0 => ResultEntry::fail("direct-to-mx(none)"),
            1 => ResultEntry::fail("direct-to-mx(too few Received(1))"),
            count => ResultEntry::pass(format!("direct-to-mx({})", count)),
        };
        txn.results.add(RESULT_SOURCE, entry);
        Action::Continue
    }

    fn name(&self) -> &'static str {
        "direct_to_mx"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checks::test_support::{results, txn};

    #[test]
    fn test_auth_user_skips() {
        let mut txn = txn(&[]).with_auth_user("test@example.com");
        DirectToMx.run(&mut txn, &AuthResults::new());
        let r = results(&txn);
        assert_eq!(r.skip, ["direct-to-mx(auth)"]);
        assert!(r.pass.is_empty() && r.fail.is_empty());
    }

    #[test]
    fn test_received_counts() {
        let mut none = txn(&[]);
        DirectToMx.run(&mut none, &AuthResults::new());
        assert_eq!(results(&none).fail, ["direct-to-mx(none)"]);

        let mut one = txn(&[("Received", "blah")]);
        DirectToMx.run(&mut one, &AuthResults::new());
        assert!(results(&one).fail[0].starts_with("direct-to-mx"));

        let mut two = txn(&[("Received", "blah1"), ("Received", "blah2")]);
        DirectToMx.run(&mut two, &AuthResults::new());
        assert_eq!(results(&two).pass, ["direct-to-mx(2)"]);
        assert!(results(&two).fail.is_empty());
    }

    #[test]
    fn test_auth_user_skips_with_received() {
        let mut txn = txn(&[
            ("Received", "from a"),
            ("Received", "from b"),
            ("Received", "from c"),
        ])
        .with_auth_user("test@example.com");
        DirectToMx.run(&mut txn, &AuthResults::new());
        let r = results(&txn);
        assert_eq!(r.skip, ["direct-to-mx(auth)"]);
        assert!(r.pass.is_empty());
        assert!(r.fail.is_empty());
    }
}
