use crate::address::{AddressParser, MailParserAddresses};
use crate::auth_results::AuthResults;
use crate::checks::delivered_to::DeliveredTo;
use crate::checks::direct_to_mx::DirectToMx;
use crate::checks::duplicate_singular::DuplicateSingular;
use crate::checks::from_match::FromMatch;
use crate::checks::from_phish::{FromPhish, PhishTarget};
use crate::checks::invalid_date::InvalidDate;
use crate::checks::invalid_return_path::InvalidReturnPath;
use crate::checks::mailing_list::MailingList;
use crate::checks::missing_required::MissingRequired;
use crate::checks::user_agent::UserAgent;
use crate::checks::{Action, HeaderCheck};
use crate::config::HeadersConfig;
use crate::error::HeadersError;
use crate::transaction::Transaction;
use std::sync::{Arc, RwLock};

/// The enabled checks for one configuration load, in dispatch order.
pub struct Engine {
    config: HeadersConfig,
    checks: Vec<Box<dyn HeaderCheck>>,
}

impl Engine {
    pub fn new(config: HeadersConfig) -> Result<Self, HeadersError> {
        Self::with_address_parser(config, Some(Arc::new(MailParserAddresses)))
    }

    /// Builds the check table. Without an address parser the From checks
    /// cannot run and are left out.
    pub fn with_address_parser(
        config: HeadersConfig,
        parser: Option<Arc<dyn AddressParser>>,
    ) -> Result<Self, HeadersError> {
        let config = config.validated()?;
        let check = &config.check;
        let reject = &config.reject;
        let mut checks: Vec<Box<dyn HeaderCheck>> = Vec::new();

        if check.duplicate_singular {
            checks.push(Box::new(DuplicateSingular::new(
                config.main.singular.names(),
                reject.duplicate_singular,
            )));
        }
        if check.missing_required {
            checks.push(Box::new(MissingRequired::new(
                config.main.required.names(),
                reject.missing_required,
            )));
        }
        if check.invalid_return_path {
            checks.push(Box::new(InvalidReturnPath::new(reject.invalid_return_path)));
        }
        if check.invalid_date {
            checks.push(Box::new(InvalidDate::new(
                config.main.date_future_days,
                config.main.date_past_days,
                reject.invalid_date,
            )));
        }
        if check.user_agent {
            checks.push(Box::new(UserAgent));
        }
        if check.direct_to_mx {
            checks.push(Box::new(DirectToMx));
        }

        let mut unavailable = Vec::new();
        if check.from_match {
            match &parser {
                Some(parser) => checks.push(Box::new(FromMatch::new(parser.clone()))),
                None => unavailable.push("from_match"),
            }
        }
        if check.delivered_to {
            checks.push(Box::new(DeliveredTo::new(reject.delivered_to)));
        }
        if check.mailing_list {
            checks.push(Box::new(MailingList::new()?));
        }
        if check.from_phish {
            let targets = config
                .phish_targets
                .iter()
                .map(|(brand, domain)| PhishTarget::new(brand, domain))
                .collect::<Result<Vec<_>, _>>()?;
            match &parser {
                Some(_) if targets.is_empty() => {
                    log::debug!("from_phish enabled but no phish_targets configured");
                }
                Some(parser) => checks.push(Box::new(FromPhish::new(
                    targets.into(),
                    parser.clone(),
                    reject.from_phish,
                ))),
                None => unavailable.push("from_phish"),
            }
        }

        if !unavailable.is_empty() {
            log::warn!(
                "No address parser available, not registering: {}",
                unavailable.join(", ")
            );
        }

        let engine = Self { config, checks };
        log::debug!("Engine built with checks: {}", engine.check_names().join(", "));
        Ok(engine)
    }

    /// Runs the enabled checks in order, stopping at the first rejection.
    pub fn evaluate(&self, txn: &mut Transaction, auth: &AuthResults) -> Action {
        for check in &self.checks {
            let action = check.run(txn, auth);
            if let Action::Reject { message } = &action {
                log::info!("Rejected by {}: {}", check.name(), message);
                return action;
            }
        }
        Action::Continue
    }

    /// Runs a single check by name. `None` when it is not enabled.
    pub fn run_check(
        &self,
        name: &str,
        txn: &mut Transaction,
        auth: &AuthResults,
    ) -> Option<Action> {
        self.checks
            .iter()
            .find(|check| check.name() == name)
            .map(|check| check.run(txn, auth))
    }

    pub fn check_names(&self) -> Vec<&'static str> {
        self.checks.iter().map(|check| check.name()).collect()
    }

    pub fn config(&self) -> &HeadersConfig {
        &self.config
    }
}

/// Shared, swappable engine. Readers clone the current `Arc` and keep it for
/// the whole message, so a reload never changes rules mid-evaluation.
pub struct EngineHandle {
    current: RwLock<Arc<Engine>>,
}

impl EngineHandle {
    pub fn new(engine: Engine) -> Self {
        Self {
            current: RwLock::new(Arc::new(engine)),
        }
    }

    pub fn snapshot(&self) -> Arc<Engine> {
        match self.current.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn swap(&self, engine: Engine) {
        let engine = Arc::new(engine);
        match self.current.write() {
            Ok(mut guard) => *guard = engine,
            Err(poisoned) => *poisoned.into_inner() = engine,
        }
    }
}
