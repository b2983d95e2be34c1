use crate::auth_results::{AuthResults, Mechanism};
use crate::checks::Action;
use crate::config::HeadersConfig;
use crate::engine::{Engine, EngineHandle};
use crate::headers::HeaderStore;
use crate::results::RESULT_SOURCE;
use crate::transaction::Transaction;
use indymilter::{
    run, Actions, Callbacks, Config as IndyConfig, Context, ContextActions, EomContext,
    SetErrorReply, Status,
};
use std::sync::Arc;
use tokio::net::UnixListener;

/// Per-connection state kept in the milter context.
#[derive(Debug, Clone, Default)]
pub struct Session {
    pub hostname: Option<String>,
    pub helo: Option<String>,
    pub message: MessageState,
}

/// Everything collected between MAIL FROM and end of message.
#[derive(Debug, Clone, Default)]
pub struct MessageState {
    pub auth_user: Option<String>,
    pub mail_from: Option<String>,
    pub recipients: Vec<String>,
    pub headers: Vec<(String, String)>,
}

impl Session {
    pub fn new(hostname: &str) -> Self {
        Self {
            hostname: Some(hostname.to_string()),
            ..Default::default()
        }
    }

    /// The MTA only hands over a client name once it is forward-confirmed.
    /// `unknown` and bracketed literals mean the lookup failed.
    pub fn fcrdns_name(&self) -> Option<&str> {
        let hostname = self.hostname.as_deref()?.trim();
        if hostname.is_empty()
            || hostname.eq_ignore_ascii_case("unknown")
            || hostname.starts_with('[')
        {
            return None;
        }
        Some(hostname.trim_end_matches('.'))
    }

    pub fn transaction(&self) -> Transaction {
        let mut headers = HeaderStore::new();
        for (name, value) in &self.message.headers {
            headers.add(name.as_str(), unfold(value));
        }

        let mut txn = Transaction::new(headers);
        if let Some(sender) = &self.message.mail_from {
            txn = txn.with_mail_from(sender);
        }
        for rcpt in &self.message.recipients {
            txn = txn.with_rcpt(rcpt);
        }
        if let Some(user) = &self.message.auth_user {
            txn = txn.with_auth_user(user);
        }
        txn.helo = self.helo.clone();
        txn
    }

    pub fn auth_results(&self, authserv_id: Option<&str>) -> AuthResults {
        let mut auth = match authserv_id {
            Some(id) => AuthResults::from_authentication_results(
                self.message
                    .headers
                    .iter()
                    .filter(|(name, _)| name.eq_ignore_ascii_case("Authentication-Results"))
                    .map(|(_, value)| value.as_str()),
                id,
            ),
            None => AuthResults::new(),
        };
        if let Some(name) = self.fcrdns_name() {
            auth.record_pass(Mechanism::Fcrdns, name);
        }
        auth
    }
}

fn unfold(value: &str) -> String {
    value.replace("\r\n", "").replace('\n', "")
}

pub struct Milter {
    handle: Arc<EngineHandle>,
    config_path: Option<String>,
}

impl Milter {
    pub fn new(config_path: Option<String>, config: HeadersConfig) -> anyhow::Result<Self> {
        let engine = Engine::new(config)?;
        Ok(Milter {
            handle: Arc::new(EngineHandle::new(engine)),
            config_path,
        })
    }

    pub fn handle(&self) -> Arc<EngineHandle> {
        self.handle.clone()
    }

    /// Rebuilds the engine from the config file; the old one stays on failure.
    pub fn reload(handle: &EngineHandle, path: &str) -> anyhow::Result<()> {
        let config = HeadersConfig::from_file(path)?;
        handle.swap(Engine::new(config)?);
        log::info!("Configuration reloaded from {}", path);
        Ok(())
    }

    fn spawn_reload_listener(&self) -> anyhow::Result<()> {
        let Some(path) = self.config_path.clone() else {
            return Ok(());
        };
        let handle = self.handle.clone();
        let mut hangup = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::hangup())?;
        tokio::spawn(async move {
            while hangup.recv().await.is_some() {
                log::info!("SIGHUP received, reloading {}", path);
                if let Err(e) = Milter::reload(&handle, &path) {
                    log::error!("Reload failed, keeping previous configuration: {}", e);
                }
            }
        });
        Ok(())
    }

    pub async fn run(&self, socket_path: &str) -> anyhow::Result<()> {
        log::info!("Starting headers milter on: {}", socket_path);
        if std::path::Path::new(socket_path).exists() {
            std::fs::remove_file(socket_path)?;
        }

        let listener = UnixListener::bind(socket_path)?;
        self.spawn_reload_listener()?;
        let handle = self.handle.clone();

        let callbacks: Callbacks<Session> = Callbacks {
            connect: Some(Box::new(move |ctx: &mut Context<Session>, hostname, _addr| {
                Box::pin(async move {
                    let hostname = hostname.to_string_lossy().to_string();
                    log::debug!("Connection from: {}", hostname);
                    ctx.data = Some(Session::new(&hostname));
                    Status::Continue
                })
            })),

            helo: Some(Box::new(move |ctx: &mut Context<Session>, helo| {
                Box::pin(async move {
                    if let Some(session) = ctx.data.as_mut() {
                        session.helo = Some(helo.to_string_lossy().to_string());
                    }
                    Status::Continue
                })
            })),

            mail: Some(Box::new(move |ctx: &mut Context<Session>, args| {
                Box::pin(async move {
                    let auth_user = ctx
                        .macros
                        .get(c"{auth_authen}")
                        .map(|v| v.to_string_lossy().to_string())
                        .filter(|v| !v.is_empty());
                    let sender = args.first().map(|s| s.to_string_lossy().to_string());
                    log::debug!("Mail from: {:?} (auth: {:?})", sender, auth_user);

                    let session = ctx.data.get_or_insert_with(Session::default);
                    session.message = MessageState {
                        auth_user,
                        mail_from: sender,
                        ..Default::default()
                    };
                    Status::Continue
                })
            })),

            rcpt: Some(Box::new(move |ctx: &mut Context<Session>, args| {
                Box::pin(async move {
                    if let (Some(session), Some(rcpt)) = (ctx.data.as_mut(), args.first()) {
                        session.message.recipients.push(rcpt.to_string_lossy().to_string());
                    }
                    Status::Continue
                })
            })),

            header: Some(Box::new(move |ctx: &mut Context<Session>, name, value| {
                Box::pin(async move {
                    if let Some(session) = ctx.data.as_mut() {
                        session.message.headers.push((
                            name.to_string_lossy().to_string(),
                            value.to_string_lossy().to_string(),
                        ));
                    }
                    Status::Continue
                })
            })),

            eom: Some(Box::new(move |ctx: &mut EomContext<Session>| {
                let handle = handle.clone();
                Box::pin(async move {
                    let Some(session) = ctx.data.as_mut() else {
                        return Status::Accept;
                    };
                    let engine = handle.snapshot();
                    let message = std::mem::take(&mut session.message);
                    let session = Session {
                        message,
                        ..session.clone()
                    };

                    let mut txn = session.transaction();
                    let auth = session.auth_results(engine.config().milter.authserv_id.as_deref());

                    match engine.evaluate(&mut txn, &auth) {
                        Action::Reject { message } => {
                            log::info!("Rejecting message: {}", message);
                            if let Err(e) =
                                ctx.reply.set_error_reply("550", Some("5.7.1"), vec![message])
                            {
                                log::error!("Failed to set reply: {}", e);
                            }
                            Status::Reject
                        }
                        Action::Continue => {
                            for (name, count) in txn.removed_headers() {
                                for index in (1..=*count).rev() {
                                    if let Err(e) = ctx
                                        .actions
                                        .change_header(name.clone(), index as i32, None::<String>)
                                        .await
                                    {
                                        log::error!("Failed to remove {} header: {}", name, e);
                                    }
                                }
                            }

                            let summary = txn.results.get(RESULT_SOURCE).summary();
                            let result_header = &engine.config().milter.result_header;
                            if !result_header.is_empty() && !summary.is_empty() {
                                if let Err(e) =
                                    ctx.actions.add_header(result_header.clone(), summary).await
                                {
                                    log::error!("Failed to add header: {}", e);
                                }
                            }
                            log::debug!("Accepting message");
                            Status::Accept
                        }
                    }
                })
            })),

            abort: Some(Box::new(move |ctx: &mut Context<Session>| {
                Box::pin(async move {
                    if let Some(session) = ctx.data.as_mut() {
                        session.message = MessageState::default();
                    }
                    Status::Continue
                })
            })),

            ..Default::default()
        };

        let config = IndyConfig {
            actions: Actions::ADD_HEADER | Actions::CHANGE_HEADER,
            ..Default::default()
        };

        run(listener, callbacks, config, tokio::signal::ctrl_c()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session() -> Session {
        let mut session = Session::new("mail.costco.com");
        session.helo = Some("mail.costco.com".to_string());
        session.message = MessageState {
            auth_user: None,
            mail_from: Some("<bounce@costco.com>".to_string()),
            recipients: vec!["<user@example.org>".to_string()],
            headers: vec![
                ("From".to_string(), "\"Costco\" <news@costco.com>".to_string()),
                (
                    "Subject".to_string(),
                    "Weekly\r\n deals".to_string(),
                ),
                (
                    "Authentication-Results".to_string(),
                    "mx.example.org; spf=pass smtp.mailfrom=bounce@costco.com".to_string(),
                ),
            ],
        };
        session
    }

    #[test]
    fn test_fcrdns_name() {
        assert_eq!(session().fcrdns_name(), Some("mail.costco.com"));
        assert_eq!(Session::new("unknown").fcrdns_name(), None);
        assert_eq!(Session::new("[192.0.2.1]").fcrdns_name(), None);
        assert_eq!(Session::default().fcrdns_name(), None);
    }

    #[test]
    fn test_transaction_from_session() {
        let txn = session().transaction();
        assert_eq!(
            txn.mail_from.as_ref().map(|m| m.address()).as_deref(),
            Some("bounce@costco.com")
        );
        assert_eq!(txn.rcpt_to.len(), 1);
        assert!(!txn.relaying);
        assert_eq!(txn.helo.as_deref(), Some("mail.costco.com"));
        assert_eq!(txn.headers.get_first("subject"), Some("Weekly deals"));
    }

    #[test]
    fn test_authenticated_session_relays() {
        let mut session = session();
        session.message.auth_user = Some("alice".to_string());
        let txn = session.transaction();
        assert!(txn.relaying);
        assert_eq!(txn.auth_user.as_deref(), Some("alice"));
    }

    #[test]
    fn test_auth_results_trust_authserv_id() {
        let trusted = session().auth_results(Some("mx.example.org"));
        assert_eq!(trusted.get(Mechanism::Spf).unwrap().pass, ["costco.com"]);
        assert_eq!(trusted.get(Mechanism::Fcrdns).unwrap().pass, ["mail.costco.com"]);

        let untrusted = session().auth_results(None);
        assert!(untrusted.get(Mechanism::Spf).is_none());

        let foreign = session().auth_results(Some("mx.other.net"));
        assert!(foreign.get(Mechanism::Spf).is_none());
    }

    #[test]
    fn test_engine_over_session() {
        let mut config = HeadersConfig::default();
        config.reject.from_phish = true;
        config
            .phish_targets
            .insert("costco".to_string(), "costco.com".to_string());
        let engine = Engine::new(config).unwrap();

        let mut session = session();
        session.hostname = Some("unknown".to_string());
        session.message.headers[0].1 = "\"Costco\" <news@c0stco-deals.biz>".to_string();
        let mut txn = session.transaction();
        let auth = session.auth_results(None);
        assert!(engine.evaluate(&mut txn, &auth).is_reject());
    }
}
