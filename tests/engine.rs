use chrono::{Duration, Utc};
use headers_milter::{
    Action, AuthResults, Engine, HeaderStore, HeadersConfig, Mechanism, Transaction, RESULT_SOURCE,
};

fn config() -> HeadersConfig {
    let mut config = HeadersConfig::default();
    config
        .phish_targets
        .insert("costco".to_string(), "costco.com".to_string());
    config
        .phish_targets
        .insert("amazon".to_string(), "amazon.com".to_string());
    config.reject.from_phish = true;
    config
}

fn message(raw: &str) -> Transaction {
    Transaction::new(HeaderStore::parse(raw))
        .with_mail_from("<test@example.com>")
        .with_rcpt("<user@example.org>")
}

fn ordinary(from: &str) -> String {
    format!(
        "Received: from a.example.com by b.example.com\r\n\
         Received: from b.example.com by mx.example.org\r\n\
         Date: {}\r\n\
         From: {}\r\n\
         To: user@example.org\r\n\
         Subject: hello\r\n\
         User-Agent: Mutt/2.2.12\r\n\
         \r\n\
         body text\r\n",
        Utc::now().to_rfc2822(),
        from
    )
}

#[test]
fn test_ordinary_message_accepted() {
    let engine = Engine::new(config()).unwrap();
    let mut txn = message(&ordinary("\"Test User\" <test@example.com>"));
    assert_eq!(engine.evaluate(&mut txn, &AuthResults::new()), Action::Continue);

    let results = txn.results.get(RESULT_SOURCE);
    assert!(results.fail.is_empty(), "unexpected fails {:?}", results.fail);
    for token in [
        "duplicate",
        "missing",
        "invalid_return_path",
        "invalid_date",
        "direct-to-mx(2)",
        "from_match",
        "from_phish",
    ] {
        assert!(results.pass.iter().any(|p| p == token), "missing pass {}", token);
    }
    assert!(results.pass.iter().any(|p| p.starts_with("UA(")));
    assert_eq!(results.msg, ["not MLM"]);
}

#[test]
fn test_costco_impersonation_rejected() {
    let engine = Engine::new(config()).unwrap();
    let mut txn = message(&ordinary("\"Costco Support\" <spam@spammer.com>"));
    match engine.evaluate(&mut txn, &AuthResults::new()) {
        Action::Reject { message } => assert!(message.contains("impersonate")),
        other => panic!("Expected reject, got {:?}", other),
    }
}

#[test]
fn test_brand_checks() {
    let engine = Engine::new(config()).unwrap();
    let cases = [
        ("\"Costco Support\" <noreply@costco.com>", false),
        ("\"C0stc0 Support\" <spam@spammer.com>", true),
        ("\"Shop Deals\" <deals@tamazon.com>", false),
        ("Amazon.com <test@ayodongbanyak08.com>", true),
    ];
    for (from, rejected) in cases {
        let mut txn = message(&ordinary(from));
        assert_eq!(
            engine.evaluate(&mut txn, &AuthResults::new()).is_reject(),
            rejected,
            "From: {}",
            from
        );
    }
}

#[test]
fn test_verified_brand_sender_accepted() {
    let engine = Engine::new(config()).unwrap();
    let raw = ordinary("\"Costco Wholesale\" <offers@costco-news.net>");

    let mut spf = AuthResults::new();
    spf.record_pass(Mechanism::Spf, "costco.com");
    assert_eq!(engine.evaluate(&mut message(&raw), &spf), Action::Continue);

    let trusted = AuthResults::from_authentication_results(
        ["mx.example.org; dkim=pass header.d=costco.com header.s=s1"],
        "mx.example.org",
    );
    assert_eq!(engine.evaluate(&mut message(&raw), &trusted), Action::Continue);

    let forged = AuthResults::from_authentication_results(
        ["evil.example; dkim=pass header.d=costco.com"],
        "mx.example.org",
    );
    assert!(engine.evaluate(&mut message(&raw), &forged).is_reject());
}

#[test]
fn test_forged_delivered_to() {
    let raw = format!("Delivered-To: user@example.org\r\n{}", ordinary("test@example.com"));

    let engine = Engine::new(config()).unwrap();
    assert_eq!(
        engine.evaluate(&mut message(&raw), &AuthResults::new()),
        Action::reject("Invalid Delivered-To header content")
    );

    let mut advisory = config();
    advisory.reject.delivered_to = false;
    let engine = Engine::new(advisory).unwrap();
    let mut txn = message(&raw);
    assert_eq!(engine.evaluate(&mut txn, &AuthResults::new()), Action::Continue);
    assert_eq!(txn.results.get(RESULT_SOURCE).fail, ["delivered_to"]);
}

#[test]
fn test_missing_required_rejection_names_header() {
    let mut config = config();
    config.reject.missing_required = true;
    let engine = Engine::new(config).unwrap();

    let mut txn = message("From: test@example.com\r\nSubject: no date\r\n\r\n");
    match engine.evaluate(&mut txn, &AuthResults::new()) {
        Action::Reject { message } => assert!(message.contains("Date")),
        other => panic!("Expected reject, got {:?}", other),
    }
    assert_eq!(txn.results.get(RESULT_SOURCE).fail, ["missing:Date"]);
}

#[test]
fn test_date_windows() {
    let engine = Engine::new(config()).unwrap();
    let date_token = |offset: Duration| {
        let raw = format!(
            "Date: {}\r\nFrom: test@example.com\r\n\r\n",
            (Utc::now() + offset).to_rfc2822()
        );
        let mut txn = message(&raw);
        engine.run_check("invalid_date", &mut txn, &AuthResults::new());
        let results = txn.results.get(RESULT_SOURCE);
        results
            .pass
            .into_iter()
            .chain(results.fail)
            .next()
            .unwrap_or_default()
    };

    assert_eq!(date_token(Duration::zero()), "invalid_date");
    assert_eq!(date_token(Duration::days(3)), "invalid_date(future)");
    assert_eq!(date_token(Duration::days(-20)), "invalid_date(past)");
}

#[test]
fn test_inbound_return_path_stripped() {
    let engine = Engine::new(config()).unwrap();
    let raw = format!("Return-Path: <test@example.com>\r\n{}", ordinary("test@example.com"));
    let mut txn = message(&raw);
    assert_eq!(engine.evaluate(&mut txn, &AuthResults::new()), Action::Continue);
    assert!(!txn.headers.contains("Return-Path"));
    assert_eq!(txn.removed_headers(), [("Return-Path".to_string(), 1)]);
}

#[test]
fn test_evaluation_is_idempotent() {
    let engine = Engine::new(config()).unwrap();
    let raw = format!(
        "X-Mailman-Version: 2.1\r\n{}",
        ordinary("\"Costco\" <deals@costco-offers.biz>")
    );
    let mut advisory = config();
    advisory.reject.from_phish = false;
    let advisory = Engine::new(advisory).unwrap();

    for engine in [&engine, &advisory] {
        let mut first = message(&raw);
        let mut second = message(&raw);
        let a = engine.evaluate(&mut first, &AuthResults::new());
        let b = engine.evaluate(&mut second, &AuthResults::new());
        assert_eq!(a, b);
        assert_eq!(
            first.results.to_json(RESULT_SOURCE),
            second.results.to_json(RESULT_SOURCE)
        );
    }
}
