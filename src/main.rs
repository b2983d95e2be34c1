use clap::{Arg, Command};
use headers_milter::address::{AddressParser, MailParserAddresses};
use headers_milter::milter::Milter;
use headers_milter::{
    Action, AuthResults, Engine, HeaderStore, HeadersConfig, Transaction, RESULT_SOURCE,
};
use log::LevelFilter;
use std::process;

#[tokio::main]
async fn main() {
    let matches = Command::new("headers-milter")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Header policy checks for Postfix and Sendmail")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("/etc/headers-milter.yaml"),
        )
        .arg(
            Arg::new("generate-config")
                .long("generate-config")
                .value_name("FILE")
                .help("Generate a default configuration file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("test-config")
                .long("test-config")
                .help("Test configuration validity")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("test-email")
                .long("test-email")
                .value_name("FILE")
                .help("Run the enabled checks against an RFC 5322 message file")
                .action(clap::ArgAction::Set),
        )
        .arg(
            Arg::new("rcpt")
                .long("rcpt")
                .value_name("ADDRESS")
                .help("Envelope recipient for --test-email (repeatable)")
                .action(clap::ArgAction::Append),
        )
        .arg(
            Arg::new("verbose")
                .short('v')
                .long("verbose")
                .help("Enable verbose logging")
                .action(clap::ArgAction::SetTrue),
        )
        .get_matches();

    let log_level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    let config_path = matches
        .get_one::<String>("config")
        .cloned()
        .unwrap_or_else(|| "/etc/headers-milter.yaml".to_string());

    if let Some(generate_path) = matches.get_one::<String>("generate-config") {
        generate_default_config(generate_path);
        return;
    }

    let config = match load_config(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error loading configuration: {e}");
            process::exit(1);
        }
    };

    if matches.get_flag("test-config") {
        test_config(config);
        return;
    }

    if let Some(email_file) = matches.get_one::<String>("test-email") {
        let recipients: Vec<String> = matches
            .get_many::<String>("rcpt")
            .map(|values| values.cloned().collect())
            .unwrap_or_default();
        if let Err(e) = test_email_file(config, email_file, &recipients) {
            eprintln!("Error testing email: {e}");
            process::exit(1);
        }
        return;
    }

    let socket_path = config.socket_path.clone();
    log::info!("Starting headers-milter with config {}", config_path);

    let milter = match Milter::new(Some(config_path), config) {
        Ok(milter) => milter,
        Err(e) => {
            log::error!("Failed to build check engine: {e}");
            process::exit(1);
        }
    };
    if let Err(e) = milter.run(&socket_path).await {
        log::error!("Milter error: {e}");
        process::exit(1);
    }
}

fn load_config(path: &str) -> anyhow::Result<HeadersConfig> {
    if std::path::Path::new(path).exists() {
        HeadersConfig::from_file(path)
    } else {
        log::warn!("Configuration file '{path}' not found, using default configuration");
        Ok(HeadersConfig::default())
    }
}

fn generate_default_config(path: &str) {
    let config = HeadersConfig::default();
    match config.to_file(path) {
        Ok(()) => {
            println!("Default configuration written to: {path}");
            println!("Please edit the configuration file to suit your needs.");
        }
        Err(e) => {
            eprintln!("Error writing configuration file: {e}");
            process::exit(1);
        }
    }
}

fn test_config(config: HeadersConfig) {
    println!("Testing configuration...");
    println!("Socket path: {}", config.socket_path);
    println!("Phish targets: {}", config.phish_targets.len());
    for (brand, domain) in &config.phish_targets {
        println!("  {brand} -> {domain}");
    }

    match Engine::new(config) {
        Ok(engine) => {
            println!("Enabled checks: {}", engine.check_names().join(", "));
            println!("Configuration is valid.");
        }
        Err(e) => {
            println!("Configuration validation failed:");
            println!("Error: {e}");
            process::exit(1);
        }
    }
}

fn test_email_file(
    config: HeadersConfig,
    email_file: &str,
    recipients: &[String],
) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(email_file)?;
    let headers = HeaderStore::parse(&content);

    let sender = match headers.get_first("Return-Path") {
        Some(return_path) => Some(return_path.trim().to_string()),
        None => headers
            .get_decoded("From")
            .and_then(|from| MailParserAddresses.parse_list(&from).ok())
            .and_then(|list| list.into_iter().next())
            .map(|addr| addr.address),
    };

    let auth = match &config.milter.authserv_id {
        Some(id) => {
            AuthResults::from_authentication_results(headers.get_all("Authentication-Results"), id)
        }
        None => AuthResults::new(),
    };

    let engine = Engine::new(config)?;
    let mut txn = Transaction::new(headers);
    if let Some(sender) = &sender {
        txn = txn.with_mail_from(sender);
    }
    for rcpt in recipients {
        txn = txn.with_rcpt(rcpt);
    }

    println!("Testing email file: {email_file}");
    println!("Envelope sender: {}", sender.as_deref().unwrap_or("<>"));

    let action = engine.evaluate(&mut txn, &auth);
    println!("{}", serde_json::to_string_pretty(&txn.results.to_json(RESULT_SOURCE))?);
    match action {
        Action::Reject { message } => println!("Result: REJECT ({message})"),
        Action::Continue => println!("Result: ACCEPT"),
    }
    Ok(())
}
