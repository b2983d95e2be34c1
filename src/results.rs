//! Per-message verdict annotations.
//!
//! Entries are appended by the checks and never rewritten. Consumers read an
//! aggregated [`CheckResults`] view per source.

use serde::Serialize;

/// Source name every header check records under.
pub const RESULT_SOURCE: &str = "headers";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass(String),
    Fail(String),
    Skip(String),
    Msg(String),
    Err(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResultEntry {
    pub verdict: Verdict,
    pub msg: Option<String>,
    pub emit: bool,
}

impl ResultEntry {
    fn new(verdict: Verdict) -> Self {
        Self {
            verdict,
            msg: None,
            emit: false,
        }
    }

    pub fn pass(token: impl Into<String>) -> Self {
        Self::new(Verdict::Pass(token.into()))
    }

    pub fn fail(token: impl Into<String>) -> Self {
        Self::new(Verdict::Fail(token.into()))
    }

    pub fn skip(token: impl Into<String>) -> Self {
        Self::new(Verdict::Skip(token.into()))
    }

    pub fn msg(text: impl Into<String>) -> Self {
        Self::new(Verdict::Msg(text.into()))
    }

    pub fn err(text: impl Into<String>) -> Self {
        Self::new(Verdict::Err(text.into()))
    }

    pub fn with_msg(mut self, msg: impl Into<String>) -> Self {
        self.msg = Some(msg.into());
        self
    }

    /// Surface the entry in the log as soon as it is recorded.
    pub fn emit(mut self) -> Self {
        self.emit = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CheckResults {
    pub pass: Vec<String>,
    pub fail: Vec<String>,
    pub skip: Vec<String>,
    pub msg: Vec<String>,
    pub err: Vec<String>,
}

impl CheckResults {
    pub fn is_empty(&self) -> bool {
        self.pass.is_empty()
            && self.fail.is_empty()
            && self.skip.is_empty()
            && self.msg.is_empty()
            && self.err.is_empty()
    }

    /// Compact one-line form used for the summary header.
    pub fn summary(&self) -> String {
        let mut parts = Vec::new();
        for (label, tokens) in [
            ("pass", &self.pass),
            ("fail", &self.fail),
            ("skip", &self.skip),
            ("err", &self.err),
        ] {
            if !tokens.is_empty() {
                parts.push(format!("{}: {}", label, tokens.join(", ")));
            }
        }
        parts.join("; ")
    }
}

#[derive(Debug, Clone, Default)]
pub struct ResultSink {
    entries: Vec<(String, ResultEntry)>,
}

impl ResultSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, source: &str, entry: ResultEntry) {
        if entry.emit {
            log::info!("{}: {}", source, describe(&entry));
        } else {
            log::debug!("{}: {}", source, describe(&entry));
        }
        self.entries.push((source.to_string(), entry));
    }

    pub fn entries<'a>(&'a self, source: &'a str) -> impl Iterator<Item = &'a ResultEntry> + 'a {
        self.entries
            .iter()
            .filter(move |(s, _)| s == source)
            .map(|(_, entry)| entry)
    }

    pub fn get(&self, source: &str) -> CheckResults {
        let mut results = CheckResults::default();
        for entry in self.entries(source) {
            match &entry.verdict {
                Verdict::Pass(token) => results.pass.push(token.clone()),
                Verdict::Fail(token) => results.fail.push(token.clone()),
                Verdict::Skip(token) => results.skip.push(token.clone()),
                Verdict::Msg(text) => results.msg.push(text.clone()),
                Verdict::Err(text) => results.err.push(text.clone()),
            }
            if let Some(msg) = &entry.msg {
                results.msg.push(msg.clone());
            }
        }
        results
    }

    pub fn to_json(&self, source: &str) -> serde_json::Value {
        serde_json::to_value(self.get(source)).unwrap_or(serde_json::Value::Null)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn describe(entry: &ResultEntry) -> String {
    let base = match &entry.verdict {
        Verdict::Pass(t) => format!("pass:{}", t),
        Verdict::Fail(t) => format!("fail:{}", t),
        Verdict::Skip(t) => format!("skip:{}", t),
        Verdict::Msg(t) => format!("msg:{}", t),
        Verdict::Err(t) => format!("err:{}", t),
    };
    match &entry.msg {
        Some(msg) => format!("{} ({})", base, msg),
        None => base,
    }
}
