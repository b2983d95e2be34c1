use mail_parser::MessageParser;

/// Ordered header fields of one message. Names compare case-insensitively and
/// repeated fields keep their original order.
#[derive(Debug, Clone, Default)]
pub struct HeaderStore {
    fields: Vec<(String, String)>,
}

impl HeaderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses an RFC 5322 header block, unfolding continuation lines. Parsing
    /// stops at the first empty line.
    pub fn parse(raw: &str) -> Self {
        let mut store = Self::new();
        for line in raw.lines() {
            if line.trim().is_empty() {
                break;
            }
            if line.starts_with(' ') || line.starts_with('\t') {
                if let Some((_, value)) = store.fields.last_mut() {
                    value.push(' ');
                    value.push_str(line.trim());
                }
                continue;
            }
            if let Some((name, value)) = line.split_once(':') {
                store.add(name.trim(), value.trim());
            }
        }
        store
    }

    pub fn add(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    pub fn get_first(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |(field, _)| field.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn count(&self, name: &str) -> usize {
        self.get_all(name).count()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get_first(name).is_some()
    }

    /// First value with RFC 2047 encoded-words decoded and folding removed.
    pub fn get_decoded(&self, name: &str) -> Option<String> {
        self.get_first(name).map(decode_value)
    }

    /// Removes every field called `name`, returning how many were dropped.
    pub fn remove(&mut self, name: &str) -> usize {
        let before = self.fields.len();
        self.fields.retain(|(field, _)| !field.eq_ignore_ascii_case(name));
        before - self.fields.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields
            .iter()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Decodes encoded-words by running the value through mail-parser as an
/// unstructured field.
fn decode_value(value: &str) -> String {
    let raw = format!("Subject: {}\r\n\r\n", value.trim());
    MessageParser::default()
        .parse(raw.as_bytes())
        .and_then(|message| message.subject().map(str::to_string))
        .unwrap_or_else(|| value.trim().to_string())
}
