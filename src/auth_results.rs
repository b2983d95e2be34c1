use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref COMMENT: Regex = Regex::new(r"\([^)]*\)").unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mechanism {
    Spf,
    Dkim,
    Fcrdns,
}

/// Prior verdict of one mechanism: the names it passed for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MechanismResult {
    pub pass: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DkimNote {
    pub result: String,
    pub domain: String,
}

/// Authentication verdicts published for the current connection and message.
#[derive(Debug, Clone, Default)]
pub struct AuthResults {
    spf: Option<MechanismResult>,
    dkim: Option<MechanismResult>,
    fcrdns: Option<MechanismResult>,
    dkim_notes: Vec<DkimNote>,
}

impl AuthResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, mechanism: Mechanism) -> Option<&MechanismResult> {
        match mechanism {
            Mechanism::Spf => self.spf.as_ref(),
            Mechanism::Dkim => self.dkim.as_ref(),
            Mechanism::Fcrdns => self.fcrdns.as_ref(),
        }
    }

    pub fn record_pass(&mut self, mechanism: Mechanism, name: impl Into<String>) {
        let slot = match mechanism {
            Mechanism::Spf => &mut self.spf,
            Mechanism::Dkim => &mut self.dkim,
            Mechanism::Fcrdns => &mut self.fcrdns,
        };
        slot.get_or_insert_with(MechanismResult::default)
            .pass
            .push(name.into().to_lowercase());
    }

    pub fn add_dkim_note(&mut self, result: impl Into<String>, domain: impl Into<String>) {
        self.dkim_notes.push(DkimNote {
            result: result.into().to_lowercase(),
            domain: domain.into().to_lowercase(),
        });
    }

    pub fn dkim_notes(&self) -> &[DkimNote] {
        &self.dkim_notes
    }

    /// Collects SPF and DKIM verdicts from `Authentication-Results` fields
    /// stamped by `authserv_id`. Fields from any other server are ignored,
    /// since a sender can add them freely.
    pub fn from_authentication_results<'a>(
        fields: impl IntoIterator<Item = &'a str>,
        authserv_id: &str,
    ) -> Self {
        let mut results = Self::new();
        for field in fields {
            results.merge_field(field, authserv_id);
        }
        results
    }

    fn merge_field(&mut self, field: &str, authserv_id: &str) {
        let field = COMMENT.replace_all(field, " ");
        let mut parts = field.split(';');

        let id = parts
            .next()
            .and_then(|p| p.split_whitespace().next())
            .unwrap_or_default();
        if !id.eq_ignore_ascii_case(authserv_id) {
            log::debug!("Ignoring Authentication-Results from '{}'", id);
            return;
        }

        for resinfo in parts {
            let mut tokens = resinfo.split_whitespace();
            let Some((method, result)) = tokens.next().and_then(|t| t.split_once('=')) else {
                continue;
            };
            let result = result.to_lowercase();
            let props: Vec<(&str, &str)> = tokens.filter_map(|t| t.split_once('=')).collect();
            let prop = |key: &str| {
                props
                    .iter()
                    .find(|(k, _)| k.eq_ignore_ascii_case(key))
                    .map(|(_, v)| v.trim_matches('"'))
            };

            match method.to_lowercase().as_str() {
                "spf" => {
                    let domain = prop("smtp.mailfrom")
                        .map(|v| v.rsplit_once('@').map_or(v, |(_, host)| host))
                        .or_else(|| prop("smtp.helo"));
                    if let (Some(domain), "pass") = (domain, result.as_str()) {
                        self.record_pass(Mechanism::Spf, domain);
                    }
                }
                "dkim" => {
                    let domain = prop("header.d").or_else(|| {
                        prop("header.i").map(|v| v.rsplit_once('@').map_or(v, |(_, host)| host))
                    });
                    if let Some(domain) = domain {
                        if result == "pass" {
                            self.record_pass(Mechanism::Dkim, domain);
                        }
                        self.add_dkim_note(result.clone(), domain);
                    }
                }
                _ => {}
            }
        }
    }
}
