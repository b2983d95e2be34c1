//! RFC 5322 address lists.
//!
//! The checks only need the address and display name of each mailbox, so the
//! grammar itself sits behind [`AddressParser`]. The default implementation
//! borrows mail-parser's header parser.

use crate::domain_utils::DomainUtils;
use crate::error::HeadersError;
use mail_parser::{Address, HeaderName, MessageParser};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAddress {
    pub name: Option<String>,
    pub address: String,
}

impl ParsedAddress {
    pub fn host(&self) -> Option<String> {
        DomainUtils::extract_domain(&self.address)
    }
}

pub trait AddressParser: Send + Sync {
    /// `Err` when the value is not an address list at all, `Ok(vec![])` when it
    /// is one but holds no usable mailbox.
    fn parse_list(&self, value: &str) -> Result<Vec<ParsedAddress>, HeadersError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MailParserAddresses;

impl AddressParser for MailParserAddresses {
    fn parse_list(&self, value: &str) -> Result<Vec<ParsedAddress>, HeadersError> {
        let raw = format!("From: {}\r\n\r\n", value.trim());
        let message = MessageParser::default()
            .parse(raw.as_bytes())
            .ok_or_else(|| HeadersError::Address(value.to_string()))?;
        let address = message
            .header(HeaderName::From)
            .and_then(|v| v.as_address())
            .ok_or_else(|| HeadersError::Address(value.to_string()))?;

        let mailboxes: Vec<_> = match address {
            Address::List(list) => list.iter().collect(),
            Address::Group(groups) => groups.iter().flat_map(|g| g.addresses.iter()).collect(),
        };

        Ok(mailboxes
            .into_iter()
            .filter_map(|addr| {
                let address = addr.address()?.trim();
                if address.is_empty() {
                    return None;
                }
                Some(ParsedAddress {
                    name: addr.name().map(str::to_string),
                    address: address.to_string(),
                })
            })
            .collect())
    }
}
