use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

use crate::checker::CheckError;
use crate::probe::ProxyEndpoint;

static ORG_NAME_JUNK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-zA-Z0-9\s]").expect("static regex is valid"));

/// One line of the candidate list: `ip,port,country,organization`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyCandidate {
    pub address: String,
    pub port: u16,
    pub country_label: String,
    pub organization_label: String,
}

impl ProxyCandidate {
    pub fn parse(line: &str) -> Result<Self, CheckError> {
        let line = line.trim();
        let fields: Vec<&str> = line.split(',').collect();
        let &[address, port, country, organization] = fields.as_slice() else {
            return Err(CheckError::InvalidFormat(line.to_string()));
        };

        let port = port
            .trim()
            .parse::<u16>()
            .map_err(|_| CheckError::InvalidFormat(line.to_string()))?;

        Ok(ProxyCandidate {
            address: address.trim().to_string(),
            port,
            country_label: country.to_string(),
            organization_label: organization.to_string(),
        })
    }

    pub fn endpoint(&self) -> ProxyEndpoint {
        ProxyEndpoint::new(self.address.clone(), self.port)
    }
}

/// A candidate confirmed to relay traffic.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AliveRecord {
    pub address: String,
    pub port: u16,
    pub country_label: String,
    pub organization: String,
}

impl AliveRecord {
    /// `organization` is the name the endpoint reported for the proxy's
    /// address, if any; the label from the input line is used otherwise.
    pub fn new(candidate: &ProxyCandidate, organization: Option<&str>) -> Self {
        let organization = organization.unwrap_or(&candidate.organization_label);
        AliveRecord {
            address: candidate.address.clone(),
            port: candidate.port,
            country_label: candidate.country_label.clone(),
            organization: clean_org_name(organization),
        }
    }
}

impl fmt::Display for AliveRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.address, self.port, self.country_label, self.organization
        )
    }
}

/// Drop every character that is not an ASCII letter, digit or whitespace.
pub fn clean_org_name(name: &str) -> String {
    ORG_NAME_JUNK.replace_all(name, "").into_owned()
}
