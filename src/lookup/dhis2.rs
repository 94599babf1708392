use std::time::Duration;

use anyhow::Context;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Deserialize;
use tracing::{debug, warn};

use super::Lookup;
use crate::error::{Error, Result};

/// connection settings of a DHIS2 instance
#[derive(Debug, Clone)]
pub struct Dhis2Config {
    /// e.g. `https://play.dhis2.org/demo`, a trailing slash is ignored
    pub base_url: String,
    pub username: String,
    pub password: String,
    /// per request, connect and read included
    pub timeout: Duration,
}

impl Default for Dhis2Config {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            username: String::new(),
            password: String::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

impl Dhis2Config {
    pub fn new<U: Into<String>, N: Into<String>, P: Into<String>>(base_url: U, username: N, password: P) -> Self {
        Self {
            base_url: base_url.into(),
            username: username.into(),
            password: password.into(),
            ..Self::default()
        }
    }
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
    /// url, username and password are all required
    pub fn validate(&self) -> Result<()> {
        let missing: Vec<&str> = [
            ("url", &self.base_url),
            ("username", &self.username),
            ("password", &self.password),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(k, _)| k)
        .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::Config(format!("missing DHIS2 {}", missing.join(", "))))
        }
    }
}

#[derive(Deserialize)]
struct DataElements {
    #[serde(rename = "dataElements", default)]
    data_elements: Vec<DataElement>,
}

#[derive(Deserialize)]
struct DataElement {
    id: String,
    #[serde(rename = "displayName", default)]
    display_name: String,
}

/// Looks data elements up by display name through the DHIS2 web API, one blocking request per label.
pub struct Dhis2Lookup {
    agent: ureq::Agent,
    endpoint: String,
    authorization: String,
}

impl Dhis2Lookup {
    pub fn new(config: &Dhis2Config) -> Result<Self> {
        config.validate()?;
        let agent = ureq::AgentBuilder::new().timeout(config.timeout).build();
        let endpoint = format!("{}/api/dataElements", config.base_url.trim_end_matches('/'));
        let credentials = STANDARD.encode(format!("{}:{}", config.username, config.password));
        Ok(Self {
            agent,
            endpoint,
            authorization: format!("Basic {}", credentials),
        })
    }
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
    fn fetch(&self, label: &str) -> anyhow::Result<Option<String>> {
        let response = self
            .agent
            .get(&self.endpoint)
            .query("filter", &format!("displayName:eq:{}", label))
            .query("fields", "id,displayName")
            .query("pageSize", "1")
            .set("Authorization", &self.authorization)
            .set("Content-Type", "application/json")
            .call();
        let response = match response {
            Ok(r) => r,
            Err(ureq::Error::Status(code, r)) => {
                warn!(label, status = code, reason = r.status_text(), "DHIS2 request failed");
                return Ok(None);
            },
            Err(e) => return Err(e).context("DHIS2 request failed"),
        };
        let body: DataElements = response
            .into_json()
            .context("Failed to parse DHIS2 response")?;
        let found = body.data_elements.into_iter().next();
        if let Some(element) = &found {
            debug!(label, id = %element.id, display_name = %element.display_name, "data element found");
        }
        Ok(found.map(|e| e.id))
    }
}

impl Lookup for Dhis2Lookup {
    fn resolve(&self, label: &str) -> Option<String> {
        match self.fetch(label) {
            Ok(id) => id,
            Err(e) => {
                warn!(label, error = %format!("{:#}", e), "data element lookup failed");
                None
            },
        }
    }
}
