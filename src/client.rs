//! Client side of the contact service.
//!
//! This module provides:
//! - `ContactService` trait, the seam the controller talks through
//! - `HttpContactService`, a blocking HTTP implementation

use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;

use crate::contact::{Contact, NewContact};

/// Operations the contact service offers.
pub trait ContactService {
    /// Fetch every record
    fn list(&self) -> Result<Vec<Contact>>;

    /// Create a record; the service assigns id and favorite flag
    fn create(&self, contact: &NewContact) -> Result<Contact>;

    /// Flip the favorite flag. `None` when the id is unknown to the service.
    fn toggle_favorite(&self, id: i64) -> Result<Option<Contact>>;

    /// Remove a record. Unknown ids are not an error.
    fn delete(&self, id: i64) -> Result<()>;
}

pub struct HttpContactService {
    client: Client,
    base_url: String,
}

impl HttpContactService {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/contactos{}", self.base_url, path)
    }
}

impl ContactService for HttpContactService {
    fn list(&self) -> Result<Vec<Contact>> {
        let response = self
            .client
            .get(self.url(""))
            .send()
            .with_context(|| format!("GET {} failed", self.url("")))?;
        check_status(response)?
            .json()
            .context("failed to decode contact list")
    }

    fn create(&self, contact: &NewContact) -> Result<Contact> {
        let response = self
            .client
            .post(self.url(""))
            .json(contact)
            .send()
            .with_context(|| format!("POST {} failed", self.url("")))?;
        check_status(response)?
            .json()
            .context("failed to decode created contact")
    }

    fn toggle_favorite(&self, id: i64) -> Result<Option<Contact>> {
        let path = format!("/{id}/favorito");
        let response = self
            .client
            .put(self.url(&path))
            .send()
            .with_context(|| format!("PUT {} failed", self.url(&path)))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let contact = check_status(response)?
            .json()
            .context("failed to decode updated contact")?;
        Ok(Some(contact))
    }

    fn delete(&self, id: i64) -> Result<()> {
        let path = format!("/{id}");
        let response = self
            .client
            .delete(self.url(&path))
            .send()
            .with_context(|| format!("DELETE {} failed", self.url(&path)))?;
        check_status(response)?;
        Ok(())
    }
}

fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().unwrap_or_default();
    bail!("service answered {}: {}", status, body.trim())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_is_normalized() {
        let service = HttpContactService::new(" http://localhost:3000/ ", None).unwrap();
        assert_eq!(service.base_url(), "http://localhost:3000");
        assert_eq!(service.url("/5"), "http://localhost:3000/api/contactos/5");
    }

    #[test]
    fn test_unreachable_service_is_an_error() {
        // Nothing listens on the discard port.
        let service =
            HttpContactService::new("http://127.0.0.1:9", Some(Duration::from_secs(2))).unwrap();
        assert!(service.list().is_err());
        assert!(service.delete(1).is_err());
    }
}
