use crate::config::GMAIL_API_BASE;
use crate::error::SinkError;
use crate::types::gmail::{ListMessagesResponse, MessageRef, RawMessage};
use url::Url;

/// Thin client for the two Gmail calls this system makes.
#[derive(Clone)]
pub struct GmailApi {
    http: reqwest::Client,
    base_url: Url,
}

impl GmailApi {
    pub fn new(http: reqwest::Client) -> Self {
        Self::with_base_url(http, GMAIL_API_BASE.clone())
    }

    /// Point the client at a different base, e.g. a mock server in tests.
    pub fn with_base_url(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    /// List one bounded page of message ids for the authenticated mailbox.
    /// No continuation token handling: repeated runs see the same
    /// most-recent window.
    pub async fn list_message_ids(
        &self,
        access_token: &str,
        page_size: u32,
    ) -> Result<Vec<MessageRef>, SinkError> {
        let mut url = self.base_url.join("users/me/messages")?;
        url.query_pairs_mut()
            .append_pair("maxResults", &page_size.to_string());

        let resp = self.http.get(url).bearer_auth(access_token).send().await?;
        if !resp.status().is_success() {
            return Err(SinkError::UpstreamStatus(resp.status()));
        }
        let listing: ListMessagesResponse = resp.json().await?;
        Ok(listing.messages)
    }

    /// Fetch the full message for one id.
    pub async fn get_message(
        &self,
        access_token: &str,
        id: &str,
    ) -> Result<RawMessage, SinkError> {
        let url = self.base_url.join(&format!("users/me/messages/{id}"))?;

        let resp = self.http.get(url).bearer_auth(access_token).send().await?;
        if !resp.status().is_success() {
            return Err(SinkError::UpstreamStatus(resp.status()));
        }
        let message: RawMessage = resp.json().await?;
        Ok(message)
    }
}
