use std::time::Duration;

use log::{debug, warn};
use reqwest::Client as HttpClient;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use url::Url;

use crate::api::error::GatewayError;
use crate::api::models::{
    ContactInfo, DeleteAck, Notification, ReceiptId, SendAck, StateInstance,
};
use crate::config::Settings;

/// Gateway account the calls are made on behalf of.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub id: String,
    pub token: String,
}

impl Instance {
    pub fn new(id: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            token: token.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: HttpClient,
    base_url: Url,
    contact_domain: String,
}

impl ApiClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, GatewayError> {
        let normalized = crate::utils::normalize_url(base_url);
        let base_url =
            Url::parse(&normalized).map_err(|e| GatewayError::InvalidUrl(format!("{normalized}: {e}")))?;
        if base_url.cannot_be_a_base() {
            return Err(GatewayError::InvalidUrl(normalized));
        }
        let http = HttpClient::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url,
            contact_domain: crate::config::DEFAULT_CONTACT_DOMAIN.to_string(),
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, GatewayError> {
        let mut client = Self::new(&settings.api_url, settings.request_timeout())?;
        client.contact_domain = settings.contact_domain.clone();
        Ok(client)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// `{base}/waInstance{id}/{method}/{token}[/{extra}]`
    fn endpoint(&self, instance: &Instance, method: &str, extra: Option<&str>) -> Result<Url, GatewayError> {
        let mut url = self.base_url.clone();
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| GatewayError::InvalidUrl(self.base_url.to_string()))?;
            segments.pop_if_empty();
            segments.push(&format!("waInstance{}", instance.id));
            segments.push(method);
            segments.push(&instance.token);
            if let Some(extra) = extra {
                segments.push(extra);
            }
        }
        Ok(url)
    }

    async fn execute<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T, GatewayError> {
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }
        let bytes = resp.bytes().await?;
        // receiveNotification answers an empty queue with `null` (some proxies with nothing)
        let bytes: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
            b"null"
        } else {
            &bytes
        };
        serde_json::from_slice(bytes).map_err(|e| GatewayError::Decode(e.to_string()))
    }

    pub async fn check_account_state(&self, instance: &Instance) -> Result<StateInstance, GatewayError> {
        let url = self.endpoint(instance, "getStateInstance", None)?;
        debug!("GET getStateInstance for instance {}", instance.id);
        self.execute(self.http.get(url)).await
    }

    /// Looks the phone number up as `<digits>@<contact domain>`.
    pub async fn resolve_contact(&self, instance: &Instance, phone: &str) -> Result<ContactInfo, GatewayError> {
        let url = self.endpoint(instance, "getContactInfo", None)?;
        let chat_id = crate::utils::contact_key(phone, &self.contact_domain);
        debug!("POST getContactInfo for {chat_id}");
        self.execute(self.http.post(url).json(&json!({ "chatId": chat_id })))
            .await
    }

    /// Fetches the next queued notification and deletes its receipt upstream.
    /// A failed deletion is logged only; the notification may then be redelivered.
    pub async fn poll_next_notification(&self, instance: &Instance) -> Result<Option<Notification>, GatewayError> {
        let url = self.endpoint(instance, "receiveNotification", None)?;
        // Decoded loosely so a malformed body can never keep its receipt from being deleted.
        let raw: Option<Value> = self.execute(self.http.get(url)).await?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        let notification = Notification::from_value(raw);
        if let Some(receipt) = notification.receipt_id.as_ref() {
            debug!("received notification {receipt}");
            if let Err(e) = self.delete_notification(instance, receipt).await {
                warn!("failed to delete notification {receipt}: {e}");
            }
        }
        Ok(Some(notification))
    }

    pub async fn delete_notification(&self, instance: &Instance, receipt: &ReceiptId) -> Result<DeleteAck, GatewayError> {
        let receipt = receipt.to_string();
        let url = self.endpoint(instance, "deleteNotification", Some(&receipt))?;
        self.execute(self.http.delete(url)).await
    }

    pub async fn send_message(&self, instance: &Instance, chat_id: &str, text: &str) -> Result<SendAck, GatewayError> {
        let url = self.endpoint(instance, "sendMessage", None)?;
        debug!("POST sendMessage to {chat_id}");
        self.execute(
            self.http
                .post(url)
                .json(&json!({ "chatId": chat_id, "message": text })),
        )
        .await
    }

    /// Raw GET of an absolute URL, used for contact avatars which live off-gateway.
    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>, GatewayError> {
        let parsed = Url::parse(url).map_err(|e| GatewayError::InvalidUrl(format!("{url}: {e}")))?;
        let resp = self.http.get(parsed).send().await?;
        let status = resp.status();
        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body: String::new(),
            });
        }
        Ok(resp.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_embeds_instance_and_token() {
        let client = ApiClient::new("api.green-api.com", Duration::from_secs(1)).unwrap();
        let instance = Instance::new("1101", "tok");
        let url = client.endpoint(&instance, "getStateInstance", None).unwrap();
        assert_eq!(url.as_str(), "https://api.green-api.com/waInstance1101/getStateInstance/tok");

        let url = client
            .endpoint(&instance, "deleteNotification", Some("15"))
            .unwrap();
        assert_eq!(url.as_str(), "https://api.green-api.com/waInstance1101/deleteNotification/tok/15");
    }

    #[test]
    fn endpoint_keeps_base_path_prefix() {
        let client = ApiClient::new("http://localhost:8080/proxy/", Duration::from_secs(1)).unwrap();
        let url = client
            .endpoint(&Instance::new("1", "t"), "sendMessage", None)
            .unwrap();
        assert_eq!(url.as_str(), "http://localhost:8080/proxy/waInstance1/sendMessage/t");
    }

    #[test]
    fn rejects_unusable_base_url() {
        assert!(matches!(
            ApiClient::new("http://", Duration::from_secs(1)),
            Err(GatewayError::InvalidUrl(_))
        ));
    }
}
