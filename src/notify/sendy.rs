use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use url::{form_urlencoded, Url};

use super::{response_reason, DispatchError, EmailTemplate, NotificationRequest, NotificationSink};
use crate::util::{service_endpoint, truncate_chars, UrlValidationError};

/// Campaign creation endpoint, relative to the Sendy installation.
pub const CAMPAIGN_PATH: &str = "/api/campaigns/create.php";

// Prefix of the success body; Sendy answers 200 for most failures too
const CAMPAIGN_CREATED: &str = "Campaign created";

const SINK_NAME: &str = "sendy";

/// Creates and immediately sends a Sendy campaign for each entry.
pub struct SendySink {
    client: reqwest::Client,
    endpoint: Url,
    api_key: SecretString,
    list_id: String,
    from_name: String,
    from_email: String,
    template: Option<EmailTemplate>,
}

impl SendySink {
    /// `hostname` is the bare host of the Sendy installation, optionally with a port.
    pub fn new(
        client: reqwest::Client,
        hostname: &str,
        api_key: SecretString,
        list_id: impl Into<String>,
        from_name: impl Into<String>,
        from_email: impl Into<String>,
    ) -> Result<Self, UrlValidationError> {
        Ok(Self {
            client,
            endpoint: service_endpoint(hostname, CAMPAIGN_PATH)?,
            api_key,
            list_id: list_id.into(),
            from_name: from_name.into(),
            from_email: from_email.into(),
            template: None,
        })
    }

    pub fn with_template(mut self, template: EmailTemplate) -> Self {
        self.template = Some(template);
        self
    }

    /// Overrides the campaign URL. Used to point the sink at a local server.
    pub fn with_endpoint(mut self, endpoint: Url) -> Self {
        self.endpoint = endpoint;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn form_body(&self, request: &NotificationRequest) -> String {
        let subject = truncate_chars(request.title.trim(), 250);
        let html = match &self.template {
            Some(template) => template.render(&request.title, &request.rich_text_body),
            None => request.rich_text_body.clone(),
        };

        form_urlencoded::Serializer::new(String::new())
            .append_pair("api_key", self.api_key.expose_secret())
            .append_pair("from_name", &self.from_name)
            .append_pair("from_email", &self.from_email)
            .append_pair("reply_to", &self.from_email)
            .append_pair("title", &subject)
            .append_pair("subject", &subject)
            .append_pair("html_text", &html)
            .append_pair("plain_text", &request.plain_text_body)
            .append_pair("list_ids", &self.list_id)
            .append_pair("send_campaign", "1")
            .finish()
    }
}

impl std::fmt::Debug for SendySink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SendySink")
            .field("endpoint", &self.endpoint.as_str())
            .field("api_key", &"[REDACTED]")
            .field("list_id", &self.list_id)
            .field("from_email", &self.from_email)
            .field("template", &self.template.is_some())
            .finish()
    }
}

#[async_trait]
impl NotificationSink for SendySink {
    fn name(&self) -> &'static str {
        SINK_NAME
    }

    async fn dispatch(&self, request: &NotificationRequest) -> Result<(), DispatchError> {
        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(self.form_body(request))
            .send()
            .await
            .map_err(|source| DispatchError::Network {
                sink: SINK_NAME,
                source,
            })?;

        if response.status() != StatusCode::OK {
            return Err(DispatchError::Rejected {
                sink: SINK_NAME,
                reason: response_reason(response).await,
            });
        }

        let body = response.text().await.map_err(|source| DispatchError::Network {
            sink: SINK_NAME,
            source,
        })?;
        let body = body.trim();
        if !body.starts_with(CAMPAIGN_CREATED) {
            return Err(DispatchError::Rejected {
                sink: SINK_NAME,
                reason: truncate_chars(body, 200).into_owned(),
            });
        }

        tracing::debug!(title = %request.title, list = %self.list_id, "Sendy campaign created");
        Ok(())
    }
}
