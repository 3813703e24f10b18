//! Chatwoot-backed contact gateway.
//!
//! Talks to the Chatwoot application API (`/api/v1/accounts/{account}`)
//! with an `api_access_token` header. Only the endpoints the board needs are
//! implemented: custom attribute definitions, the plain and filtered contact
//! listings, and the custom attribute write/clear calls.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use kanban_models::{Contact, ContactId, ListAttribute};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use url::Url;

use crate::error::{GatewayError, Result};
use crate::gateway::{ContactGateway, ContactPage, ContactQuery, PageMeta, StageFilter};

/// Environment variable for the Chatwoot base URL.
pub const CHATWOOT_URL_ENV: &str = "CHATWOOT_URL";

/// Environment variable for the Chatwoot account ID.
pub const CHATWOOT_ACCOUNT_ID_ENV: &str = "CHATWOOT_ACCOUNT_ID";

/// Environment variable for the Chatwoot API access token.
pub const CHATWOOT_API_TOKEN_ENV: &str = "CHATWOOT_API_TOKEN";

/// Environment variable restricting board attributes to a key prefix.
pub const ATTRIBUTE_PREFIX_ENV: &str = "KANBAN_ATTRIBUTE_PREFIX";

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Longest response body kept in an error message.
const MAX_ERROR_BODY: usize = 512;

/// Statuses from the filter endpoint that mean "this filter shape is not
/// accepted" rather than a generic failure.
const FILTER_REJECTED_STATUSES: [u16; 4] = [400, 404, 405, 422];

/// Connection settings for a Chatwoot account.
#[derive(Clone)]
pub struct ChatwootConfig {
    /// Base URL of the Chatwoot installation.
    pub base_url: Url,
    /// Account whose contacts are shown.
    pub account_id: String,
    /// API access token.
    pub api_token: String,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Only attributes whose key starts with this prefix are offered.
    pub attribute_prefix: Option<String>,
}

impl fmt::Debug for ChatwootConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatwootConfig")
            .field("base_url", &self.base_url.as_str())
            .field("account_id", &self.account_id)
            .field("api_token", &self.masked_token())
            .field("timeout", &self.timeout)
            .field("attribute_prefix", &self.attribute_prefix)
            .finish()
    }
}

impl ChatwootConfig {
    /// Creates a configuration, validating every parameter.
    pub fn new(
        base_url: &str,
        account_id: impl Into<String>,
        api_token: impl Into<String>,
    ) -> Result<Self> {
        let base_url = base_url.trim();
        if base_url.is_empty() {
            return Err(GatewayError::Config("Chatwoot URL is required".into()));
        }
        let base_url = Url::parse(base_url)
            .map_err(|e| GatewayError::Config(format!("invalid Chatwoot URL '{}': {}", base_url, e)))?;

        let account_id = account_id.into().trim().to_string();
        if account_id.is_empty() {
            return Err(GatewayError::Config("Chatwoot account ID is required".into()));
        }

        let api_token = api_token.into().trim().to_string();
        if api_token.is_empty() {
            return Err(GatewayError::Config("Chatwoot API token is required".into()));
        }

        Ok(Self {
            base_url,
            account_id,
            api_token,
            timeout: DEFAULT_TIMEOUT,
            attribute_prefix: None,
        })
    }

    /// Creates a configuration from environment variables.
    pub fn from_env() -> Result<Self> {
        let var = |name: &str| std::env::var(name).unwrap_or_default();
        let config = Self::new(
            &var(CHATWOOT_URL_ENV),
            var(CHATWOOT_ACCOUNT_ID_ENV),
            var(CHATWOOT_API_TOKEN_ENV),
        )?;
        Ok(match std::env::var(ATTRIBUTE_PREFIX_ENV) {
            Ok(prefix) if !prefix.is_empty() => config.with_attribute_prefix(prefix),
            _ => config,
        })
    }

    /// Sets the request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Restricts offered attributes to keys starting with `prefix`.
    pub fn with_attribute_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.attribute_prefix = Some(prefix.into());
        self
    }

    /// Returns the token with everything but the first and last four
    /// characters hidden.
    pub fn masked_token(&self) -> String {
        let chars: Vec<char> = self.api_token.chars().collect();
        if chars.len() <= 8 {
            return "*".repeat(chars.len());
        }
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }

    /// Builds an account-scoped API URL.
    fn account_url(&self, path: &str) -> Result<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let raw = format!("{}/api/v1/accounts/{}{}", base, self.account_id, path);
        Url::parse(&raw).map_err(|e| GatewayError::Config(format!("invalid URL '{}': {}", raw, e)))
    }
}

/// Attribute definition as returned by `custom_attribute_definitions`.
#[derive(Debug, Deserialize)]
struct AttributeDefinition {
    attribute_key: String,
    #[serde(default)]
    attribute_display_name: Option<String>,
    #[serde(default)]
    attribute_display_type: Option<String>,
    #[serde(default)]
    attribute_model: Option<String>,
    #[serde(default)]
    attribute_values: Option<Vec<Value>>,
}

impl AttributeDefinition {
    fn is_contact_list(&self) -> bool {
        self.attribute_model.as_deref() == Some("contact_attribute")
            && self.attribute_display_type.as_deref() == Some("list")
    }

    fn into_list_attribute(self) -> ListAttribute {
        let values = self
            .attribute_values
            .unwrap_or_default()
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) if !s.is_empty() => Some(s),
                _ => None,
            })
            .collect::<Vec<_>>();
        let display_name = self
            .attribute_display_name
            .filter(|n| !n.is_empty())
            .unwrap_or_else(|| self.attribute_key.clone());
        ListAttribute::new(self.attribute_key, display_name, values)
    }
}

/// Definitions come either bare or wrapped in `payload`.
#[derive(Deserialize)]
#[serde(untagged)]
enum DefinitionsResponse {
    Wrapped { payload: Vec<AttributeDefinition> },
    Bare(Vec<AttributeDefinition>),
}

/// Chatwoot reports some counters as strings.
#[derive(Deserialize)]
#[serde(untagged)]
enum Counter {
    Number(u64),
    Text(String),
}

impl Counter {
    fn value(&self) -> Option<u64> {
        match self {
            Counter::Number(n) => Some(*n),
            Counter::Text(s) => s.trim().parse().ok(),
        }
    }
}

#[derive(Deserialize, Default)]
struct RawMeta {
    #[serde(default)]
    count: Option<Counter>,
    #[serde(default)]
    current_page: Option<Counter>,
}

#[derive(Deserialize)]
struct ContactsResponse {
    #[serde(default)]
    meta: Option<RawMeta>,
    #[serde(default)]
    payload: Vec<Contact>,
}

impl ContactsResponse {
    fn into_page(self, requested_page: u32) -> ContactPage {
        let meta = self.meta.unwrap_or_default();
        ContactPage {
            contacts: self.payload,
            meta: PageMeta {
                total_count: meta.count.as_ref().and_then(Counter::value),
                current_page: meta
                    .current_page
                    .as_ref()
                    .and_then(Counter::value)
                    .and_then(|p| u32::try_from(p).ok())
                    .unwrap_or(requested_page),
            },
        }
    }
}

/// Builds the Chatwoot filter payload for a stage filter. `None` means the
/// plain listing endpoint should be used instead.
fn filter_payload(attribute_key: &str, filter: &StageFilter) -> Option<Value> {
    let condition = |operator: &str, values: Vec<String>, query_operator: Value| {
        json!({
            "attribute_key": attribute_key,
            "filter_operator": operator,
            "values": values,
            "query_operator": query_operator,
            "custom_attribute_type": "",
        })
    };

    match filter {
        StageFilter::Any => None,
        StageFilter::Value(v) => Some(json!({
            "payload": [condition("equal_to", vec![v.clone()], Value::Null)]
        })),
        StageFilter::Unassigned { legal_values } if legal_values.is_empty() => Some(json!({
            "payload": [condition("is_not_present", Vec::new(), Value::Null)]
        })),
        StageFilter::Unassigned { legal_values } => Some(json!({
            "payload": [
                condition("is_not_present", Vec::new(), json!("or")),
                condition("not_equal_to", legal_values.clone(), Value::Null),
            ]
        })),
    }
}

fn truncate_body(body: &str) -> String {
    if body.chars().count() <= MAX_ERROR_BODY {
        body.to_string()
    } else {
        let cut: String = body.chars().take(MAX_ERROR_BODY).collect();
        format!("{}...", cut)
    }
}

/// Contact gateway backed by the Chatwoot REST API.
#[derive(Clone)]
pub struct ChatwootGateway {
    config: ChatwootConfig,
    client: reqwest::Client,
}

impl ChatwootGateway {
    /// Creates a gateway for the given account.
    pub fn new(config: ChatwootConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self { config, client })
    }

    /// Creates a gateway from environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ChatwootConfig::from_env()?)
    }

    /// Returns the connection settings.
    pub fn config(&self) -> &ChatwootConfig {
        &self.config
    }

    /// Sends a request and returns the decoded JSON body, or
    /// `GatewayError::Http` for non-success statuses.
    async fn request_json(&self, method: Method, url: Url, body: Option<Value>) -> Result<Value> {
        debug!(method = %method, url = %url, "chatwoot request");

        let mut request = self
            .client
            .request(method.clone(), url.clone())
            .header("api_access_token", &self.config.api_token)
            .header("Content-Type", "application/json");
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            warn!(
                method = %method,
                url = %url,
                status = status.as_u16(),
                "chatwoot request failed"
            );
            return Err(GatewayError::Http {
                status: status.as_u16(),
                method: method.to_string(),
                url: url.to_string(),
                body: truncate_body(&text),
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl ContactGateway for ChatwootGateway {
    async fn list_attributes(&self) -> Result<Vec<ListAttribute>> {
        let url = self.config.account_url("/custom_attribute_definitions")?;
        let body = self.request_json(Method::GET, url, None).await?;
        let definitions = match serde_json::from_value::<DefinitionsResponse>(body)? {
            DefinitionsResponse::Wrapped { payload } => payload,
            DefinitionsResponse::Bare(list) => list,
        };

        let prefix = self.config.attribute_prefix.as_deref().unwrap_or("");
        let attributes: Vec<ListAttribute> = definitions
            .into_iter()
            .filter(AttributeDefinition::is_contact_list)
            .filter(|d| d.attribute_key.starts_with(prefix))
            .map(AttributeDefinition::into_list_attribute)
            .collect();

        debug!(count = attributes.len(), "loaded list attributes");
        Ok(attributes)
    }

    async fn list_contacts(&self, query: &ContactQuery) -> Result<ContactPage> {
        let page = query.page.to_string();
        let body = match filter_payload(&query.attribute_key, &query.filter) {
            None => {
                let mut url = self.config.account_url("/contacts")?;
                url.query_pairs_mut().append_pair("page", &page);
                self.request_json(Method::GET, url, None).await?
            }
            Some(payload) => {
                let mut url = self.config.account_url("/contacts/filter")?;
                url.query_pairs_mut().append_pair("page", &page);
                match self.request_json(Method::POST, url, Some(payload)).await {
                    Ok(body) => body,
                    Err(GatewayError::Http { status, body, .. })
                        if FILTER_REJECTED_STATUSES.contains(&status) =>
                    {
                        return Err(GatewayError::FilterUnsupported(format!(
                            "HTTP {}: {}",
                            status, body
                        )));
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        let response: ContactsResponse = serde_json::from_value(body)?;
        let page = response.into_page(query.page);
        debug!(
            attribute = %query.attribute_key,
            filter = %query.filter.label(),
            page = query.page,
            returned = page.contacts.len(),
            total = ?page.meta.total_count,
            "listed contacts"
        );
        Ok(page)
    }

    async fn set_stage(
        &self,
        contact_id: &ContactId,
        attribute_key: &str,
        value: Option<&str>,
    ) -> Result<()> {
        match value {
            Some(value) => {
                let url = self.config.account_url(&format!("/contacts/{}", contact_id))?;
                let body = json!({ "custom_attributes": { attribute_key: value } });
                self.request_json(Method::PUT, url, Some(body)).await?;
            }
            None => {
                let url = self
                    .config
                    .account_url(&format!("/contacts/{}/destroy_custom_attributes", contact_id))?;
                let body = json!({ "custom_attributes": [attribute_key] });
                self.request_json(Method::POST, url, Some(body)).await?;
            }
        }
        debug!(contact_id = %contact_id, attribute = %attribute_key, value = ?value, "updated contact stage");
        Ok(())
    }
}
