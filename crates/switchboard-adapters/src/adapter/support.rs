//! Shared plumbing for adapter HTTP calls

use eventsource_stream::{Event, EventStreamError, Eventsource};
use futures_util::Stream;
use reqwest::RequestBuilder;
use serde_json::Value;
use switchboard_catalog::Provider;
use switchboard_core::Deadline;

use crate::error::AdapterError;

/// Resolve the upstream URL for a call
///
/// Priority: provider `base_url`, then a `base_url` setting, then the
/// adapter's documented default. The endpoint path may be overridden per
/// provider via the `endpoint` setting.
pub(crate) fn endpoint_url(
    provider: &Provider,
    default_base: Option<&str>,
    default_endpoint: &str,
) -> Result<String, AdapterError> {
    let base = provider
        .base_url
        .as_ref()
        .map(|u| u.as_str().to_owned())
        .or_else(|| provider.setting_str("base_url").map(str::to_owned))
        .or_else(|| default_base.map(str::to_owned))
        .ok_or_else(|| {
            AdapterError::BadRequest(format!("provider {} requires a base_url", provider.name))
        })?;

    let endpoint = provider.setting_str("endpoint").unwrap_or(default_endpoint);
    Ok(format!(
        "{}/{}",
        base.trim_end_matches('/'),
        endpoint.trim_start_matches('/')
    ))
}

/// Attach provider-configured extra headers
///
/// Credential material never travels through this map; auth decoration is
/// each adapter's own, audited code path.
pub(crate) fn apply_setting_headers(mut builder: RequestBuilder, provider: &Provider) -> RequestBuilder {
    if let Some(Value::Object(headers)) = provider.settings.get("headers") {
        for (name, value) in headers {
            if let Some(value) = value.as_str() {
                builder = builder.header(name, value);
            }
        }
    }
    builder
}

/// Send a request and parse the JSON reply, classifying failures
///
/// The remaining deadline budget becomes the request timeout, covering
/// connect, send, and body read.
pub(crate) async fn send_json(builder: RequestBuilder, deadline: Deadline) -> Result<Value, AdapterError> {
    let response = builder
        .timeout(deadline.remaining())
        .send()
        .await
        .map_err(|e| AdapterError::from_transport(&e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AdapterError::from_status(status, truncate(&body)));
    }

    response.json().await.map_err(|e| AdapterError::Upstream {
        status: status.as_u16(),
        body: format!("failed to parse upstream response: {e}"),
    })
}

/// Send a request expecting a server-sent-event body
pub(crate) async fn send_sse(
    builder: RequestBuilder,
    deadline: Deadline,
) -> Result<impl Stream<Item = Result<Event, EventStreamError<reqwest::Error>>> + Send, AdapterError> {
    let response = builder
        .timeout(deadline.remaining())
        .send()
        .await
        .map_err(|e| AdapterError::from_transport(&e))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(AdapterError::from_status(status, truncate(&body)));
    }

    Ok(response.bytes_stream().eventsource())
}

/// Keep upstream error bodies short enough to echo safely
fn truncate(body: &str) -> String {
    const MAX: usize = 2048;
    if body.len() <= MAX {
        body.to_owned()
    } else {
        let mut cut = MAX;
        while !body.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}...", &body[..cut])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use switchboard_catalog::ProviderType;

    fn provider(base_url: Option<&str>, settings: IndexMap<String, Value>) -> Provider {
        Provider {
            name: "p".to_owned(),
            provider_type: ProviderType::OpenaiCompatible,
            base_url: base_url.map(|u| u.parse().unwrap()),
            api_keys: vec![],
            settings,
            is_active: true,
        }
    }

    #[test]
    fn url_prefers_provider_base_then_default() {
        let p = provider(Some("https://example.com/v1/"), IndexMap::new());
        assert_eq!(
            endpoint_url(&p, Some("https://default"), "/chat").unwrap(),
            "https://example.com/v1/chat"
        );

        let p = provider(None, IndexMap::new());
        assert_eq!(
            endpoint_url(&p, Some("https://default"), "/chat").unwrap(),
            "https://default/chat"
        );

        assert!(endpoint_url(&p, None, "/chat").is_err());
    }

    #[test]
    fn endpoint_setting_overrides_default_path() {
        let mut settings = IndexMap::new();
        settings.insert("endpoint".to_owned(), Value::from("/custom/path"));
        let p = provider(Some("https://example.com"), settings);
        assert_eq!(
            endpoint_url(&p, None, "/chat").unwrap(),
            "https://example.com/custom/path"
        );
    }
}
