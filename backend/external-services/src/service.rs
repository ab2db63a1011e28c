//! Shared HTTP client for the gateway's merchant API.
//!
//! Policy: always resolve, never reject on HTTP status. A non-2xx response
//! surfaces as `Ok(Err(Response))` so the caller decides what a failure
//! status means for the payment; only transport-level problems become
//! errors, with timeouts distinguished for the graceful-degradation path.

use std::{str::FromStr, time::Duration};

use common_utils::{
    request::{Method, Request, RequestContent},
    CustomResult,
};
use domain_types::errors::ApiClientError;
use error_stack::{report, ResultExt};
use once_cell::sync::OnceCell;
use reqwest::Client;

/// Bound on every outbound gateway call.
pub const GATEWAY_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

#[derive(Debug, Clone)]
pub struct Response {
    pub status_code: u16,
    pub response: bytes::Bytes,
}

static CLIENT: OnceCell<Client> = OnceCell::new();

fn get_client() -> CustomResult<Client, ApiClientError> {
    Ok(CLIENT
        .get_or_try_init(|| {
            Client::builder()
                .redirect(reqwest::redirect::Policy::none())
                .pool_idle_timeout(POOL_IDLE_TIMEOUT)
                .build()
                .change_context(ApiClientError::ClientConstructionFailed)
        })?
        .clone())
}

/// Execute an outbound request. Non-2xx bodies come back as `Ok(Err(..))`.
pub async fn send_request(
    request: Request,
) -> CustomResult<Result<Response, Response>, ApiClientError> {
    let url =
        reqwest::Url::parse(&request.url).change_context(ApiClientError::UrlEncodingFailed)?;
    let client = get_client()?;

    let mut builder = match request.method {
        Method::Get => client.get(url.clone()),
        Method::Post => client.post(url.clone()),
    }
    .timeout(GATEWAY_REQUEST_TIMEOUT);

    builder = builder.headers(construct_header_map(&request.headers)?);
    builder = match request.body {
        Some(RequestContent::Json(ref payload)) => builder.json(payload),
        Some(RequestContent::FormUrlEncoded(ref pairs)) => builder.form(pairs),
        None => builder,
    };

    let start = std::time::Instant::now();
    let result = builder.send().await.map_err(|error| {
        let api_error = if error.is_timeout() {
            ApiClientError::RequestTimeoutReceived
        } else {
            ApiClientError::RequestNotSent(error.to_string())
        };
        tracing::warn!(url = %url, error = %error, "outbound gateway request failed");
        report!(api_error)
    });

    let response = handle_response(result?).await;
    tracing::info!(
        url = %url,
        method = %request.method,
        latency_ms = %start.elapsed().as_millis(),
        "outbound gateway request completed"
    );
    response
}

async fn handle_response(
    response: reqwest::Response,
) -> CustomResult<Result<Response, Response>, ApiClientError> {
    let status_code = response.status().as_u16();
    let body = response
        .bytes()
        .await
        .change_context(ApiClientError::ResponseDecodingFailed)?;
    let wrapped = Response {
        status_code,
        response: body,
    };
    match status_code {
        200..=202 | 204 | 302 => Ok(Ok(wrapped)),
        400..=599 => Ok(Err(wrapped)),
        _ => {
            tracing::warn!(status_code, "unexpected response from gateway");
            Err(report!(ApiClientError::UnexpectedServerResponse))
        }
    }
}

fn construct_header_map(
    headers: &[(String, String)],
) -> CustomResult<reqwest::header::HeaderMap, ApiClientError> {
    use reqwest::header::{HeaderMap, HeaderName, HeaderValue};

    headers.iter().try_fold(
        HeaderMap::new(),
        |mut header_map, (header_name, header_value)| {
            let header_name = HeaderName::from_str(header_name)
                .change_context(ApiClientError::HeaderMapConstructionFailed)?;
            let header_value = HeaderValue::from_str(header_value)
                .change_context(ApiClientError::HeaderMapConstructionFailed)?;
            header_map.append(header_name, header_value);
            Ok(header_map)
        },
    )
}
