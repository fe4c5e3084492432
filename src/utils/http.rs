use std::time::Duration;

use bytes::Bytes;
use futures_util::StreamExt;

use crate::{GatewayError, Result};

const MAX_ERROR_BODY_BYTES: usize = 64 * 1024;
const MAX_IMAGE_BODY_BYTES: usize = 32 * 1024 * 1024;

pub(crate) const HTTP_TIMEOUT: Duration = Duration::from_secs(300);

pub(crate) fn default_http_client() -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

pub(crate) fn join_endpoint(base_url: &str, endpoint: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let endpoint = endpoint.trim_start_matches('/');
    format!("{base}/{endpoint}")
}

/// Turns a non-2xx response into `GatewayError::Api`, keeping the status
/// for taxonomy classification and a truncated body for diagnostics.
pub(crate) async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if !status.is_success() {
        let body = read_text_truncated(response, MAX_ERROR_BODY_BYTES).await;
        return Err(GatewayError::Api { status, body });
    }
    Ok(response)
}

pub(crate) async fn read_text_truncated(response: reqwest::Response, max_bytes: usize) -> String {
    let (bytes, truncated) = read_bytes_truncated(response, max_bytes).await;
    let mut body = String::from_utf8_lossy(&bytes).to_string();
    if truncated {
        if !body.is_empty() {
            body.push('\n');
        }
        body.push_str("...(truncated)");
    }
    body
}

/// Reads a binary image body, refusing to buffer more than the cap.
pub(crate) async fn read_image_bytes(response: reqwest::Response) -> Result<Bytes> {
    let (bytes, truncated) = read_bytes_truncated(response, MAX_IMAGE_BODY_BYTES).await;
    if truncated {
        return Err(GatewayError::InvalidResponse(format!(
            "image body exceeded {MAX_IMAGE_BODY_BYTES} bytes"
        )));
    }
    Ok(Bytes::from(bytes))
}

async fn read_bytes_truncated(response: reqwest::Response, max_bytes: usize) -> (Vec<u8>, bool) {
    let max_bytes = max_bytes.max(1);
    let mut out = Vec::<u8>::new();
    let mut truncated = false;

    let mut stream = response.bytes_stream();
    while let Some(next) = stream.next().await {
        let Ok(chunk) = next else {
            break;
        };
        let remaining = max_bytes.saturating_sub(out.len());
        if remaining == 0 {
            truncated = true;
            break;
        }
        if chunk.len() <= remaining {
            out.extend_from_slice(chunk.as_ref());
        } else {
            out.extend_from_slice(&chunk.as_ref()[..remaining]);
            truncated = true;
            break;
        }
    }
    (out, truncated)
}
