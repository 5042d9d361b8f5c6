// Copyright (c) 2023 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

use crate::configuration::ENV_VENDOR_MSG_TRACING;
use crate::errors::VendorError;
use crate::util::bool_from_env;
use actix_web::web::Bytes;
use awc::ClientResponse;
use awc::error::PayloadError;
use futures::Stream;
use log::{debug, warn};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Max accepted response body size of vendor API responses.
const MAX_BODY_SIZE: usize = 2 * 1024 * 1024;

pub fn new_http_client(request_timeout: Duration) -> awc::Client {
    awc::Client::builder().timeout(request_timeout).finish()
}

/// Check the response status and deserialize the JSON body.
///
/// HTTP 401 and 403 are reported as [`VendorError::Auth`].
pub async fn json_response<T, S>(
    name: &str,
    response: &mut ClientResponse<S>,
) -> Result<T, VendorError>
where
    T: DeserializeOwned,
    S: Stream<Item = Result<Bytes, PayloadError>> + Unpin,
{
    let body = checked_body(name, response).await?;
    Ok(serde_json::from_slice(&body)?)
}

/// Check the response status and return the raw body.
pub async fn checked_body<S>(
    name: &str,
    response: &mut ClientResponse<S>,
) -> Result<Bytes, VendorError>
where
    S: Stream<Item = Result<Bytes, PayloadError>> + Unpin,
{
    let status = response.status();
    let body = response.body().limit(MAX_BODY_SIZE).await?;

    if bool_from_env(ENV_VENDOR_MSG_TRACING) {
        debug!("[{name}] <- {status} {}", String::from_utf8_lossy(&body));
    }

    if status.is_success() {
        return Ok(body);
    }

    warn!("[{name}] request failed with status {status}");
    match status.as_u16() {
        401 | 403 => Err(VendorError::Auth(format!("HTTP {status}"))),
        code => Err(VendorError::Http(code)),
    }
}
