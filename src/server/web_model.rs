// Copyright (c) 2022 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

use crate::host::{EntityState, EntityType};
use actix_web::error::JsonPayloadError;
use actix_web::{Error, HttpRequest, HttpResponse, error};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Rest API response
#[derive(Debug, Serialize)]
pub struct ApiResponse<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'a str>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'a str>,
}

impl<'a> ApiResponse<'a> {
    pub fn new(code: &'a str, message: &'a str) -> ApiResponse<'a> {
        ApiResponse {
            code: Some(code),
            message: Some(message),
        }
    }
}

/// Entity command request body.
#[derive(Debug, Deserialize)]
pub struct CommandRequest {
    pub cmd_id: String,
    pub params: Option<Map<String, Value>>,
}

/// Entity state as reported by the REST API.
#[derive(Debug, Serialize)]
pub struct StateResponse<'a> {
    pub entity_id: &'a str,
    pub entity_type: EntityType,
    pub entry_id: &'a str,
    pub name: &'a str,
    /// Entity state, or `unavailable` if the device is not available.
    pub state: &'a str,
    pub features: &'a [String],
    #[serde(skip_serializing_if = "is_empty_map")]
    pub attributes: &'a Map<String, Value>,
}

fn is_empty_map(map: &&Map<String, Value>) -> bool {
    map.is_empty()
}

impl<'a> From<&'a EntityState> for StateResponse<'a> {
    fn from(state: &'a EntityState) -> Self {
        Self {
            entity_id: &state.entity_id,
            entity_type: state.entity_type,
            entry_id: &state.entry_id,
            name: &state.name,
            state: state.reported_state(),
            features: &state.features,
            attributes: &state.attributes,
        }
    }
}

pub fn json_error_handler(err: error::JsonPayloadError, _: &HttpRequest) -> Error {
    let message = err.to_string();

    let resp = match &err {
        JsonPayloadError::ContentType => HttpResponse::UnsupportedMediaType()
            .json(ApiResponse::new("UNSUPPORTED_MEDIA_TYPE", &message[..])),
        JsonPayloadError::Deserialize(json_err) if json_err.is_data() => {
            // alternative: HttpResponse::UnprocessableEntity 422
            HttpResponse::BadRequest().json(ApiResponse::new("INVALID_JSON", &message[..]))
        }
        _ => HttpResponse::BadRequest().json(ApiResponse::new("BAD_REQUEST", &message[..])),
    };

    error::InternalError::from_response(err, resp).into()
}
