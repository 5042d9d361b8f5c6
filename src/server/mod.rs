// Copyright (c) 2022 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! REST API for entity states and commands, and the vendor webhook endpoint.

use crate::Controller;
use crate::controller::{
    GetEntityState, GetEntries, GetStates, RemoveEntry, SetupEntry, UnloadEntry,
};
use crate::errors::ServiceError;
use crate::host::{CallEntity, EntityCommand, WebhookReceived};
use actix::Addr;
use actix_web::{HttpResponse, delete, get, post, web};
use log::debug;
use web_model::{ApiResponse, CommandRequest, StateResponse};

pub mod web_model;

pub use web_model::json_error_handler;

/// Register all API routes.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(get_states)
        .service(get_state)
        .service(call_entity)
        .service(webhook)
        .service(get_entries)
        .service(setup_entry)
        .service(unload_entry)
        .service(remove_entry);
}

#[get("/api/states")]
pub async fn get_states(
    controller: web::Data<Addr<Controller>>,
) -> Result<HttpResponse, ServiceError> {
    let states = controller.send(GetStates).await?;
    let response: Vec<_> = states.iter().map(StateResponse::from).collect();
    Ok(HttpResponse::Ok().json(response))
}

#[get("/api/states/{entity_id}")]
pub async fn get_state(
    path: web::Path<String>,
    controller: web::Data<Addr<Controller>>,
) -> Result<HttpResponse, ServiceError> {
    let state = controller
        .send(GetEntityState {
            entity_id: path.into_inner(),
        })
        .await??;
    Ok(HttpResponse::Ok().json(StateResponse::from(&state)))
}

#[post("/api/entities/{entity_id}/command")]
pub async fn call_entity(
    path: web::Path<String>,
    request: web::Json<CommandRequest>,
    controller: web::Data<Addr<Controller>>,
) -> Result<HttpResponse, ServiceError> {
    let request = request.into_inner();
    let command = EntityCommand {
        entity_id: path.into_inner(),
        cmd_id: request.cmd_id,
        params: request.params,
    };
    controller.send(CallEntity(command)).await??;
    Ok(HttpResponse::Ok().json(ApiResponse::new("OK", "Command executed")))
}

/// Vendor push events. The payload is only checked for valid JSON, the receiver of the webhook id
/// validates the content.
#[post("/api/webhook/{webhook_id}")]
pub async fn webhook(
    path: web::Path<String>,
    body: web::Bytes,
    controller: web::Data<Addr<Controller>>,
) -> Result<HttpResponse, ServiceError> {
    let webhook_id = path.into_inner();
    debug!("[webhook] {webhook_id}: {} bytes", body.len());
    let payload = serde_json::from_slice(&body)
        .map_err(|e| ServiceError::BadRequest(format!("Invalid JSON payload: {e}")))?;
    controller
        .send(WebhookReceived {
            webhook_id,
            payload,
        })
        .await??;
    Ok(HttpResponse::Ok().finish())
}

#[get("/api/entries")]
pub async fn get_entries(
    controller: web::Data<Addr<Controller>>,
) -> Result<HttpResponse, ServiceError> {
    let entries = controller.send(GetEntries).await?;
    Ok(HttpResponse::Ok().json(entries))
}

#[post("/api/entries/{entry_id}/setup")]
pub async fn setup_entry(
    path: web::Path<String>,
    controller: web::Data<Addr<Controller>>,
) -> Result<HttpResponse, ServiceError> {
    controller
        .send(SetupEntry {
            entry_id: path.into_inner(),
        })
        .await??;
    Ok(HttpResponse::Accepted().json(ApiResponse::new("OK", "Setup started")))
}

#[post("/api/entries/{entry_id}/unload")]
pub async fn unload_entry(
    path: web::Path<String>,
    controller: web::Data<Addr<Controller>>,
) -> Result<HttpResponse, ServiceError> {
    controller
        .send(UnloadEntry {
            entry_id: path.into_inner(),
        })
        .await??;
    Ok(HttpResponse::Ok().json(ApiResponse::new("OK", "Entry unloaded")))
}

#[delete("/api/entries/{entry_id}")]
pub async fn remove_entry(
    path: web::Path<String>,
    controller: web::Data<Addr<Controller>>,
) -> Result<HttpResponse, ServiceError> {
    controller
        .send(RemoveEntry {
            entry_id: path.into_inner(),
        })
        .await??;
    Ok(HttpResponse::Ok().json(ApiResponse::new("OK", "Entry removed")))
}
