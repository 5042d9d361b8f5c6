// Copyright (c) 2024 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Configuration entry management.

use crate::controller::{Controller, EntryInfo, GetEntries, RemoveEntry, UnloadEntry};
use crate::errors::ServiceError;
use crate::host::Domain;
use crate::irrigation;
use actix::{Handler, MessageResult, ResponseFuture, fut};
use log::{info, warn};

impl Handler<GetEntries> for Controller {
    type Result = MessageResult<GetEntries>;

    fn handle(&mut self, _: GetEntries, _ctx: &mut Self::Context) -> Self::Result {
        let mut entries: Vec<EntryInfo> = self
            .entries
            .values()
            .map(|managed| EntryInfo {
                entry_id: managed.entry.entry_id.clone(),
                domain: managed.entry.domain,
                title: managed.entry.title.clone(),
                state: managed.state_name(),
                entities: self
                    .states
                    .values()
                    .filter(|s| s.entry_id == managed.entry.entry_id)
                    .count(),
                error: managed.last_error.clone(),
            })
            .collect();
        entries.sort_by(|a, b| a.entry_id.cmp(&b.entry_id));
        MessageResult(entries)
    }
}

impl Handler<UnloadEntry> for Controller {
    type Result = Result<(), ServiceError>;

    fn handle(&mut self, msg: UnloadEntry, ctx: &mut Self::Context) -> Self::Result {
        self.unload(&msg.entry_id, ctx)
    }
}

/// Unload the entry, delete it from the stored entries and clean up vendor resources.
impl Handler<RemoveEntry> for Controller {
    type Result = ResponseFuture<Result<(), ServiceError>>;

    fn handle(&mut self, msg: RemoveEntry, ctx: &mut Self::Context) -> Self::Result {
        if let Err(e) = self.unload(&msg.entry_id, ctx) {
            return Box::pin(fut::ready(Err(e)));
        }
        let Some(managed) = self.entries.remove(&msg.entry_id) else {
            return Box::pin(fut::ready(Err(ServiceError::NotFound(format!(
                "Unknown entry: {}",
                msg.entry_id
            )))));
        };
        self.persist_entries();
        info!("[{}] Entry removed", msg.entry_id);

        let entry = managed.entry;
        let rachio = self.rachio_settings.clone();
        Box::pin(async move {
            if entry.domain == Domain::Rachio {
                if let Err(e) = irrigation::remove_entry(&entry, &rachio).await {
                    warn!("[{}] Failed to delete cloudhook: {e}", entry.entry_id);
                }
            }
            Ok(())
        })
    }
}
