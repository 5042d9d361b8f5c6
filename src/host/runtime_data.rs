// Copyright (c) 2024 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Per-entry runtime data, keyed by configuration entry id.

use crate::host::{EntityHandle, Shutdown, WebhookReceived};
use actix::Recipient;
use std::collections::HashMap;

/// Result of a successful integration entry setup.
#[derive(Default)]
pub struct LoadedEntry {
    pub entities: Vec<EntityHandle>,
    /// Non-entity actors of the entry, e.g. a data update coordinator.
    pub services: Vec<Recipient<Shutdown>>,
    /// Registered webhook id and its receiver.
    pub webhook: Option<(String, Recipient<WebhookReceived>)>,
}

impl LoadedEntry {
    /// Stop all actors of this entry.
    pub fn shutdown(&self) {
        for entity in &self.entities {
            entity.shutdown.do_send(Shutdown);
        }
        for service in &self.services {
            service.do_send(Shutdown);
        }
    }
}

/// Runtime data store of all loaded entries.
#[derive(Default)]
pub struct RuntimeData {
    entries: HashMap<String, LoadedEntry>,
}

impl RuntimeData {
    pub fn insert(&mut self, entry_id: impl Into<String>, loaded: LoadedEntry) {
        self.entries.insert(entry_id.into(), loaded);
    }

    pub fn remove(&mut self, entry_id: &str) -> Option<LoadedEntry> {
        self.entries.remove(entry_id)
    }

    /// Find the entity with the given id in all loaded entries.
    pub fn entity(&self, entity_id: &str) -> Option<&EntityHandle> {
        self.entries
            .values()
            .flat_map(|e| e.entities.iter())
            .find(|e| e.entity_id == entity_id)
    }

    /// Find the receiver of a registered webhook id.
    pub fn webhook(&self, webhook_id: &str) -> Option<&Recipient<WebhookReceived>> {
        self.entries
            .values()
            .filter_map(|e| e.webhook.as_ref())
            .find(|(id, _)| id == webhook_id)
            .map(|(_, recipient)| recipient)
    }
}
