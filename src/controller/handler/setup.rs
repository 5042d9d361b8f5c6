// Copyright (c) 2024 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Integration entry setup with retry handling.

use crate::controller::{Controller, EntryLifecycleInput, EntryLifecycleState, SetupEntry};
use crate::errors::{ServiceError, SetupError};
use crate::host::{ConfigEntry, HostContext, LoadedEntry};
use actix::{ActorFutureExt, AsyncContext, Context, Handler, WrapFuture};
use log::{debug, error, info, warn};

/// Start the setup of an entry.
///
/// The setup runs in the background, the result is handled in [`Controller::setup_finished`].
/// Only entries which are not loaded, waiting for a retry, or failed before can be set up.
impl Handler<SetupEntry> for Controller {
    type Result = Result<(), ServiceError>;

    fn handle(&mut self, msg: SetupEntry, ctx: &mut Self::Context) -> Self::Result {
        let managed = self
            .entries
            .get_mut(&msg.entry_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Unknown entry: {}", msg.entry_id)))?;

        if managed
            .machine
            .consume(&EntryLifecycleInput::Setup)
            .is_err()
        {
            debug!(
                "[{}] Ignoring setup request in state {}",
                msg.entry_id,
                managed.state_name()
            );
            return Err(ServiceError::BadRequest(format!(
                "Entry cannot be set up in state {}",
                managed.state_name()
            )));
        }
        // a manual setup request replaces a pending retry
        if let Some(handle) = managed.retry_handle.take() {
            ctx.cancel_future(handle);
        }

        info!(
            "[{}] Setting up {} entry: {}",
            msg.entry_id, managed.entry.domain, managed.entry.title
        );
        managed.setup_generation += 1;
        let generation = managed.setup_generation;
        let host = HostContext::new(ctx.address().recipient());
        let setup = (self.setup)(managed.entry.clone(), host);
        ctx.spawn(setup.into_actor(self).map(move |(entry, result), act, ctx| {
            act.setup_finished(entry, generation, result, ctx)
        }));

        Ok(())
    }
}

impl Controller {
    /// Handle the result of an entry setup.
    ///
    /// - success: store the loaded entry in the runtime data.
    /// - [`SetupError::NotReady`]: retry with backoff until the max number of attempts is reached.
    /// - other errors are terminal.
    ///
    /// Entry data changed during setup is persisted in any case.
    ///
    /// The result of a setup which was superseded by an unload or a newer setup is discarded.
    pub(crate) fn setup_finished(
        &mut self,
        entry: ConfigEntry,
        generation: u64,
        result: Result<LoadedEntry, SetupError>,
        ctx: &mut Context<Self>,
    ) {
        let entry_id = entry.entry_id.clone();
        let Some(managed) = self.entries.get_mut(&entry_id) else {
            info!("[{entry_id}] Entry was removed during setup");
            if let Ok(loaded) = result {
                loaded.shutdown();
            }
            return;
        };

        if managed.setup_generation != generation {
            info!("[{entry_id}] Discarding result of an outdated setup");
            if let Ok(loaded) = result {
                loaded.shutdown();
            }
            // states of a newer setup or loaded entry must be kept
            if !matches!(
                managed.machine.state(),
                EntryLifecycleState::SetupInProgress | EntryLifecycleState::Loaded
            ) {
                self.states.retain(|_, state| state.entry_id != entry_id);
            }
            return;
        }

        let entry_changed = managed.entry != entry;
        if entry_changed {
            managed.entry = entry;
        }

        match result {
            Ok(loaded) => {
                if managed
                    .machine
                    .consume(&EntryLifecycleInput::SetupSucceeded)
                    .is_ok()
                {
                    info!(
                        "[{entry_id}] Setup completed with {} entities",
                        loaded.entities.len()
                    );
                    managed.retry_attempt = 0;
                    managed.retry_delay = self.retry.duration;
                    managed.last_error = None;
                    self.runtime.insert(entry_id.clone(), loaded);
                } else {
                    warn!(
                        "[{entry_id}] Setup finished in state {}",
                        managed.state_name()
                    );
                    loaded.shutdown();
                }
            }
            Err(e) if e.is_retryable() => {
                managed.last_error = Some(e.to_string());
                if managed
                    .machine
                    .consume(&EntryLifecycleInput::SetupNotReady)
                    .is_ok()
                {
                    managed.retry_attempt += 1;
                    if self.retry.attempts > 0 && managed.retry_attempt > self.retry.attempts {
                        warn!(
                            "[{entry_id}] Max setup attempts reached ({}). Giving up: {e}",
                            self.retry.attempts
                        );
                        let _ = managed.machine.consume(&EntryLifecycleInput::GiveUp);
                    } else {
                        let delay = managed.retry_delay;
                        warn!("[{entry_id}] Setup not ready, retrying in {delay:?}: {e}");
                        managed.retry_handle = Some(ctx.notify_later(
                            SetupEntry {
                                entry_id: entry_id.clone(),
                            },
                            delay,
                        ));
                        managed.retry_delay = self.retry.next_delay(delay);
                    }
                }
                self.states.retain(|_, state| state.entry_id != entry_id);
            }
            Err(e) => {
                error!("[{entry_id}] Setup failed: {e}");
                managed.last_error = Some(e.to_string());
                let _ = managed.machine.consume(&EntryLifecycleInput::SetupFailed);
                self.states.retain(|_, state| state.entry_id != entry_id);
            }
        }

        if entry_changed {
            self.persist_entries();
        }
    }
}
