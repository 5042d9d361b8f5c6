// Copyright (c) 2024 Unfolded Circle ApS, Markus Zehnder <markus.z@unfoldedcircle.com>
// SPDX-License-Identifier: MPL-2.0

//! Central controller managing the integration entries, their entity actors and entity states.

mod handler;
mod messages;

pub use messages::*;

use crate::configuration::{
    HiveSettings, PowerviewSettings, RachioSettings, RetrySettings, Settings, save_user_settings,
};
use crate::errors::{ServiceError, SetupError};
use crate::host::{ConfigEntry, Domain, EntityState, HostContext, LoadedEntry, RuntimeData};
use crate::{alarm, irrigation, shade};
use actix::prelude::{Actor, AsyncContext, Context, SpawnHandle};
use futures::FutureExt;
use futures::future::LocalBoxFuture;
use log::{debug, info};
use rust_fsm::*;
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;
use url::Url;

state_machine! {
    derive(Debug)
    EntryLifecycle(NotLoaded)

    NotLoaded(Setup) => SetupInProgress,
    SetupInProgress => {
        SetupSucceeded => Loaded,
        SetupNotReady => SetupRetry,
        SetupFailed => Failed,
        Unload => NotLoaded,
    },
    SetupRetry => {
        Setup => SetupInProgress,
        GiveUp => Failed,
        Unload => NotLoaded,
    },
    Loaded(Unload) => NotLoaded,
    Failed => {
        Setup => SetupInProgress,
        Unload => NotLoaded,
    },
}

/// Result of an entry setup, together with the entry data possibly updated during setup.
pub type SetupOutcome = (ConfigEntry, Result<LoadedEntry, SetupError>);

/// Integration entry setup function.
pub type SetupFn = Rc<dyn Fn(ConfigEntry, HostContext) -> LocalBoxFuture<'static, SetupOutcome>>;

/// Entry persistence function.
pub type PersistFn = fn(&[ConfigEntry]) -> Result<(), ServiceError>;

/// Vendor settings required to set up the integration entries.
#[derive(Clone)]
pub struct VendorSettings {
    pub hive: HiveSettings,
    pub powerview: PowerviewSettings,
    pub rachio: RachioSettings,
    /// Base URL for local webhook URLs.
    pub webhook_base_url: Option<Url>,
}

impl From<&Settings> for VendorSettings {
    fn from(settings: &Settings) -> Self {
        Self {
            hive: settings.hive.clone(),
            powerview: settings.powerview.clone(),
            rachio: settings.rachio.clone(),
            webhook_base_url: settings
                .external_url
                .clone()
                .or_else(|| settings.http.local_url()),
        }
    }
}

/// Set up an entry with the vendor integration of its domain.
pub async fn setup_vendor_entry(
    mut entry: ConfigEntry,
    settings: VendorSettings,
    host: HostContext,
) -> SetupOutcome {
    let result = match entry.domain {
        Domain::Hive => alarm::setup_entry(&entry, &settings.hive, host).await,
        Domain::Powerview => shade::setup_entry(&entry, &settings.powerview, host).await,
        Domain::Rachio => match settings.webhook_base_url.as_ref() {
            Some(base_url) => {
                irrigation::setup_entry(&mut entry, &settings.rachio, base_url, host).await
            }
            None => Err(SetupError::Failed("No webhook base URL available".into())),
        },
    };
    (entry, result)
}

/// A configured integration entry and its lifecycle state.
struct ManagedEntry {
    entry: ConfigEntry,
    machine: StateMachine<EntryLifecycle>,
    retry_attempt: u32,
    retry_delay: Duration,
    retry_handle: Option<SpawnHandle>,
    last_error: Option<String>,
    /// Incremented with every setup start and unload. Results of older setups are discarded.
    setup_generation: u64,
}

impl ManagedEntry {
    fn new(entry: ConfigEntry, retry: &RetrySettings) -> Self {
        Self {
            entry,
            machine: StateMachine::new(),
            retry_attempt: 0,
            retry_delay: retry.duration,
            retry_handle: None,
            last_error: None,
            setup_generation: 0,
        }
    }

    fn state_name(&self) -> &'static str {
        match self.machine.state() {
            EntryLifecycleState::NotLoaded => "not_loaded",
            EntryLifecycleState::SetupInProgress => "setup_in_progress",
            EntryLifecycleState::SetupRetry => "setup_retry",
            EntryLifecycleState::Loaded => "loaded",
            EntryLifecycleState::Failed => "setup_error",
        }
    }
}

pub struct Controller {
    /// Configured entries by entry id.
    entries: HashMap<String, ManagedEntry>,
    /// Actors of the loaded entries.
    runtime: RuntimeData,
    /// Last published state of every entity.
    states: HashMap<String, EntityState>,
    retry: RetrySettings,
    rachio_settings: RachioSettings,
    setup: SetupFn,
    persist: PersistFn,
}

impl Controller {
    pub fn new(settings: &Settings) -> Self {
        let vendor_settings = VendorSettings::from(settings);
        let setup: SetupFn = Rc::new(move |entry: ConfigEntry, host: HostContext| {
            setup_vendor_entry(entry, vendor_settings.clone(), host).boxed_local()
        });
        Self::with_setup(settings, setup, save_user_settings)
    }

    /// Create a controller with a custom entry setup and persistence function.
    pub fn with_setup(settings: &Settings, setup: SetupFn, persist: PersistFn) -> Self {
        let entries = settings
            .entries
            .iter()
            .map(|e| {
                (
                    e.entry_id.clone(),
                    ManagedEntry::new(e.clone(), &settings.setup_retry),
                )
            })
            .collect();
        Self {
            entries,
            runtime: RuntimeData::default(),
            states: HashMap::new(),
            retry: settings.setup_retry.clone(),
            rachio_settings: settings.rachio.clone(),
            setup,
            persist,
        }
    }

    fn persist_entries(&self) {
        let mut entries: Vec<_> = self.entries.values().map(|e| e.entry.clone()).collect();
        entries.sort_by(|a, b| a.entry_id.cmp(&b.entry_id));
        // errors are logged by the persistence function
        let _ = (self.persist)(&entries);
    }

    /// Stop the entity actors of an entry and drop its states.
    fn unload(&mut self, entry_id: &str, ctx: &mut Context<Self>) -> Result<(), ServiceError> {
        let managed = self
            .entries
            .get_mut(entry_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Unknown entry: {entry_id}")))?;

        if managed
            .machine
            .consume(&EntryLifecycleInput::Unload)
            .is_err()
        {
            debug!("[{entry_id}] Entry is not loaded");
            return Ok(());
        }
        if let Some(handle) = managed.retry_handle.take() {
            ctx.cancel_future(handle);
        }
        managed.retry_attempt = 0;
        managed.retry_delay = self.retry.duration;
        managed.setup_generation += 1;

        if let Some(loaded) = self.runtime.remove(entry_id) {
            loaded.shutdown();
        }
        self.states.retain(|_, state| state.entry_id != entry_id);
        info!("[{entry_id}] Entry unloaded");
        Ok(())
    }
}

impl Actor for Controller {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!("Setting up {} integration entries", self.entries.len());
        for entry_id in self.entries.keys() {
            ctx.notify(SetupEntry {
                entry_id: entry_id.clone(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        Controller, GetEntries, GetEntityState, GetStates, RemoveEntry, SetupEntry, SetupFn,
        UnloadEntry,
    };
    use crate::configuration::{RetrySettings, Settings};
    use crate::errors::{ServiceError, SetupError};
    use crate::host::{
        CallEntity, ConfigEntry, Domain, EntityCommand, EntityHandle, EntityState, EntityType,
        HostContext, LoadedEntry, Shutdown, WebhookReceived,
    };
    use actix::prelude::{Actor, ActorContext, Addr, Context, Handler};
    use futures::FutureExt;
    use serde_json::json;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;
    use std::time::Duration;

    thread_local! {
        static PERSISTED: RefCell<Vec<ConfigEntry>> = const { RefCell::new(Vec::new()) };
    }

    fn persist(entries: &[ConfigEntry]) -> Result<(), ServiceError> {
        PERSISTED.with(|p| *p.borrow_mut() = entries.to_vec());
        Ok(())
    }

    fn persisted() -> Vec<ConfigEntry> {
        PERSISTED.with(|p| p.borrow().clone())
    }

    struct FakeSwitch {
        entity_id: String,
        entry_id: String,
        host: HostContext,
    }

    impl FakeSwitch {
        fn publish(&self, state: &str) {
            let mut entity =
                EntityState::new(&self.entity_id, EntityType::Switch, &self.entry_id, "Switch");
            entity.state = state.into();
            self.host.publish(entity);
        }
    }

    impl Actor for FakeSwitch {
        type Context = Context<Self>;

        fn started(&mut self, _ctx: &mut Self::Context) {
            self.publish("off");
        }
    }

    impl Handler<CallEntity> for FakeSwitch {
        type Result = Result<(), ServiceError>;

        fn handle(&mut self, msg: CallEntity, _ctx: &mut Self::Context) -> Self::Result {
            match msg.0.cmd_id.as_str() {
                "turn_on" => self.publish("on"),
                cmd => return Err(ServiceError::BadRequest(cmd.into())),
            }
            Ok(())
        }
    }

    impl Handler<WebhookReceived> for FakeSwitch {
        type Result = Result<(), ServiceError>;

        fn handle(&mut self, msg: WebhookReceived, _ctx: &mut Self::Context) -> Self::Result {
            let state = msg.payload["state"].as_str().unwrap_or("unknown").to_string();
            self.publish(&state);
            Ok(())
        }
    }

    impl Handler<Shutdown> for FakeSwitch {
        type Result = ();

        fn handle(&mut self, _: Shutdown, ctx: &mut Self::Context) -> Self::Result {
            ctx.stop();
        }
    }

    /// Setup function failing with `error` for the first `failures` attempts.
    fn fake_setup(failures: u32, error: SetupError) -> (SetupFn, Rc<Cell<u32>>) {
        let attempts = Rc::new(Cell::new(0));
        let counter = attempts.clone();
        let setup: SetupFn = Rc::new(move |mut entry: ConfigEntry, host: HostContext| {
            counter.set(counter.get() + 1);
            let attempt = counter.get();
            let error = error.clone();
            async move {
                entry.data.insert("webhook_id".into(), json!("hook1"));
                if attempt <= failures {
                    return (entry, Err(error));
                }
                let loaded = start_switch(&entry, host);
                (entry, Ok(loaded))
            }
            .boxed_local()
        });
        (setup, attempts)
    }

    /// Setup function succeeding after the given delay, one delay per attempt.
    fn delayed_setup(delays: &'static [u64]) -> SetupFn {
        let attempts = Rc::new(Cell::new(0));
        Rc::new(move |entry: ConfigEntry, host: HostContext| {
            let delay = delays[attempts.get()];
            attempts.set(attempts.get() + 1);
            async move {
                actix::clock::sleep(Duration::from_millis(delay)).await;
                let loaded = start_switch(&entry, host);
                (entry, Ok(loaded))
            }
            .boxed_local()
        })
    }

    fn start_switch(entry: &ConfigEntry, host: HostContext) -> LoadedEntry {
        let entity_id = format!("switch.{}", entry.entry_id);
        let addr = FakeSwitch {
            entity_id: entity_id.clone(),
            entry_id: entry.entry_id.clone(),
            host,
        }
        .start();
        let mut loaded = LoadedEntry::default();
        loaded.entities.push(EntityHandle::new(entity_id, &addr));
        loaded.webhook = Some(("hook1".into(), addr.recipient()));
        loaded
    }

    fn settings(attempts: u32) -> Settings {
        Settings {
            setup_retry: RetrySettings {
                attempts,
                duration: Duration::from_millis(10),
                duration_max: Duration::from_millis(20),
                backoff_factor: 2.0,
            },
            entries: vec![ConfigEntry::new("e1", Domain::Rachio, "Rachio")],
            ..Default::default()
        }
    }

    async fn wait_for_entry_state(controller: &Addr<Controller>, state: &str) {
        for _ in 0..100 {
            let entries = controller.send(GetEntries).await.expect("controller running");
            if entries[0].state == state {
                return;
            }
            actix::clock::sleep(Duration::from_millis(5)).await;
        }
        panic!("entry not in state {state}");
    }

    async fn wait_for_entity_state(controller: &Addr<Controller>, entity_id: &str, state: &str) {
        for _ in 0..100 {
            let result = controller
                .send(GetEntityState {
                    entity_id: entity_id.into(),
                })
                .await
                .expect("controller running");
            if result.is_ok_and(|s| s.state == state) {
                return;
            }
            actix::clock::sleep(Duration::from_millis(5)).await;
        }
        panic!("entity {entity_id} not in state {state}");
    }

    #[actix::test]
    async fn entry_is_set_up_on_start() {
        let (setup, attempts) = fake_setup(0, SetupError::NotReady("offline".into()));
        let controller = Controller::with_setup(&settings(0), setup, persist).start();

        wait_for_entry_state(&controller, "loaded").await;
        wait_for_entity_state(&controller, "switch.e1", "off").await;

        assert_eq!(1, attempts.get());
        // generated entry data is persisted
        assert_eq!(Some("hook1"), persisted()[0].data_str("webhook_id"));
    }

    #[actix::test]
    async fn not_ready_setup_is_retried() {
        let (setup, attempts) = fake_setup(2, SetupError::NotReady("offline".into()));
        let controller = Controller::with_setup(&settings(0), setup, persist).start();

        wait_for_entry_state(&controller, "loaded").await;

        assert_eq!(3, attempts.get());
        let entries = controller.send(GetEntries).await.expect("controller running");
        assert_eq!(None, entries[0].error);
    }

    #[actix::test]
    async fn retries_stop_at_max_attempts() {
        let (setup, attempts) = fake_setup(u32::MAX, SetupError::NotReady("offline".into()));
        let controller = Controller::with_setup(&settings(2), setup, persist).start();

        wait_for_entry_state(&controller, "setup_error").await;

        assert_eq!(3, attempts.get());
    }

    #[actix::test]
    async fn auth_failure_is_not_retried() {
        let (setup, attempts) = fake_setup(1, SetupError::AuthFailed("HTTP 401".into()));
        let controller = Controller::with_setup(&settings(0), setup, persist).start();

        wait_for_entry_state(&controller, "setup_error").await;
        actix::clock::sleep(Duration::from_millis(50)).await;

        assert_eq!(1, attempts.get());
        let entries = controller.send(GetEntries).await.expect("controller running");
        assert_eq!(
            Some("Authentication failed: HTTP 401".to_string()),
            entries[0].error
        );

        // a manual setup request starts a new attempt
        controller
            .send(SetupEntry {
                entry_id: "e1".into(),
            })
            .await
            .expect("controller running")
            .expect("setup started");
        wait_for_entry_state(&controller, "loaded").await;
    }

    #[actix::test]
    async fn entity_command_is_routed_to_entity() {
        let (setup, _) = fake_setup(0, SetupError::NotReady("offline".into()));
        let controller = Controller::with_setup(&settings(0), setup, persist).start();
        wait_for_entry_state(&controller, "loaded").await;

        controller
            .send(CallEntity(EntityCommand::new("switch.e1", "turn_on")))
            .await
            .expect("controller running")
            .expect("command succeeds");
        wait_for_entity_state(&controller, "switch.e1", "on").await;

        let result = controller
            .send(CallEntity(EntityCommand::new("switch.unknown", "turn_on")))
            .await
            .expect("controller running");
        assert!(matches!(result, Err(ServiceError::NotFound(_))));

        let result = controller
            .send(CallEntity(EntityCommand::new("switch.e1", "explode")))
            .await
            .expect("controller running");
        assert!(matches!(result, Err(ServiceError::BadRequest(_))));
    }

    #[actix::test]
    async fn webhook_is_routed_by_id() {
        let (setup, _) = fake_setup(0, SetupError::NotReady("offline".into()));
        let controller = Controller::with_setup(&settings(0), setup, persist).start();
        wait_for_entry_state(&controller, "loaded").await;

        controller
            .send(WebhookReceived {
                webhook_id: "hook1".into(),
                payload: json!({ "state": "on" }),
            })
            .await
            .expect("controller running")
            .expect("webhook accepted");
        wait_for_entity_state(&controller, "switch.e1", "on").await;

        let result = controller
            .send(WebhookReceived {
                webhook_id: "hook2".into(),
                payload: json!({}),
            })
            .await
            .expect("controller running");
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }

    #[actix::test]
    async fn unload_drops_entities_and_states() {
        let (setup, _) = fake_setup(0, SetupError::NotReady("offline".into()));
        let controller = Controller::with_setup(&settings(0), setup, persist).start();
        wait_for_entity_state(&controller, "switch.e1", "off").await;

        controller
            .send(UnloadEntry {
                entry_id: "e1".into(),
            })
            .await
            .expect("controller running")
            .expect("entry unloaded");

        assert!(controller.send(GetStates).await.expect("controller running").is_empty());
        let result = controller
            .send(CallEntity(EntityCommand::new("switch.e1", "turn_on")))
            .await
            .expect("controller running");
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
        wait_for_entry_state(&controller, "not_loaded").await;
    }

    #[actix::test]
    async fn outdated_setup_result_is_discarded() {
        let setup = delayed_setup(&[50, 150]);
        let controller = Controller::with_setup(&settings(0), setup, persist).start();

        actix::clock::sleep(Duration::from_millis(10)).await;
        controller
            .send(UnloadEntry {
                entry_id: "e1".into(),
            })
            .await
            .expect("controller running")
            .expect("entry unloaded");
        controller
            .send(SetupEntry {
                entry_id: "e1".into(),
            })
            .await
            .expect("controller running")
            .expect("setup started");

        // the first setup finishes while the second one is still running
        actix::clock::sleep(Duration::from_millis(80)).await;
        let entries = controller.send(GetEntries).await.expect("controller running");
        assert_eq!("setup_in_progress", entries[0].state);

        wait_for_entry_state(&controller, "loaded").await;
        wait_for_entity_state(&controller, "switch.e1", "off").await;
        let entries = controller.send(GetEntries).await.expect("controller running");
        assert_eq!(1, entries[0].entities);

        controller
            .send(CallEntity(EntityCommand::new("switch.e1", "turn_on")))
            .await
            .expect("controller running")
            .expect("command succeeds");
        wait_for_entity_state(&controller, "switch.e1", "on").await;
    }

    #[actix::test]
    async fn setup_finishing_after_unload_leaves_no_states() {
        let setup = delayed_setup(&[30]);
        let controller = Controller::with_setup(&settings(0), setup, persist).start();

        actix::clock::sleep(Duration::from_millis(10)).await;
        controller
            .send(UnloadEntry {
                entry_id: "e1".into(),
            })
            .await
            .expect("controller running")
            .expect("entry unloaded");
        actix::clock::sleep(Duration::from_millis(60)).await;

        let entries = controller.send(GetEntries).await.expect("controller running");
        assert_eq!("not_loaded", entries[0].state);
        assert!(controller.send(GetStates).await.expect("controller running").is_empty());
    }

    #[actix::test]
    async fn removed_entry_is_deleted_from_store() {
        let (setup, _) = fake_setup(0, SetupError::NotReady("offline".into()));
        let controller = Controller::with_setup(&settings(0), setup, persist).start();
        wait_for_entry_state(&controller, "loaded").await;

        controller
            .send(RemoveEntry {
                entry_id: "e1".into(),
            })
            .await
            .expect("controller running")
            .expect("entry removed");

        assert!(controller.send(GetEntries).await.expect("controller running").is_empty());
        assert!(persisted().is_empty());

        let result = controller
            .send(RemoveEntry {
                entry_id: "e1".into(),
            })
            .await
            .expect("controller running");
        assert!(matches!(result, Err(ServiceError::NotFound(_))));
    }
}
