//! Per-context manager: inbox, triggers and the single-flight drain loop.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Context as _;
use serde::Serialize;

use dth_resolver::{ProjectResolver, ResolveError};
use dth_types::{
    ChangeConfigurationPayload, DiagnosticsGroup, ErrorPayload, InitializePayload, Message,
    message_types,
};

use crate::connection::ConnectionHandle;
use crate::lock;
use crate::protocol::ProtocolManager;
use crate::snapshot::{Snapshot, send_error_if_changed, send_if_changed};
use crate::trigger::Trigger;

const DEFAULT_CONFIGURATION: &str = "Debug";

/// An inbound message together with the connection it arrived on.
struct Inbound {
    message: Message,
    sender: Arc<ConnectionHandle>,
}

/// Everything a drain pass reads and writes, under one lock.
struct WorkState {
    initialized: bool,
    owner: Option<Arc<ConnectionHandle>>,
    subscribers: Vec<Arc<ConnectionHandle>>,
    requested_path: Trigger<String>,
    requested_configuration: Trigger<String>,
    files_changed: Trigger<()>,
    refresh_dependencies: Trigger<()>,
    /// Protocol version requested at initialize; authoritative for this
    /// context once set, even if later negotiation disagrees.
    version_pin: Option<i32>,
    local: Snapshot,
    remote: Snapshot,
}

/// One project context: all state keyed by a client-chosen context id.
///
/// Messages are enqueued in arrival order and drained by at most one
/// worker at a time. A drain pass applies every queued message to the
/// triggers, resolves the project if any trigger fired, and transmits
/// exactly the sections whose value changed since the last transmission.
pub struct ProjectContext {
    id: i32,
    resolver: Arc<dyn ProjectResolver>,
    protocol: Arc<ProtocolManager>,
    inbox: Mutex<VecDeque<Inbound>>,
    processing: AtomicBool,
    /// Kept outside the work lock so context enumeration never waits on
    /// an in-flight resolution pass.
    project_path: Mutex<Option<String>>,
    work: Mutex<WorkState>,
}

impl ProjectContext {
    #[must_use]
    pub fn new(
        id: i32,
        resolver: Arc<dyn ProjectResolver>,
        protocol: Arc<ProtocolManager>,
    ) -> Self {
        Self {
            id,
            resolver,
            protocol,
            inbox: Mutex::new(VecDeque::new()),
            processing: AtomicBool::new(false),
            project_path: Mutex::new(None),
            work: Mutex::new(WorkState {
                initialized: false,
                owner: None,
                subscribers: Vec::new(),
                requested_path: Trigger::new(),
                requested_configuration: Trigger::new(),
                files_changed: Trigger::new(),
                refresh_dependencies: Trigger::new(),
                version_pin: None,
                local: Snapshot::default(),
                remote: Snapshot::default(),
            }),
        }
    }

    #[must_use]
    pub fn id(&self) -> i32 {
        self.id
    }

    /// The project folder this context was initialized with, if any.
    #[must_use]
    pub fn project_path(&self) -> Option<String> {
        lock(&self.project_path).clone()
    }

    /// The protocol version used when serializing this context's
    /// version-dependent payloads.
    #[must_use]
    pub fn protocol_version(&self) -> i32 {
        let work = lock(&self.work);
        self.effective_version(&work)
    }

    /// Enqueue a message and schedule a drain on the blocking pool.
    pub fn on_receive(self: &Arc<Self>, message: Message, sender: Arc<ConnectionHandle>) {
        self.enqueue(message, sender);
        let context = Arc::clone(self);
        tokio::task::spawn_blocking(move || context.process_loop());
    }

    fn enqueue(&self, message: Message, sender: Arc<ConnectionHandle>) {
        lock(&self.inbox).push_back(Inbound { message, sender });
    }

    /// Drain the inbox, resolving and dispatching as needed.
    ///
    /// Non-blocking entry: when another worker already holds the
    /// processing flag this returns immediately, and the holder is
    /// guaranteed to observe the message that prompted this call.
    fn process_loop(&self) {
        if self.processing.swap(true, Ordering::AcqRel) {
            return;
        }
        loop {
            loop {
                let inbound = lock(&self.inbox).pop_front();
                let Some(inbound) = inbound else { break };
                self.apply(inbound);
            }

            if let Err(error) = self.run_pass() {
                self.report_failure(&error);
            }

            // Release the flag only under the lock that observed the
            // inbox empty: a concurrent enqueue either happened before
            // this check (and is drained by this worker) or after the
            // release (and its own scheduling attempt wins the flag).
            let inbox = lock(&self.inbox);
            if inbox.is_empty() {
                self.processing.store(false, Ordering::Release);
                break;
            }
        }
    }

    /// Apply one message to the triggers. No resolution happens here.
    fn apply(&self, inbound: Inbound) {
        let Inbound { message, sender } = inbound;
        let mut work = lock(&self.work);
        match message.message_type.as_str() {
            message_types::INITIALIZE => self.apply_initialize(&mut work, &message, sender),
            message_types::CHANGE_CONFIGURATION => {
                match decode::<ChangeConfigurationPayload>(&message) {
                    Some(payload) => work.requested_configuration.set(payload.configuration),
                    None => {
                        tracing::warn!(context = self.id, "malformed ChangeConfiguration payload");
                    }
                }
            }
            message_types::REFRESH_DEPENDENCIES | message_types::RESTORE_COMPLETE => {
                work.refresh_dependencies.set(());
            }
            message_types::FILES_CHANGED => work.files_changed.set(()),
            message_types::GET_DIAGNOSTICS => work.subscribers.push(sender),
            other => {
                tracing::debug!(context = self.id, message_type = other, "ignoring message");
            }
        }
    }

    fn apply_initialize(
        &self,
        work: &mut WorkState,
        message: &Message,
        sender: Arc<ConnectionHandle>,
    ) {
        if work.initialized {
            tracing::warn!(context = self.id, "ignoring duplicate initialize");
            return;
        }
        let Some(payload) = decode::<InitializePayload>(message) else {
            tracing::warn!(
                context = self.id,
                "initialize without a valid ProjectFolder, ignoring"
            );
            return;
        };

        work.initialized = true;
        work.owner = Some(sender);
        *lock(&self.project_path) = Some(payload.project_folder.clone());
        work.requested_path.set(payload.project_folder);
        work.requested_configuration.set(
            payload
                .configuration
                .unwrap_or_else(|| DEFAULT_CONFIGURATION.to_string()),
        );
        if payload.version > 0 && !self.protocol.environment_overridden() {
            work.version_pin = Some(payload.version.min(self.protocol.max_version()));
        }
    }

    /// One drain cycle's outbound step: resolve if any trigger fired,
    /// then diff the current local snapshot against what clients have.
    ///
    /// The diff and the diagnostics flush are not tied to a resolution:
    /// a drain with no trigger (a lone `GetDiagnostics`) is served from
    /// the cached local snapshot.
    fn run_pass(&self) -> Result<(), ResolveError> {
        let mut guard = lock(&self.work);
        let work = &mut *guard;

        let triggered = work.requested_path.was_assigned()
            || work.requested_configuration.was_assigned()
            || work.files_changed.was_assigned()
            || work.refresh_dependencies.was_assigned();
        if triggered {
            self.resolve_into_local(work)?;
        }

        let version = self.effective_version(work);
        self.send_outgoing(work, version)
            .map_err(|error| ResolveError::Failed(error.to_string()))?;
        Ok(())
    }

    fn resolve_into_local(&self, work: &mut WorkState) -> Result<(), ResolveError> {
        let refresh = work.refresh_dependencies.was_assigned();
        work.requested_path.clear_assigned();
        work.requested_configuration.clear_assigned();
        work.files_changed.clear_assigned();
        work.refresh_dependencies.clear_assigned();

        let Some(path) = work.requested_path.value().cloned() else {
            tracing::warn!(
                context = self.id,
                "state change requested before initialize, nothing to resolve"
            );
            return Ok(());
        };
        let configuration = work
            .requested_configuration
            .value()
            .cloned()
            .unwrap_or_else(|| DEFAULT_CONFIGURATION.to_string());
        let previous_search_paths = work
            .remote
            .project_information
            .as_ref()
            .map(|info| info.project_search_paths.clone());

        tracing::info!(
            context = self.id,
            path = %path,
            configuration = %configuration,
            refresh,
            "resolving project state"
        );
        let state = self.resolver.resolve(
            &path,
            &configuration,
            refresh,
            previous_search_paths.as_deref(),
        )?;

        work.local = Snapshot::from_state(&state);
        Ok(())
    }

    /// Transmit every section whose local value differs from the remote
    /// one, then the diagnostics batch, in a fixed order.
    fn send_outgoing(&self, work: &mut WorkState, version: i32) -> anyhow::Result<()> {
        let Some(owner) = work.owner.clone() else {
            return Ok(());
        };
        let WorkState {
            local,
            remote,
            subscribers,
            ..
        } = work;

        // Project and per-framework diagnostics ride in the pass's batch
        // whether or not their individual diff fires.
        let mut batch: Vec<DiagnosticsGroup> = Vec::new();

        send_if_changed(
            &local.project_information,
            &mut remote.project_information,
            |info| self.transmit_section(&owner, message_types::PROJECT_INFORMATION, info),
        )?;

        if let Some(group) = &local.project_diagnostics {
            batch.push(group.clone());
        }
        send_if_changed(
            &local.project_diagnostics,
            &mut remote.project_diagnostics,
            |group: &DiagnosticsGroup| -> anyhow::Result<()> {
                owner.transmit(Message::from_payload(
                    message_types::DIAGNOSTICS,
                    self.id,
                    group.to_payload(version),
                ));
                Ok(())
            },
        )?;

        for world in &local.projects {
            let remote_world = remote.world_mut(&world.framework);

            if let Some(group) = &world.dependency_diagnostics {
                batch.push(group.clone());
            }
            send_if_changed(
                &world.dependency_diagnostics,
                &mut remote_world.dependency_diagnostics,
                |group: &DiagnosticsGroup| -> anyhow::Result<()> {
                    owner.transmit(Message::from_payload(
                        message_types::DEPENDENCY_DIAGNOSTICS,
                        self.id,
                        group.to_payload(version),
                    ));
                    Ok(())
                },
            )?;
            send_if_changed(
                &world.dependencies,
                &mut remote_world.dependencies,
                |payload| self.transmit_section(&owner, message_types::DEPENDENCIES, payload),
            )?;
            send_if_changed(
                &world.compiler_options,
                &mut remote_world.compiler_options,
                |payload| self.transmit_section(&owner, message_types::COMPILER_OPTIONS, payload),
            )?;
            send_if_changed(&world.references, &mut remote_world.references, |payload| {
                self.transmit_section(&owner, message_types::REFERENCES, payload)
            })?;
            send_if_changed(&world.sources, &mut remote_world.sources, |payload| {
                self.transmit_section(&owner, message_types::SOURCES, payload)
            })?;
        }

        let live: Vec<String> = local
            .projects
            .iter()
            .map(|world| world.framework.framework_name.clone())
            .collect();
        remote.prune_stale_frameworks(&live);

        // The error record diff is not gated on the batch: a recovery
        // with zero diagnostics still sends the clearing empty record.
        send_error_if_changed(
            &local.global_error,
            &mut remote.global_error,
            |error: &ErrorPayload| -> anyhow::Result<()> {
                let value = serde_json::to_value(error).context("serializing error record")?;
                let message = Message::from_payload(message_types::ERROR, self.id, value);
                for subscriber in subscribers.iter() {
                    subscriber.transmit(message.clone());
                }
                owner.transmit(message);
                Ok(())
            },
        )?;

        // An all-empty batch leaves subscribers queued for a later pass.
        let groups: Vec<serde_json::Value> = batch
            .iter()
            .filter(|group| !group.diagnostics.is_empty())
            .map(|group| group.to_payload(version))
            .collect();
        if !groups.is_empty() {
            let message = Message::from_payload(
                message_types::ALL_DIAGNOSTICS,
                self.id,
                serde_json::Value::Array(groups),
            );
            for subscriber in subscribers.drain(..) {
                subscriber.transmit(message.clone());
            }
        }

        Ok(())
    }

    fn transmit_section<T: Serialize>(
        &self,
        sender: &ConnectionHandle,
        message_type: &str,
        payload: &T,
    ) -> anyhow::Result<()> {
        let value = serde_json::to_value(payload)
            .with_context(|| format!("serializing {message_type} section"))?;
        sender.transmit(Message::from_payload(message_type, self.id, value));
        Ok(())
    }

    /// A failed pass becomes the context's global error: reported to the
    /// owner and every pending subscriber, remembered so a later
    /// successful pass can clear it. The context stays usable.
    fn report_failure(&self, error: &ResolveError) {
        tracing::error!(context = self.id, error = %error, "resolution pass failed");
        let payload = match error {
            ResolveError::Malformed {
                path,
                line,
                column,
                message,
            } => ErrorPayload {
                message: Some(message.clone()),
                path: Some(path.clone()),
                line: Some(*line),
                column: Some(*column),
            },
            other => ErrorPayload {
                message: Some(other.to_string()),
                ..ErrorPayload::default()
            },
        };

        let Ok(value) = serde_json::to_value(&payload) else {
            return;
        };
        let message = Message::from_payload(message_types::ERROR, self.id, value);

        let mut work = lock(&self.work);
        // Recorded on both sides: the failure has been reported already,
        // and only a successful pass (which rebuilds `local`) clears it.
        work.local.global_error = payload.clone();
        work.remote.global_error = payload;
        if let Some(owner) = &work.owner {
            owner.transmit(message.clone());
        }
        for subscriber in work.subscribers.drain(..) {
            subscriber.transmit(message.clone());
        }
    }

    fn effective_version(&self, work: &WorkState) -> i32 {
        match work.version_pin {
            Some(pinned) => {
                let negotiated = self.protocol.current_version();
                if negotiated != pinned {
                    tracing::warn!(
                        context = self.id,
                        pinned,
                        negotiated,
                        "negotiated protocol version differs from the context pin, keeping the pin"
                    );
                }
                pinned
            }
            None => self.protocol.current_version(),
        }
    }
}

fn decode<T: serde::de::DeserializeOwned>(message: &Message) -> Option<T> {
    let payload = message.payload.clone()?;
    serde_json::from_value(payload).ok()
}
