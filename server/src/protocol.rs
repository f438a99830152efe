//! Protocol version negotiation.

use std::sync::atomic::{AtomicI32, Ordering};

use dth_types::{Message, ProtocolVersionPayload, UNBOUND_CONTEXT_ID, message_types};

use crate::connection::ConnectionHandle;

/// Highest protocol version this server speaks.
pub const MAX_PROTOCOL_VERSION: i32 = 4;

/// Environment variable pinning the protocol version, overriding any
/// negotiation a client attempts.
pub const PROTOCOL_VERSION_ENV_VAR: &str = "DTH_PROTOCOL_VERSION";

/// Process-wide protocol version state.
///
/// Starts at version 1. A `ProtocolVersion` negotiation message raises
/// the current version to the lower of the requested and the maximum
/// supported version, unless [`PROTOCOL_VERSION_ENV_VAR`] pinned it.
#[derive(Debug)]
pub struct ProtocolManager {
    max_version: i32,
    env_overridden: bool,
    current: AtomicI32,
}

impl ProtocolManager {
    #[must_use]
    pub fn new() -> Self {
        Self::with_environment(std::env::var(PROTOCOL_VERSION_ENV_VAR).ok().as_deref())
    }

    fn with_environment(env_value: Option<&str>) -> Self {
        let mut current = 1;
        let mut env_overridden = false;
        if let Some(raw) = env_value {
            match raw.parse::<i32>() {
                Ok(version) if version > 0 && version <= MAX_PROTOCOL_VERSION => {
                    current = version;
                    env_overridden = true;
                }
                _ => {
                    tracing::warn!(
                        value = raw,
                        "ignoring invalid {PROTOCOL_VERSION_ENV_VAR} value"
                    );
                }
            }
        }
        Self {
            max_version: MAX_PROTOCOL_VERSION,
            env_overridden,
            current: AtomicI32::new(current),
        }
    }

    #[must_use]
    pub fn current_version(&self) -> i32 {
        self.current.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn max_version(&self) -> i32 {
        self.max_version
    }

    #[must_use]
    pub fn environment_overridden(&self) -> bool {
        self.env_overridden
    }

    #[must_use]
    pub fn is_negotiation(message: &Message) -> bool {
        message.message_type == message_types::PROTOCOL_VERSION
    }

    /// Handle a `ProtocolVersion` message and reply with the agreed
    /// version on the sending connection. Malformed payloads are logged
    /// and ignored; the current version is left untouched.
    pub fn negotiate(&self, message: &Message, sender: &ConnectionHandle) {
        let requested = match &message.payload {
            Some(payload) => {
                match serde_json::from_value::<ProtocolVersionPayload>(payload.clone()) {
                    Ok(payload) => payload.version,
                    Err(error) => {
                        tracing::warn!(error = %error, "ignoring malformed protocol negotiation");
                        return;
                    }
                }
            }
            None => {
                tracing::warn!("ignoring protocol negotiation without payload");
                return;
            }
        };
        if requested <= 0 {
            tracing::warn!(requested, "ignoring non-positive protocol version request");
            return;
        }

        let negotiated = requested.min(self.max_version);
        if self.env_overridden {
            tracing::debug!(
                requested,
                pinned = self.current_version(),
                "protocol version pinned by environment, negotiation ignored"
            );
        } else {
            self.current.store(negotiated, Ordering::Release);
            tracing::info!(version = negotiated, "protocol version negotiated");
        }

        let reply = Message::from_payload(
            message_types::PROTOCOL_VERSION,
            UNBOUND_CONTEXT_ID,
            serde_json::json!({ "Version": self.current_version() }),
        );
        sender.transmit(reply);
    }
}

impl Default for ProtocolManager {
    fn default() -> Self {
        Self::new()
    }
}
