//! Diff-and-dispatch project state server.
//!
//! Clients connect over TCP with `Content-Length` framed JSON messages.
//! Each project context keeps two snapshots of its state: the freshly
//! resolved `local` and the last-transmitted `remote`. A change request
//! marks a trigger; a single-flight drain loop per context applies the
//! queued messages, resolves the project, and sends exactly the sections
//! whose value differs from what the client already has.

mod codec;
mod connection;
mod context;
mod protocol;
mod registry;
mod server;
mod snapshot;
mod trigger;

pub use codec::{FrameReader, FrameWriter};
pub use connection::ConnectionHandle;
pub use context::ProjectContext;
pub use protocol::{MAX_PROTOCOL_VERSION, PROTOCOL_VERSION_ENV_VAR, ProtocolManager};
pub use registry::ContextRegistry;
pub use server::Server;
pub use snapshot::{ProjectWorld, Snapshot, send_error_if_changed, send_if_changed};
pub use trigger::Trigger;

/// Lock a mutex, recovering the data from a poisoned lock. Context state
/// stays coherent even if a worker thread panicked mid-update.
pub(crate) fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
