//! dthd - design-time host daemon entry point.
//!
//! Started by an IDE or build host, which passes the port to listen on,
//! its own name and its pid. The daemon serves project state over the
//! loopback interface and exits on its own when the host process dies,
//! so orphaned daemons do not accumulate.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use dth_resolver::ManifestResolver;
use dth_server::Server;

const HOST_POLL_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Parser)]
#[command(name = "dthd", version, about = "Design-time project state host")]
struct Args {
    /// Port to listen on (loopback only).
    #[arg(long)]
    port: u16,

    /// Name of the host process, stamped on every outbound message.
    #[arg(long)]
    host_name: String,

    /// Pid of the host process; the daemon exits when it dies.
    #[arg(long)]
    host_pid: i32,

    /// Lower the default log filter to debug.
    #[arg(long)]
    verbose: bool,
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_default();

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

#[cfg(unix)]
fn host_process_alive(pid: i32) -> bool {
    // Signal 0 probes for existence without delivering anything; EPERM
    // still means the process is there.
    let probed = unsafe { libc::kill(pid, 0) };
    probed == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn host_process_alive(_pid: i32) -> bool {
    true
}

async fn watch_host_process(pid: i32) {
    let mut interval = tokio::time::interval(HOST_POLL_INTERVAL);
    loop {
        interval.tick().await;
        if !host_process_alive(pid) {
            tracing::info!(pid, "host process exited");
            return;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);
    tracing::info!(
        port = args.port,
        host = %args.host_name,
        host_pid = args.host_pid,
        "starting design-time host daemon"
    );

    let server = Server::new(args.host_name.clone(), Arc::new(ManifestResolver::new()));
    tokio::select! {
        result = server.run(args.port) => result,
        () = watch_host_process(args.host_pid) => {
            tracing::info!("shutting down with the host process");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_parse_all_flags() {
        let args = Args::try_parse_from([
            "dthd",
            "--port",
            "4112",
            "--host-name",
            "vs-host",
            "--host-pid",
            "1234",
            "--verbose",
        ])
        .unwrap();
        assert_eq!(args.port, 4112);
        assert_eq!(args.host_name, "vs-host");
        assert_eq!(args.host_pid, 1234);
        assert!(args.verbose);
    }

    #[test]
    fn test_args_require_port_and_host() {
        assert!(Args::try_parse_from(["dthd", "--port", "4112"]).is_err());
        assert!(Args::try_parse_from(["dthd"]).is_err());
    }

    #[test]
    fn test_own_process_is_alive() {
        #[allow(clippy::cast_possible_wrap)]
        let pid = std::process::id() as i32;
        assert!(host_process_alive(pid));
    }
}
