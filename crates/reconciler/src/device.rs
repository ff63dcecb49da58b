//! Router command execution abstraction.
//!
//! The [`DeviceExecutor`] trait hides how a show-command reaches a router.
//! Production code uses [`SshDeviceExecutor`], tests use `MockDeviceExecutor`.
//!
//! # Session lifetime
//!
//! An SSH session is opened, used for exactly one command and closed inside a
//! single blocking task. The session is dropped on every path, so a failed
//! handshake or a failed command never leaks a connection.
//!
//! The per-attempt deadline and retry policy belong to
//! [`ResilientGateway`](crate::gateway::ResilientGateway). A deadline only drops
//! the future waiting on the blocking task, so each router has a session lock
//! that the blocking task holds until it returns. A retry therefore waits for
//! the abandoned session to close instead of opening a second one. The job
//! itself gives up once `session_timeout` has passed since it started reading.

use std::collections::HashMap;
use std::future::Future;
use std::io::{ErrorKind, Read};
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::{Duration, Instant};

use peersync_core::config::RouterConfig;
use peersync_core::credentials::Credentials;
use ssh2::Session;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::error::ReconcilerError;

/// Where a command is sent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTarget {
    /// Inventory hostname, used for logging and reporting.
    pub hostname: String,
    /// Address or DNS name used to connect.
    pub address: String,
    pub port: u16,
}

impl DeviceTarget {
    /// Builds a target from router configuration.
    ///
    /// The connect address is the configured `address`, then the configured
    /// `primary_ip`, then `fallback_ip` (usually the inventory primary IP),
    /// then the hostname itself.
    pub fn from_router(router: &RouterConfig, fallback_ip: Option<&str>, port: u16) -> Self {
        let address = router
            .address
            .as_deref()
            .or(router.primary_ip.as_deref())
            .or(fallback_ip)
            .map(|a| a.split('/').next().unwrap_or(a))
            .unwrap_or(&router.hostname)
            .to_owned();

        Self {
            hostname: router.hostname.clone(),
            address,
            port,
        }
    }
}

/// Trait abstracting command execution on a router.
///
/// # Errors
///
/// - `ReconcilerError::Connection`: TCP connect or SSH handshake failed
/// - `ReconcilerError::Authentication`: the router rejected the credentials
/// - `ReconcilerError::Command`: the command could not be executed or read
pub trait DeviceExecutor: Send + Sync + 'static {
    /// Runs `command` on `target` and returns its raw output.
    fn run_command(
        &self,
        target: &DeviceTarget,
        command: &str,
    ) -> impl Future<Output = Result<String, ReconcilerError>> + Send;
}

/// One lock per router hostname.
#[derive(Default)]
struct SessionLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl SessionLocks {
    async fn acquire(&self, hostname: &str) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            Arc::clone(locks.entry(hostname.to_owned()).or_default())
        };
        lock.lock_owned().await
    }
}

/// SSH implementation backed by libssh2.
pub struct SshDeviceExecutor {
    username: String,
    password: String,
    connect_timeout: Duration,
    session_timeout: Duration,
    sessions: SessionLocks,
}

impl SshDeviceExecutor {
    /// Creates an executor with password authentication.
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        connect_timeout: Duration,
        session_timeout: Duration,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            connect_timeout,
            session_timeout,
            sessions: SessionLocks::default(),
        }
    }

    /// Creates an executor from environment credentials.
    pub fn from_credentials(
        credentials: &Credentials,
        connect_timeout: Duration,
        session_timeout: Duration,
    ) -> Self {
        Self::new(
            credentials.router_username.clone(),
            credentials.router_password.clone(),
            connect_timeout,
            session_timeout,
        )
    }

    /// Runs `job` on the blocking pool while holding the router's session lock.
    ///
    /// The lock is released when `job` returns, even if the caller stopped
    /// waiting for it.
    pub async fn run_blocking<T, F>(&self, hostname: &str, job: F) -> Result<T, ReconcilerError>
    where
        T: Send + 'static,
        F: FnOnce() -> Result<T, ReconcilerError> + Send + 'static,
    {
        let guard = self.sessions.acquire(hostname).await;
        tokio::task::spawn_blocking(move || {
            let _session = guard;
            job()
        })
        .await
        .map_err(|e| ReconcilerError::Connection {
            target: hostname.to_owned(),
            reason: format!("ssh worker failed: {e}"),
        })?
    }
}

impl DeviceExecutor for SshDeviceExecutor {
    async fn run_command(
        &self,
        target: &DeviceTarget,
        command: &str,
    ) -> Result<String, ReconcilerError> {
        let job = SshJob {
            target: target.clone(),
            command: command.to_owned(),
            username: self.username.clone(),
            password: self.password.clone(),
            connect_timeout: self.connect_timeout,
            session_timeout: self.session_timeout,
        };

        self.run_blocking(&target.hostname, move || job.run()).await
    }
}

/// Everything one blocking SSH exchange needs, owned.
struct SshJob {
    target: DeviceTarget,
    command: String,
    username: String,
    password: String,
    connect_timeout: Duration,
    session_timeout: Duration,
}

impl SshJob {
    fn connection_error(&self, reason: impl std::fmt::Display) -> ReconcilerError {
        ReconcilerError::Connection {
            target: self.target.hostname.clone(),
            reason: reason.to_string(),
        }
    }

    fn command_error(&self, reason: impl std::fmt::Display) -> ReconcilerError {
        ReconcilerError::Command {
            target: self.target.hostname.clone(),
            command: self.command.clone(),
            reason: reason.to_string(),
        }
    }

    fn run(self) -> Result<String, ReconcilerError> {
        let addr = (self.target.address.as_str(), self.target.port)
            .to_socket_addrs()
            .map_err(|e| self.connection_error(format!("cannot resolve {}: {e}", self.target.address)))?
            .next()
            .ok_or_else(|| self.connection_error(format!("no address for {}", self.target.address)))?;

        let tcp = TcpStream::connect_timeout(&addr, self.connect_timeout)
            .map_err(|e| self.connection_error(e))?;
        tcp.set_read_timeout(Some(self.session_timeout))
            .map_err(|e| self.connection_error(e))?;
        tcp.set_write_timeout(Some(self.session_timeout))
            .map_err(|e| self.connection_error(e))?;

        let mut session = Session::new().map_err(|e| self.connection_error(e))?;
        session.set_tcp_stream(tcp);
        session.set_timeout(u32::try_from(self.session_timeout.as_millis()).unwrap_or(u32::MAX));
        session
            .handshake()
            .map_err(|e| self.connection_error(format!("ssh handshake: {e}")))?;

        session
            .userauth_password(&self.username, &self.password)
            .map_err(|e| ReconcilerError::Authentication {
                target: self.target.hostname.clone(),
                reason: e.to_string(),
            })?;
        if !session.authenticated() {
            return Err(ReconcilerError::Authentication {
                target: self.target.hostname.clone(),
                reason: "server did not accept credentials".to_owned(),
            });
        }

        let mut channel = session
            .channel_session()
            .map_err(|e| self.connection_error(format!("open channel: {e}")))?;
        channel
            .exec(&self.command)
            .map_err(|e| self.command_error(e))?;

        let raw = self.read_output(&mut channel)?;

        if let Err(e) = channel.wait_close() {
            debug!(router = self.target.hostname.as_str(), error = %e, "channel close failed");
        }
        match channel.exit_status() {
            Ok(0) => {}
            Ok(status) => warn!(
                router = self.target.hostname.as_str(),
                command = self.command.as_str(),
                status,
                "command exited with non-zero status"
            ),
            Err(e) => debug!(router = self.target.hostname.as_str(), error = %e, "no exit status"),
        }
        if let Err(e) = session.disconnect(None, "done", None) {
            debug!(router = self.target.hostname.as_str(), error = %e, "ssh disconnect failed");
        }

        debug!(
            router = self.target.hostname.as_str(),
            bytes = raw.len(),
            "command output received"
        );
        Ok(String::from_utf8_lossy(&raw).into_owned())
    }

    /// Reads until EOF, giving up once `session_timeout` has elapsed in total.
    fn read_output(&self, channel: &mut impl Read) -> Result<Vec<u8>, ReconcilerError> {
        let deadline = Instant::now() + self.session_timeout;
        let mut raw = Vec::new();
        let mut chunk = [0u8; 8192];
        loop {
            if Instant::now() >= deadline {
                return Err(self.command_error(format!(
                    "output not complete after {}ms",
                    self.session_timeout.as_millis()
                )));
            }
            match channel.read(&mut chunk) {
                Ok(0) => return Ok(raw),
                Ok(n) => raw.extend_from_slice(&chunk[..n]),
                Err(e) if e.kind() == ErrorKind::Interrupted => {}
                Err(e) => return Err(self.command_error(e)),
            }
        }
    }
}

/// Test mock returning canned output per hostname.
#[cfg(test)]
#[derive(Default)]
pub struct MockDeviceExecutor {
    /// hostname -> raw output
    pub outputs: std::collections::HashMap<String, String>,
    /// Hostnames that refuse connections.
    pub unreachable: std::collections::HashSet<String>,
    /// Number of calls per hostname.
    pub calls: std::sync::Mutex<std::collections::HashMap<String, u32>>,
}

#[cfg(test)]
impl MockDeviceExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_output(mut self, hostname: &str, output: &str) -> Self {
        self.outputs.insert(hostname.to_owned(), output.to_owned());
        self
    }

    pub fn with_unreachable(mut self, hostname: &str) -> Self {
        self.unreachable.insert(hostname.to_owned());
        self
    }

    pub fn call_count(&self, hostname: &str) -> u32 {
        self.calls
            .lock()
            .map(|c| c.get(hostname).copied().unwrap_or(0))
            .unwrap_or(0)
    }
}

#[cfg(test)]
impl DeviceExecutor for MockDeviceExecutor {
    async fn run_command(
        &self,
        target: &DeviceTarget,
        _command: &str,
    ) -> Result<String, ReconcilerError> {
        if let Ok(mut calls) = self.calls.lock() {
            *calls.entry(target.hostname.clone()).or_default() += 1;
        }
        if self.unreachable.contains(&target.hostname) {
            return Err(ReconcilerError::Connection {
                target: target.hostname.clone(),
                reason: "connection refused".to_owned(),
            });
        }
        Ok(self
            .outputs
            .get(&target.hostname)
            .cloned()
            .unwrap_or_default())
    }
}
