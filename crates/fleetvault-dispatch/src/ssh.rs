// SPDX-FileCopyrightText: 2026 Fleetvault Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `ssh2`-backed [`SessionConnector`].
//!
//! libssh2 calls block, so every step runs on the blocking thread pool. The
//! session keeps a clone of its TCP socket: [`RemoteSession::close`] shuts
//! that socket down, which releases a worker thread still blocked reading
//! output after its task hit the deadline or was cancelled.

use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::sync::{Arc, Mutex, TryLockError};
use std::time::Duration;

use async_trait::async_trait;
use fleetvault_core::{CredentialRecord, ExitReport, FleetError, RemoteSession, SessionConnector};
use ssh2::{Channel, Session};
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// Production connector: password authentication, host keys not verified.
#[derive(Debug, Default, Clone)]
pub struct SshConnector;

impl SshConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SessionConnector for SshConnector {
    async fn connect(
        &self,
        record: &CredentialRecord,
        connect_timeout: Duration,
    ) -> Result<Box<dyn RemoteSession>, FleetError> {
        let host = record.host.clone();
        let port = record.port;
        let user = record.user.clone();
        let password = Zeroizing::new(record.password.clone());

        let session = tokio::task::spawn_blocking(move || {
            open_session(&host, port, &user, &password, connect_timeout)
        })
        .await
        .map_err(|e| FleetError::Internal(format!("ssh connect task failed: {e}")))??;

        Ok(Box::new(session))
    }
}

fn open_session(
    host: &str,
    port: u16,
    user: &str,
    password: &str,
    timeout: Duration,
) -> Result<SshSession, FleetError> {
    let addr = (host, port)
        .to_socket_addrs()
        .map_err(|e| FleetError::remote(host, format!("cannot resolve address: {e}")))?
        .next()
        .ok_or_else(|| FleetError::remote(host, "address resolved to nothing"))?;

    let stream = TcpStream::connect_timeout(&addr, timeout)
        .map_err(|e| FleetError::remote(host, format!("connect failed: {e}")))?;
    let socket = stream
        .try_clone()
        .map_err(|e| FleetError::remote(host, format!("cannot clone socket: {e}")))?;

    let mut session =
        Session::new().map_err(|e| FleetError::remote(host, format!("ssh init failed: {e}")))?;
    session.set_tcp_stream(stream);
    session.set_timeout(u32::try_from(timeout.as_millis()).unwrap_or(u32::MAX));

    session
        .handshake()
        .map_err(|e| FleetError::remote(host, format!("handshake failed: {e}")))?;
    session
        .userauth_password(user, password)
        .map_err(|e| FleetError::remote(host, format!("authentication failed: {e}")))?;
    if !session.authenticated() {
        return Err(FleetError::remote(host, "authentication rejected"));
    }

    // Command runtime is bounded by the dispatcher deadline, not libssh2.
    session.set_timeout(0);
    debug!(host = %host, port, "ssh session established");

    Ok(SshSession {
        host: host.to_string(),
        inner: Arc::new(Mutex::new(SshInner {
            session,
            channel: None,
        })),
        socket,
    })
}

struct SshInner {
    session: Session,
    channel: Option<Channel>,
}

/// One authenticated ssh2 session.
pub struct SshSession {
    host: String,
    inner: Arc<Mutex<SshInner>>,
    socket: TcpStream,
}

impl SshSession {
    /// Run `f` with the locked session on the blocking pool.
    async fn blocking<T, F>(&self, f: F) -> Result<T, FleetError>
    where
        T: Send + 'static,
        F: FnOnce(&str, &mut SshInner) -> Result<T, FleetError> + Send + 'static,
    {
        let inner = Arc::clone(&self.inner);
        let host = self.host.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = inner
                .lock()
                .map_err(|_| FleetError::remote(&host, "session lock poisoned"))?;
            f(&host, &mut guard)
        })
        .await
        .map_err(|e| FleetError::Internal(format!("ssh task failed: {e}")))?
    }
}

fn channel<'a>(host: &str, inner: &'a mut SshInner) -> Result<&'a mut Channel, FleetError> {
    inner
        .channel
        .as_mut()
        .ok_or_else(|| FleetError::remote(host, "no command running"))
}

#[async_trait]
impl RemoteSession for SshSession {
    async fn execute(&mut self, command: &str) -> Result<(), FleetError> {
        let command = command.to_string();
        self.blocking(move |host, inner| {
            let mut channel = inner
                .session
                .channel_session()
                .map_err(|e| FleetError::remote(host, format!("cannot open channel: {e}")))?;
            channel
                .request_pty("xterm", None, None)
                .map_err(|e| FleetError::remote(host, format!("pty request failed: {e}")))?;
            channel
                .exec(&command)
                .map_err(|e| FleetError::remote(host, format!("exec failed: {e}")))?;
            inner.channel = Some(channel);
            Ok(())
        })
        .await
    }

    async fn write_stdin(&mut self, data: &[u8]) -> Result<(), FleetError> {
        let data = Zeroizing::new(data.to_vec());
        self.blocking(move |host, inner| {
            let channel = channel(host, inner)?;
            channel
                .write_all(&data)
                .and_then(|()| channel.flush())
                .map_err(|e| FleetError::remote(host, format!("stdin write failed: {e}")))
        })
        .await
    }

    async fn wait_exit_status(&mut self) -> Result<ExitReport, FleetError> {
        self.blocking(|host, inner| {
            let channel = channel(host, inner)?;
            let mut raw = Vec::new();
            channel
                .read_to_end(&mut raw)
                .map_err(|e| FleetError::remote(host, format!("reading output failed: {e}")))?;
            channel
                .wait_close()
                .map_err(|e| FleetError::remote(host, format!("channel close failed: {e}")))?;
            let exit_status = channel
                .exit_status()
                .map_err(|e| FleetError::remote(host, format!("no exit status: {e}")))?;
            Ok(ExitReport {
                exit_status,
                output: String::from_utf8_lossy(&raw).into_owned(),
            })
        })
        .await
    }

    async fn close(&mut self) -> Result<(), FleetError> {
        let inner = Arc::clone(&self.inner);
        let host = self.host.clone();
        let socket = self
            .socket
            .try_clone()
            .map_err(|e| FleetError::remote(&host, format!("cannot clone socket: {e}")))?;

        tokio::task::spawn_blocking(move || {
            match inner.try_lock() {
                Ok(mut guard) => {
                    if let Some(mut channel) = guard.channel.take() {
                        close_step(&host, "channel close", channel.close());
                    }
                    close_step(
                        &host,
                        "disconnect",
                        guard
                            .session
                            .disconnect(None, "fleetvault session closed", None),
                    );
                }
                // Worker thread still blocked on this session; the socket
                // shutdown below unblocks it.
                Err(TryLockError::WouldBlock) => {
                    debug!(host = %host, "session busy, forcing socket shutdown");
                }
                Err(TryLockError::Poisoned(_)) => {
                    warn!(host = %host, "session lock poisoned, forcing socket shutdown");
                }
            }
            if let Err(e) = socket.shutdown(Shutdown::Both)
                && e.kind() != std::io::ErrorKind::NotConnected
            {
                debug!(host = %host, error = %e, "socket shutdown failed");
            }
        })
        .await
        .map_err(|e| FleetError::Internal(format!("ssh close task failed: {e}")))
    }
}

/// Best-effort teardown step: failures are logged, never returned.
fn close_step(host: &str, step: &str, result: Result<(), ssh2::Error>) -> bool {
    match result {
        Ok(()) => true,
        Err(e) => {
            debug!(host = %host, step, error = %e, "session teardown step failed");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use fleetvault_core::PackageManager;

    use super::*;

    #[tokio::test]
    async fn refused_connection_is_a_remote_session_error() {
        // Bind then drop a listener so the port is closed.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let record = CredentialRecord {
            user: "u".into(),
            host: "127.0.0.1".into(),
            port,
            password: "p".into(),
            passwordless_sudo: true,
            package_manager: PackageManager::Apt,
        };

        let result = SshConnector::new()
            .connect(&record, Duration::from_secs(2))
            .await;
        match result {
            Err(FleetError::RemoteSession { host, .. }) => assert_eq!(host, "127.0.0.1"),
            Err(other) => panic!("expected RemoteSession, got {other:?}"),
            Ok(_) => panic!("expected connect failure"),
        }
    }

    #[test]
    fn failed_teardown_step_is_swallowed() {
        let err = ssh2::Error::new(ssh2::ErrorCode::Session(-7), "socket send failed");
        assert!(!close_step("h1", "disconnect", Err(err)));
        assert!(close_step("h1", "channel close", Ok(())));
    }
}
