//! The listen loop.
//!
//! Each iteration stamps the lease, reconnects if the connection is
//! gone, forwards queued commands and blocks on one socket read. Errors
//! are triaged rather than propagated blindly: a read timeout is the
//! loop's idle tick, a lost connection demotes the lease and arms the
//! backoff, and only credential rejections, a captured lease or an
//! unrecognized failure stop the daemon.

use std::thread;

use tracing::{debug, error, info, trace, warn};

use callbridge_core::{CommandInbox, EventOutbox, StorageLayout};
use callbridge_cti::{CtiError, Method};
use callbridge_ws::{Transport, WsError};

use crate::config::ListenerConfig;
use crate::error::{ListenerError, ListenerResult};
use crate::lease::{ProcessLease, ProcessStatus};
use crate::reconnect::{ReconnectPolicy, ReconnectState};
use crate::session::{CtiSession, dial, fresh_identity};
use crate::signals::ShutdownFlag;

/// Outcome of one loop iteration.
enum Flow {
    Continue,
    Stop,
}

/// The daemon: owns the lease, the session and the loop.
pub struct Runner {
    config: ListenerConfig,
    lease: ProcessLease,
    session: CtiSession<Transport>,
    inbox: CommandInbox,
    reconnect: ReconnectPolicy,
    backoff: ReconnectState,
    shutdown: ShutdownFlag,
}

impl Runner {
    /// Claims the lease and prepares a detached session.
    pub fn new(
        config: ListenerConfig,
        layout: &StorageLayout,
        shutdown: ShutdownFlag,
    ) -> ListenerResult<Self> {
        layout.ensure_dirs()?;
        let mut lease = ProcessLease::claim(layout.lease_path())?;
        lease.update_status(ProcessStatus::Inactive)?;
        let session = CtiSession::new(
            fresh_identity(&config),
            EventOutbox::new(layout.events_dir()),
            config.event_mask,
            config.wire_base64(),
        );
        Ok(Self {
            inbox: CommandInbox::new(layout.commands_dir()),
            config,
            lease,
            session,
            reconnect: ReconnectPolicy::default(),
            backoff: ReconnectState::new(),
            shutdown,
        })
    }

    /// Runs the listen loop until shutdown or a fatal error.
    ///
    /// The connection is closed and the lease marked stopped on the way
    /// out either way.
    pub fn run(&mut self) -> ListenerResult<()> {
        let result = self.listen();
        self.session.close("Listener shutting down");
        self.lease.stop();
        result
    }

    fn listen(&mut self) -> ListenerResult<()> {
        // The first attempt happens before the loop, so a run with
        // reconnection off still serves one connection.
        if let Err(error) = self.try_connect() {
            self.triage(error)?;
        }
        loop {
            if self.shutdown.is_shutdown() {
                info!("shutdown requested, leaving the listen loop");
                return Ok(());
            }
            match self.iterate() {
                Ok(Flow::Continue) => {}
                Ok(Flow::Stop) => return Ok(()),
                Err(error) => self.triage(error)?,
            }
        }
    }

    fn iterate(&mut self) -> ListenerResult<Flow> {
        self.lease.update_activity()?;

        if !self.session.is_connected(false) {
            if !self.config.auto_reconnect {
                debug!("disconnected and reconnection is off");
                return Ok(Flow::Stop);
            }
            self.backoff.record_failure();
            let wait = self.reconnect.wait_for(self.backoff.consecutive_failures());
            trace!(wait_us = wait.as_micros() as u64, "waiting before reconnecting");
            thread::sleep(wait);
            if !self.try_connect()? {
                return Ok(Flow::Continue);
            }
        }

        self.pump_commands()?;
        self.session.receive()?;
        Ok(Flow::Continue)
    }

    /// One connection attempt; `false` means try again later.
    fn try_connect(&mut self) -> ListenerResult<bool> {
        match dial(&self.config) {
            Ok((identity, connection)) => {
                self.session.attach(identity, connection);
                if !self.session.is_connected(true) {
                    debug!("connection did not survive its first probe");
                    return Ok(false);
                }
                self.on_connect()?;
                Ok(true)
            }
            Err(error) => {
                warn!(%error, url = %self.config.url(), "connection attempt failed");
                Ok(false)
            }
        }
    }

    fn on_connect(&mut self) -> ListenerResult<()> {
        info!(url = %self.config.url(), "connected to the CTI server");
        self.backoff.record_success();
        self.lease.update_status(ProcessStatus::Active)?;
        self.session.subscribe()?;
        Ok(())
    }

    /// Forwards queued commands, calls before transfers.
    fn pump_commands(&mut self) -> ListenerResult<()> {
        for command in self.inbox.drain(self.config.command_ttl())? {
            debug!(kind = command.kind(), "forwarding queued command");
            self.session.send_request(Method::from(command))?;
        }
        Ok(())
    }

    /// Sorts a loop error into recoverable and fatal.
    ///
    /// A timeout is the idle tick. A lost connection demotes the lease
    /// so the next iteration reconnects. A rejected request is the
    /// server's business, not a reason to die. A captured lease or a
    /// credential rejection cannot be retried past, and anything
    /// unrecognized stops the daemon rather than looping on it.
    fn triage(&mut self, error: ListenerError) -> ListenerResult<()> {
        match &error {
            ListenerError::Ws(WsError::Timeout) => Ok(()),
            ListenerError::Ws(WsError::Broken { .. } | WsError::CloseReceived) => {
                warn!(%error, "connection lost");
                self.lease.update_status(ProcessStatus::Inactive)?;
                Ok(())
            }
            ListenerError::MandateLost { .. } => {
                warn!(%error, "another listener captured the lease");
                self.session.close("Other listener process captured control");
                Err(error)
            }
            ListenerError::Cti(CtiError::AuthenticationRejected { .. }) => {
                error!(%error, "server rejected our credentials");
                Err(error)
            }
            ListenerError::Cti(CtiError::ApplicationRejected { .. }) => {
                warn!(%error, "request rejected by the server");
                Ok(())
            }
            _ => {
                error!(%error, "unhandled listener error");
                Err(error)
            }
        }
    }
}
