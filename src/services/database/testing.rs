//! In-memory session driver for unit tests.
//!
//! `ScriptedDriver` answers each `open` from a script of outcomes and records
//! every target it was asked to connect to. Its sessions react to markers in
//! the statement text:
//!
//! - `FAIL_STATEMENT` fails the statement, session stays usable
//! - `DROP_SESSION` reports a structured session loss
//! - `UNCLASSIFIED_EOF` reports an unclassified end-of-file error
//!
//! A session opened for a username of `drop_session` loses the session when
//! asked for its current user.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use super::traits::{
    BoxedSession, ConnectTarget, DriverError, FailureKind, Params, PhysicalSession, Row,
    SessionDriver,
};

pub(crate) const SERVER_BANNER: &str =
    "Oracle Database 19c Enterprise Edition Release 19.0.0.0.0 - Production";

pub(crate) fn tls_failure() -> DriverError {
    DriverError::new(
        FailureKind::Transport,
        "ORA-29024: Certificate validation failure",
    )
    .with_code(29024)
}

pub(crate) fn refused() -> DriverError {
    DriverError::new(FailureKind::Listener, "ORA-12541: TNS:no listener").with_code(12541)
}

pub(crate) fn lost_session() -> DriverError {
    DriverError::new(
        FailureKind::SessionLost,
        "ORA-03113: end-of-file on communication channel",
    )
    .with_code(3113)
}

#[derive(Default)]
struct Counters {
    live: AtomicUsize,
    closed: AtomicUsize,
}

enum Mode {
    Scripted {
        script: Mutex<VecDeque<Result<(), DriverError>>>,
        otherwise: Result<(), DriverError>,
    },
    Hanging,
}

pub(crate) struct ScriptedDriver {
    mode: Mode,
    targets: Mutex<Vec<ConnectTarget>>,
    statements: Arc<Mutex<Vec<String>>>,
    counters: Arc<Counters>,
}

impl ScriptedDriver {
    /// Play `script` in order, then answer every further attempt with `otherwise`.
    pub(crate) fn scripted(
        script: Vec<Result<(), DriverError>>,
        otherwise: Result<(), DriverError>,
    ) -> Self {
        Self::with_mode(Mode::Scripted {
            script: Mutex::new(script.into()),
            otherwise,
        })
    }

    pub(crate) fn succeeding() -> Self {
        Self::scripted(Vec::new(), Ok(()))
    }

    pub(crate) fn failing(error: DriverError) -> Self {
        Self::scripted(Vec::new(), Err(error))
    }

    /// Builds a session, then never finishes the handshake.
    pub(crate) fn hanging() -> Self {
        Self::with_mode(Mode::Hanging)
    }

    fn with_mode(mode: Mode) -> Self {
        Self {
            mode,
            targets: Mutex::new(Vec::new()),
            statements: Arc::new(Mutex::new(Vec::new())),
            counters: Arc::new(Counters::default()),
        }
    }

    pub(crate) fn attempts(&self) -> usize {
        self.targets.lock().unwrap().len()
    }

    pub(crate) fn targets(&self) -> Vec<ConnectTarget> {
        self.targets.lock().unwrap().clone()
    }

    pub(crate) fn statements(&self) -> Vec<String> {
        self.statements.lock().unwrap().clone()
    }

    /// Sessions opened and not yet dropped
    pub(crate) fn live_sessions(&self) -> usize {
        self.counters.live.load(Ordering::SeqCst)
    }

    pub(crate) fn closed_gracefully(&self) -> usize {
        self.counters.closed.load(Ordering::SeqCst)
    }

    fn session_for(&self, target: &ConnectTarget) -> ScriptedSession {
        self.counters.live.fetch_add(1, Ordering::SeqCst);
        ScriptedSession {
            user: target.username.to_uppercase(),
            statements: self.statements.clone(),
            counters: self.counters.clone(),
        }
    }
}

#[async_trait]
impl SessionDriver for ScriptedDriver {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn open(&self, target: &ConnectTarget) -> Result<BoxedSession, DriverError> {
        self.targets.lock().unwrap().push(target.clone());

        match &self.mode {
            Mode::Scripted { script, otherwise } => {
                let next = script.lock().unwrap().pop_front();
                match next.unwrap_or_else(|| otherwise.clone()) {
                    Ok(()) => Ok(Box::new(self.session_for(target))),
                    Err(e) => Err(e),
                }
            }
            Mode::Hanging => {
                let _half_open = self.session_for(target);
                futures::future::pending::<()>().await;
                Err(DriverError::unclassified("unreachable"))
            }
        }
    }
}

struct ScriptedSession {
    user: String,
    statements: Arc<Mutex<Vec<String>>>,
    counters: Arc<Counters>,
}

impl ScriptedSession {
    fn run(&mut self, statement: &str) -> Result<(), DriverError> {
        self.statements.lock().unwrap().push(statement.to_string());

        if statement.contains("DROP_SESSION") {
            Err(lost_session())
        } else if statement.contains("UNCLASSIFIED_EOF") {
            Err(DriverError::unclassified(
                "ORA-03113: end-of-file on communication channel",
            ))
        } else if statement.contains("FAIL_STATEMENT") {
            Err(DriverError::new(
                FailureKind::Statement,
                "ORA-00942: table or view does not exist",
            )
            .with_code(942))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PhysicalSession for ScriptedSession {
    async fn execute(&mut self, statement: &str, _params: &Params) -> Result<u64, DriverError> {
        self.run(statement)?;
        Ok(2)
    }

    async fn query(&mut self, statement: &str, _params: &Params) -> Result<Vec<Row>, DriverError> {
        self.run(statement)?;
        Ok(vec![Row::from_pairs([("STATEMENT", statement)])])
    }

    async fn server_version(&mut self) -> Result<String, DriverError> {
        Ok(SERVER_BANNER.to_string())
    }

    async fn current_user(&mut self) -> Result<String, DriverError> {
        if self.user == "DROP_SESSION" {
            return Err(lost_session());
        }
        Ok(self.user.clone())
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        self.counters.closed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl Drop for ScriptedSession {
    fn drop(&mut self) {
        self.counters.live.fetch_sub(1, Ordering::SeqCst);
    }
}
