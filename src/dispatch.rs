//! Turns one request into exactly one reply.
//!
//! Every request goes through the same checks before it runs: authentication, command lookup,
//! arity, write permission and the type of the first argument. Failures become error replies and
//! the connection stays usable.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use thiserror::Error as ThisError;
use tracing::{debug, error};

use crate::codec::{Request, RequestError};
use crate::commands::executable::Executable;
use crate::commands::{lookup, Access, Command, CommandParserError};
use crate::frame::Frame;
use crate::server::Node;
use crate::snapshot::FormatError;
use crate::store::{StoreError, DEFAULT_DB};
use crate::Error;

#[derive(Debug, ThisError, PartialEq)]
pub enum DispatchError {
    #[error("Must be authenticated first")]
    NotAuthenticated,
    #[error("server is operating in slave only mode; redirect to master")]
    ReadOnly,
    #[error("server shutting down and command not allowed.")]
    ShuttingDown,
}

/// Per connection state.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Database the connection works on.
    pub db: String,
    pub authenticated: bool,
    /// Set by QUIT and SHUTDOWN: the connection closes once the reply is written.
    pub close_requested: bool,
    /// Commands replayed from a master's DO envelope run with this set.
    pub replaying: bool,
}

impl Session {
    pub fn new(authenticated: bool) -> Session {
        Session {
            db: DEFAULT_DB.to_string(),
            authenticated,
            close_requested: false,
            replaying: false,
        }
    }

    pub fn replaying(db: impl Into<String>) -> Session {
        Session {
            db: db.into(),
            authenticated: true,
            close_requested: false,
            replaying: true,
        }
    }
}

/// Checks and runs `request` for the connection `session` belongs to.
pub async fn dispatch(node: &Node, session: &mut Session, request: Request) -> Frame {
    debug!(command = request.name, args = request.args.len(), "received request");

    let frame = match check(node, session, &request) {
        Ok(()) => execute(node, session, request).await,
        Err(err) => error_frame(err),
    };

    if node.is_halting() {
        session.close_requested = true;
    }

    frame
}

fn check(node: &Node, session: &Session, request: &Request) -> Result<(), Error> {
    if !session.authenticated && request.name != "auth" {
        return Err(DispatchError::NotAuthenticated.into());
    }

    let spec = lookup(&request.name).ok_or_else(|| CommandParserError::UnknownCommand {
        command: request.name.clone(),
    })?;

    if spec.arity >= 0 && request.args.len() != spec.arity as usize {
        return Err(CommandParserError::WrongArity {
            command: request.name.clone(),
            expected: spec.arity,
            actual: request.args.len(),
        }
        .into());
    }

    if spec.access == Access::Write {
        if !node.config.authority {
            return Err(DispatchError::ReadOnly.into());
        }
        if node.is_halting() || session.close_requested {
            return Err(DispatchError::ShuttingDown.into());
        }
    }

    if let Some(key) = request.args.first() {
        let key = String::from_utf8_lossy(key);
        let actual = node.store.lock().value_type(&session.db, &key);
        spec.arg_kind.check(actual)?;
    }

    Ok(())
}

async fn execute(node: &Node, session: &mut Session, request: Request) -> Frame {
    node.store.lock().record_operation();

    let cmd = match Command::try_from(request) {
        Ok(cmd) => cmd,
        Err(err) => return error_frame(err),
    };

    let frame = match cmd {
        Command::Slave(slave) => slave.attach(node).await,
        cmd => match panic::catch_unwind(AssertUnwindSafe(|| cmd.exec(node, session))) {
            Ok(Ok(frame)) => frame,
            Ok(Err(err)) => error_frame(err),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(message, "command panicked");
                Frame::error(format!("Unhandled exception [{message}]"))
            }
        },
    };

    let changes = node.store.lock().changes_since_save();
    if changes >= node.config.update_count {
        debug!(changes, "save threshold reached");
        node.request_save();
    }

    frame
}

/// Errors the dispatcher knows about are reported with their own message, anything else is
/// unexpected.
fn error_frame(err: Error) -> Frame {
    let known = err.is::<DispatchError>()
        || err.is::<StoreError>()
        || err.is::<CommandParserError>()
        || err.is::<FormatError>()
        || err.is::<RequestError>();

    if known {
        Frame::error(err.to_string())
    } else {
        error!(%err, "unhandled error");
        Frame::error(format!("Unhandled exception [{err}]"))
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic".to_string()
    }
}
