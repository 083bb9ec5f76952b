use crate::commands::executable::Executable;
use crate::commands::{CommandParser, CommandParserError};
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Sets a timeout in seconds on `key`. After the timeout has expired the key is deleted. A key
/// that already has a timeout keeps it; writing a new value to the key clears it.
#[derive(Debug, PartialEq)]
pub struct Expire {
    pub key: String,
    pub seconds: i64,
}

impl Executable for Expire {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        node.store
            .lock()
            .expire(&session.db, self.key, self.seconds)?;

        Ok(Frame::Integer(1))
    }
}

impl TryFrom<&mut CommandParser> for Expire {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        let seconds = parser.next_integer().map_err(|err| match err {
            CommandParserError::InvalidInteger(value) => {
                CommandParserError::InvalidExpiration(value)
            }
            err => err,
        })?;

        Ok(Self { key, seconds })
    }
}
