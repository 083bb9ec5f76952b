use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Increments the number stored at key by one. A missing or non-numeric value counts as 0.
#[derive(Debug, PartialEq)]
pub struct Incr {
    pub key: String,
}

impl Executable for Incr {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        let res = node.store.lock().add(&session.db, self.key, 1);

        match res {
            Ok(value) => Ok(Frame::Integer(value)),
            Err(msg) => Ok(Frame::Error(msg.to_string())),
        }
    }
}

impl TryFrom<&mut CommandParser> for Incr {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;

        Ok(Self { key })
    }
}
