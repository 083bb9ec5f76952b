use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Renames `key` to `new_key`, replacing whatever `new_key` held. Fails when both names are the
/// same or `key` does not exist.
#[derive(Debug, PartialEq)]
pub struct Rename {
    pub key: String,
    pub new_key: String,
}

impl Executable for Rename {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        node.store
            .lock()
            .rename(&session.db, self.key, self.new_key)?;

        Ok(Frame::ok())
    }
}

impl TryFrom<&mut CommandParser> for Rename {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        let new_key = parser.next_string()?;

        Ok(Self { key, new_key })
    }
}
