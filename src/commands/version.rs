use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Current version of the store: the number of changes it went through.
#[derive(Debug, PartialEq)]
pub struct Version;

impl Executable for Version {
    fn exec(self, node: &Node, _session: &mut Session) -> Result<Frame, Error> {
        Ok(Frame::Integer(node.store.lock().version() as i64))
    }
}

impl TryFrom<&mut CommandParser> for Version {
    type Error = Error;

    fn try_from(_parser: &mut CommandParser) -> Result<Self, Self::Error> {
        Ok(Self)
    }
}
