use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Unix time, in seconds, of the last successful save.
#[derive(Debug, PartialEq)]
pub struct LastSave;

impl Executable for LastSave {
    fn exec(self, node: &Node, _session: &mut Session) -> Result<Frame, Error> {
        Ok(Frame::Integer(node.store.lock().last_save() as i64))
    }
}

impl TryFrom<&mut CommandParser> for LastSave {
    type Error = Error;

    fn try_from(_parser: &mut CommandParser) -> Result<Self, Self::Error> {
        Ok(Self)
    }
}
