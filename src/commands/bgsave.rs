use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Asks the saver task to write the snapshot file and replies right away.
#[derive(Debug, PartialEq)]
pub struct BgSave;

impl Executable for BgSave {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        node.request_save();
        node.store.lock().journal_unversioned(&session.db, "bgsave");

        Ok(Frame::ok())
    }
}

impl TryFrom<&mut CommandParser> for BgSave {
    type Error = Error;

    fn try_from(_parser: &mut CommandParser) -> Result<Self, Self::Error> {
        Ok(Self)
    }
}
