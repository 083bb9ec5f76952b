use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Closes the connection once the reply is written.
#[derive(Debug, PartialEq)]
pub struct Quit;

impl Executable for Quit {
    fn exec(self, _node: &Node, session: &mut Session) -> Result<Frame, Error> {
        session.close_requested = true;
        Ok(Frame::ok())
    }
}

impl TryFrom<&mut CommandParser> for Quit {
    type Error = Error;

    fn try_from(_parser: &mut CommandParser) -> Result<Self, Self::Error> {
        Ok(Self)
    }
}
