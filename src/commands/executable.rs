use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

pub trait Executable {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error>;
}
