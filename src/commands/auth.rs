use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Authenticates the connection with the shared secret of the node. A wrong password also
/// revokes an earlier successful AUTH.
#[derive(Debug, PartialEq)]
pub struct Auth {
    pub password: String,
}

impl Executable for Auth {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        session.authenticated = node
            .config
            .auth
            .as_deref()
            .map_or(true, |secret| secret == self.password);

        if session.authenticated {
            Ok(Frame::ok())
        } else {
            Ok(Frame::error("authentication password incorrect"))
        }
    }
}

impl TryFrom<&mut CommandParser> for Auth {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let password = parser.next_string()?;
        Ok(Self { password })
    }
}
