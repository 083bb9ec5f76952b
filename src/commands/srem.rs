use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Removes `member` from the set. Replies `:1` when it was a member and `:0` otherwise.
#[derive(Debug, PartialEq)]
pub struct SRem {
    pub key: String,
    pub member: Bytes,
}

impl Executable for SRem {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        let removed = node.store.lock().srem(&session.db, self.key, self.member)?;
        Ok(Frame::Integer(removed as i64))
    }
}

impl TryFrom<&mut CommandParser> for SRem {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        let member = parser.next_bytes()?;

        Ok(Self { key, member })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Request;
    use crate::commands::Command;

    #[tokio::test]
    async fn removes_member() {
        let node = Node::authority();
        let mut session = Session::new(true);
        node.store
            .lock()
            .sadd("0", "s".to_string(), Bytes::from("x"))
            .unwrap();

        let srem = || {
            Command::try_from(Request::new(
                "SREM",
                vec![Bytes::from("s"), Bytes::from("x")],
            ))
            .unwrap()
        };

        assert_eq!(srem().exec(&node, &mut session).unwrap(), Frame::Integer(1));
        assert_eq!(srem().exec(&node, &mut session).unwrap(), Frame::Integer(0));
    }
}
