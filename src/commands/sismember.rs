use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

#[derive(Debug, PartialEq)]
pub struct SIsMember {
    pub key: String,
    pub member: Bytes,
}

impl Executable for SIsMember {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        let is_member = node
            .store
            .lock()
            .sismember(&session.db, &self.key, &self.member)?;

        Ok(Frame::Integer(is_member as i64))
    }
}

impl TryFrom<&mut CommandParser> for SIsMember {
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
    async fn membership() {
        let node = Node::authority();
        let mut session = Session::new(true);
        node.store
            .lock()
            .sadd("0", "s".to_string(), Bytes::from("x"))
            .unwrap();

        let sismember = |member: &'static str| {
            Command::try_from(Request::new(
                "SISMEMBER",
                vec![Bytes::from("s"), Bytes::from(member)],
            ))
            .unwrap()
        };

        assert_eq!(
            sismember("x").exec(&node, &mut session).unwrap(),
            Frame::Integer(1)
        );
        assert_eq!(
            sismember("y").exec(&node, &mut session).unwrap(),
            Frame::Integer(0)
        );
    }
}
