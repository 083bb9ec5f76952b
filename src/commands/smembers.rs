use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Returns every member of the set at `key`, in byte order.
#[derive(Debug, PartialEq)]
pub struct SMembers {
    pub key: String,
}

impl Executable for SMembers {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        let members = node.store.lock().smembers(&session.db, &self.key)?;
        Ok(Frame::bulk_array(members))
    }
}

impl TryFrom<&mut CommandParser> for SMembers {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        Ok(Self { key })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Request;
    use crate::commands::Command;
    use bytes::Bytes;

    #[tokio::test]
    async fn sorted_members() {
        let node = Node::authority();
        let mut session = Session::new(true);
        {
            let mut store = node.store.lock();
            for member in ["b", "c", "a"] {
                store
                    .sadd("0", "s".to_string(), Bytes::from(member))
                    .unwrap();
            }
        }

        let cmd = Command::try_from(Request::new("SMEMBERS", vec![Bytes::from("s")])).unwrap();

        assert_eq!(
            cmd.exec(&node, &mut session).unwrap(),
            Frame::bulk_array([Bytes::from("a"), Bytes::from("b"), Bytes::from("c")])
        );
    }

    #[tokio::test]
    async fn missing_set() {
        let node = Node::authority();
        let mut session = Session::new(true);

        let cmd = Command::try_from(Request::new("SMEMBERS", vec![Bytes::from("s")])).unwrap();

        assert_eq!(cmd.exec(&node, &mut session).unwrap(), Frame::Array(vec![]));
        assert!(!node.store.lock().exists("0", "s"));
    }
}
