use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// TTL returns the remaining time to live of a key that has a timeout, in seconds. Keys without
/// a timeout, missing ones included, reply `-1`.
#[derive(Debug, PartialEq)]
pub struct Ttl {
    pub key: String,
}

impl Executable for Ttl {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        let ttl = node.store.lock().ttl(&session.db, &self.key);
        Ok(Frame::Integer(ttl))
    }
}

impl TryFrom<&mut CommandParser> for Ttl {
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
    use tokio::time::{self, Duration};

    fn ttl() -> Command {
        Command::try_from(Request::new("TTL", vec![Bytes::from("key1")])).unwrap()
    }

    #[tokio::test]
    async fn counts_down() {
        time::pause();

        let node = Node::authority();
        let mut session = Session::new(true);
        {
            let mut store = node.store.lock();
            store.set("0", "key1".to_string(), Bytes::from("1"));
            store.expire("0", "key1".to_string(), 10).unwrap();
        }

        assert_eq!(ttl().exec(&node, &mut session).unwrap(), Frame::Integer(10));

        time::advance(Duration::from_millis(4500)).await;

        assert_eq!(ttl().exec(&node, &mut session).unwrap(), Frame::Integer(6));
    }

    #[tokio::test]
    async fn without_timeout() {
        let node = Node::authority();
        let mut session = Session::new(true);

        assert_eq!(ttl().exec(&node, &mut session).unwrap(), Frame::Integer(-1));

        node.store
            .lock()
            .set("0", "key1".to_string(), Bytes::from("1"));

        assert_eq!(ttl().exec(&node, &mut session).unwrap(), Frame::Integer(-1));
    }
}
