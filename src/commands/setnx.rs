use bytes::Bytes;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Set key to hold string value if key does not exist. In that case, it is equal to SET. When key
/// already holds a value, no operation is performed. SETNX is short for "SET if Not eXists".
#[derive(Debug, PartialEq)]
pub struct Setnx {
    pub key: String,
    pub value: Bytes,
}

impl Executable for Setnx {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        let written = node.store.lock().setnx(&session.db, self.key, self.value);

        Ok(Frame::Integer(written as i64))
    }
}

impl TryFrom<&mut CommandParser> for Setnx {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        let value = parser.next_bytes()?;

        Ok(Self { key, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Request;
    use crate::commands::Command;

    fn setnx() -> Command {
        let request = Request::new("SETNX", vec![Bytes::from("key1"), Bytes::from("1")]);
        Command::try_from(request).unwrap()
    }

    #[tokio::test]
    async fn when_key_does_not_exists() {
        let node = Node::authority();
        let mut session = Session::new(true);

        let cmd = setnx();
        assert_eq!(
            cmd,
            Command::Setnx(Setnx {
                key: String::from("key1"),
                value: Bytes::from("1")
            })
        );

        let res = cmd.exec(&node, &mut session).unwrap();

        assert_eq!(res, Frame::Integer(1));
        assert_eq!(node.store.lock().get("0", "key1"), Some(Bytes::from("1")));
    }

    #[tokio::test]
    async fn when_key_already_exists() {
        let node = Node::authority();
        let mut session = Session::new(true);
        node.store
            .lock()
            .set("0", String::from("key1"), Bytes::from("old"));

        let res = setnx().exec(&node, &mut session).unwrap();

        assert_eq!(res, Frame::Integer(0));
        assert_eq!(node.store.lock().get("0", "key1"), Some(Bytes::from("old")));
    }
}
