use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Decrements the number stored at key by one.
#[derive(Debug, PartialEq)]
pub struct Decr {
    pub key: String,
}

impl Executable for Decr {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        let res = node.store.lock().add(&session.db, self.key, -1);

        match res {
            Ok(value) => Ok(Frame::Integer(value)),
            Err(msg) => Ok(Frame::Error(msg.to_string())),
        }
    }
}

impl TryFrom<&mut CommandParser> for Decr {
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
    async fn goes_negative() {
        let cmd = Command::try_from(Request::new("DECR", vec![Bytes::from("key1")])).unwrap();

        assert_eq!(
            cmd,
            Command::Decr(Decr {
                key: "key1".to_string()
            })
        );

        let node = Node::authority();
        let mut session = Session::new(true);

        let result = cmd.exec(&node, &mut session).unwrap();

        assert_eq!(result, Frame::Integer(-1));
        assert_eq!(node.store.lock().get("0", "key1"), Some(Bytes::from("-1")));
    }

    #[tokio::test]
    async fn out_of_range() {
        let node = Node::authority();
        let mut session = Session::new(true);
        node.store
            .lock()
            .set("0", String::from("key1"), Bytes::from(i64::MIN.to_string()));

        let cmd = Command::try_from(Request::new("DECR", vec![Bytes::from("key1")])).unwrap();
        let result = cmd.exec(&node, &mut session).unwrap();

        assert_eq!(
            result,
            Frame::Error("value is not an integer or out of range".to_string())
        );
    }
}
