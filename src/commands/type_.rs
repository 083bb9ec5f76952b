use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Returns the string representation of the type of the value stored at key: `none`, `string`,
/// `list` or `set`.
#[derive(Debug, PartialEq)]
pub struct Type {
    pub key: String,
}

impl Executable for Type {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        let value_type = node.store.lock().value_type(&session.db, &self.key);
        Ok(Frame::Simple(value_type.to_string()))
    }
}

impl TryFrom<&mut CommandParser> for Type {
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
    use crate::store::End;
    use bytes::Bytes;

    #[tokio::test]
    async fn every_type() {
        let node = Node::authority();
        let mut session = Session::new(true);
        {
            let mut store = node.store.lock();
            store.set("0", "s".to_string(), Bytes::from("1"));
            store
                .push("0", "l".to_string(), Bytes::from("1"), End::Tail)
                .unwrap();
            store.sadd("0", "t".to_string(), Bytes::from("1")).unwrap();
        }

        for (key, expected) in [("s", "string"), ("l", "list"), ("t", "set"), ("x", "none")] {
            let cmd = Command::try_from(Request::new("TYPE", vec![Bytes::from(key)])).unwrap();
            assert_eq!(
                cmd.exec(&node, &mut session).unwrap(),
                Frame::Simple(expected.to_string())
            );
        }
    }
}
