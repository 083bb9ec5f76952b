use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Replies `:1` when `key` exists in the selected database, `:0` otherwise.
#[derive(Debug, PartialEq)]
pub struct Exists {
    pub key: String,
}

impl Executable for Exists {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        let exists = node.store.lock().exists(&session.db, &self.key);
        Ok(Frame::Integer(exists as i64))
    }
}

impl TryFrom<&mut CommandParser> for Exists {
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
    async fn existing_and_missing() {
        let node = Node::authority();
        let mut session = Session::new(true);
        node.store
            .lock()
            .set("0", "foo".to_string(), Bytes::from("1"));

        let exists = |key: &'static str| {
            Command::try_from(Request::new("EXISTS", vec![Bytes::from(key)])).unwrap()
        };

        assert_eq!(
            exists("foo").exec(&node, &mut session).unwrap(),
            Frame::Integer(1)
        );
        assert_eq!(
            exists("bar").exec(&node, &mut session).unwrap(),
            Frame::Integer(0)
        );
    }
}
