use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

/// Moves `key` from the selected database into `db`. Replies `:1` on success and `:0` when the key
/// is missing or `db` already holds a key with that name.
#[derive(Debug, PartialEq)]
pub struct Move {
    pub key: String,
    pub db: String,
}

impl Executable for Move {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        let res = node.store.lock().move_key(&session.db, self.key, &self.db);

        Ok(Frame::Integer(res.is_ok() as i64))
    }
}

impl TryFrom<&mut CommandParser> for Move {
    type Error = Error;

    fn try_from(parser: &mut CommandParser) -> Result<Self, Self::Error> {
        let key = parser.next_string()?;
        let db = parser.next_string()?;

        Ok(Self { key, db })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::Request;
    use crate::commands::Command;
    use bytes::Bytes;

    fn move_to_1() -> Command {
        Command::try_from(Request::new(
            "MOVE",
            vec![Bytes::from("a"), Bytes::from("1")],
        ))
        .unwrap()
    }

    #[tokio::test]
    async fn moves_between_databases() {
        let node = Node::authority();
        let mut session = Session::new(true);
        node.store
            .lock()
            .set("0", "a".to_string(), Bytes::from("1"));

        assert_eq!(
            move_to_1().exec(&node, &mut session).unwrap(),
            Frame::Integer(1)
        );

        let store = node.store.lock();
        assert!(!store.exists("0", "a"));
        assert_eq!(store.get("1", "a"), Some(Bytes::from("1")));
    }

    #[tokio::test]
    async fn refuses_missing_or_taken() {
        let node = Node::authority();
        let mut session = Session::new(true);

        assert_eq!(
            move_to_1().exec(&node, &mut session).unwrap(),
            Frame::Integer(0)
        );

        {
            let mut store = node.store.lock();
            store.set("0", "a".to_string(), Bytes::from("zero"));
            store.set("1", "a".to_string(), Bytes::from("one"));
        }

        assert_eq!(
            move_to_1().exec(&node, &mut session).unwrap(),
            Frame::Integer(0)
        );
        assert_eq!(node.store.lock().get("0", "a"), Some(Bytes::from("zero")));
    }
}
