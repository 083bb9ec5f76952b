use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SetOperation {
    Inter,
    Union,
    Diff,
}

/// SINTER, SUNION and SDIFF. Missing keys and keys that do not hold a set are skipped, except by
/// SINTER where they make the result empty.
#[derive(Debug, PartialEq)]
pub struct SetOp {
    pub op: SetOperation,
    pub keys: Vec<String>,
}

impl SetOp {
    pub(crate) fn parse(parser: &mut CommandParser, op: SetOperation) -> Result<Self, Error> {
        let keys = parser.remaining_strings()?;

        Ok(Self { op, keys })
    }
}

impl Executable for SetOp {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        let store = node.store.lock();
        let members = match self.op {
            SetOperation::Inter => store.sinter(&session.db, &self.keys),
            SetOperation::Union => store.sunion(&session.db, &self.keys),
            SetOperation::Diff => store.sdiff(&session.db, &self.keys),
        };

        Ok(Frame::bulk_array(members))
    }
}

/// SINTERSTORE, SUNIONSTORE and SDIFFSTORE: store the result of the operation over `keys` in
/// `destination`.
#[derive(Debug, PartialEq)]
pub struct SetOpStore {
    pub op: SetOperation,
    pub destination: String,
    pub keys: Vec<String>,
}

impl SetOpStore {
    pub(crate) fn parse(parser: &mut CommandParser, op: SetOperation) -> Result<Self, Error> {
        let destination = parser.next_string()?;
        let keys = parser.remaining_strings()?;

        Ok(Self {
            op,
            destination,
            keys,
        })
    }
}

impl Executable for SetOpStore {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        let mut store = node.store.lock();
        match self.op {
            SetOperation::Inter => store.sinterstore(&session.db, self.destination, &self.keys),
            SetOperation::Union => store.sunionstore(&session.db, self.destination, &self.keys),
            SetOperation::Diff => store.sdiffstore(&session.db, self.destination, &self.keys),
        }

        Ok(Frame::ok())
    }
}
