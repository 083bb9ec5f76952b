pub mod auth;
pub mod bgsave;
pub mod dbsize;
pub mod decr;
pub mod decrby;
pub mod del;
pub mod do_;
pub mod executable;
pub mod exists;
pub mod expire;
pub mod flushall;
pub mod flushdb;
pub mod get;
pub mod getset;
pub mod incr;
pub mod incrby;
pub mod info;
pub mod keys;
pub mod lastsave;
pub mod lindex;
pub mod llen;
pub mod lrange;
pub mod lrem;
pub mod lset;
pub mod ltrim;
pub mod mget;
pub mod move_;
pub mod ping;
pub mod pop;
pub mod push;
pub mod quit;
pub mod randomkey;
pub mod re;
pub mod rename;
pub mod renamenx;
pub mod replacedb;
pub mod sadd;
pub mod save;
pub mod scard;
pub mod select;
pub mod set;
pub mod setnx;
pub mod setop;
pub mod shutdown;
pub mod sismember;
pub mod slave;
pub mod smembers;
pub mod smove;
pub mod sort;
pub mod spop;
pub mod srem;
pub mod ttl;
pub mod type_;
pub mod version;

use bytes::Bytes;
use std::{str, vec};
use thiserror::Error as ThisError;

use crate::codec::Request;
use crate::commands::executable::Executable;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::store::{End, StoreError, ValueType};
use crate::Error;

use auth::Auth;
use bgsave::BgSave;
use dbsize::DBSize;
use decr::Decr;
use decrby::DecrBy;
use del::Del;
use do_::Do;
use exists::Exists;
use expire::Expire;
use flushall::FlushAll;
use flushdb::FlushDb;
use get::Get;
use getset::GetSet;
use incr::Incr;
use incrby::IncrBy;
use info::Info;
use keys::Keys;
use lastsave::LastSave;
use lindex::LIndex;
use llen::LLen;
use lrange::LRange;
use lrem::LRem;
use lset::LSet;
use ltrim::LTrim;
use mget::Mget;
use move_::Move;
use ping::Ping;
use pop::Pop;
use push::Push;
use quit::Quit;
use randomkey::RandomKey;
use re::Re;
use rename::Rename;
use renamenx::RenameNx;
use replacedb::ReplaceDb;
use sadd::SAdd;
use save::Save;
use scard::SCard;
use select::Select;
use set::Set;
use setnx::Setnx;
use setop::{SetOp, SetOpStore, SetOperation};
use shutdown::Shutdown;
use sismember::SIsMember;
use slave::Slave;
use smembers::SMembers;
use smove::SMove;
use sort::Sort;
use spop::SPop;
use srem::SRem;
use ttl::Ttl;
use type_::Type;
use version::Version;

/// Whether a command may run on a node, and how it is replicated.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Access {
    /// Never changes the store.
    Read,
    /// Changes the store. Only the authority accepts it from clients.
    Write,
    /// Node to node commands, accepted everywhere.
    Internal,
}

/// What the first argument of a command must name in the store before the command runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArgKind {
    /// Any existing key.
    Any,
    StringOrNone,
    ListOrNone,
    List,
    SetOrNone,
    Set,
    /// The command checks its arguments itself.
    Unconstrained,
}

impl ArgKind {
    pub fn check(self, actual: ValueType) -> Result<(), StoreError> {
        let accepted = match self {
            ArgKind::Unconstrained => true,
            ArgKind::Any => {
                if actual == ValueType::None {
                    return Err(StoreError::NoSuchKey);
                }
                true
            }
            ArgKind::StringOrNone => matches!(actual, ValueType::String | ValueType::None),
            ArgKind::ListOrNone => matches!(actual, ValueType::List | ValueType::None),
            ArgKind::List => actual == ValueType::List,
            ArgKind::SetOrNone => matches!(actual, ValueType::Set | ValueType::None),
            ArgKind::Set => actual == ValueType::Set,
        };

        if accepted {
            Ok(())
        } else {
            Err(StoreError::WrongType)
        }
    }
}

/// Static description of a command, checked before it is parsed and executed.
#[derive(Debug, PartialEq)]
pub struct CommandSpec {
    pub name: &'static str,
    /// Exact number of arguments, or `-1` when the command takes a variable number.
    pub arity: i32,
    pub access: Access,
    pub arg_kind: ArgKind,
}

impl CommandSpec {
    /// Commands a replica runs when they arrive inside a DO envelope.
    pub fn is_replayable(&self) -> bool {
        self.access == Access::Write
            || matches!(self.name, "save" | "bgsave" | "shutdown" | "select")
    }
}

const fn spec(name: &'static str, arity: i32, access: Access, arg_kind: ArgKind) -> CommandSpec {
    CommandSpec {
        name,
        arity,
        access,
        arg_kind,
    }
}

use Access::{Internal, Read, Write};
use ArgKind::Unconstrained as Free;

static COMMANDS: &[CommandSpec] = &[
    // Strings
    spec("get", 1, Read, ArgKind::StringOrNone),
    spec("set", -1, Write, Free),
    spec("setnx", 2, Write, ArgKind::StringOrNone),
    spec("getset", 2, Write, ArgKind::StringOrNone),
    spec("mget", -1, Read, Free),
    spec("incr", 1, Write, ArgKind::StringOrNone),
    spec("incrby", 2, Write, ArgKind::StringOrNone),
    spec("decr", 1, Write, ArgKind::StringOrNone),
    spec("decrby", 2, Write, ArgKind::StringOrNone),
    // Keys
    spec("del", -1, Write, Free),
    spec("ldel", 1, Write, ArgKind::ListOrNone),
    spec("exists", 1, Read, Free),
    spec("keys", 1, Read, Free),
    spec("re", 1, Read, Free),
    spec("rename", 2, Write, Free),
    spec("renamenx", 2, Write, Free),
    spec("move", 2, Write, Free),
    spec("type", 1, Read, Free),
    spec("expire", 2, Write, ArgKind::Any),
    spec("ttl", 1, Read, Free),
    spec("randomkey", 0, Read, Free),
    spec("sort", -1, Read, ArgKind::Any),
    // Lists
    spec("lpush", 2, Write, ArgKind::ListOrNone),
    spec("rpush", 2, Write, ArgKind::ListOrNone),
    spec("llen", 1, Read, ArgKind::List),
    spec("lrange", 3, Read, ArgKind::ListOrNone),
    spec("ltrim", 3, Write, ArgKind::List),
    spec("lindex", 2, Read, ArgKind::List),
    spec("lset", 3, Write, ArgKind::List),
    spec("lrem", 3, Write, ArgKind::List),
    spec("lpop", 1, Write, ArgKind::ListOrNone),
    spec("rpop", 1, Write, ArgKind::ListOrNone),
    // Sets
    spec("sadd", 2, Write, ArgKind::SetOrNone),
    spec("scard", 1, Read, ArgKind::SetOrNone),
    spec("sismember", 2, Read, ArgKind::SetOrNone),
    spec("smembers", 1, Read, ArgKind::SetOrNone),
    spec("srem", 2, Write, ArgKind::Set),
    spec("sinter", -1, Read, Free),
    spec("sinterstore", -1, Write, Free),
    spec("sunion", -1, Read, Free),
    spec("sunionstore", -1, Write, Free),
    spec("sdiff", -1, Read, Free),
    spec("sdiffstore", -1, Write, Free),
    spec("spop", 1, Write, ArgKind::SetOrNone),
    spec("smove", 3, Write, Free),
    // Server
    spec("select", 1, Read, Free),
    spec("ping", 0, Read, Free),
    spec("auth", 1, Read, Free),
    spec("info", 0, Read, Free),
    spec("save", 0, Read, Free),
    spec("bgsave", 0, Read, Free),
    spec("lastsave", 0, Read, Free),
    spec("dbsize", 0, Read, Free),
    spec("flushdb", 0, Write, Free),
    spec("flushall", 0, Write, Free),
    spec("shutdown", 0, Read, Free),
    spec("quit", 0, Read, Free),
    spec("version", 0, Read, Free),
    // Replication
    spec("slave", 1, Internal, Free),
    spec("subordinate", 1, Internal, Free),
    spec("do", -1, Internal, Free),
    spec("replacedb", 2, Internal, Free),
];

/// Finds the descriptor of the command called `name` (already case folded).
pub fn lookup(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS.iter().find(|spec| spec.name == name)
}

#[derive(Debug, PartialEq)]
pub enum Command {
    // Strings
    Decr(Decr),
    DecrBy(DecrBy),
    Get(Get),
    GetSet(GetSet),
    Incr(Incr),
    IncrBy(IncrBy),
    Mget(Mget),
    Set(Set),
    Setnx(Setnx),

    // Keys
    Del(Del),
    Exists(Exists),
    Expire(Expire),
    Keys(Keys),
    Move(Move),
    RandomKey(RandomKey),
    Re(Re),
    Rename(Rename),
    RenameNx(RenameNx),
    Sort(Sort),
    Ttl(Ttl),
    Type(Type),

    // Lists
    LIndex(LIndex),
    LLen(LLen),
    LRange(LRange),
    LRem(LRem),
    LSet(LSet),
    LTrim(LTrim),
    Pop(Pop),
    Push(Push),

    // Sets
    SAdd(SAdd),
    SCard(SCard),
    SIsMember(SIsMember),
    SMembers(SMembers),
    SMove(SMove),
    SPop(SPop),
    SRem(SRem),
    SetOp(SetOp),
    SetOpStore(SetOpStore),

    // Server
    Auth(Auth),
    BgSave(BgSave),
    DBSize(DBSize),
    FlushAll(FlushAll),
    FlushDb(FlushDb),
    Info(Info),
    LastSave(LastSave),
    Ping(Ping),
    Quit(Quit),
    Save(Save),
    Select(Select),
    Shutdown(Shutdown),
    Version(Version),

    // Replication
    Do(Do),
    ReplaceDb(ReplaceDb),
    Slave(Slave),
}

impl Executable for Command {
    fn exec(self, node: &Node, session: &mut Session) -> Result<Frame, Error> {
        match self {
            Command::Decr(cmd) => cmd.exec(node, session),
            Command::DecrBy(cmd) => cmd.exec(node, session),
            Command::Get(cmd) => cmd.exec(node, session),
            Command::GetSet(cmd) => cmd.exec(node, session),
            Command::Incr(cmd) => cmd.exec(node, session),
            Command::IncrBy(cmd) => cmd.exec(node, session),
            Command::Mget(cmd) => cmd.exec(node, session),
            Command::Set(cmd) => cmd.exec(node, session),
            Command::Setnx(cmd) => cmd.exec(node, session),
            Command::Del(cmd) => cmd.exec(node, session),
            Command::Exists(cmd) => cmd.exec(node, session),
            Command::Expire(cmd) => cmd.exec(node, session),
            Command::Keys(cmd) => cmd.exec(node, session),
            Command::Move(cmd) => cmd.exec(node, session),
            Command::RandomKey(cmd) => cmd.exec(node, session),
            Command::Re(cmd) => cmd.exec(node, session),
            Command::Rename(cmd) => cmd.exec(node, session),
            Command::RenameNx(cmd) => cmd.exec(node, session),
            Command::Sort(cmd) => cmd.exec(node, session),
            Command::Ttl(cmd) => cmd.exec(node, session),
            Command::Type(cmd) => cmd.exec(node, session),
            Command::LIndex(cmd) => cmd.exec(node, session),
            Command::LLen(cmd) => cmd.exec(node, session),
            Command::LRange(cmd) => cmd.exec(node, session),
            Command::LRem(cmd) => cmd.exec(node, session),
            Command::LSet(cmd) => cmd.exec(node, session),
            Command::LTrim(cmd) => cmd.exec(node, session),
            Command::Pop(cmd) => cmd.exec(node, session),
            Command::Push(cmd) => cmd.exec(node, session),
            Command::SAdd(cmd) => cmd.exec(node, session),
            Command::SCard(cmd) => cmd.exec(node, session),
            Command::SIsMember(cmd) => cmd.exec(node, session),
            Command::SMembers(cmd) => cmd.exec(node, session),
            Command::SMove(cmd) => cmd.exec(node, session),
            Command::SPop(cmd) => cmd.exec(node, session),
            Command::SRem(cmd) => cmd.exec(node, session),
            Command::SetOp(cmd) => cmd.exec(node, session),
            Command::SetOpStore(cmd) => cmd.exec(node, session),
            Command::Auth(cmd) => cmd.exec(node, session),
            Command::BgSave(cmd) => cmd.exec(node, session),
            Command::DBSize(cmd) => cmd.exec(node, session),
            Command::FlushAll(cmd) => cmd.exec(node, session),
            Command::FlushDb(cmd) => cmd.exec(node, session),
            Command::Info(cmd) => cmd.exec(node, session),
            Command::LastSave(cmd) => cmd.exec(node, session),
            Command::Ping(cmd) => cmd.exec(node, session),
            Command::Quit(cmd) => cmd.exec(node, session),
            Command::Save(cmd) => cmd.exec(node, session),
            Command::Select(cmd) => cmd.exec(node, session),
            Command::Shutdown(cmd) => cmd.exec(node, session),
            Command::Version(cmd) => cmd.exec(node, session),
            Command::Do(cmd) => cmd.exec(node, session),
            Command::ReplaceDb(cmd) => cmd.exec(node, session),
            // Attaching a replica waits on the network, the dispatcher awaits it directly.
            Command::Slave(cmd) => Err(CommandParserError::InvalidCommandArgument {
                command: "slave".to_string(),
                argument: cmd.address(),
            }
            .into()),
        }
    }
}

impl TryFrom<Request> for Command {
    type Error = Error;

    fn try_from(request: Request) -> Result<Self, Self::Error> {
        let parser = &mut CommandParser::new(request);

        match &parser.command[..] {
            "decr" => Decr::try_from(parser).map(Command::Decr),
            "decrby" => DecrBy::try_from(parser).map(Command::DecrBy),
            "get" => Get::try_from(parser).map(Command::Get),
            "getset" => GetSet::try_from(parser).map(Command::GetSet),
            "incr" => Incr::try_from(parser).map(Command::Incr),
            "incrby" => IncrBy::try_from(parser).map(Command::IncrBy),
            "mget" => Mget::try_from(parser).map(Command::Mget),
            "set" => Set::try_from(parser).map(Command::Set),
            "setnx" => Setnx::try_from(parser).map(Command::Setnx),
            "del" | "ldel" => Del::try_from(parser).map(Command::Del),
            "exists" => Exists::try_from(parser).map(Command::Exists),
            "expire" => Expire::try_from(parser).map(Command::Expire),
            "keys" => Keys::try_from(parser).map(Command::Keys),
            "move" => Move::try_from(parser).map(Command::Move),
            "randomkey" => RandomKey::try_from(parser).map(Command::RandomKey),
            "re" => Re::try_from(parser).map(Command::Re),
            "rename" => Rename::try_from(parser).map(Command::Rename),
            "renamenx" => RenameNx::try_from(parser).map(Command::RenameNx),
            "sort" => Sort::try_from(parser).map(Command::Sort),
            "ttl" => Ttl::try_from(parser).map(Command::Ttl),
            "type" => Type::try_from(parser).map(Command::Type),
            "lindex" => LIndex::try_from(parser).map(Command::LIndex),
            "llen" => LLen::try_from(parser).map(Command::LLen),
            "lrange" => LRange::try_from(parser).map(Command::LRange),
            "lrem" => LRem::try_from(parser).map(Command::LRem),
            "lset" => LSet::try_from(parser).map(Command::LSet),
            "ltrim" => LTrim::try_from(parser).map(Command::LTrim),
            "lpop" => Pop::parse(parser, End::Head).map(Command::Pop),
            "rpop" => Pop::parse(parser, End::Tail).map(Command::Pop),
            "lpush" => Push::parse(parser, End::Head).map(Command::Push),
            "rpush" => Push::parse(parser, End::Tail).map(Command::Push),
            "sadd" => SAdd::try_from(parser).map(Command::SAdd),
            "scard" => SCard::try_from(parser).map(Command::SCard),
            "sismember" => SIsMember::try_from(parser).map(Command::SIsMember),
            "smembers" => SMembers::try_from(parser).map(Command::SMembers),
            "smove" => SMove::try_from(parser).map(Command::SMove),
            "spop" => SPop::try_from(parser).map(Command::SPop),
            "srem" => SRem::try_from(parser).map(Command::SRem),
            "sinter" => SetOp::parse(parser, SetOperation::Inter).map(Command::SetOp),
            "sunion" => SetOp::parse(parser, SetOperation::Union).map(Command::SetOp),
            "sdiff" => SetOp::parse(parser, SetOperation::Diff).map(Command::SetOp),
            "sinterstore" => {
                SetOpStore::parse(parser, SetOperation::Inter).map(Command::SetOpStore)
            }
            "sunionstore" => {
                SetOpStore::parse(parser, SetOperation::Union).map(Command::SetOpStore)
            }
            "sdiffstore" => SetOpStore::parse(parser, SetOperation::Diff).map(Command::SetOpStore),
            "auth" => Auth::try_from(parser).map(Command::Auth),
            "bgsave" => BgSave::try_from(parser).map(Command::BgSave),
            "dbsize" => DBSize::try_from(parser).map(Command::DBSize),
            "flushall" => FlushAll::try_from(parser).map(Command::FlushAll),
            "flushdb" => FlushDb::try_from(parser).map(Command::FlushDb),
            "info" => Info::try_from(parser).map(Command::Info),
            "lastsave" => LastSave::try_from(parser).map(Command::LastSave),
            "ping" => Ping::try_from(parser).map(Command::Ping),
            "quit" => Quit::try_from(parser).map(Command::Quit),
            "save" => Save::try_from(parser).map(Command::Save),
            "select" => Select::try_from(parser).map(Command::Select),
            "shutdown" => Shutdown::try_from(parser).map(Command::Shutdown),
            "version" => Version::try_from(parser).map(Command::Version),
            "do" => Do::try_from(parser).map(Command::Do),
            "replacedb" => ReplaceDb::try_from(parser).map(Command::ReplaceDb),
            "slave" | "subordinate" => Slave::try_from(parser).map(Command::Slave),
            _ => Err(CommandParserError::UnknownCommand {
                command: parser.command.clone(),
            }
            .into()),
        }
    }
}

/// Walks the arguments of a request.
pub struct CommandParser {
    command: String,
    parts: vec::IntoIter<Bytes>,
}

impl CommandParser {
    fn new(request: Request) -> CommandParser {
        CommandParser {
            command: request.name,
            parts: request.args.into_iter(),
        }
    }

    fn next_string(&mut self) -> Result<String, CommandParserError> {
        let bytes = self.next_bytes()?;
        str::from_utf8(&bytes[..])
            .map(|s| s.to_string())
            .map_err(CommandParserError::InvalidUTF8String)
    }

    fn next_integer(&mut self) -> Result<i64, CommandParserError> {
        let string = self.next_string()?;
        string
            .parse::<i64>()
            .map_err(|_| CommandParserError::InvalidInteger(string))
    }

    fn next_bytes(&mut self) -> Result<Bytes, CommandParserError> {
        self.parts.next().ok_or(CommandParserError::EndOfStream)
    }

    /// Collects the remaining arguments as strings. At least one must be left.
    fn remaining_strings(&mut self) -> Result<Vec<String>, CommandParserError> {
        let mut strings = vec![self.next_string()?];
        loop {
            match self.next_string() {
                Ok(string) => strings.push(string),
                Err(CommandParserError::EndOfStream) => return Ok(strings),
                Err(err) => return Err(err),
            }
        }
    }
}

#[derive(Debug, ThisError, PartialEq)]
pub enum CommandParserError {
    #[error("'{command}' is an unknown command")]
    UnknownCommand { command: String },
    #[error("poorly formed command {command} - missing arguments. Expected {expected} got {actual}")]
    WrongArity {
        command: String,
        expected: i32,
        actual: usize,
    },
    #[error("invalid argument '{argument}' for {command}")]
    InvalidCommandArgument { command: String, argument: String },
    #[error("'{0}' is not an integer value")]
    InvalidInteger(String),
    #[error("expiration time '{0}' is not an integer")]
    InvalidExpiration(String),
    #[error("invalid UTF-8 string")]
    InvalidUTF8String(#[from] str::Utf8Error),
    #[error("poorly formed command - missing arguments")]
    EndOfStream,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_get_command() {
        let request = Request::new("GET", vec![Bytes::from("foo")]);

        let get_command = Command::try_from(request).unwrap();

        assert_eq!(
            get_command,
            Command::Get(Get {
                key: String::from("foo")
            })
        );
    }

    #[test]
    fn parse_set_command_with_payload() {
        let request = Request::new("SET", vec![Bytes::from("foo"), Bytes::from("a b\r\nc")]);

        let set_command = Command::try_from(request).unwrap();

        assert_eq!(
            set_command,
            Command::Set(Set {
                key: String::from("foo"),
                value: Bytes::from("a b\r\nc")
            })
        );
    }

    #[test]
    fn aliases() {
        let ldel = Command::try_from(Request::new("LDEL", vec![Bytes::from("l")])).unwrap();
        assert_eq!(
            ldel,
            Command::Del(Del {
                keys: vec!["l".to_string()]
            })
        );

        let subordinate =
            Command::try_from(Request::new("subordinate", vec![Bytes::from("h:1")])).unwrap();
        assert!(matches!(subordinate, Command::Slave(_)));
    }

    #[test]
    fn unknown_command() {
        let err = Command::try_from(Request::new("NOPE", vec![])).unwrap_err();
        let err = err.downcast_ref::<CommandParserError>().unwrap();

        assert_eq!(
            *err,
            CommandParserError::UnknownCommand {
                command: "nope".to_string()
            }
        );
        assert_eq!(err.to_string(), "'nope' is an unknown command");
    }

    #[test]
    fn invalid_utf8() {
        let request = Request::new("GET", vec![Bytes::from_static(&[0xff, 0xfe])]);
        let err = Command::try_from(request).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<CommandParserError>(),
            Some(CommandParserError::InvalidUTF8String(_))
        ));
    }

    #[test]
    fn every_command_has_a_descriptor() {
        let names = [
            "get", "set", "setnx", "getset", "mget", "incr", "incrby", "decr", "decrby", "del",
            "ldel", "exists", "keys", "re", "rename", "renamenx", "move", "type", "expire", "ttl",
            "randomkey", "sort", "lpush", "rpush", "llen", "lrange", "ltrim", "lindex", "lset",
            "lrem", "lpop", "rpop", "sadd", "scard", "sismember", "smembers", "srem", "sinter",
            "sinterstore", "sunion", "sunionstore", "sdiff", "sdiffstore", "spop", "smove",
            "select", "ping", "auth", "info", "save", "bgsave", "lastsave", "dbsize", "flushdb",
            "flushall", "shutdown", "quit", "version", "slave", "subordinate", "do", "replacedb",
        ];

        for name in names {
            assert!(lookup(name).is_some(), "{name} has no descriptor");
        }
        assert_eq!(names.len(), COMMANDS.len());
        assert!(lookup("getdel").is_none());
    }

    #[test]
    fn replayable_commands() {
        let replayable = |name| lookup(name).unwrap().is_replayable();

        assert!(replayable("set"));
        assert!(replayable("flushall"));
        assert!(replayable("select"));
        assert!(replayable("save"));
        assert!(!replayable("get"));
        assert!(!replayable("quit"));
        assert!(!replayable("do"));
        assert!(!replayable("slave"));
    }

    #[test]
    fn arg_kind_check() {
        assert_eq!(ArgKind::Any.check(ValueType::None), Err(StoreError::NoSuchKey));
        assert_eq!(ArgKind::Any.check(ValueType::Set), Ok(()));
        assert_eq!(ArgKind::StringOrNone.check(ValueType::None), Ok(()));
        assert_eq!(
            ArgKind::StringOrNone.check(ValueType::List),
            Err(StoreError::WrongType)
        );
        assert_eq!(ArgKind::List.check(ValueType::None), Err(StoreError::WrongType));
        assert_eq!(ArgKind::Set.check(ValueType::Set), Ok(()));
        assert_eq!(ArgKind::Unconstrained.check(ValueType::String), Ok(()));
    }
}
