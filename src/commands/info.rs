use bytes::Bytes;
use itertools::Itertools;

use crate::commands::executable::Executable;
use crate::commands::CommandParser;
use crate::dispatch::Session;
use crate::frame::Frame;
use crate::server::Node;
use crate::Error;

const SECONDS_PER_DAY: u64 = 60 * 60 * 24;

/// Reports the state of the node as `field:value` lines.
#[derive(Debug, PartialEq)]
pub struct Info;

impl Executable for Info {
    fn exec(self, node: &Node, _session: &mut Session) -> Result<Frame, Error> {
        let stats = node.store.lock().stats();
        let uptime = node.uptime().as_secs();
        let role = if node.config.authority {
            "master"
        } else {
            "slave"
        };

        let fields = [
            ("version", env!("CARGO_PKG_VERSION").to_string()),
            ("connected_clients", node.current_connections().to_string()),
            ("connected_slaves", node.replication.link_count().to_string()),
            ("used_memory", stats.used_memory.to_string()),
            (
                "changes_since_last_save",
                stats.changes_since_save.to_string(),
            ),
            ("last_save_time", stats.last_save.to_string()),
            (
                "total_connections_received",
                node.total_connections().to_string(),
            ),
            (
                "total_commands_processed",
                stats.total_operations.to_string(),
            ),
            ("uptime_in_seconds", uptime.to_string()),
            ("uptime_in_days", (uptime / SECONDS_PER_DAY).to_string()),
            ("bgsave_in_progress", (node.is_saving() as u8).to_string()),
            ("role", role.to_string()),
        ];

        let info = fields
            .iter()
            .map(|(field, value)| format!("{field}:{value}"))
            .join("\r\n");

        Ok(Frame::Bulk(Bytes::from(info)))
    }
}

impl TryFrom<&mut CommandParser> for Info {
    type Error = Error;

    fn try_from(_parser: &mut CommandParser) -> Result<Self, Self::Error> {
        Ok(Self)
    }
}
