use clap::Parser;
use replikv::config::{listen_address, Config, ConfigFile};
use replikv::{server, Error};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(version, about)]
struct Args {
    /// Address to listen on, as host:port. Either part may be left empty
    #[arg(short, long, env = "REPLIKV_LISTEN", default_value = "127.0.0.1:6379")]
    listen: String,

    /// Bootstrap file read when no dump file exists
    #[arg(short, long, env = "REPLIKV_INIT_FILE", default_value = "MDB.TXT")]
    init_file: PathBuf,

    /// Snapshot file
    #[arg(short, long, env = "REPLIKV_DUMP_FILE", default_value = "replikv-dump.db")]
    dump_file: PathBuf,

    /// Run as the master, accepting writes from clients
    #[arg(short, long)]
    master: bool,

    /// Log every request and reply
    #[arg(long)]
    debug: bool,

    /// Configuration file holding the shared secret and the save threshold
    #[arg(short, long, env = "REPLIKV_CONFIG", default_value = ".replikv.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let args = Args::parse();

    let default_level = if args.debug { "replikv=debug" } else { "replikv=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let file = ConfigFile::load(&args.config)?;
    let config = Config {
        listen: listen_address(&args.listen),
        init_file: args.init_file,
        dump_file: args.dump_file,
        authority: args.master,
        ..Config::default()
    }
    .with_file(file);

    server::run(config).await
}
