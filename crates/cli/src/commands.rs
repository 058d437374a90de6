use clap::Subcommand;
use model::{execution::connection::Driver, pagination::offset::SeedStrategy};

#[derive(Subcommand)]
pub enum Commands {
    /// Poll every session of a configuration file until interrupted
    Run {
        #[arg(long, help = "Config file path")]
        config: String,

        #[arg(long, help = "Load additional variables from this .env file")]
        env_file: Option<String>,

        #[arg(
            long,
            help = "Directory of the offset store (overrides state_dir from the config)"
        )]
        state_dir: Option<String>,
    },
    /// Poll a single table given on the command line
    Poll {
        #[arg(long, help = "Database driver: mysql or postgres")]
        driver: Driver,

        #[arg(long, help = "Connection URL")]
        url: String,

        #[arg(long, help = "User name, if not part of the URL")]
        username: Option<String>,

        #[arg(long, help = "Password, if not part of the URL")]
        password: Option<String>,

        #[arg(long, help = "Table to poll")]
        table: String,

        #[arg(long, help = "Monotonically increasing polling column")]
        column: String,

        #[arg(long, default_value_t = 5, help = "Seconds to sleep between polls")]
        interval: u64,

        #[arg(long, help = "Start after this offset instead of seeding")]
        offset: Option<String>,

        #[arg(long, default_value_t = SeedStrategy::LastRow, help = "Seed strategy: last_row or max")]
        seed: SeedStrategy,

        #[arg(long, help = "Persist offsets to this directory")]
        state_dir: Option<String>,
    },
    /// Connect to a database and print its product name
    TestConn {
        #[arg(long, help = "Database driver: mysql or postgres")]
        driver: Driver,

        #[arg(long, help = "Connection URL")]
        url: String,
    },
    /// Show stored offsets, for one session or all of them
    Offset {
        #[arg(long, help = "Session name (omit to list every session)")]
        session: Option<String>,

        #[arg(long, help = "Directory of the offset store")]
        state_dir: Option<String>,

        #[arg(
            long,
            help = "If set, prints the checkpoint as JSON instead of plain text"
        )]
        json: bool,
    },
}
