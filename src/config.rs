use clap::Parser;

use crate::sites::TimeWindow;

/// Broad engineering-role search used when a refresh gives no query.
pub const DEFAULT_QUERY: &str = "(software OR SWE OR SDE OR \"back end\" OR systems OR programmer OR coder OR \"machine learning\" OR ML OR \"data science\" OR \"data engineer\" OR \"data\" OR quantitative OR quant OR \"full stack\") (engineer OR developer OR analyst OR scientist OR researcher)";

pub const DEFAULT_WINDOW: TimeWindow = TimeWindow::PastDay;

pub const DEFAULT_MAX_RESULTS: usize = 100;

#[derive(Parser, Debug, Clone)]
#[command(name = "jobscout", about = "Job posting discovery and extraction pipeline")]
pub struct Config {
    /// Database connection URL
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Run database migrations on startup
    #[arg(long, env = "RUN_MIGRATIONS", default_value = "true")]
    pub run_migrations: bool,

    /// API token for the Replicate text-generation endpoint
    #[arg(long, env = "REPLICATE_API_TOKEN")]
    pub replicate_api_token: String,

    /// Concurrent ingest workers per platform
    #[arg(long, env = "INGEST_WORKERS", default_value = "4")]
    pub ingest_workers: usize,

    /// Timeout for outbound detail-page fetches, in seconds
    #[arg(long, env = "FETCH_TIMEOUT_SECS", default_value = "20")]
    pub fetch_timeout_secs: u64,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(clap::Subcommand, Debug, Clone)]
pub enum Command {
    /// Start the web server (default when no subcommand given)
    Serve {
        /// Listen address
        #[arg(long, env = "LISTEN_ADDR", default_value = "0.0.0.0:8080")]
        listen_addr: String,
    },
    /// Run one discovery + ingest pass and exit
    Refresh {
        /// Search keywords (defaults to the broad engineering query)
        #[arg(long)]
        query: Option<String>,

        /// Lookback window: past_twelve_hours, past_day, past_week, past_month, past_year
        #[arg(long)]
        window: Option<TimeWindow>,

        /// Maximum search results to process
        #[arg(long)]
        max: Option<usize>,
    },
}

impl Config {
    /// Resolve the command, defaulting to Serve if none specified.
    pub fn resolved_command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve {
            listen_addr: std::env::var("LISTEN_ADDR")
                .unwrap_or_else(|_| "0.0.0.0:8080".to_string()),
        })
    }
}
