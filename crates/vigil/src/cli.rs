//! Clap derive structures for the `vigil` CLI.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// vigil -- operator console for monitoring gateways
#[derive(Debug, Parser)]
#[command(
    name = "vigil",
    version,
    about = "Watch live monitoring feeds and run gateway admin actions",
    long_about = "Operator console for a monitoring gateway.\n\n\
        Live feeds arrive over STOMP on a WebSocket; admin actions are sent\n\
        as correlated requests and fall back to HTTP when the realtime link\n\
        is down or silent.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Gateway profile to use
    #[arg(long, short = 'p', env = "VIGIL_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Gateway URL (overrides profile)
    #[arg(long, short = 'g', env = "VIGIL_GATEWAY", global = true)]
    pub gateway: Option<String>,

    /// Routing node behind the gateway
    #[arg(long, short = 'n', env = "VIGIL_NODE", global = true)]
    pub node: Option<String>,

    /// Bearer token
    #[arg(long, env = "VIGIL_TOKEN", global = true, hide_env_values = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(long, short = 'o', env = "VIGIL_OUTPUT", default_value = "json", global = true)]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "VIGIL_INSECURE", global = true)]
    pub insecure: bool,

    /// HTTP request timeout in seconds (overrides profile)
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Stream live feeds until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Sensors and their alert thresholds
    #[command(alias = "s")]
    Sensors(SensorsArgs),

    /// Cameras, scans, and analytics policy
    #[command(alias = "cam")]
    Cameras(CamerasArgs),

    /// AI digests
    Digest(DigestArgs),

    /// Operator incident reports
    #[command(alias = "inc")]
    Incidents(IncidentsArgs),

    /// Health of the gateway's routing nodes
    Nodes(NodesArgs),

    /// Inspect the configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  WATCH
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Feed {
    Sensors,
    Cameras,
    Incidents,
    News,
    Digests,
    Alerts,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Feeds to print (comma-separated, default: all)
    #[arg(long, short = 'f', value_delimiter = ',')]
    pub feed: Vec<Feed>,

    /// Skip the initial HTTP load of sensors, cameras and digests
    #[arg(long)]
    pub no_load: bool,

    /// Exit after this many records
    #[arg(long, short = 'c')]
    pub count: Option<usize>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SENSORS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct SensorsArgs {
    #[command(subcommand)]
    pub command: SensorsCommand,
}

#[derive(Debug, Subcommand)]
pub enum SensorsCommand {
    /// Load the profile region's sensors
    #[command(alias = "ls")]
    Load,

    /// Register a new sensor
    Register {
        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        external_id: Option<String>,

        #[arg(long)]
        region: Option<String>,

        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,

        #[arg(long, allow_hyphen_values = true)]
        lng: Option<f64>,

        /// Free-form metadata as JSON
        #[arg(long)]
        meta: Option<String>,
    },

    /// Read or change a sensor's thresholds
    Policy(SensorPolicyArgs),
}

#[derive(Debug, Args)]
pub struct SensorPolicyArgs {
    #[command(subcommand)]
    pub command: SensorPolicyCommand,
}

#[derive(Debug, Subcommand)]
pub enum SensorPolicyCommand {
    /// Show a sensor's policy
    Get {
        /// Sensor id
        id: String,
    },

    /// Replace a sensor's policy
    Set {
        /// Sensor id
        id: String,

        #[arg(long)]
        mode: Option<String>,

        #[arg(long, allow_hyphen_values = true)]
        alert_above: Option<f64>,

        #[arg(long, allow_hyphen_values = true)]
        warn_above: Option<f64>,

        #[arg(long, allow_hyphen_values = true)]
        clear_below: Option<f64>,

        #[arg(long)]
        ttl_sec: Option<i64>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CAMERAS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CamerasArgs {
    #[command(subcommand)]
    pub command: CamerasCommand,
}

#[derive(Debug, Subcommand)]
pub enum CamerasCommand {
    /// Load camera status
    #[command(alias = "ls")]
    Load,

    /// Scan every camera, or one camera immediately
    Scan {
        /// Camera id (omit to scan all)
        id: Option<String>,
    },

    /// Run detection on a camera snapshot
    Detect {
        /// Camera id
        #[arg(long)]
        id: Option<String>,

        #[arg(long)]
        external_id: Option<String>,

        #[arg(long)]
        snapshot_url: Option<String>,

        /// Do not open an incident on a hit
        #[arg(long)]
        no_incident: bool,
    },

    /// Read or change a camera's analytics policy
    Policy(CameraPolicyArgs),
}

#[derive(Debug, Args)]
pub struct CameraPolicyArgs {
    #[command(subcommand)]
    pub command: CameraPolicyCommand,
}

#[derive(Debug, Subcommand)]
pub enum CameraPolicyCommand {
    /// Show a camera's policy
    Get {
        /// Camera id
        id: String,
    },

    /// Replace a camera's policy
    Set {
        /// Camera id
        id: String,

        /// Disable analytics for this camera
        #[arg(long)]
        disabled: bool,

        #[arg(long)]
        mode: Option<String>,

        #[arg(long)]
        interval_sec: Option<i64>,

        #[arg(long)]
        ok_regex: Option<String>,

        #[arg(long)]
        hit_regex: Option<String>,

        #[arg(long)]
        incident_kind: Option<String>,

        #[arg(long)]
        incident_level: Option<String>,

        #[arg(long)]
        ttl_sec: Option<i64>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  DIGEST / INCIDENTS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct DigestArgs {
    #[command(subcommand)]
    pub command: DigestCommand,
}

#[derive(Debug, Subcommand)]
pub enum DigestCommand {
    /// Load a page of AI news
    #[command(alias = "ls")]
    Load {
        #[arg(long, default_value = "0")]
        page: u32,

        #[arg(long, short = 'l', default_value = "50")]
        size: u32,
    },

    /// Trigger digest generation
    Run,
}

#[derive(Debug, Args)]
pub struct IncidentsArgs {
    #[command(subcommand)]
    pub command: IncidentsCommand,
}

#[derive(Debug, Subcommand)]
pub enum IncidentsCommand {
    /// Report an incident
    Report {
        #[arg(long)]
        kind: Option<String>,

        #[arg(long)]
        level: Option<String>,

        #[arg(long)]
        reason: Option<String>,

        #[arg(long, allow_hyphen_values = true)]
        lat: Option<f64>,

        #[arg(long, allow_hyphen_values = true)]
        lng: Option<f64>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  NODES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct NodesArgs {
    /// Nodes to check (comma-separated, default: node-a,node-b,node-c)
    #[arg(long, value_delimiter = ',', global = true)]
    pub nodes: Vec<String>,

    #[command(subcommand)]
    pub command: NodesCommand,
}

#[derive(Debug, Subcommand)]
pub enum NodesCommand {
    /// Ping every node once and print its health
    Status,

    /// Keep polling and print the node list whenever it changes
    Watch {
        /// Poll only; do not open the nodes' event streams
        #[arg(long)]
        no_events: bool,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG / COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file location
    Path,

    /// Display the loaded configuration as TOML (tokens masked)
    Show,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
