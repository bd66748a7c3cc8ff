use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "shoal",
    about = "Shoal: replicated object store tooling",
    version,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate or check object identifiers
    Id(IdArgs),
    /// Decode a value token
    Decode(DecodeArgs),
    /// Encode a value as a token
    Encode(EncodeArgs),
    /// Show the shape signature of a JSON document
    Shape(ShapeArgs),
    /// Run a primary and secondaries in-process and replicate a transaction
    Demo(DemoArgs),
}

#[derive(Args)]
pub struct IdArgs {
    #[command(subcommand)]
    pub action: IdAction,
}

#[derive(Subcommand)]
pub enum IdAction {
    /// Generate fresh identifiers
    Generate {
        #[arg(short = 'n', long, default_value_t = 1)]
        count: usize,
    },
    /// Check whether a string is a well-formed identifier
    Validate { candidate: String },
}

#[derive(Args)]
pub struct DecodeArgs {
    /// Token such as `null`, `42`, `'text'` or `<id>`
    pub token: String,
}

#[derive(Args)]
pub struct EncodeArgs {
    /// JSON scalar: null, true, false, a non-negative integer, or a string
    #[arg(required_unless_present_any = ["reference", "undefined"])]
    pub json: Option<String>,

    /// Encode a reference to this identifier instead
    #[arg(long = "ref", conflicts_with_all = ["json", "undefined"])]
    pub reference: Option<String>,

    /// Encode the undefined value
    #[arg(long, conflicts_with = "json")]
    pub undefined: bool,
}

#[derive(Args)]
pub struct ShapeArgs {
    /// JSON object or array
    pub json: String,

    /// Also encode the document's fields positionally
    #[arg(long)]
    pub fields: bool,
}

#[derive(Args)]
pub struct DemoArgs {
    /// Store configuration file (TOML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of secondary handles
    #[arg(short, long, default_value_t = 2)]
    pub secondaries: usize,
}
