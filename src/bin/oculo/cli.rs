use clap::{Args, Parser, Subcommand};
use oculo_rehab::{ExerciseKind, PhysiologicalProfile};

#[derive(Parser)]
#[command(
    name = "oculo",
    version,
    about = "Ocular rehabilitation exercise engine",
    long_about = "Run gaze, blink and head-stability exercises against the synthetic\n\
                  physiological simulator and report clinical-style metrics.\n\
                  Defaults can be set with OCULO_* environment variables or a .env file."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run one exercise session and print the report
    Run(RunArgs),
    /// List the synthetic physiological profiles
    Profiles(ProfilesArgs),
    /// Grade session counters with the measured clinical thresholds
    Analyze(AnalyzeArgs),
}

#[derive(Args)]
pub struct RunArgs {
    /// Exercise: follow-dot, blink-training, head-stability
    #[arg(short, long)]
    pub exercise: String,

    /// Physiological profile: healthy, low, high (default: $OCULO_PROFILE or healthy)
    #[arg(short, long)]
    pub profile: Option<String>,

    /// Session length in seconds
    #[arg(short, long)]
    pub duration: Option<u32>,

    /// Seed for the synthetic generator
    #[arg(long)]
    pub seed: Option<u64>,

    /// Run on the wall clock instead of a virtual clock
    #[arg(long, default_value_t = false)]
    pub realtime: bool,

    /// Number of back-to-back sessions; each adds one entry to the report's score history
    #[arg(long, default_value_t = 1)]
    pub repeat: u32,

    /// Patient name recorded in the report
    #[arg(long)]
    pub patient: Option<String>,

    /// Output file (default: stdout)
    #[arg(short, long)]
    pub output: Option<String>,

    /// Compact JSON output (no indentation)
    #[arg(long, default_value_t = false)]
    pub compact: bool,

    /// Suppress progress messages on stderr
    #[arg(long, default_value_t = false)]
    pub quiet: bool,
}

#[derive(Args)]
pub struct ProfilesArgs {
    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Exercise: follow-dot, blink-training, head-stability
    #[arg(short, long)]
    pub exercise: String,

    /// Elapsed session time in seconds
    #[arg(long)]
    pub elapsed: f64,

    /// Running score at the end of the session
    #[arg(long, default_value_t = 0.0)]
    pub score: f64,

    /// Blink count
    #[arg(long, default_value_t = 0)]
    pub blinks: u32,

    /// Head stability score (0-100)
    #[arg(long, default_value_t = 100.0)]
    pub stability: f64,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

pub fn parse_exercise(s: &str) -> Result<ExerciseKind, String> {
    s.parse()
}

pub fn parse_profile(s: &str) -> Result<PhysiologicalProfile, String> {
    s.parse()
}
