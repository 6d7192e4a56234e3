//! CLI parse: clap types for thinkblocks. No behavior; definitions only.

use crate::lesson::{BlockType, TimeFlexibility};
use crate::skills::SkillColor;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// thinkblocks - thinking-skill lesson planner
#[derive(Parser, Debug)]
#[command(name = "thinkblocks")]
#[command(about = "Generate skill-progressive lesson plans from curriculum context")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Workspace root directory
    #[arg(long, default_value = ".")]
    pub workspace: PathBuf,

    /// Configuration file path (overrides layered config loading)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Enable logging (default: off)
    #[arg(long, default_value = "false")]
    pub verbose: bool,

    /// Log level (trace, debug, info, warn, error, off)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Log format (json, text)
    #[arg(long)]
    pub log_format: Option<String>,

    /// Log output (stdout, stderr, file)
    #[arg(long)]
    pub log_output: Option<String>,

    /// Log file path (when output is "file")
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate a lesson plan
    Generate {
        /// Grade or year level, e.g. "Year 4"
        #[arg(long)]
        grade: String,
        /// Curriculum name, e.g. "Australian Curriculum"
        #[arg(long)]
        curriculum: String,
        #[arg(long)]
        subject: String,
        #[arg(long)]
        topic: String,
        /// 0.0 (foundational) to 1.0 (mastery)
        #[arg(long, default_value_t = 0.5)]
        difficulty: f64,
        /// Number of blocks (1-10)
        #[arg(long, default_value_t = 3)]
        steps: usize,
        /// Block type per step, comma separated (MapIt, SayIt, BuildIt)
        #[arg(long, value_delimiter = ',')]
        prefer: Vec<BlockType>,
        /// Available lesson time in minutes (10-120)
        #[arg(long)]
        minutes: Option<u32>,
        /// How strictly the available time applies
        #[arg(long, value_enum, default_value = "moderate")]
        time_flexibility: TimeFlexibility,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
        /// Do not store the generated plan
        #[arg(long)]
        no_save: bool,
    },
    /// Show a stored lesson plan
    Show {
        lesson_id: String,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// List stored lesson plans
    List {
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// List thinking skills
    Skills {
        /// Only skills of this color
        #[arg(long)]
        color: Option<SkillColor>,
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },
    /// Configuration commands
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Load and validate configuration, then summarize it
    Validate,
}

impl Commands {
    /// Stable name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Commands::Generate { .. } => "generate",
            Commands::Show { .. } => "show",
            Commands::List { .. } => "list",
            Commands::Skills { .. } => "skills",
            Commands::Config { .. } => "config validate",
        }
    }
}
