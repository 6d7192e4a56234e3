//! CLI domain: parse, route, output, and presentation only.
//! No domain orchestration; single route table dispatches to the planner API.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::{exit_code, map_error, EXIT_CLIENT_ERROR, EXIT_FAILURE};
pub use parse::{Cli, Commands, ConfigCommands, OutputFormat};
pub use presentation::{
    format_config_summary, format_lesson_list, format_lesson_plan, format_skills,
};
pub use route::RunContext;
