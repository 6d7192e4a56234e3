//! Environment overrides: `THINKBLOCKS__PIPELINE__MAX_CONCURRENCY=8` sets
//! `pipeline.max_concurrency`.

use config::builder::DefaultState;
use config::{ConfigBuilder, Environment};

pub const PREFIX: &str = "THINKBLOCKS";
pub const SEPARATOR: &str = "__";

pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix(PREFIX)
            .prefix_separator(SEPARATOR)
            .separator(SEPARATOR)
            .try_parsing(true),
    )
}
