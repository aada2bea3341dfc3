/// Compile-time build metadata produced by `build.rs`.
#[derive(Debug, Clone, Copy)]
pub struct BuildMetadata {
    pub version: &'static str,
    pub git_hash: &'static str,
    pub timestamp: &'static str,
    pub profile: &'static str,
}

/// CLI semantic version derived from the crate metadata.
pub const CLI_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Returns the statically-embedded build metadata.
pub fn current() -> BuildMetadata {
    BuildMetadata {
        version: CLI_VERSION,
        git_hash: option_env!("TALLY_BUILD_HASH").unwrap_or("unknown"),
        timestamp: option_env!("TALLY_BUILD_TIMESTAMP").unwrap_or("unknown"),
        profile: option_env!("TALLY_BUILD_PROFILE").unwrap_or("unknown"),
    }
}
