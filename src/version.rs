pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build information printed by `hulk-admin --version`.
pub fn version_info() -> String {
    let unknown = "Unknown";
    format!(
        "{}\
         \nGit Commit Hash:   {}\
         \nRust Version:      {}\
         \nProfile:           {}",
        VERSION,
        option_env!("HULK_BUILD_GIT_HASH").unwrap_or(unknown),
        option_env!("HULK_BUILD_RUSTC_VERSION").unwrap_or(unknown),
        if cfg!(debug_assertions) { "debug" } else { "release" },
    )
}
