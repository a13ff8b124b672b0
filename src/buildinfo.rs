//! Build banner printed by both binaries at startup.

/// Logs version, date and commit, with `N/A` placeholders when the build
/// was not stamped (`BUILD_VERSION` / `BUILD_DATE` / `BUILD_COMMIT`).
pub fn log_build_info() {
    let version = option_env!("BUILD_VERSION").unwrap_or("N/A");
    let date = option_env!("BUILD_DATE").unwrap_or("N/A");
    let commit = option_env!("BUILD_COMMIT").unwrap_or("N/A");

    tracing::info!("Build version: {version}");
    tracing::info!("Build date: {date}");
    tracing::info!("Build commit: {commit}");
}
