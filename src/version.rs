//! Version information.

/// Package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Commit the binary was built from, if the build environment set
/// `MUNINN_GIT_SHA`.
pub const GIT_SHA: Option<&str> = option_env!("MUNINN_GIT_SHA");

/// Version as reported by `/api/health` and `muninnd --version`:
/// `{version}` or `{version}+{short sha}`.
pub fn version_string() -> String {
    match GIT_SHA {
        Some(sha) if !sha.is_empty() => {
            format!("{PKG_VERSION}+{}", &sha[..7.min(sha.len())])
        }
        _ => PKG_VERSION.to_string(),
    }
}
