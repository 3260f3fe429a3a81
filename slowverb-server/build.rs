//! Build script for slowverb-server
//!
//! Embeds build identification for the startup banner: short git hash,
//! build timestamp and cargo profile.

use std::process::Command;

fn main() {
    let git_hash = Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .and_then(|output| String::from_utf8(output.stdout).ok())
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    // RFC 3339 with local offset, e.g. 2025-10-26T14:30:45-05:00
    let build_timestamp = chrono::Local::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, false);

    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=SLOWVERB_GIT_HASH={}", git_hash);
    println!("cargo:rustc-env=SLOWVERB_BUILD_TIMESTAMP={}", build_timestamp);
    println!("cargo:rustc-env=SLOWVERB_BUILD_PROFILE={}", profile);
}
