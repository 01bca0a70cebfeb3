//! Stamps the binary with the commit and time it was built from.
//!
//! `GIT_HASH`, `BUILD_TIMESTAMP` and `BUILD_PROFILE` are read back with
//! `env!` in the startup banner and the health document.

use std::process::Command;

fn git_short_hash() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let hash = String::from_utf8(output.stdout).ok()?;
    Some(hash.trim().to_string())
}

fn main() {
    let stamps = [
        ("GIT_HASH", git_short_hash().unwrap_or_else(|| "unknown".into())),
        (
            "BUILD_TIMESTAMP",
            chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        ),
        (
            "BUILD_PROFILE",
            std::env::var("PROFILE").unwrap_or_else(|_| "unknown".into()),
        ),
    ];

    for (name, value) in stamps {
        println!("cargo:rustc-env={}={}", name, value);
    }

    // a new commit changes the hash
    println!("cargo:rerun-if-changed=../.git/HEAD");
    println!("cargo:rerun-if-changed=build.rs");
}
