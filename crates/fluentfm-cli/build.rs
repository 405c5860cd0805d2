//! Embeds the git revision in the `--version` string.

use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=../../.git/HEAD");
    println!("cargo:rerun-if-changed=../../.git/refs/");

    let package = env!("CARGO_PKG_VERSION");
    let version = match git_revision() {
        Some(rev) if rev != package => format!("{} ({})", package, rev),
        _ => package.to_string(),
    };

    println!("cargo:rustc-env=FLUENTFM_VERSION={}", version);
}

fn git_revision() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--tags", "--always", "--dirty"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }

    let rev = String::from_utf8(output.stdout).ok()?;
    let rev = rev.trim();
    if rev.is_empty() {
        return None;
    }
    Some(rev.trim_start_matches('v').to_string())
}
