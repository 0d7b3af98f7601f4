use std::process::Command;

/// Stamps the binary with `ELEFANT_BUILD` (`<crate version>+<git hash>`),
/// reported in the startup log line.
fn main() {
    let hash = Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string());

    let build = match hash {
        Some(hash) => {
            let dirty = Command::new("git")
                .args(["diff", "--quiet"])
                .output()
                .map(|o| !o.status.success())
                .unwrap_or(false);
            if dirty {
                format!("{}+{}-dirty", env!("CARGO_PKG_VERSION"), hash)
            } else {
                format!("{}+{}", env!("CARGO_PKG_VERSION"), hash)
            }
        }
        None => format!("{}+unknown", env!("CARGO_PKG_VERSION")),
    };

    println!("cargo:rustc-env=ELEFANT_BUILD={}", build);
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/heads");
}
