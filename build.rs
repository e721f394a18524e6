// Embeds the short git hash so `asciivid --version` can report the exact build.
// Builds outside a git checkout simply omit it.
fn main() {
    println!("cargo:rerun-if-changed=.git/HEAD");

    let Ok(output) = std::process::Command::new("git")
        .args(["rev-parse", "--short", "HEAD"])
        .output()
    else {
        return;
    };
    if !output.status.success() {
        return;
    }
    if let Ok(hash) = String::from_utf8(output.stdout) {
        println!("cargo:rustc-env=ASCIIVID_GIT_HASH={}", hash.trim());
    }
}
