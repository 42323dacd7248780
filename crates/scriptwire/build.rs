//! Records where and how the CLI was built for `scriptwire version --extended`.

fn main() {
    let target = std::env::var("TARGET").unwrap_or_else(|_| "unknown".to_string());
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());
    println!("cargo:rustc-env=SCRIPTWIRE_BUILD_TARGET={target}");
    println!("cargo:rustc-env=SCRIPTWIRE_BUILD_PROFILE={profile}");
    println!("cargo:rerun-if-env-changed=TARGET");
    println!("cargo:rerun-if-env-changed=PROFILE");
}
