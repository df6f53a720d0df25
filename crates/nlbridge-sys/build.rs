// Emits the link search path for the native engine when the `knitro`
// feature is enabled. The library location is taken from `KNITRODIR`.

fn main() {
    println!("cargo:rerun-if-env-changed=KNITRODIR");
    if std::env::var_os("CARGO_FEATURE_KNITRO").is_none() {
        return;
    }
    if let Some(dir) = std::env::var_os("KNITRODIR") {
        let lib = std::path::Path::new(&dir).join("lib");
        println!("cargo:rustc-link-search=native={}", lib.display());
    }
}
