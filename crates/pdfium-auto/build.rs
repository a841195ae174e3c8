// build.rs for pdfium-auto
//
// With the `bundled` feature on, copy the library named by PDFIUM_BUNDLE_LIB
// into OUT_DIR and generate `bundled.rs`, which embeds it via
// `include_bytes!`. Without the feature this script does nothing.

use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-env-changed=PDFIUM_BUNDLE_LIB");
    println!("cargo:rerun-if-env-changed=CARGO_FEATURE_BUNDLED");

    if std::env::var_os("CARGO_FEATURE_BUNDLED").is_none() {
        return;
    }

    let source = match std::env::var("PDFIUM_BUNDLE_LIB") {
        Ok(p) if !p.is_empty() => PathBuf::from(p),
        _ => panic!(
            "\npdfium-auto: the `bundled` feature needs PDFIUM_BUNDLE_LIB set to the \
             platform library (libpdfium.so, libpdfium.dylib or pdfium.dll).\n\
             Prebuilt libraries: https://github.com/bblanchon/pdfium-binaries/releases\n"
        ),
    };
    if !source.is_file() {
        panic!(
            "pdfium-auto: PDFIUM_BUNDLE_LIB is not a file: {}",
            source.display()
        );
    }
    println!("cargo:rerun-if-changed={}", source.display());

    let out_dir = PathBuf::from(std::env::var("OUT_DIR").expect("OUT_DIR is set by cargo"));
    let embedded = out_dir.join("bundled_pdfium_lib");
    if let Err(e) = std::fs::copy(&source, &embedded) {
        panic!(
            "pdfium-auto: copying {} to {} failed: {}",
            source.display(),
            embedded.display(),
            e
        );
    }

    let generated = out_dir.join("bundled.rs");
    let code = "pub static PDFIUM_BYTES: &[u8] = \
                include_bytes!(concat!(env!(\"OUT_DIR\"), \"/bundled_pdfium_lib\"));\n";
    if let Err(e) = std::fs::write(&generated, code) {
        panic!("pdfium-auto: writing {} failed: {}", generated.display(), e);
    }
}
