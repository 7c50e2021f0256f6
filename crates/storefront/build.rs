//! Build script for the storefront crate.
//!
//! Fingerprints static assets so they can be served with immutable caching.
//! Each asset is copied to a `derived/` directory next to it as
//! `<stem>.<hash>.<ext>` and the hash is exposed to templates through a
//! compile-time environment variable.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

/// Static asset to fingerprint, relative to `static/`.
struct Asset {
    dir: &'static str,
    file: &'static str,
    env_var: &'static str,
}

const ASSETS: &[Asset] = &[
    Asset {
        dir: "css",
        file: "main.css",
        env_var: "CSS_HASH",
    },
    Asset {
        dir: "js",
        file: "cart.js",
        env_var: "JS_HASH",
    },
];

fn main() {
    let manifest_dir =
        env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR must be set by Cargo");
    let static_dir = Path::new(&manifest_dir).join("static");

    for asset in ASSETS {
        fingerprint(&static_dir, asset);
    }
}

fn fingerprint(static_dir: &Path, asset: &Asset) {
    let source: PathBuf = static_dir.join(asset.dir).join(asset.file);
    println!("cargo:rerun-if-changed={}", source.display());

    let content = match fs::read(&source) {
        Ok(content) => content,
        Err(e) => {
            println!("cargo:warning=Could not read {}: {e}", source.display());
            println!("cargo:rustc-env={}=", asset.env_var);
            return;
        }
    };

    let digest = format!("{:x}", Sha256::digest(&content));
    let short_hash = digest.get(..8).unwrap_or(&digest);
    println!("cargo:rustc-env={}={short_hash}", asset.env_var);

    let (stem, ext) = asset.file.rsplit_once('.').unwrap_or((asset.file, ""));
    let derived_dir = static_dir.join(asset.dir).join("derived");
    fs::create_dir_all(&derived_dir).expect("Failed to create derived asset directory");
    fs::copy(&source, derived_dir.join(format!("{stem}.{short_hash}.{ext}")))
        .expect("Failed to copy asset to derived directory");
}
