//! Build script for slidev_runner: decides whether the saved image archive is
//! embedded in the binary.
//!
//! Priority:
//!   1. SLIDEV_IMAGE_ARCHIVE env var (explicit path to a .tar.zst)
//!   2. <workspace>/image/slidev.tar.zst (written by `slidev-dkr compress-docker`)
//!   3. An empty placeholder in OUT_DIR, meaning "no embedded image"

use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-env-changed=SLIDEV_IMAGE_ARCHIVE");

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let default_archive = manifest_dir.join("../../image/slidev.tar.zst");
    println!("cargo:rerun-if-changed={}", default_archive.display());

    let archive = env::var("SLIDEV_IMAGE_ARCHIVE")
        .ok()
        .filter(|s| !s.is_empty())
        .map(PathBuf::from)
        .or_else(|| default_archive.is_file().then_some(default_archive));

    let path = match archive {
        Some(path) => {
            println!("cargo:warning=Embedding container image archive {}", path.display());
            path
        }
        None => {
            let out_dir = PathBuf::from(env::var("OUT_DIR").unwrap());
            let placeholder = out_dir.join("slidev.tar.zst.empty");
            fs::write(&placeholder, b"").expect("failed to write empty archive placeholder");
            placeholder
        }
    };

    let path = path
        .canonicalize()
        .expect("image archive path must be resolvable");
    println!("cargo:rustc-env=SLIDEV_IMAGE_ARCHIVE={}", path.display());
}
