use std::env;

use anyhow::*;
use fs_extra::{copy_items, dir::CopyOptions};

fn main() -> Result<()> {
    // Tell Cargo to re-run `build.rs` if anything in `content/` changes.
    println!("cargo:rerun-if-changed=content");

    // Copy the content directory to the build output directory so native
    // builds can load models the same way the page fetches them.
    let out_dir = env::var("OUT_DIR")?;

    let copy_options = CopyOptions::new().overwrite(true);
    copy_items(&["content/"], out_dir, &copy_options)?;

    Ok(())
}
