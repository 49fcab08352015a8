use std::path::Path;

use cfg_if::cfg_if;
use tracing::info;

/// Converts a content file path to a URL the page's HTTP server will
/// recognize.
#[cfg(target_arch = "wasm32")]
fn format_url<P>(file_name: P) -> anyhow::Result<reqwest::Url>
where
    P: AsRef<Path> + std::fmt::Debug,
{
    let origin = web_sys::window()
        .ok_or_else(|| anyhow::anyhow!("no browser window available"))?
        .location()
        .origin()
        .map_err(|e| anyhow::anyhow!("failed to read page origin: {e:?}"))?;
    let base_url = reqwest::Url::parse(&format!("{}/", origin))?;
    let file_name = file_name
        .as_ref()
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("invalid utf8 chars in {file_name:?}"))?;
    let final_url = base_url.join(file_name)?;

    info!("url for load file request: {final_url:?}");
    Ok(final_url)
}

/// Loads a content file and returns it as a string. `file_path` should be
/// relative to the content\ directory.
pub async fn load_as_string<P>(file_path: P) -> anyhow::Result<String>
where
    P: AsRef<Path> + std::fmt::Debug,
{
    info!("load file as string: {file_path:?}",);

    cfg_if! {
      if #[cfg(target_arch = "wasm32")] {
        Ok(reqwest::get(format_url(file_path)?).await?.error_for_status()?.text().await?)
      } else {
        Ok(std::fs::read_to_string(content_path(file_path))?)
      }
    }
}

/// Native builds read content from the copy `build.rs` places in `OUT_DIR`.
#[cfg(not(target_arch = "wasm32"))]
fn content_path<P: AsRef<Path>>(file_path: P) -> std::path::PathBuf {
    // TODO: Look next to the executable first so release builds can ship the
    //       content directory alongside the binary.
    Path::new(env!("OUT_DIR")).join("content").join(file_path)
}

#[cfg(all(test, not(target_arch = "wasm32")))]
mod tests {
    use super::*;

    #[test]
    fn loads_bundled_content() {
        let text = pollster::block_on(load_as_string("models/navbar_ico.obj")).unwrap();
        assert!(text.lines().any(|l| l.starts_with("v ")));
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(pollster::block_on(load_as_string("models/does_not_exist.obj")).is_err());
    }
}
