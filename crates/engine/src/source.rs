use std::io::Read;
use std::path::Path;
use std::time::Duration;

use anyhow::Context as _;
use studyshelf_core::SourceLocator;

const CHUNK_SIZE: usize = 64 * 1024;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Loads the full byte content of a document, reporting progress in `0.0..=1.0`.
///
/// Progress is only reported while the total length is known; `1.0` is
/// always reported once the read completes.
pub fn fetch(source: &SourceLocator, progress: impl FnMut(f32)) -> anyhow::Result<Vec<u8>> {
    match source {
        SourceLocator::Local(path) => fetch_local(path, progress),
        SourceLocator::Remote(url) => fetch_remote(url, progress),
    }
}

pub fn fetch_local(path: &Path, progress: impl FnMut(f32)) -> anyhow::Result<Vec<u8>> {
    let file =
        std::fs::File::open(path).with_context(|| format!("open {}", path.display()))?;
    let total = file.metadata().ok().map(|meta| meta.len());
    read_with_progress(file, total, progress).with_context(|| format!("read {}", path.display()))
}

pub fn fetch_remote(url: &str, progress: impl FnMut(f32)) -> anyhow::Result<Vec<u8>> {
    let client = reqwest::blocking::Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .context("build http client")?;
    let response = client
        .get(url)
        .send()
        .with_context(|| format!("fetch {url}"))?;
    if !response.status().is_success() {
        anyhow::bail!("HTTP error {} fetching {url}", response.status());
    }
    let total = response.content_length();
    read_with_progress(response, total, progress).with_context(|| format!("read body of {url}"))
}

fn read_with_progress(
    mut reader: impl Read,
    total: Option<u64>,
    mut progress: impl FnMut(f32),
) -> anyhow::Result<Vec<u8>> {
    let capacity = total
        .and_then(|len| usize::try_from(len).ok())
        .unwrap_or(0);
    let mut bytes = Vec::with_capacity(capacity);
    let mut chunk = vec![0u8; CHUNK_SIZE];
    loop {
        let read = match reader.read(&mut chunk) {
            Ok(0) => break,
            Ok(read) => read,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        bytes.extend_from_slice(&chunk[..read]);
        if let Some(total) = total.filter(|total| *total > 0) {
            progress((bytes.len() as f64 / total as f64).min(1.0) as f32);
        }
    }
    progress(1.0);
    Ok(bytes)
}
