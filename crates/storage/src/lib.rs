//! File-backed configuration: catalogs, settings and downloads.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use studyshelf_core::{Catalog, CategoryInfo, Document, Settings};

const BUILTIN_CATALOG: &str = include_str!("../data/catalog.json");
const SETTINGS_FILE: &str = "settings.json";
const FALLBACK_FILENAME: &str = "document.pdf";

#[derive(Debug, Serialize, Deserialize)]
struct CatalogFile {
    documents: Vec<Document>,
    #[serde(default)]
    categories: BTreeMap<String, CategoryInfo>,
}

/// A validated catalog plus the directory its relative paths resolve against.
#[derive(Debug, Clone)]
pub struct LoadedCatalog {
    pub catalog: Catalog,
    pub base_dir: PathBuf,
}

pub fn parse_catalog(json: &str) -> anyhow::Result<Catalog> {
    let file: CatalogFile = serde_json::from_str(json).context("parse catalog json")?;
    let catalog = Catalog::new(file.documents, file.categories).context("invalid catalog")?;
    Ok(catalog)
}

pub fn builtin_catalog(base_dir: PathBuf) -> anyhow::Result<LoadedCatalog> {
    let catalog = parse_catalog(BUILTIN_CATALOG).context("built-in catalog")?;
    Ok(LoadedCatalog { catalog, base_dir })
}

pub fn load_catalog_file(path: &Path) -> anyhow::Result<LoadedCatalog> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("read catalog {}", path.display()))?;
    let catalog =
        parse_catalog(&json).with_context(|| format!("load catalog {}", path.display()))?;
    let base_dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    log::info!(
        "loaded {} documents from {}",
        catalog.documents().len(),
        path.display()
    );
    Ok(LoadedCatalog { catalog, base_dir })
}

/// Settings stored as JSON in the config directory.
#[derive(Debug)]
pub struct Storage {
    dir: PathBuf,
}

impl Storage {
    pub fn open(dir: impl AsRef<Path>) -> anyhow::Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create config dir {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn settings_path(&self) -> PathBuf {
        self.dir.join(SETTINGS_FILE)
    }

    /// Loads settings, writing the defaults first when no file exists yet.
    pub fn load_settings(&self) -> anyhow::Result<Settings> {
        let path = self.settings_path();
        if !path.exists() {
            let settings = Settings::default();
            self.save_settings(&settings)?;
            return Ok(settings);
        }
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("read settings {}", path.display()))?;
        let mut settings: Settings = serde_json::from_str(&json)
            .with_context(|| format!("parse settings {}", path.display()))?;
        settings.normalize();
        Ok(settings)
    }

    pub fn save_settings(&self, settings: &Settings) -> anyhow::Result<()> {
        let mut settings = settings.clone();
        settings.normalize();
        let json = serde_json::to_string_pretty(&settings)?;
        let path = self.settings_path();
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
        std::fs::rename(&tmp, &path)
            .with_context(|| format!("replace settings {}", path.display()))?;
        Ok(())
    }
}

/// First free path for `filename` in `dir`, adding ` (n)` before the extension on collision.
pub fn unique_download_path(dir: &Path, filename: &str) -> PathBuf {
    let name = Path::new(filename)
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(FALLBACK_FILENAME);

    let candidate = dir.join(name);
    if !candidate.exists() {
        return candidate;
    }

    let (stem, ext) = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (name, None),
    };
    (1u32..)
        .map(|n| match ext {
            Some(ext) => dir.join(format!("{stem} ({n}).{ext}")),
            None => dir.join(format!("{stem} ({n})")),
        })
        .find(|path| !path.exists())
        .unwrap_or(candidate)
}

pub fn save_download(dir: &Path, filename: &str, bytes: &[u8]) -> anyhow::Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("create download dir {}", dir.display()))?;
    let path = unique_download_path(dir, filename);
    std::fs::write(&path, bytes).with_context(|| format!("write {}", path.display()))?;
    log::info!("saved {} bytes to {}", bytes.len(), path.display());
    Ok(path)
}
