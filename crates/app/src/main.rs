use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::Parser;
use directories::{ProjectDirs, UserDirs};
use simplelog::{Config, LevelFilter, WriteLogger};
use studyshelf_application::AppContext;
use studyshelf_core::{DocumentId, Settings};
use studyshelf_storage::{LoadedCatalog, Storage};
use studyshelf_ui::{Ui, UiOptions};

#[derive(Parser, Debug)]
#[command(name = "studyshelf")]
#[command(about = "Browse, search and read study materials in the terminal")]
#[command(version)]
struct Args {
    /// Catalog JSON file; the built-in catalog is used when omitted
    #[arg(long)]
    catalog: Option<PathBuf>,

    /// Start on a single subject page
    #[arg(long)]
    subject: Option<String>,

    /// Open the document with this id right away
    #[arg(long, value_name = "ID")]
    open: Option<u32>,

    /// off, error, warn, info, debug or trace
    #[arg(long, default_value = "info", value_parser = parse_level)]
    log_level: LevelFilter,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("{err:?}");
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    let project_dirs =
        ProjectDirs::from("dev", "studyshelf", "studyshelf").context("resolve project dirs")?;
    let config_dir = project_dirs.config_dir();
    fs::create_dir_all(config_dir)
        .with_context(|| format!("create config dir {}", config_dir.display()))?;

    init_logging(&config_dir.join("studyshelf.log"), args.log_level)?;
    log::info!("starting studyshelf {}", env!("CARGO_PKG_VERSION"));

    let storage = Storage::open(config_dir)?;
    let settings = storage.load_settings()?;

    let cwd = std::env::current_dir().context("get cwd")?;
    let LoadedCatalog { catalog, base_dir } = match &args.catalog {
        Some(path) => studyshelf_storage::load_catalog_file(path)?,
        None => studyshelf_storage::builtin_catalog(cwd.clone())?,
    };

    if let Some(subject) = &args.subject
        && catalog.category(subject).is_none()
    {
        anyhow::bail!("unknown subject {subject:?}");
    }

    let download_dir = resolve_download_dir(&settings, &cwd);
    log::info!("downloads go to {}", download_dir.display());

    let mut ctx = AppContext::new(settings).with_catalog(catalog, base_dir);
    if let Some(subject) = args.subject {
        ctx = ctx.with_subject(subject);
    }

    let mut ui = Ui::new(
        ctx,
        UiOptions {
            download_dir,
            open_on_start: args.open.map(DocumentId),
        },
    );
    ui.run()
}

fn init_logging(path: &Path, level: LevelFilter) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("create log {}", path.display()))?;
    WriteLogger::init(level, Config::default(), file).context("init logger")?;
    Ok(())
}

fn parse_level(value: &str) -> Result<LevelFilter, String> {
    value
        .parse::<LevelFilter>()
        .map_err(|_| format!("unknown log level {value:?}"))
}

fn resolve_download_dir(settings: &Settings, cwd: &Path) -> PathBuf {
    if let Some(dir) = settings.download_dir.as_deref() {
        let dir = PathBuf::from(dir);
        return if dir.is_absolute() { dir } else { cwd.join(dir) };
    }
    UserDirs::new()
        .and_then(|dirs| dirs.download_dir().map(Path::to_path_buf))
        .unwrap_or_else(|| cwd.to_path_buf())
}
