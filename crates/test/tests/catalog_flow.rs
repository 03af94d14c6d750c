use std::path::PathBuf;
use std::time::{Duration, Instant};

use studyshelf_application::{
    AppContext, EMPTY_CATEGORY_PLACEHOLDER, SearchOutcome, category_grid, category_listing,
};
use studyshelf_core::{DocumentId, SourceLocator};
use studyshelf_test::{FakeDoc, make_settings, sample_catalog};

fn titles(ctx: &AppContext) -> Vec<String> {
    ctx.visible_documents()
        .into_iter()
        .map(|d| d.title.clone())
        .collect()
}

#[test]
fn browsing_lists_the_selected_subject() {
    let ctx = AppContext::new(make_settings(0)).with_catalog(sample_catalog(), PathBuf::from("."));
    assert_eq!(ctx.current_category(), Some("Art"));
    assert!(ctx.visible_documents().is_empty());

    let mut ctx = ctx;
    ctx.select_category(2);
    assert_eq!(ctx.current_category(), Some("Mathematics"));
    assert_eq!(titles(&ctx), vec!["Calculus Basics", "Matrix Operations"]);

    ctx.move_document(5);
    assert_eq!(ctx.selected().map(|d| d.id), Some(DocumentId(2)));
}

#[test]
fn empty_subject_shows_a_placeholder_card() {
    let catalog = sample_catalog();
    let cards = category_grid(&catalog);
    let art = cards.iter().find(|c| c.name == "Art").unwrap();
    assert_eq!(art.count, 0);
    assert!(category_listing(&catalog, "Art").documents().is_empty());
    assert_eq!(EMPTY_CATEGORY_PLACEHOLDER, "No documents yet");
}

#[test]
fn search_waits_for_the_debounce_then_groups_by_subject() {
    let mut ctx =
        AppContext::new(make_settings(300)).with_catalog(sample_catalog(), PathBuf::from("."));
    let start = Instant::now();

    ctx.edit_query("c", start);
    ctx.edit_query("ce", start + Duration::from_millis(100));
    assert!(!ctx.is_searching());
    assert!(!ctx.tick(start + Duration::from_millis(350)));
    assert!(ctx.tick(start + Duration::from_millis(400)));
    assert!(ctx.is_searching());

    // "ce" hits "Forces" and "Cell Biology" in Science and "Science" itself.
    match ctx.search() {
        SearchOutcome::Results(groups) => {
            assert_eq!(groups.keys().collect::<Vec<_>>(), vec!["Science"]);
        }
        SearchOutcome::NotSearching => panic!("expected results"),
    }
    assert_eq!(titles(&ctx), vec!["Newton's Laws", "Cell Biology"]);

    ctx.clear_query();
    assert!(!ctx.is_searching());
}

#[test]
fn search_without_matches_reports_no_results() {
    let mut ctx =
        AppContext::new(make_settings(0)).with_catalog(sample_catalog(), PathBuf::from("."));
    ctx.edit_query("quantum", Instant::now());
    assert!(ctx.search().is_no_results());
    assert!(ctx.visible_documents().is_empty());
}

#[test]
fn subject_page_filters_only_its_own_documents() {
    let mut ctx = AppContext::new(make_settings(0))
        .with_catalog(sample_catalog(), PathBuf::from("."))
        .with_subject("Science");
    assert_eq!(titles(&ctx), vec!["Newton's Laws", "Cell Biology"]);

    ctx.edit_query("cell", Instant::now());
    assert_eq!(titles(&ctx), vec!["Cell Biology"]);

    ctx.edit_query("calculus", Instant::now());
    assert!(ctx.visible_documents().is_empty());
}

#[test]
fn documents_resolve_against_the_catalog_dir() {
    let ctx = AppContext::new(make_settings(0))
        .with_catalog(sample_catalog(), PathBuf::from("/srv/materials"));
    let doc = ctx.catalog.document(DocumentId(3)).unwrap().clone();
    assert_eq!(
        ctx.source_for(&doc),
        SourceLocator::Local(PathBuf::from("/srv/materials/pdfs/doc-3.pdf"))
    );
}

#[test]
fn downloading_a_local_document_copies_it() -> anyhow::Result<()> {
    let source_dir = tempfile::tempdir()?;
    let download_dir = tempfile::tempdir()?;
    let path = FakeDoc::pages(2).write(source_dir.path(), "notes.pdf")?;

    let mut reported = Vec::new();
    let bytes = studyshelf_engine::fetch(&SourceLocator::Local(path.clone()), |f| {
        reported.push(f)
    })?;
    assert_eq!(reported.last().copied(), Some(1.0));

    let first = studyshelf_storage::save_download(download_dir.path(), "notes.pdf", &bytes)?;
    let second = studyshelf_storage::save_download(download_dir.path(), "notes.pdf", &bytes)?;
    assert_ne!(first, second);
    assert_eq!(std::fs::read(&second)?, std::fs::read(&path)?);
    Ok(())
}

#[test]
fn builtin_catalog_loads_into_the_app() -> anyhow::Result<()> {
    let loaded = studyshelf_storage::builtin_catalog(PathBuf::from("."))?;
    let mut ctx = AppContext::new(make_settings(0)).with_catalog(loaded.catalog, loaded.base_dir);
    assert_eq!(ctx.category_names(), vec!["English", "History", "Mathematics", "Science"]);

    ctx.edit_query("NEWTON", Instant::now());
    assert!(
        ctx.visible_documents()
            .iter()
            .any(|d| d.title.contains("Newton"))
    );
    Ok(())
}
