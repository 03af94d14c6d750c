//! Application orchestration layer for studyshelf.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use studyshelf_core::{Catalog, Document, Settings, SourceLocator};

pub mod catalog_view;
pub mod debounce;
pub mod subject;
pub mod viewer;

pub use catalog_view::{
    CategoryCard, CategoryListing, CategorySummary, EMPTY_CATEGORY_PLACEHOLDER, SearchOutcome,
    category_grid, category_listing, filter, list_categories, matches_query,
};
pub use debounce::Debouncer;
pub use subject::{SubjectResults, SubjectSearch};
pub use viewer::{
    DisplayedPage, Notice, NoticeLevel, Thumbnail, ViewerCommand, ViewerEffect, ViewerSession,
    ViewerState,
};

#[derive(Debug, Clone)]
pub struct AppContext {
    pub settings: Settings,
    pub catalog: Catalog,
    pub catalog_base: PathBuf,
    pub subject: Option<SubjectSearch>,
    /// What the user has typed so far.
    pub query: String,
    /// What the visible results were last computed from.
    pub applied_query: String,
    pub debouncer: Debouncer,
    pub selected_category: usize,
    pub selected_document: usize,
}

impl AppContext {
    pub fn new(settings: Settings) -> Self {
        let delay = Duration::from_millis(settings.search_debounce_ms);
        Self {
            settings,
            catalog: Catalog::default(),
            catalog_base: PathBuf::from("."),
            subject: None,
            query: String::new(),
            applied_query: String::new(),
            debouncer: Debouncer::new(delay),
            selected_category: 0,
            selected_document: 0,
        }
    }

    pub fn with_catalog(mut self, catalog: Catalog, base_dir: PathBuf) -> Self {
        self.catalog = catalog;
        self.catalog_base = base_dir;
        if let Some(subject) = self.subject.take() {
            self.subject = Some(SubjectSearch::new(subject.subject(), &self.catalog));
        }
        self.clamp_selection();
        self
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        let subject = subject.into();
        if let Some(index) = self.catalog.categories().keys().position(|n| *n == subject) {
            self.selected_category = index;
        }
        self.subject = Some(SubjectSearch::new(subject, &self.catalog));
        self.selected_document = 0;
        self
    }

    pub fn category_names(&self) -> Vec<&str> {
        self.catalog.categories().keys().map(String::as_str).collect()
    }

    pub fn current_category(&self) -> Option<&str> {
        if let Some(subject) = &self.subject {
            return Some(subject.subject());
        }
        self.category_names().get(self.selected_category).copied()
    }

    /// Records a keystroke in the search box; results update once the debounce fires.
    pub fn edit_query(&mut self, query: impl Into<String>, now: Instant) {
        self.query = query.into();
        if self.debouncer.delay().is_zero() {
            self.apply_query();
        } else {
            self.debouncer.touch(now);
        }
    }

    pub fn clear_query(&mut self) {
        self.query.clear();
        self.debouncer.cancel();
        self.apply_query();
    }

    /// Returns true when pending input was applied.
    pub fn tick(&mut self, now: Instant) -> bool {
        if self.debouncer.fire(now) {
            self.apply_query();
            true
        } else {
            false
        }
    }

    pub fn is_searching(&self) -> bool {
        !self.applied_query.trim().is_empty()
    }

    pub fn search(&self) -> SearchOutcome<'_> {
        filter(&self.catalog, &self.applied_query)
    }

    /// Documents in the list pane, in display order.
    pub fn visible_documents(&self) -> Vec<&Document> {
        if let Some(subject) = &self.subject {
            return subject.results(&self.catalog).documents().to_vec();
        }
        if self.is_searching() {
            return self.search().flatten();
        }
        match self.current_category() {
            Some(name) => category_listing(&self.catalog, name).documents().to_vec(),
            None => Vec::new(),
        }
    }

    pub fn selected(&self) -> Option<&Document> {
        self.visible_documents().get(self.selected_document).copied()
    }

    pub fn select_category(&mut self, index: usize) {
        let count = self.catalog.categories().len();
        if count == 0 {
            return;
        }
        self.selected_category = index.min(count - 1);
        self.selected_document = 0;
    }

    pub fn move_document(&mut self, delta: isize) {
        let len = self.visible_documents().len();
        if len == 0 {
            self.selected_document = 0;
            return;
        }
        let next = self.selected_document.saturating_add_signed(delta);
        self.selected_document = next.min(len - 1);
    }

    pub fn source_for(&self, doc: &Document) -> SourceLocator {
        SourceLocator::parse(&doc.path, &self.catalog_base)
    }

    fn apply_query(&mut self) {
        self.applied_query = self.query.clone();
        if let Some(subject) = self.subject.as_mut() {
            subject.set_query(&self.catalog, &self.query);
        }
        self.selected_document = 0;
    }

    fn clamp_selection(&mut self) {
        let categories = self.catalog.categories().len();
        self.selected_category = self.selected_category.min(categories.saturating_sub(1));
        let docs = self.visible_documents().len();
        self.selected_document = self.selected_document.min(docs.saturating_sub(1));
    }
}
