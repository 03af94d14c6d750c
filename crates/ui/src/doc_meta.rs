//! Page count and file size for catalog rows, read off the draw path.

use std::collections::{HashMap, HashSet};

use studyshelf_core::{DocumentId, SourceLocator};
use studyshelf_engine::DocumentMeta;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MetaStatus {
    Loading,
    Ready(Option<DocumentMeta>),
}

pub(crate) struct MetaLookup {
    cache: HashMap<DocumentId, Option<DocumentMeta>>,
    pending: HashSet<DocumentId>,
    tx: flume::Sender<(DocumentId, Option<DocumentMeta>)>,
    rx: flume::Receiver<(DocumentId, Option<DocumentMeta>)>,
}

impl MetaLookup {
    pub(crate) fn new() -> Self {
        let (tx, rx) = flume::unbounded();
        Self {
            cache: HashMap::new(),
            pending: HashSet::new(),
            tx,
            rx,
        }
    }

    /// Local files are read once on a background thread; remote ones never are.
    pub(crate) fn get(&mut self, id: DocumentId, source: &SourceLocator) -> MetaStatus {
        if let Some(meta) = self.cache.get(&id) {
            return MetaStatus::Ready(*meta);
        }
        if self.pending.contains(&id) {
            return MetaStatus::Loading;
        }
        let path = match source {
            SourceLocator::Local(path) => path.clone(),
            SourceLocator::Remote(_) => {
                self.cache.insert(id, None);
                return MetaStatus::Ready(None);
            }
        };

        self.pending.insert(id);
        let tx = self.tx.clone();
        std::thread::spawn(move || {
            let meta = match studyshelf_engine::read_meta(&path) {
                Ok(meta) => Some(meta),
                Err(err) => {
                    log::debug!("no metadata for {}: {err:#}", path.display());
                    None
                }
            };
            let _ = tx.send((id, meta));
        });
        MetaStatus::Loading
    }

    /// Moves finished lookups into the cache. True when anything arrived.
    pub(crate) fn pump(&mut self) -> bool {
        let mut changed = false;
        while let Ok((id, meta)) = self.rx.try_recv() {
            self.pending.remove(&id);
            self.cache.insert(id, meta);
            changed = true;
        }
        changed
    }

    pub(crate) fn is_busy(&self) -> bool {
        !self.pending.is_empty()
    }
}
