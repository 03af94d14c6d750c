//! Render service: one worker thread owning the engine and the open document.

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use flume::{Receiver, Sender};
use studyshelf_core::{EngineEvent, Generation, RenderId, SourceLocator, ViewerError};

use crate::{DocumentHandle, RenderEngine, source};

/// Shared flag a queued or running page render polls to abort early.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

#[derive(Debug)]
enum Request {
    Open {
        generation: Generation,
        source: SourceLocator,
    },
    Release {
        generation: Generation,
    },
    Page {
        generation: Generation,
        render_id: RenderId,
        page: u32,
        width_px: u32,
        cancel: CancelToken,
    },
    Thumbnail {
        generation: Generation,
        page: u32,
        width_px: u32,
    },
    Shutdown,
}

impl Request {
    fn generation(&self) -> Option<Generation> {
        match self {
            Request::Open { generation, .. }
            | Request::Release { generation }
            | Request::Page { generation, .. }
            | Request::Thumbnail { generation, .. } => Some(*generation),
            Request::Shutdown => None,
        }
    }
}

/// Pending work ordered control first, then page renders, then thumbnails.
#[derive(Debug, Default)]
struct JobQueue {
    control: VecDeque<Request>,
    pages: VecDeque<Request>,
    thumbnails: VecDeque<Request>,
}

impl JobQueue {
    fn push(&mut self, request: Request) {
        match request {
            Request::Page { .. } => self.pages.push_back(request),
            Request::Thumbnail { .. } => self.thumbnails.push_back(request),
            Request::Release { generation } => {
                self.drop_generation(generation);
                self.control.push_back(request);
            }
            Request::Open { .. } | Request::Shutdown => self.control.push_back(request),
        }
    }

    fn pop(&mut self) -> Option<Request> {
        self.control
            .pop_front()
            .or_else(|| self.pages.pop_front())
            .or_else(|| self.thumbnails.pop_front())
    }

    fn is_empty(&self) -> bool {
        self.control.is_empty() && self.pages.is_empty() && self.thumbnails.is_empty()
    }

    fn drop_generation(&mut self, generation: Generation) {
        let keep = |request: &Request| request.generation() != Some(generation);
        self.control.retain(keep);
        self.pages.retain(keep);
        self.thumbnails.retain(keep);
    }
}

/// The page render most recently handed to the worker.
#[derive(Debug)]
struct ActiveRender {
    generation: Generation,
    render_id: RenderId,
    cancel: CancelToken,
}

pub struct RenderService {
    request_tx: Sender<Request>,
    event_rx: Receiver<EngineEvent>,
    active_render: Option<ActiveRender>,
    worker: Option<JoinHandle<()>>,
}

impl RenderService {
    /// Starts the worker. `factory` runs on the worker thread, so the engine
    /// itself does not need to be `Send`.
    pub fn spawn<E, F>(factory: F) -> Self
    where
        E: RenderEngine + 'static,
        F: FnOnce() -> anyhow::Result<E> + Send + 'static,
    {
        let (request_tx, request_rx) = flume::unbounded();
        let (event_tx, event_rx) = flume::unbounded();

        let worker = std::thread::Builder::new()
            .name("studyshelf-render".to_string())
            .spawn(move || match factory() {
                Ok(engine) => run_worker(&engine, &request_rx, &event_tx),
                Err(err) => {
                    log::warn!("rendering engine unavailable: {err:#}");
                    run_unavailable(&format!("{err:#}"), &request_rx, &event_tx);
                }
            });
        let worker = match worker {
            Ok(handle) => Some(handle),
            Err(err) => {
                log::warn!("failed to spawn render worker: {err}");
                None
            }
        };

        Self {
            request_tx,
            event_rx,
            active_render: None,
            worker,
        }
    }

    pub fn open(&self, generation: Generation, source: SourceLocator) {
        self.send(Request::Open { generation, source });
    }

    /// Queues a page render. Any earlier page render is superseded and
    /// cancelled, so the worker never holds two live ones.
    pub fn render_page(
        &mut self,
        generation: Generation,
        render_id: RenderId,
        page: u32,
        width_px: u32,
    ) {
        let cancel = CancelToken::new();
        let previous = self.active_render.replace(ActiveRender {
            generation,
            render_id,
            cancel: cancel.clone(),
        });
        if let Some(previous) = previous {
            log::debug!("{} superseded by {render_id}", previous.render_id);
            previous.cancel.cancel();
        }
        self.send(Request::Page {
            generation,
            render_id,
            page,
            width_px,
            cancel,
        });
    }

    pub fn render_thumbnail(&self, generation: Generation, page: u32, width_px: u32) {
        self.send(Request::Thumbnail {
            generation,
            page,
            width_px,
        });
    }

    /// Best effort: a render already past its last check still completes.
    pub fn cancel_render(&mut self, generation: Generation) {
        if let Some(active) = &self.active_render
            && active.generation == generation
        {
            active.cancel.cancel();
            self.active_render = None;
        }
    }

    pub fn release(&mut self, generation: Generation) {
        self.cancel_render(generation);
        self.send(Request::Release { generation });
    }

    pub fn try_recv(&self) -> Option<EngineEvent> {
        self.event_rx.try_recv().ok()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Option<EngineEvent> {
        self.event_rx.recv_timeout(timeout).ok()
    }

    pub fn drain(&self) -> Vec<EngineEvent> {
        self.event_rx.try_iter().collect()
    }

    pub fn is_running(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    pub fn shutdown(&mut self) {
        if let Some(active) = self.active_render.take() {
            active.cancel.cancel();
        }
        let _ = self.request_tx.send(Request::Shutdown);
        if let Some(worker) = self.worker.take()
            && worker.join().is_err()
        {
            log::warn!("render worker panicked");
        }
    }

    fn send(&self, request: Request) {
        if self.request_tx.send(request).is_err() {
            log::warn!("render worker is gone; request dropped");
        }
    }
}

impl Drop for RenderService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker<E: RenderEngine>(
    engine: &E,
    requests: &Receiver<Request>,
    events: &Sender<EngineEvent>,
) {
    let mut queue = JobQueue::default();
    let mut current: Option<(Generation, E::Handle<'_>)> = None;

    loop {
        if queue.is_empty() {
            match requests.recv() {
                Ok(request) => queue.push(request),
                Err(_) => break,
            }
        }
        for request in requests.try_iter() {
            queue.push(request);
        }
        let Some(job) = queue.pop() else {
            continue;
        };

        match job {
            Request::Shutdown => break,
            Request::Release { generation } => {
                if current.as_ref().is_some_and(|(g, _)| *g == generation) {
                    log::debug!("releasing document {generation}");
                    current = None;
                }
            }
            Request::Open { generation, source } => {
                current = None;
                let report = |fraction: f32| {
                    let _ = events.send(EngineEvent::OpenProgress {
                        generation,
                        fraction,
                    });
                };
                let opened = source::fetch(&source, report)
                    .and_then(|bytes| engine.open(bytes));
                match opened {
                    Ok(handle) => {
                        let page_count = handle.page_count();
                        log::info!("opened {source} ({page_count} pages) as {generation}");
                        current = Some((generation, handle));
                        let _ = events.send(EngineEvent::Opened {
                            generation,
                            page_count,
                        });
                    }
                    Err(err) => {
                        log::warn!("open {source} failed: {err:#}");
                        let _ = events.send(EngineEvent::OpenFailed {
                            generation,
                            error: ViewerError::open(source.to_string(), format!("{err:#}")),
                        });
                    }
                }
            }
            Request::Page {
                generation,
                render_id,
                page,
                width_px,
                cancel,
            } => {
                let Some((_, handle)) = current.as_ref().filter(|(g, _)| *g == generation) else {
                    log::debug!("dropping page {page} for released {generation}");
                    continue;
                };
                if cancel.is_cancelled() {
                    let _ = events.send(EngineEvent::RenderCancelled {
                        generation,
                        render_id,
                        page,
                    });
                    continue;
                }
                let result = handle.render_page(page, width_px);
                if cancel.is_cancelled() {
                    let _ = events.send(EngineEvent::RenderCancelled {
                        generation,
                        render_id,
                        page,
                    });
                    continue;
                }
                let event = match result {
                    Ok(bitmap) => EngineEvent::PageRendered {
                        generation,
                        render_id,
                        page,
                        width_px,
                        bitmap: Arc::new(bitmap),
                    },
                    Err(err) => {
                        log::warn!("render page {page} failed: {err:#}");
                        EngineEvent::PageFailed {
                            generation,
                            render_id,
                            page,
                            error: ViewerError::render(page, format!("{err:#}")),
                        }
                    }
                };
                let _ = events.send(event);
            }
            Request::Thumbnail {
                generation,
                page,
                width_px,
            } => {
                let Some((_, handle)) = current.as_ref().filter(|(g, _)| *g == generation) else {
                    continue;
                };
                let event = match handle.render_page(page, width_px) {
                    Ok(bitmap) => EngineEvent::ThumbnailRendered {
                        generation,
                        page,
                        bitmap: Arc::new(bitmap),
                    },
                    Err(err) => EngineEvent::ThumbnailFailed {
                        generation,
                        page,
                        error: ViewerError::thumbnail(page, format!("{err:#}")),
                    },
                };
                let _ = events.send(event);
            }
        }
    }
    log::debug!("render worker stopped");
}

/// Worker loop used when the engine could not be constructed: every open fails.
fn run_unavailable(reason: &str, requests: &Receiver<Request>, events: &Sender<EngineEvent>) {
    for request in requests.iter() {
        match request {
            Request::Shutdown => break,
            Request::Open { generation, source } => {
                let _ = events.send(EngineEvent::OpenFailed {
                    generation,
                    error: ViewerError::open(source.to_string(), reason),
                });
            }
            _ => {}
        }
    }
}
