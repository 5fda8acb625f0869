//! Render pipeline - owns the worker pool and tracks in-flight tasks

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use flume::{Receiver, RecvTimeoutError, Sender};
use log::{debug, trace, warn};

use super::engine::DocumentEngine;
use super::request::{CancelToken, RenderRequest, RenderResponse, RequestId, TaskKind};
use super::worker::render_worker;

#[derive(Debug)]
struct PendingTask {
    page: usize,
    kind: TaskKind,
    cancel: CancelToken,
}

/// Worker pool for one open document. Dropped wholesale on reload, which
/// also orphans any response still on its way back.
pub struct RenderPipeline {
    request_tx: Sender<RenderRequest>,
    response_rx: Receiver<RenderResponse>,
    next_request_id: u64,
    pending: HashMap<RequestId, PendingTask>,
    num_workers: usize,
}

impl RenderPipeline {
    #[must_use]
    pub fn new(engine: Arc<dyn DocumentEngine>, bytes: Arc<[u8]>, num_workers: usize) -> Self {
        // flume gives MPMC: every worker pulls from the same request queue
        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();

        let num_workers = num_workers.max(1);
        for n in 0..num_workers {
            let engine = Arc::clone(&engine);
            let bytes = Arc::clone(&bytes);
            let rx = request_rx.clone();
            let tx = response_tx.clone();

            let spawned = std::thread::Builder::new()
                .name(format!("pagesurf-render-{n}"))
                .spawn(move || render_worker(engine, bytes, rx, tx));
            if let Err(e) = spawned {
                warn!("failed to spawn render worker {n}: {e}");
            }
        }

        Self {
            request_tx,
            response_rx,
            next_request_id: 1,
            pending: HashMap::new(),
            num_workers,
        }
    }

    /// Queue a render. The returned token cancels it.
    pub fn dispatch(&mut self, page: usize, scale: f32, kind: TaskKind) -> (RequestId, CancelToken) {
        let id = self.next_id();
        let cancel = CancelToken::new();

        trace!("dispatch {id:?}: page {page} at {scale:.2} ({kind:?})");
        if self
            .request_tx
            .send(RenderRequest::Render {
                id,
                page,
                scale,
                kind,
                cancel: cancel.clone(),
            })
            .is_err()
        {
            warn!("render workers are gone, page {page} will not render");
        }
        self.pending.insert(
            id,
            PendingTask {
                page,
                kind,
                cancel: cancel.clone(),
            },
        );

        (id, cancel)
    }

    /// Cancel every live high-res task for `page`. Returns how many were hit.
    pub fn cancel_high_res(&mut self, page: usize) -> usize {
        let mut hit = 0;
        for task in self.pending.values() {
            if task.page == page
                && matches!(task.kind, TaskKind::HighRes { .. })
                && !task.cancel.is_cancelled()
            {
                task.cancel.cancel();
                hit += 1;
            }
        }
        if hit > 0 {
            debug!("cancelled {hit} high-res task(s) for page {page}");
        }
        hit
    }

    pub fn cancel_all(&mut self) {
        for task in self.pending.values() {
            task.cancel.cancel();
        }
    }

    /// A live (not cancelled) task of this kind exists for `page`
    #[must_use]
    pub fn is_in_flight(&self, page: usize, thumbnail: bool) -> bool {
        self.pending.values().any(|task| {
            task.page == page
                && matches!(task.kind, TaskKind::Thumbnail) == thumbnail
                && !task.cancel.is_cancelled()
        })
    }

    /// Poll for completed render responses
    pub fn poll_responses(&mut self) -> Vec<RenderResponse> {
        let mut responses = vec![];

        while let Ok(response) = self.response_rx.try_recv() {
            self.pending.remove(&response.id());
            responses.push(response);
        }

        responses
    }

    /// Block for the next response, up to `timeout`
    pub fn recv_timeout(&mut self, timeout: Duration) -> Option<RenderResponse> {
        match self.response_rx.recv_timeout(timeout) {
            Ok(response) => {
                self.pending.remove(&response.id());
                Some(response)
            }
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => {
                warn!("all render workers exited with {} task(s) pending", self.pending.len());
                self.pending.clear();
                None
            }
        }
    }

    /// The response for `id` has not arrived yet
    #[must_use]
    pub fn is_pending(&self, id: RequestId) -> bool {
        self.pending.contains_key(&id)
    }

    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.pending.is_empty()
    }

    /// Cancel everything and stop all workers
    pub fn shutdown(&mut self) {
        self.cancel_all();
        for _ in 0..self.num_workers {
            let _ = self.request_tx.send(RenderRequest::Shutdown);
        }
    }

    fn next_id(&mut self) -> RequestId {
        let id = RequestId::new(self.next_request_id);
        self.next_request_id += 1;
        id
    }
}

impl Drop for RenderPipeline {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::request::RenderOutput;
    use crate::test_utils::FakeEngine;

    fn pipeline(engine: FakeEngine) -> RenderPipeline {
        RenderPipeline::new(Arc::new(engine), Arc::from(&b"doc"[..]), 2)
    }

    fn wait_idle(p: &mut RenderPipeline) -> Vec<RenderResponse> {
        let mut out = Vec::new();
        while !p.is_idle() {
            if let Some(r) = p.recv_timeout(Duration::from_secs(5)) {
                out.push(r);
            } else {
                break;
            }
        }
        out
    }

    #[test]
    fn dispatched_tasks_complete_and_clear_pending() {
        let mut p = pipeline(FakeEngine::new(4));
        p.dispatch(1, 0.2, TaskKind::Thumbnail);
        p.dispatch(2, 1.0, TaskKind::HighRes { version: 1, zoom: 100 });
        assert_eq!(p.pending_count(), 2);
        assert!(p.is_in_flight(1, true));
        assert!(p.is_in_flight(2, false));

        let responses = wait_idle(&mut p);
        assert_eq!(responses.len(), 2);
        assert!(p.is_idle());
        assert!(responses.iter().any(|r| matches!(
            r,
            RenderResponse::Rendered {
                output: RenderOutput::HighRes { .. },
                page: 2,
                ..
            }
        )));
    }

    #[test]
    fn cancel_high_res_marks_only_that_page() {
        let mut p = pipeline(FakeEngine::new(4).with_render_delay(Duration::from_millis(50)));
        let (_, a) = p.dispatch(1, 1.0, TaskKind::HighRes { version: 1, zoom: 100 });
        let (_, b) = p.dispatch(2, 1.0, TaskKind::HighRes { version: 1, zoom: 100 });
        let (_, thumb) = p.dispatch(1, 0.2, TaskKind::Thumbnail);

        assert_eq!(p.cancel_high_res(1), 1);
        assert!(a.is_cancelled());
        assert!(!b.is_cancelled());
        assert!(!thumb.is_cancelled());
        assert!(!p.is_in_flight(1, false));
        assert_eq!(p.cancel_high_res(1), 0);

        let responses = wait_idle(&mut p);
        assert!(responses.iter().any(|r| matches!(
            r,
            RenderResponse::Cancelled { page: 1, kind: TaskKind::HighRes { .. }, .. }
        )));
    }

    #[test]
    fn request_ids_are_unique() {
        let mut p = pipeline(FakeEngine::new(2));
        let (a, _) = p.dispatch(1, 1.0, TaskKind::Thumbnail);
        let (b, _) = p.dispatch(1, 1.0, TaskKind::Thumbnail);
        assert_ne!(a, b);
        wait_idle(&mut p);
    }
}
