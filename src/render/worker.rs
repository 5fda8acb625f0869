//! Render worker - runs in separate thread(s)

use std::sync::Arc;

use flume::{Receiver, Sender};
use log::{debug, trace, warn};

use super::engine::{DocumentEngine, PageSource};
use super::request::{CancelToken, RenderOutput, RenderRequest, RenderResponse, RequestId, TaskKind};
use super::resources::encode_png;
use crate::error::EngineFault;

/// Worker loop: open a private page source, then serve requests until
/// `Shutdown` or until the request channel closes.
pub fn render_worker(
    engine: Arc<dyn DocumentEngine>,
    bytes: Arc<[u8]>,
    requests: Receiver<RenderRequest>,
    responses: Sender<RenderResponse>,
) {
    let doc = match engine.open(&bytes) {
        Ok(d) => d,
        Err(fault) => {
            warn!("render worker could not open document: {fault}");
            // Keep answering so nobody waits on a dead worker
            for request in requests {
                match request {
                    RenderRequest::Render { id, page, kind, .. } => {
                        let _ = responses.send(RenderResponse::Failed {
                            id,
                            page,
                            kind,
                            fault: fault.clone(),
                        });
                    }
                    RenderRequest::Shutdown => break,
                }
            }
            return;
        }
    };

    for request in requests {
        match request {
            RenderRequest::Render {
                id,
                page,
                scale,
                kind,
                cancel,
            } => {
                let response = handle_render_request(doc.as_ref(), id, page, scale, kind, &cancel);
                if responses.send(response).is_err() {
                    debug!("response channel closed, worker exiting");
                    break;
                }
            }

            RenderRequest::Shutdown => break,
        }
    }
}

fn handle_render_request(
    doc: &dyn PageSource,
    id: RequestId,
    page: usize,
    scale: f32,
    kind: TaskKind,
    cancel: &CancelToken,
) -> RenderResponse {
    if cancel.is_cancelled() {
        trace!("page {page} cancelled before paint");
        return RenderResponse::Cancelled { id, page, kind };
    }

    match render_task(doc, page, scale, kind, cancel) {
        Ok(output) => {
            // A paint cannot be interrupted, so a late cancel drops the result here
            if cancel.is_cancelled() {
                RenderResponse::Cancelled { id, page, kind }
            } else {
                RenderResponse::Rendered {
                    id,
                    page,
                    kind,
                    output,
                }
            }
        }
        Err(EngineFault::Cancelled) => RenderResponse::Cancelled { id, page, kind },
        Err(fault) => RenderResponse::Failed {
            id,
            page,
            kind,
            fault,
        },
    }
}

/// Paint one page and package the result for its task kind
pub fn render_task(
    doc: &dyn PageSource,
    page: usize,
    scale: f32,
    kind: TaskKind,
    cancel: &CancelToken,
) -> Result<RenderOutput, EngineFault> {
    let bitmap = doc.render(page, scale, cancel)?;

    match kind {
        TaskKind::Thumbnail => {
            let png = encode_png(&bitmap)?;
            Ok(RenderOutput::Thumbnail { bitmap, png })
        }
        TaskKind::HighRes { .. } => {
            let text_runs = match doc.text_runs(page) {
                Ok(runs) => runs,
                Err(e) => {
                    // The raster is still useful without a selectable overlay
                    warn!("text extraction failed for page {page}: {e}");
                    Vec::new()
                }
            };
            Ok(RenderOutput::HighRes { bitmap, text_runs })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeEngine;

    fn spawn(engine: FakeEngine, bytes: &[u8]) -> (Sender<RenderRequest>, Receiver<RenderResponse>) {
        let (req_tx, req_rx) = flume::unbounded();
        let (resp_tx, resp_rx) = flume::unbounded();
        let engine: Arc<dyn DocumentEngine> = Arc::new(engine);
        let bytes: Arc<[u8]> = Arc::from(bytes);
        std::thread::spawn(move || render_worker(engine, bytes, req_rx, resp_tx));
        (req_tx, resp_rx)
    }

    fn render(page: usize, kind: TaskKind, cancel: CancelToken) -> RenderRequest {
        RenderRequest::Render {
            id: RequestId::new(page as u64),
            page,
            scale: 0.2,
            kind,
            cancel,
        }
    }

    #[test]
    fn thumbnail_comes_back_png_encoded() {
        let (tx, rx) = spawn(FakeEngine::new(3), b"doc");
        tx.send(render(2, TaskKind::Thumbnail, CancelToken::new())).unwrap();

        match rx.recv().unwrap() {
            RenderResponse::Rendered {
                page,
                output: RenderOutput::Thumbnail { bitmap, png },
                ..
            } => {
                assert_eq!(page, 2);
                assert_eq!((bitmap.width, bitmap.height), (120, 160));
                assert!(png.starts_with(&[0x89, b'P', b'N', b'G']));
            }
            other => panic!("unexpected response: {other:?}"),
        }
        tx.send(RenderRequest::Shutdown).unwrap();
    }

    #[test]
    fn high_res_carries_text_runs() {
        let (tx, rx) = spawn(FakeEngine::new(3), b"doc");
        tx.send(render(1, TaskKind::HighRes { version: 1, zoom: 100 }, CancelToken::new()))
            .unwrap();

        match rx.recv().unwrap() {
            RenderResponse::Rendered {
                output: RenderOutput::HighRes { text_runs, .. },
                kind,
                ..
            } => {
                assert_eq!(kind, TaskKind::HighRes { version: 1, zoom: 100 });
                assert_eq!(text_runs.len(), 1);
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn pre_cancelled_request_never_paints() {
        let engine = FakeEngine::new(3);
        let log = engine.render_log();
        let (tx, rx) = spawn(engine, b"doc");

        let token = CancelToken::new();
        token.cancel();
        tx.send(render(1, TaskKind::Thumbnail, token)).unwrap();

        assert!(matches!(rx.recv().unwrap(), RenderResponse::Cancelled { page: 1, .. }));
        assert!(log.lock().unwrap().is_empty());
    }

    #[test]
    fn failing_page_reports_fault() {
        let (tx, rx) = spawn(FakeEngine::new(3).with_failing_page(2), b"doc");
        tx.send(RenderRequest::Render {
            id: RequestId::new(2),
            page: 2,
            scale: 1.0,
            kind: TaskKind::HighRes { version: 1, zoom: 100 },
            cancel: CancelToken::new(),
        })
        .unwrap();
        assert!(matches!(rx.recv().unwrap(), RenderResponse::Failed { page: 2, .. }));
    }

    #[test]
    fn unopenable_document_fails_every_request() {
        let (tx, rx) = spawn(FakeEngine::new(3), FakeEngine::MALFORMED);
        tx.send(render(1, TaskKind::Thumbnail, CancelToken::new())).unwrap();
        assert!(matches!(rx.recv().unwrap(), RenderResponse::Failed { .. }));
        tx.send(RenderRequest::Shutdown).unwrap();
    }
}
