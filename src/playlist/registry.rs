//! Pending-request registry (§3 "Pending-request registry", §4.7).
//!
//! Holds blocking playlist and part requests that couldn't be satisfied at
//! admission time. `check_pending` is re-run after every state change that
//! could unblock a waiter; it does a full scan of both sets every tick
//! rather than early-exiting on the first unsatisfied entry (§9, resolved
//! open question 1 — strictly more prompt, no change in observable
//! behaviour).

use crate::{
    render::render_manifest,
    response::{self, FileResponse},
    window::Window,
};
use common::{ArcLogger, LogEntry, LogLevel};
use tokio::sync::oneshot;

pub struct PendingPlaylistRequest {
    pub is_delta_update: bool,
    pub msn: u64,
    pub part: u64,
    pub res_tx: oneshot::Sender<FileResponse>,
}

pub struct PendingPartRequest {
    pub part_name: String,
    pub part_id: u64,
    pub res_tx: oneshot::Sender<FileResponse>,
}

#[derive(Default)]
pub struct PendingRegistry {
    playlists: Vec<PendingPlaylistRequest>,
    parts: Vec<PendingPartRequest>,
}

impl PendingRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self {
            playlists: Vec::new(),
            parts: Vec::new(),
        }
    }

    pub fn park_playlist(&mut self, req: PendingPlaylistRequest) {
        self.playlists.push(req);
    }

    pub fn park_part(&mut self, req: PendingPartRequest) {
        self.parts.push(req);
    }

    #[must_use]
    pub fn num_pending_playlists(&self) -> usize {
        self.playlists.len()
    }

    #[must_use]
    pub fn num_pending_parts(&self) -> usize {
        self.parts.len()
    }

    /// Replies `500` to every parked request and empties both sets. Called
    /// once, when the shared cancellation signal fires (§4.1, §5).
    pub fn drain_cancelled(&mut self) {
        for req in self.playlists.drain(..) {
            _ = req.res_tx.send(response::CANCELLED);
        }
        for req in self.parts.drain(..) {
            _ = req.res_tx.send(response::CANCELLED);
        }
    }

    /// §4.7: unblock every waiter the current window state can satisfy.
    pub fn check_pending(&mut self, window: &Window, logger: &ArcLogger) {
        if window.has_content() {
            let mut i = 0;
            while i < self.playlists.len() {
                if window.has_part(self.playlists[i].msn, self.playlists[i].part) {
                    let req = self.playlists.swap_remove(i);
                    match render_manifest(window, req.is_delta_update) {
                        Ok(body) => {
                            _ = req.res_tx.send(response::ok_playlist(body.into_bytes()));
                        }
                        Err(e) => {
                            logger.log(LogEntry::new(
                                LogLevel::Error,
                                "hls",
                                format!("render pending playlist: {e}"),
                            ));
                            _ = req.res_tx.send(response::INTERNAL_ERROR);
                        }
                    }
                } else {
                    i += 1;
                }
            }
        }

        let mut i = 0;
        while i < self.parts.len() {
            if window.next_part_id() <= self.parts[i].part_id {
                i += 1;
                continue;
            }

            let req = self.parts.swap_remove(i);
            let Some(part) = window.part_by_name(&req.part_name) else {
                logger.log(LogEntry::new(
                    LogLevel::Warning,
                    "hls",
                    format!("pending part {} vanished before it could be served", req.part_name),
                ));
                _ = req.res_tx.send(response::INTERNAL_ERROR);
                continue;
            };
            _ = req.res_tx.send(response::ok_media(part.reader()));
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::window::Window;
    use common::{time::DurationH264, DummyLogger, PartFinalized};
    use http::StatusCode;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_check_pending_unblocks_part() {
        let mut window = Window::new(1);
        let mut registry = PendingRegistry::new();
        let logger = DummyLogger::new();

        let (tx, rx) = oneshot::channel();
        registry.park_part(PendingPartRequest {
            part_name: "part0".to_owned(),
            part_id: 0,
            res_tx: tx,
        });

        registry.check_pending(&window, &logger);
        assert_eq!(1, registry.num_pending_parts());

        window.part_finalized(Arc::new(PartFinalized {
            id: 0,
            is_independent: true,
            rendered_content: Some(bytes::Bytes::from(vec![1, 2, 3])),
            rendered_duration: DurationH264::new(0),
        }));
        registry.check_pending(&window, &logger);

        assert_eq!(0, registry.num_pending_parts());
        let resp = rx.await.unwrap();
        assert_eq!(StatusCode::OK, resp.status);
    }

    #[tokio::test]
    async fn test_drain_cancelled_replies_500() {
        let mut registry = PendingRegistry::new();
        let (tx, rx) = oneshot::channel();
        registry.park_part(PendingPartRequest {
            part_name: "part0".to_owned(),
            part_id: 0,
            res_tx: tx,
        });
        registry.drain_cancelled();
        let resp = rx.await.unwrap();
        assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, resp.status);
    }
}
