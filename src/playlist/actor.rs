//! The Playlist Actor (§4.1): the single point that mutates window and
//! registry state and answers the five request types muxer/client traffic
//! can raise.
//!
//! The reference implementation this core was extracted from serializes
//! access through a dedicated event-loop task reading off typed request
//! channels. This crate instead serializes access through a single
//! `tokio::sync::Mutex` guarding the combined window+registry state — the
//! alternative §9 ("Design Notes: Actor vs locks") calls out explicitly as
//! equivalent, provided blocking requests still park instead of busy-poll.
//! A request "parks" by pushing a oneshot sender into the registry and
//! releasing the lock before awaiting the receiver, so it never holds the
//! mutex while suspended — giving the same non-blocking-reload semantics as
//! a channel actor without a second task.

use crate::{
    dispatch::HlsQuery,
    registry::{PendingPartRequest, PendingPlaylistRequest, PendingRegistry},
    render::render_manifest,
    response::{self, FileResponse},
    window::{SegmentOrGap, Window},
};
use common::{ArcLogger, LogEntry, LogLevel, PartFinalized, SegmentFinalized};
use std::{collections::VecDeque, sync::Arc};
use tokio::sync::{oneshot, Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

/// Construction-time configuration for a [`PlaylistActor`] (§10.4). Small
/// and explicit — there is no implicit global state and no file format
/// owned by this crate; an embedder's own configuration layer is
/// responsible for getting a `segment_count` from wherever it lives.
#[derive(Clone, Copy, Debug)]
pub struct PlaylistConfig {
    pub segment_count: usize,
}

/// Invoked synchronously after every eviction, with the window's current
/// segment list, so an embedder can prune whatever it keeps on disk (§4.5
/// step 4, §6 "Muxer-facing contract"). Must not block indefinitely or the
/// actor stalls — this is a contract with the muxer, not defended against
/// (§7).
pub type OnSegmentFinalizedHook = Box<dyn Fn(&VecDeque<SegmentOrGap>) + Send + Sync>;

struct ActorState {
    is_cancelled: bool,
    logger: ArcLogger,
    window: Window,
    registry: PendingRegistry,
    on_segment_finalized_hook: OnSegmentFinalizedHook,
}

pub struct PlaylistActor {
    state: Arc<Mutex<ActorState>>,
}

impl PlaylistActor {
    #[must_use]
    pub fn new(
        token: CancellationToken,
        logger: ArcLogger,
        config: PlaylistConfig,
        on_segment_finalized_hook: OnSegmentFinalizedHook,
    ) -> Self {
        let state = Arc::new(Mutex::new(ActorState {
            is_cancelled: false,
            logger,
            window: Window::new(config.segment_count),
            registry: PendingRegistry::new(),
            on_segment_finalized_hook,
        }));

        let state2 = state.clone();
        tokio::spawn(async move {
            token.cancelled().await;
            let mut state = state2.lock().await;
            state.is_cancelled = true;
            state.registry.drain_cancelled();
        });

        Self { state }
    }

    async fn lock(&self) -> Option<MutexGuard<ActorState>> {
        let state = self.state.lock().await;
        if state.is_cancelled {
            return None;
        }
        Some(state)
    }

    /// §4.5: a segment the muxer just finalized joins the window.
    pub async fn on_segment_finalized(&self, segment: SegmentFinalized) {
        let Some(mut state) = self.lock().await else {
            return;
        };
        let segment = Arc::new(segment);
        let evicted = state.window.segment_finalized(segment);
        if evicted.0 {
            (state.on_segment_finalized_hook)(state.window.segments());
        }
        let logger = state.logger.clone();
        state.registry.check_pending(&state.window, &logger);
    }

    /// §4.6: a part the muxer just finalized is adopted by the in-progress
    /// segment.
    pub async fn on_part_finalized(&self, part: Arc<PartFinalized>) {
        let Some(mut state) = self.lock().await else {
            return;
        };
        state.window.part_finalized(part);
        let logger = state.logger.clone();
        state.registry.check_pending(&state.window, &logger);
    }

    /// §4.8 dispatch for a resolved `(name, query)` pair.
    #[allow(clippy::case_sensitive_file_extension_comparisons)]
    pub async fn file(&self, name: &str, query: &HlsQuery) -> FileResponse {
        if name == "stream.m3u8" {
            return self.playlist_reader(query).await;
        }
        if name.starts_with("seg") && name.ends_with(".mp4") {
            return self.segment_reader(name).await;
        }
        if name.starts_with("part") && name.ends_with(".mp4") {
            return self.blocking_part(name).await;
        }
        response::NOT_FOUND
    }

    async fn playlist_reader(&self, query: &HlsQuery) -> FileResponse {
        if let Some((msn, part)) = query.msn_and_part {
            return self.blocking_playlist(query.is_delta_update, msn, part).await;
        }

        let Some(state) = self.lock().await else {
            return response::CANCELLED;
        };
        if !state.window.has_content() {
            return response::NOT_FOUND;
        }

        match render_manifest(&state.window, query.is_delta_update) {
            Ok(body) => response::ok_playlist(body.into_bytes()),
            Err(e) => {
                state.logger.log(LogEntry::new(
                    LogLevel::Error,
                    "hls",
                    format!("render playlist: {e}"),
                ));
                response::INTERNAL_ERROR
            }
        }
    }

    /// §4.3 blocking playlist reload.
    async fn blocking_playlist(&self, is_delta_update: bool, msn: u64, part: u64) -> FileResponse {
        let res_rx: oneshot::Receiver<FileResponse>;
        {
            let Some(mut state) = self.lock().await else {
                return response::CANCELLED;
            };

            // §9 resolved open question 2: the literal `next_segment_id + 1`
            // bound is kept (pinned by Scenario 2).
            if msn > state.window.next_segment_id() + 1 {
                return response::BAD_REQUEST;
            }

            if state.window.has_content() && state.window.has_part(msn, part) {
                return match render_manifest(&state.window, is_delta_update) {
                    Ok(body) => response::ok_playlist(body.into_bytes()),
                    Err(e) => {
                        state.logger.log(LogEntry::new(
                            LogLevel::Error,
                            "hls",
                            format!("render playlist: {e}"),
                        ));
                        response::INTERNAL_ERROR
                    }
                };
            }

            let (res_tx, rx) = oneshot::channel();
            res_rx = rx;
            state.registry.park_playlist(PendingPlaylistRequest {
                is_delta_update,
                msn,
                part,
                res_tx,
            });
        }

        // Lock released; park until `check_pending` or cancellation fires.
        res_rx.await.unwrap_or(response::CANCELLED)
    }

    /// §4.4 blocking part fetch, reached only for names starting with
    /// `part`.
    async fn blocking_part(&self, file_name: &str) -> FileResponse {
        let res_rx: oneshot::Receiver<FileResponse>;
        {
            let Some(mut state) = self.lock().await else {
                return response::CANCELLED;
            };

            let Some(base) = file_name.strip_suffix(".mp4") else {
                return response::NOT_FOUND;
            };

            if let Some(part) = state.window.part_by_name(base) {
                return response::ok_media(part.reader());
            }

            if file_name != common::part_name(state.window.next_part_id()) + ".mp4" {
                return response::NOT_FOUND;
            }

            let (res_tx, rx) = oneshot::channel();
            res_rx = rx;
            state.registry.park_part(PendingPartRequest {
                part_name: base.to_owned(),
                part_id: state.window.next_part_id(),
                res_tx,
            });
        }

        res_rx.await.unwrap_or(response::CANCELLED)
    }

    async fn segment_reader(&self, file_name: &str) -> FileResponse {
        let Some(state) = self.lock().await else {
            return response::CANCELLED;
        };

        let Some(base) = file_name.strip_suffix(".mp4") else {
            return response::NOT_FOUND;
        };

        let Some(segment) = state.window.segment_by_name(base) else {
            return response::NOT_FOUND;
        };

        response::ok_media(segment.reader())
    }

    #[cfg(test)]
    pub async fn debug_state(&self) -> PlaylistDebugState {
        #[allow(clippy::unwrap_used)]
        let state = self.lock().await.unwrap();
        PlaylistDebugState {
            num_pending_playlists: state.registry.num_pending_playlists(),
            num_pending_parts: state.registry.num_pending_parts(),
        }
    }
}

#[cfg(test)]
#[derive(Debug)]
pub struct PlaylistDebugState {
    pub num_pending_playlists: usize,
    pub num_pending_parts: usize,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::dispatch::HlsQuery;
    use common::{time::DurationH264, time::UnixH264, DummyLogger};
    use http::StatusCode;

    fn no_op_hook() -> OnSegmentFinalizedHook {
        Box::new(|_| {})
    }

    fn query(msn_and_part: Option<(u64, u64)>) -> HlsQuery {
        HlsQuery {
            msn_and_part,
            is_delta_update: false,
        }
    }

    #[tokio::test]
    async fn test_scenario_1_first_segment_bootstraps_gaps() {
        let actor = PlaylistActor::new(
            CancellationToken::new(),
            DummyLogger::new(),
            PlaylistConfig { segment_count: 3 },
            no_op_hook(),
        );

        let seg = SegmentFinalized::new(
            0,
            UnixH264::default(),
            "seg0".to_owned(),
            Vec::new(),
            DurationH264::new(2 * i64::from(common::time::H264_TIMESCALE)),
        );
        actor.on_segment_finalized(seg).await;

        let resp = actor.file("stream.m3u8", &query(None)).await;
        assert_eq!(StatusCode::OK, resp.status);
        let body = resp.print().await;
        // §4.5 step 3 runs immediately on the gap-padding overflow: 3 gaps +
        // seg0 (4 entries) overflows `segment_count=3` by one, so a single
        // gap is evicted before the playlist is ever rendered, leaving 2
        // gaps and advancing the media sequence to 1.
        assert!(body.contains("#EXT-X-MEDIA-SEQUENCE:1"));
        assert_eq!(2, body.matches("#EXT-X-GAP").count());
        assert!(body.contains("#EXTINF:2.00000,\nseg0.mp4"));
    }

    #[tokio::test]
    async fn test_scenario_2_msn_too_far_ahead_is_rejected() {
        let actor = PlaylistActor::new(
            CancellationToken::new(),
            DummyLogger::new(),
            PlaylistConfig { segment_count: 3 },
            no_op_hook(),
        );

        for id in 0..5 {
            let seg = SegmentFinalized::new(
                id,
                UnixH264::default(),
                format!("seg{id}"),
                Vec::new(),
                DurationH264::new(0),
            );
            actor.on_segment_finalized(seg).await;
        }
        // next_segment_id is now 5.

        let resp = actor.file("stream.m3u8", &query(Some((7, 0)))).await;
        assert_eq!(StatusCode::BAD_REQUEST, resp.status);
    }

    #[tokio::test]
    async fn test_blocking_part_is_unblocked_by_part_finalized() {
        let actor = PlaylistActor::new(
            CancellationToken::new(),
            DummyLogger::new(),
            PlaylistConfig { segment_count: 3 },
            no_op_hook(),
        );

        let waiter = {
            let actor = &actor;
            async move { actor.file("part0.mp4", &query(None)).await }
        };

        let finalize = async {
            // Give the waiter a chance to park first.
            tokio::task::yield_now().await;
            actor
                .on_part_finalized(Arc::new(PartFinalized {
                    id: 0,
                    is_independent: true,
                    rendered_content: Some(bytes::Bytes::from(vec![9, 9, 9])),
                    rendered_duration: DurationH264::new(0),
                }))
                .await;
        };

        let (resp, ()) = tokio::join!(waiter, finalize);
        assert_eq!(StatusCode::OK, resp.status);
    }

    #[tokio::test]
    async fn test_cancellation_drains_pending_with_500() {
        let token = CancellationToken::new();
        let actor = PlaylistActor::new(token.clone(), DummyLogger::new(), PlaylistConfig { segment_count: 1 }, no_op_hook());

        let waiter = actor.file("part0.mp4", &query(None));
        let cancel = async {
            tokio::task::yield_now().await;
            token.cancel();
        };

        let (resp, ()) = tokio::join!(waiter, cancel);
        assert_eq!(StatusCode::INTERNAL_SERVER_ERROR, resp.status);
    }
}
