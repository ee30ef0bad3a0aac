//! A Low-Latency HLS playlist core: tracks a sliding window of finalized
//! segments and parts handed to it by an external muxer, serves
//! `stream.m3u8` (with blocking reload, preload hints and delta updates)
//! and serves back segment/part byte ranges, without itself touching disk,
//! H.264/MP4 encoding, or any particular HTTP framework.

mod actor;
mod dispatch;
mod error;
mod registry;
mod render;
mod response;
mod window;

pub use actor::{OnSegmentFinalizedHook, PlaylistActor, PlaylistConfig};
pub use dispatch::HlsQuery;
pub use error::{DispatchError, RenderError};
pub use render::{avc1_codec, codec_list, mp4a_codec, primary_playlist, render_manifest};
pub use response::FileResponse;
pub use window::{Gap, SegmentOrGap, Window};
