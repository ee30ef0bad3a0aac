//! Pure rendering of `stream.m3u8` from a window snapshot (§4.2), and of the
//! primary (master) playlist, a stateless boundary format (§6) that this
//! crate does not serve itself but provides as a convenience for embedders.

use crate::{
    error::RenderError,
    window::{SegmentOrGap, Window},
};
use common::time::DurationH264;

/// Renders the full or delta-update media playlist body for `window`.
///
/// The `#EXT-X-PRELOAD-HINT` line is always emitted, even against an empty
/// `next_segment_parts` — some clients (notably `hls.js`) loop on reload if
/// it is ever missing (§9).
pub fn render_manifest(window: &Window, is_delta_update: bool) -> Result<String, RenderError> {
    let mut out = String::from("#EXTM3U\n#EXT-X-VERSION:9\n");

    let target_duration = window.target_duration();
    out += &format!("#EXT-X-TARGETDURATION:{target_duration}\n");

    let skip_boundary = f64::from(u32::try_from(target_duration)?) * 6.0;
    let part_target_duration = window.part_target_duration();

    out += "#EXT-X-SERVER-CONTROL:CAN-BLOCK-RELOAD=YES";
    out += &format!(
        ",PART-HOLD-BACK={:.5}",
        part_target_duration.as_secs_f64() * 2.5
    );
    out += &format!(",CAN-SKIP-UNTIL={skip_boundary}\n");

    out += &format!(
        "#EXT-X-PART-INF:PART-TARGET={}\n",
        part_target_duration.as_secs_f64()
    );

    out += &format!("#EXT-X-MEDIA-SEQUENCE:{}\n", window.segment_delete_count());

    let segments = window.segments();
    let mut skipped = 0;
    if is_delta_update {
        let mut cur_duration = DurationH264::new(0);
        let mut shown = 0;
        for sog in segments {
            cur_duration = cur_duration
                .checked_add(sog.duration())
                .ok_or(RenderError::DurationOverflow)?;
            if cur_duration.as_secs_f64() >= skip_boundary {
                break;
            }
            shown += 1;
        }
        skipped = segments.len() - shown;
        out += &format!("#EXT-X-SKIP:SKIPPED-SEGMENTS={skipped}\n");
    } else {
        out += "#EXT-X-MAP:URI=\"init.mp4\"\n";
    }

    for (i, sog) in segments.iter().enumerate() {
        if i < skipped {
            continue;
        }

        match sog {
            SegmentOrGap::Segment(seg) => {
                if (segments.len() - i) <= 2 {
                    let start_time = seg.start_time().as_chrono();
                    if let Some(start_time) = start_time {
                        out += &format!(
                            "#EXT-X-PROGRAM-DATE-TIME:{}Z\n",
                            start_time.format("%Y-%m-%dT%H:%M:%S%.3f")
                        );
                    }

                    for part in seg.parts() {
                        out += &format!(
                            "#EXT-X-PART:DURATION={:.5},URI=\"{}.mp4\"",
                            part.rendered_duration.as_secs_f64(),
                            part.name(),
                        );
                        if part.is_independent {
                            out += ",INDEPENDENT=YES";
                        }
                        out += "\n";
                    }
                }

                out += &format!("#EXTINF:{:.5},\n", seg.duration().as_secs_f64());
                out += &format!("{}.mp4\n", seg.name());
            }
            SegmentOrGap::Gap(gap) => {
                out += "#EXT-X-GAP\n";
                out += &format!("#EXTINF:{:.5},\n", gap.0.as_secs_f64());
                out += "gap.mp4\n";
            }
        }
    }

    for part in window.next_segment_parts() {
        out += &format!(
            "#EXT-X-PART:DURATION={:.5},URI=\"{}.mp4\"",
            part.rendered_duration.as_secs_f64(),
            part.name(),
        );
        if part.is_independent {
            out += ",INDEPENDENT=YES";
        }
        out += "\n";
    }

    out += &format!(
        "#EXT-X-PRELOAD-HINT:TYPE=PART,URI=\"{}.mp4\"\n",
        common::part_name(window.next_part_id()),
    );

    Ok(out)
}

/// Builds the `#EXT-X-STREAM-INF` primary playlist body (§6). Not reachable
/// through [`crate::dispatch::dispatch`] — the master playlist is generated
/// from codec metadata alone and has no window state, so an embedder is
/// expected to call this directly from wherever it tracks codec info.
#[must_use]
pub fn primary_playlist(codec: &str) -> Vec<u8> {
    [
        "#EXTM3U\n",
        "#EXT-X-VERSION:9\n",
        "#EXT-X-INDEPENDENT-SEGMENTS\n",
        "\n",
        &format!("#EXT-X-STREAM-INF:BANDWIDTH=200000,CODECS=\"{codec}\"\n"),
        "stream.m3u8\n",
    ]
    .join("")
    .into_bytes()
}

/// `avc1.` codec string from the first four bytes of a SPS NAL unit: hex of
/// `sps[1..4]` (profile_idc, constraint flags, level_idc). Grounded on the
/// `avc1.{:02x}{:02x}{:02x}` convention other HLS muxers use when deriving
/// this from raw SPS bytes rather than a parsed parameter set.
#[must_use]
pub fn avc1_codec(sps: &[u8]) -> Option<String> {
    if sps.len() < 4 {
        return None;
    }
    Some(format!("avc1.{:02x}{:02x}{:02x}", sps[1], sps[2], sps[3]))
}

/// `mp4a.40.<audioType>` codec string for an MPEG-4 audio object type.
#[must_use]
pub fn mp4a_codec(audio_object_type: u8) -> String {
    format!("mp4a.40.{audio_object_type}")
}

/// Joins whichever of the video/audio codec strings are present, per §6's
/// `<list>` rule, in `avc1,mp4a` order.
#[must_use]
pub fn codec_list(video_sps: Option<&[u8]>, audio_object_type: Option<u8>) -> String {
    let mut parts = Vec::new();
    if let Some(sps) = video_sps {
        if let Some(avc1) = avc1_codec(sps) {
            parts.push(avc1);
        }
    }
    if let Some(audio_object_type) = audio_object_type {
        parts.push(mp4a_codec(audio_object_type));
    }
    parts.join(",")
}
