//! The sliding window of finalized segments and parts (§3, §4.5, §4.6).
//!
//! `Window` is the only piece of state the [`crate::actor::PlaylistActor`]
//! mutates on ingest; the manifest renderer (`crate::render`) is a pure
//! function over a `&Window` snapshot.

use common::{
    time::{DurationH264, SECOND},
    PartFinalized, SegmentFinalized,
};
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};

/// Placeholder segment inserted before any real history exists, so that
/// media-sequence alignment behaves correctly for players that pre-buffer a
/// few segments. Carries the duration of the first real segment seen (§9,
/// note 3) rather than of any absent prior segment.
#[derive(Debug)]
pub struct Gap(pub DurationH264);

#[derive(Debug)]
pub enum SegmentOrGap {
    Segment(Arc<SegmentFinalized>),
    Gap(Gap),
}

impl SegmentOrGap {
    #[must_use]
    pub fn duration(&self) -> DurationH264 {
        match self {
            SegmentOrGap::Segment(seg) => seg.duration(),
            SegmentOrGap::Gap(gap) => gap.0,
        }
    }
}

/// The result of folding a just-finalized segment into the window: whether
/// the head had to be evicted to stay within `segment_count`, handed back so
/// the caller can run the externally supplied eviction hook (§4.5 step 4).
pub struct Evicted(pub bool);

pub struct Window {
    segment_count: usize,
    segments: VecDeque<SegmentOrGap>,
    segments_by_name: HashMap<String, Arc<SegmentFinalized>>,
    parts_by_name: HashMap<String, Arc<PartFinalized>>,
    segment_delete_count: usize,
    next_segment_id: u64,
    next_segment_parts: Vec<Arc<PartFinalized>>,
    next_part_id: u64,
}

impl Window {
    #[must_use]
    pub fn new(segment_count: usize) -> Self {
        Self {
            segment_count,
            segments: VecDeque::new(),
            segments_by_name: HashMap::new(),
            parts_by_name: HashMap::new(),
            segment_delete_count: 0,
            next_segment_id: 0,
            next_segment_parts: Vec::new(),
            next_part_id: 0,
        }
    }

    #[must_use]
    pub fn has_content(&self) -> bool {
        !self.segments.is_empty()
    }

    #[must_use]
    pub fn segments(&self) -> &VecDeque<SegmentOrGap> {
        &self.segments
    }

    #[must_use]
    pub fn next_segment_parts(&self) -> &[Arc<PartFinalized>] {
        &self.next_segment_parts
    }

    #[must_use]
    pub fn next_part_id(&self) -> u64 {
        self.next_part_id
    }

    #[must_use]
    pub fn next_segment_id(&self) -> u64 {
        self.next_segment_id
    }

    #[must_use]
    pub fn segment_delete_count(&self) -> usize {
        self.segment_delete_count
    }

    #[must_use]
    pub fn segment_by_name(&self, name: &str) -> Option<&Arc<SegmentFinalized>> {
        self.segments_by_name.get(name)
    }

    #[must_use]
    pub fn part_by_name(&self, name: &str) -> Option<&Arc<PartFinalized>> {
        self.parts_by_name.get(name)
    }

    /// The LL-HLS availability check (§4.3). Rolls over to part 0 of the
    /// next parent segment when `part` is beyond the end of `msn`'s parts.
    #[must_use]
    pub fn has_part(&self, mut msn: u64, mut part: u64) -> bool {
        if !self.has_content() {
            return false;
        }

        for sog in &self.segments {
            let SegmentOrGap::Segment(seg) = sog else {
                continue;
            };

            if msn != seg.id() {
                continue;
            }

            let Ok(num_parts) = u64::try_from(seg.parts().len()) else {
                return false;
            };
            if part >= num_parts {
                msn += 1;
                part = 0;
                continue;
            }

            return true;
        }

        if msn != self.next_segment_id {
            return false;
        }

        let Ok(num_next_parts) = u64::try_from(self.next_segment_parts.len()) else {
            return false;
        };
        part < num_next_parts
    }

    /// §4.5: absorb a just-finalized segment, pre-filling gaps on first
    /// arrival and evicting the head if the window overflows its capacity.
    pub fn segment_finalized(&mut self, segment: Arc<SegmentFinalized>) -> Evicted {
        if self.segments.is_empty() {
            for _ in 0..self.segment_count {
                self.segments
                    .push_back(SegmentOrGap::Gap(Gap(segment.duration())));
            }
        }

        self.segments_by_name
            .insert(segment.name().to_owned(), segment.clone());
        self.segments.push_back(SegmentOrGap::Segment(segment.clone()));

        self.next_segment_id = segment.id() + 1;
        self.next_segment_parts.clear();

        if self.segments.len() > self.segment_count {
            let evicted = self.segments.pop_front().expect("len > 0");

            if let SegmentOrGap::Segment(evicted_seg) = evicted {
                for part in evicted_seg.parts() {
                    self.parts_by_name.remove(&part.name());
                }
                self.segments_by_name.remove(evicted_seg.name());
            }

            self.segment_delete_count += 1;
            return Evicted(true);
        }

        Evicted(false)
    }

    /// §4.6: a part is conceptually adopted by the segment currently being
    /// assembled; `next_segment_parts` is only cleared when that segment is
    /// itself finalized.
    pub fn part_finalized(&mut self, part: Arc<PartFinalized>) {
        self.parts_by_name.insert(part.name(), part.clone());
        self.next_segment_parts.push(part.clone());
        self.next_part_id = part.id + 1;
    }

    /// §4.2 `T`: the largest rendered duration in the window, rounded up to
    /// whole seconds. A ceiling (rather than nearest-with-ties-to-even)
    /// rounding is used deliberately — it is the one choice that can never
    /// violate testable property 5 (`TARGETDURATION >= round(EXTINF)`)
    /// regardless of how a given duration happens to round.
    #[must_use]
    pub fn target_duration(&self) -> i64 {
        let mut ret: i64 = 0;
        for sog in &self.segments {
            let v = div_up(sog.duration().as_nanos(), SECOND);
            if v > ret {
                ret = v;
            }
        }
        ret
    }

    /// §4.2 `PT`: the largest part duration among segments in the window
    /// and the not-yet-closed `next_segment_parts`.
    #[must_use]
    pub fn part_target_duration(&self) -> DurationH264 {
        let mut ret = DurationH264::new(0);

        for sog in &self.segments {
            let SegmentOrGap::Segment(seg) = sog else {
                continue;
            };
            for part in seg.parts() {
                if part.rendered_duration > ret {
                    ret = part.rendered_duration;
                }
            }
        }

        for part in &self.next_segment_parts {
            if part.rendered_duration > ret {
                ret = part.rendered_duration;
            }
        }

        ret
    }
}

fn div_up(a: i64, b: i64) -> i64 {
    (a + (b - 1)) / b
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use common::time::UnixH264;

    #[test]
    fn test_first_segment_bootstraps_gaps() {
        let mut window = Window::new(3);
        assert!(!window.has_content());

        let seg = Arc::new(SegmentFinalized::new(
            0,
            UnixH264::default(),
            "seg0".to_owned(),
            Vec::new(),
            DurationH264::new(2 * i64::from(common::time::H264_TIMESCALE)),
        ));
        let evicted = window.segment_finalized(seg);

        // §4.5 step 3 runs unconditionally on overflow, even against the
        // gaps just pre-filled in step 1: 3 gaps + seg0 overflows a
        // `segment_count` of 3, so one gap is evicted immediately.
        assert!(window.has_content());
        assert!(evicted.0);
        assert_eq!(3, window.segments().len());
        assert_eq!(1, window.segment_delete_count());
        assert_eq!(1, window.next_segment_id());
    }

    #[test]
    fn test_eviction_drops_part_bytes() {
        let mut window = Window::new(3);
        for id in 0..4 {
            let part = Arc::new(PartFinalized {
                id,
                is_independent: true,
                rendered_content: Some(bytes::Bytes::from(vec![1, 2, 3])),
                rendered_duration: DurationH264::new(0),
            });
            window.part_finalized(part.clone());

            let seg = Arc::new(SegmentFinalized::new(
                id,
                UnixH264::default(),
                format!("seg{id}"),
                vec![part],
                DurationH264::new(0),
            ));
            // Every call here overflows: the initial gap padding alone
            // already exceeds `segment_count`, so the head (a gap, then
            // seg0 once the gaps are gone) is evicted on every iteration.
            let evicted = window.segment_finalized(seg);
            assert!(evicted.0);
        }

        // 3 gap evictions (id 0..=2) + 1 real eviction (seg0, at id 3).
        assert_eq!(4, window.segment_delete_count());
        assert!(window.segment_by_name("seg0").is_none());
        assert!(window.part_by_name("part0").is_none());
        assert!(window.segment_by_name("seg3").is_some());
        assert!(window.part_by_name("part3").is_some());
    }

    #[test]
    fn test_has_part_rollover() {
        let mut window = Window::new(3);
        let part = Arc::new(PartFinalized {
            id: 0,
            is_independent: true,
            rendered_content: None,
            rendered_duration: DurationH264::new(0),
        });
        window.part_finalized(part.clone());
        let seg4 = Arc::new(SegmentFinalized::new(
            4,
            UnixH264::default(),
            "seg4".to_owned(),
            vec![part.clone(), part.clone(), part],
            DurationH264::new(0),
        ));
        window.segment_finalized(seg4);

        // Segment 4 only has 3 parts (indices 0..=2); part 5 rolls over to
        // segment 5 part 0, which doesn't exist yet.
        assert!(!window.has_part(4, 5));
        assert!(window.has_part(4, 0));
    }
}
