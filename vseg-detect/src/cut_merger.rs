//! Turns cut indices into contiguous shot ranges

use tracing::debug;
use vseg_core::FrameRange;

/// Collapses cuts that sit too close together and splits a frame span at the rest
#[derive(Debug, Clone, Copy)]
pub struct CutMerger {
    min_gap: usize,
}

impl CutMerger {
    /// `min_gap`: a cut closer than this to the previous surviving cut is dropped
    pub fn new(min_gap: usize) -> Self {
        Self { min_gap }
    }

    /// Cuts that survive merging, in increasing order.
    ///
    /// Cuts outside `(bounds.start, bounds.end]` cannot split the span and are
    /// ignored. The first remaining cut always survives.
    pub fn surviving_cuts(&self, cuts: &[usize], bounds: FrameRange) -> Vec<usize> {
        let mut sorted: Vec<usize> = cuts
            .iter()
            .copied()
            .filter(|&c| c > bounds.start && c <= bounds.end)
            .collect();
        sorted.sort_unstable();
        sorted.dedup();

        let mut kept: Vec<usize> = Vec::with_capacity(sorted.len());
        for cut in sorted {
            if let Some(&last) = kept.last() {
                if cut - last < self.min_gap {
                    debug!(cut, previous = last, min_gap = self.min_gap, "Merging cut into previous shot");
                    continue;
                }
            }
            kept.push(cut);
        }
        kept
    }

    /// Splits `bounds` into closed ranges at the surviving cuts.
    ///
    /// The ranges are ordered, disjoint and cover `bounds` exactly: the first
    /// starts at `bounds.start`, the last ends at `bounds.end`.
    pub fn merge(&self, cuts: &[usize], bounds: FrameRange) -> Vec<FrameRange> {
        let kept = self.surviving_cuts(cuts, bounds);

        let mut ranges = Vec::with_capacity(kept.len() + 1);
        let mut start = bounds.start;
        for cut in kept {
            ranges.push(FrameRange { start, end: cut - 1 });
            start = cut;
        }
        ranges.push(FrameRange {
            start,
            end: bounds.end,
        });
        ranges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vseg_core::is_partition;

    fn span(start: usize, end: usize) -> FrameRange {
        FrameRange { start, end }
    }

    #[test]
    fn test_zero_cuts_is_one_shot() {
        let shots = CutMerger::new(30).merge(&[], span(0, 499));
        assert_eq!(shots, vec![span(0, 499)]);
    }

    #[test]
    fn test_one_cut_splits_in_two() {
        let shots = CutMerger::new(30).merge(&[120], span(0, 499));
        assert_eq!(shots, vec![span(0, 119), span(120, 499)]);
    }

    #[test]
    fn test_cuts_29_frames_apart_merge() {
        let shots = CutMerger::new(30).merge(&[100, 129], span(0, 299));
        assert_eq!(shots, vec![span(0, 99), span(100, 299)]);
    }

    #[test]
    fn test_cuts_31_frames_apart_stay_separate() {
        let shots = CutMerger::new(30).merge(&[100, 131], span(0, 299));
        assert_eq!(shots, vec![span(0, 99), span(100, 130), span(131, 299)]);
    }

    #[test]
    fn test_merge_compares_against_surviving_cut() {
        // 125 is dropped (25 after 100); 140 is 40 after 100 and survives.
        let merger = CutMerger::new(30);
        assert_eq!(merger.surviving_cuts(&[100, 125, 140], span(0, 299)), vec![100, 140]);
    }

    #[test]
    fn test_first_cut_survives_near_start() {
        let shots = CutMerger::new(30).merge(&[5, 200], span(0, 299));
        assert_eq!(shots, vec![span(0, 4), span(5, 199), span(200, 299)]);
    }

    #[test]
    fn test_out_of_range_and_duplicate_cuts_are_ignored() {
        let shots = CutMerger::new(30).merge(&[300, 0, 150, 150, 400], span(0, 299));
        assert_eq!(shots, vec![span(0, 149), span(150, 299)]);
    }

    #[test]
    fn test_respects_non_zero_start() {
        let shots = CutMerger::new(10).merge(&[250, 290, 300], span(200, 400));
        assert_eq!(shots, vec![span(200, 249), span(250, 289), span(290, 299), span(300, 400)]);
    }

    #[test]
    fn test_result_always_partitions_bounds() {
        let merger = CutMerger::new(30);
        let cut_sets: [&[usize]; 5] = [
            &[],
            &[1],
            &[999],
            &[10, 20, 30, 40, 50, 500, 520, 560],
            &[3, 33, 63, 93, 123, 153, 183, 213],
        ];
        for cuts in cut_sets {
            let shots = merger.merge(cuts, span(0, 999));
            assert!(is_partition(&shots, 0, 999), "{cuts:?} -> {shots:?}");
        }
    }

    #[test]
    fn test_single_frame_span() {
        assert_eq!(CutMerger::new(30).merge(&[0], span(0, 0)), vec![span(0, 0)]);
    }
}
