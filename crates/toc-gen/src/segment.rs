//! Duration segmentation for providers with a fixed set of clip lengths
//!
//! A provider that only renders e.g. 4, 6 or 8 second clips cannot produce a
//! 10 or 14 second scene in one call. The planner picks the sequence of calls
//! whose total reaches the desired length with the least overshoot (then the
//! fewest calls); the caller concatenates the clips and trims the result.

use serde::Serialize;
use toc_core::{Result, TocError};

/// Clip lengths for each provider call, and the length to trim the joined clip to
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SegmentPlan {
    pub segments: Vec<u32>,
    /// `None` when the segments add up to the desired length exactly
    pub trim_to: Option<u32>,
}

impl SegmentPlan {
    pub fn total(&self) -> u32 {
        self.segments.iter().sum()
    }

    pub fn is_single(&self) -> bool {
        self.segments.len() == 1
    }
}

/// Longest scene or clip, in seconds, the planner accepts
pub const MAX_PLAN_SECONDS: u32 = 3600;

/// Plan provider calls covering `desired_seconds`
///
/// A non-positive duration yields one clip of the shortest allowed length,
/// trimmed to that same length.
pub fn plan_segments(desired_seconds: i64, allowed: &[u32]) -> Result<SegmentPlan> {
    let mut allowed: Vec<u32> = allowed.iter().copied().filter(|d| *d > 0).collect();
    allowed.sort_unstable();
    allowed.dedup();
    let (Some(&min), Some(&max)) = (allowed.first(), allowed.last()) else {
        return Err(TocError::Config(
            "No positive clip durations to plan segments with".to_string(),
        ));
    };
    if max > MAX_PLAN_SECONDS {
        return Err(TocError::Config(format!(
            "Clip duration {}s exceeds the {}s limit",
            max, MAX_PLAN_SECONDS
        )));
    }

    if desired_seconds <= 0 {
        return Ok(SegmentPlan {
            segments: vec![min],
            trim_to: Some(min),
        });
    }
    if desired_seconds > i64::from(MAX_PLAN_SECONDS) {
        return Err(TocError::Config(format!(
            "Duration {}s exceeds the {}s limit",
            desired_seconds, MAX_PLAN_SECONDS
        )));
    }
    let desired = desired_seconds as usize;
    if allowed.iter().any(|d| *d as usize == desired) {
        return Ok(SegmentPlan {
            segments: vec![desired as u32],
            trim_to: None,
        });
    }

    // Fewest clips reaching each total, plus the last clip used to get there;
    // desired + max always has one
    let limit = desired + max as usize;
    let mut count: Vec<Option<usize>> = vec![None; limit + 1];
    let mut last = vec![0u32; limit + 1];
    count[0] = Some(0);
    for total in 0..=limit {
        let Some(current) = count[total] else {
            continue;
        };
        for &d in &allowed {
            let next = total + d as usize;
            if next > limit {
                continue;
            }
            if count[next].map_or(true, |existing| current + 1 < existing) {
                count[next] = Some(current + 1);
                last[next] = d;
            }
        }
    }

    // Totals are scanned upward, so the first reachable one has the least overshoot
    let total = (desired..=limit)
        .find(|total| count[*total].is_some())
        .ok_or_else(|| {
            TocError::Config(format!("Cannot plan segments for {}s", desired_seconds))
        })?;

    let mut segments = Vec::new();
    let mut cursor = total;
    while cursor > 0 {
        let d = last[cursor];
        segments.push(d);
        cursor -= d as usize;
    }
    segments.reverse();

    Ok(SegmentPlan {
        segments,
        trim_to: (total != desired).then_some(desired as u32),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const VEO: &[u32] = &[4, 6, 8];

    #[test]
    fn test_exact_allowed_duration() {
        let plan = plan_segments(6, VEO).unwrap();
        assert_eq!(plan.segments, vec![6]);
        assert_eq!(plan.trim_to, None);
        assert!(plan.is_single());
    }

    #[test]
    fn test_sum_without_trim() {
        let plan = plan_segments(10, VEO).unwrap();
        assert_eq!(plan.total(), 10);
        assert_eq!(plan.segments.len(), 2);
        assert_eq!(plan.trim_to, None);
    }

    #[test]
    fn test_overshoot_is_trimmed() {
        let plan = plan_segments(7, VEO).unwrap();
        assert_eq!(plan.segments, vec![8]);
        assert_eq!(plan.trim_to, Some(7));

        let plan = plan_segments(3, VEO).unwrap();
        assert_eq!(plan.segments, vec![4]);
        assert_eq!(plan.trim_to, Some(3));
    }

    #[test]
    fn test_fewest_segments_for_long_scene() {
        let plan = plan_segments(20, VEO).unwrap();
        assert_eq!(plan.total(), 20);
        assert_eq!(plan.segments.len(), 3);
        assert_eq!(plan.trim_to, None);

        let odd = plan_segments(15, VEO).unwrap();
        assert_eq!(odd.total(), 16);
        assert_eq!(odd.segments.len(), 2);
        assert_eq!(odd.trim_to, Some(15));
    }

    #[test]
    fn test_non_positive_uses_shortest_clip() {
        for desired in [0, -5] {
            let plan = plan_segments(desired, VEO).unwrap();
            assert_eq!(plan.segments, vec![4]);
            assert_eq!(plan.trim_to, Some(4));
        }
    }

    #[test]
    fn test_allowed_set_is_normalized() {
        let plan = plan_segments(12, &[8, 0, 4, 4]).unwrap();
        assert_eq!(plan.total(), 12);
        assert_eq!(plan.segments.len(), 2);
        assert!(plan_segments(5, &[]).is_err());
        assert!(plan_segments(5, &[0]).is_err());
    }

    #[test]
    fn test_oversized_inputs_are_rejected() {
        let err = plan_segments(5, &[4, u32::MAX]).unwrap_err();
        assert!(err.to_string().contains("exceeds"));
        assert!(plan_segments(i64::from(MAX_PLAN_SECONDS) + 1, VEO).is_err());

        let longest = plan_segments(i64::from(MAX_PLAN_SECONDS), VEO).unwrap();
        assert_eq!(longest.total(), MAX_PLAN_SECONDS);
        assert_eq!(longest.segments.len(), 450);
    }
}
