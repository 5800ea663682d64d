use crate::types::Interval;

/// Drop intervals that never grew past their start
pub fn drop_degenerate(intervals: Vec<Interval>) -> Vec<Interval> {
    let before = intervals.len();
    let kept: Vec<Interval> = intervals
        .into_iter()
        .filter(|interval| !interval.is_degenerate())
        .collect();
    if kept.len() < before {
        log::debug!("dropped {} zero-duration intervals", before - kept.len());
    }
    kept
}
