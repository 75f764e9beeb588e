use anyhow::{anyhow, Context, Result};

use super::literal::{parse_literal, Literal};

/// Per video, the start (or end) second of each segment.
pub type SegmentTimes = Vec<Vec<i64>>;

/// Parse a cell holding an outer list with one entry per video.
pub fn parse_per_video(raw: &str, column: &str) -> Result<Vec<Literal>> {
    parse_literal(raw)
        .with_context(|| format!("parsing `{}`", column))?
        .into_seq()
        .ok_or_else(|| anyhow!("`{}` is not a list: {:?}", column, raw))
}

/// Parse a `start_time`/`end_time` style cell, e.g. `[[0, 10], [3]]`.
pub fn parse_segment_times(raw: &str, column: &str) -> Result<SegmentTimes> {
    parse_per_video(raw, column)?
        .iter()
        .enumerate()
        .map(|(video_idx, entry)| -> Result<Vec<i64>> {
            let segments = entry.as_seq().ok_or_else(|| {
                anyhow!(
                    "`{}` entry {} is not a list of times: {}",
                    column,
                    video_idx,
                    entry
                )
            })?;
            segments
                .iter()
                .map(|t| {
                    t.as_i64().ok_or_else(|| {
                        anyhow!(
                            "`{}` entry {} holds a non-numeric time: {}",
                            column,
                            video_idx,
                            t
                        )
                    })
                })
                .collect()
        })
        .collect()
}

/// Sum of `end - start` over every segment of every video.
///
/// Videos and segments are paired up to the shorter side. Negative
/// durations are kept; a difference or running total that leaves the `i64`
/// range is an error.
pub fn total_duration(
    starts: &[Vec<i64>],
    ends: &[Vec<i64>],
    start_col: &str,
    end_col: &str,
) -> Result<i64> {
    let mut total: i64 = 0;
    for (video_idx, (s, e)) in starts.iter().zip(ends).enumerate() {
        for (start, end) in s.iter().zip(e) {
            let duration = end.checked_sub(*start).ok_or_else(|| {
                anyhow!(
                    "`{}` - `{}` overflows for video {}: {} - {}",
                    end_col,
                    start_col,
                    video_idx,
                    end,
                    start
                )
            })?;
            total = total.checked_add(duration).ok_or_else(|| {
                anyhow!(
                    "total of `{}` / `{}` overflows at video {}",
                    start_col,
                    end_col,
                    video_idx
                )
            })?;
        }
    }
    Ok(total)
}

/// [`total_duration`] straight from the two raw cells.
pub fn cell_duration(start_raw: &str, end_raw: &str, start_col: &str, end_col: &str) -> Result<i64> {
    let starts = parse_segment_times(start_raw, start_col)?;
    let ends = parse_segment_times(end_raw, end_col)?;
    total_duration(&starts, &ends, start_col, end_col)
}
