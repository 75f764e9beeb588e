use anyhow::{bail, Context, Result};
use std::{fmt, str::FromStr};

/// Address of one segment: `"<video_id>_<start>_<fps>"`.
///
/// The video id may contain underscores, so the key is split from the
/// right and only the last two fields are numeric.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentKey {
    pub video_id: String,
    pub start: i64,
    pub fps: i64,
}

impl FromStr for SegmentKey {
    type Err = anyhow::Error;

    fn from_str(key: &str) -> Result<Self> {
        let mut parts = key.rsplitn(3, '_');
        let (fps, start, video_id) = match (parts.next(), parts.next(), parts.next()) {
            (Some(fps), Some(start), Some(video_id)) => (fps, start, video_id),
            _ => bail!(
                "segment key {:?} must look like <video_id>_<start>_<fps>",
                key
            ),
        };

        let start = start
            .trim()
            .parse::<i64>()
            .with_context(|| format!("start time {:?} in key {:?}", start, key))?;
        let fps = fps
            .trim()
            .parse::<i64>()
            .with_context(|| format!("fps {:?} in key {:?}", fps, key))?;

        Ok(SegmentKey {
            video_id: video_id.to_string(),
            start,
            fps,
        })
    }
}

impl fmt::Display for SegmentKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}_{}", self.video_id, self.start, self.fps)
    }
}
