use anyhow::{anyhow, Context, Result};
use arrow::array::StringArray;
use serde::Serialize;
use tracing::{debug, trace};

use super::{MappingLookup, SegmentKey};
use crate::mapping::{
    literal::Literal,
    segments::parse_per_video,
    utils::{
        cell_at, normalize_state, parse_float_cell, parse_int_cell, parse_video_list,
        required_cell,
    },
    MappingTable,
};

/// Everything the mapping knows about one segment of one video.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SegmentRecord {
    pub video_id: String,
    pub start: i64,
    /// End time as stored in the mapping; not truncated.
    pub end: Literal,
    pub time_of_day: Literal,
    pub city: Option<String>,
    /// `"unknown"` when the mapping has no state.
    pub state: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub country: Option<String>,
    /// `gmp / population_city`, or `0.0` when the population is not positive.
    pub gdp_per_capita: f64,
    pub population_city: i64,
    pub population_country: Option<f64>,
    pub traffic_mortality: Option<f64>,
    pub continent: Option<String>,
    pub literacy_rate: Option<f64>,
    pub avg_height: Option<f64>,
    pub iso3: Option<String>,
    pub fps: i64,
    /// Vehicle types for every segment of the matched video.
    pub vehicle_type: Literal,
}

/// GDP per capita from the raw integer values.
pub fn gdp_per_capita(gdp: i64, population: i64) -> f64 {
    if population > 0 {
        gdp as f64 / population as f64
    } else {
        0.0
    }
}

/// The per-video columns of the table, looked up once per scan.
struct VideoColumns<'a> {
    videos: &'a StringArray,
    start_time: &'a StringArray,
    end_time: &'a StringArray,
    time_of_day: &'a StringArray,
    vehicle_type: &'a StringArray,
}

impl<'a> VideoColumns<'a> {
    fn from_table(table: &'a MappingTable) -> Result<Self> {
        Ok(Self {
            videos: table.column("videos")?,
            start_time: table.column("start_time")?,
            end_time: table.column("end_time")?,
            time_of_day: table.column("time_of_day")?,
            vehicle_type: table.column("vehicle_type")?,
        })
    }
}

/// One row's per-video fields, parsed. Times keep their literal form so a
/// fractional start never matches an integer key.
struct RowVideos {
    ids: Vec<String>,
    starts: Vec<Literal>,
    ends: Vec<Literal>,
    time_of_day: Vec<Literal>,
    vehicle_type: Vec<Literal>,
}

impl RowVideos {
    fn parse(cols: &VideoColumns<'_>, row: usize) -> Result<Self> {
        Ok(Self {
            ids: parse_video_list(required_cell(cols.videos, "videos", row)?),
            starts: parse_per_video(
                required_cell(cols.start_time, "start_time", row)?,
                "start_time",
            )?,
            ends: parse_per_video(required_cell(cols.end_time, "end_time", row)?, "end_time")?,
            time_of_day: parse_per_video(
                required_cell(cols.time_of_day, "time_of_day", row)?,
                "time_of_day",
            )?,
            vehicle_type: parse_per_video(
                required_cell(cols.vehicle_type, "vehicle_type", row)?,
                "vehicle_type",
            )?,
        })
    }
}

impl<'a> MappingLookup<'a> {
    /// Find the segment addressed by `key` (`"<video_id>_<start>_<fps>"`).
    ///
    /// Rows, then videos within a row, then segments within a video are
    /// scanned in order and the first segment whose start equals the key's
    /// start wins. `Ok(None)` means nothing matched; a malformed key or a
    /// malformed cell in a scanned row is an error.
    pub fn find_values_with_video_id(&self, key: &str) -> Result<Option<SegmentRecord>> {
        let key: SegmentKey = key.parse()?;
        self.find_segment(&key)
    }

    /// [`MappingLookup::find_values_with_video_id`] with an already parsed key.
    pub fn find_segment(&self, key: &SegmentKey) -> Result<Option<SegmentRecord>> {
        let cols = VideoColumns::from_table(self.table)?;

        for row in 0..self.table.num_rows() {
            let parsed = RowVideos::parse(&cols, row)
                .with_context(|| format!("reading videos of mapping row {}", row))?;

            let videos = parsed
                .ids
                .iter()
                .zip(&parsed.starts)
                .zip(&parsed.ends)
                .zip(&parsed.time_of_day)
                .zip(&parsed.vehicle_type);

            for ((((video, starts), ends), time_of_day), vehicle_type) in videos {
                if *video != key.video_id {
                    continue;
                }
                debug!(video = %video, start = %starts, end = %ends, "finding values");

                let segment_starts = starts.as_seq().ok_or_else(|| {
                    anyhow!(
                        "row {}: `start_time` of {} is not a list: {}",
                        row,
                        video,
                        starts
                    )
                })?;
                let Some(idx) = segment_starts.iter().position(|s| s.equals_int(key.start))
                else {
                    continue;
                };
                let end = ends
                    .as_seq()
                    .and_then(|times| times.get(idx))
                    .cloned()
                    .ok_or_else(|| {
                        anyhow!(
                            "row {}: `end_time` of {} has no segment {}",
                            row,
                            video,
                            idx
                        )
                    })?;
                let tag = time_of_day
                    .as_seq()
                    .and_then(|tags| tags.get(idx))
                    .cloned()
                    .ok_or_else(|| {
                        anyhow!(
                            "row {}: `time_of_day` of {} has no segment {}",
                            row,
                            video,
                            idx
                        )
                    })?;

                trace!(row, segment = idx, "segment matched");
                let record = self
                    .build_record(row, key, end, tag, vehicle_type.clone())
                    .with_context(|| format!("reading attributes of mapping row {}", row))?;
                return Ok(Some(record));
            }
        }

        debug!(%key, "no segment found");
        Ok(None)
    }

    fn build_record(
        &self,
        row: usize,
        key: &SegmentKey,
        end: Literal,
        time_of_day: Literal,
        vehicle_type: Literal,
    ) -> Result<SegmentRecord> {
        let table = self.table;
        let text = |name: &str| -> Result<Option<String>> {
            Ok(table.cell(name, row)?.map(str::to_string))
        };
        let float = |name: &str| -> Result<Option<f64>> {
            parse_float_cell(table.cell(name, row)?, name)
        };

        let population = parse_int_cell(
            required_cell(table.column("population_city")?, "population_city", row)?,
            "population_city",
        )?;
        let gdp_capita = if population > 0 {
            let gdp = parse_int_cell(required_cell(table.column("gmp")?, "gmp", row)?, "gmp")?;
            gdp_per_capita(gdp, population)
        } else {
            0.0
        };

        Ok(SegmentRecord {
            video_id: key.video_id.clone(),
            start: key.start,
            end,
            time_of_day,
            city: text("city")?,
            state: normalize_state(cell_at(table.column("state")?, row)).to_string(),
            lat: float("lat")?,
            lon: float("lon")?,
            country: text("country")?,
            gdp_per_capita: gdp_capita,
            population_city: population,
            population_country: float("population_country")?,
            traffic_mortality: float("traffic_mortality")?,
            continent: text("continent")?,
            literacy_rate: float("literacy_rate")?,
            avg_height: float("avg_height")?,
            iso3: text("iso3")?,
            fps: key.fps,
            vehicle_type,
        })
    }
}
