//! Contract with the upload/queue side of the pipeline.
//!
//! Nothing here talks to the network. These helpers decode queued job
//! messages, pull metadata out of uploaded video names, lay out where the
//! annotated video goes, and shape the analysis record the backend stores.

use serde::Serialize;

use crate::analysis::Summary;
use crate::counter::RepResult;
use crate::error::JobError;
use crate::score::LabelCounts;

/// Prefix under which annotated videos are stored.
pub const RESULT_ROOT: &str = "fitvideoresult";
const ANALYZED_SUFFIX: &str = "_analyzed.mp4";

/// Object key named by a queue message: either a storage event
/// (`Records[0].s3.object.key`, URL-encoded) or a direct `video_key`.
pub fn object_key_from_message(body: &str) -> Result<String, JobError> {
    let v: serde_json::Value =
        serde_json::from_str(body).map_err(|e| JobError::BadBody(e.to_string()))?;

    if let Some(key) = v
        .get("Records")
        .and_then(|r| r.get(0))
        .and_then(|r| r.pointer("/s3/object/key"))
        .and_then(|k| k.as_str())
    {
        return Ok(unquote_plus(key));
    }
    if let Some(key) = v.get("video_key").and_then(|k| k.as_str()) {
        return Ok(key.to_string());
    }

    let keys = v
        .as_object()
        .map(|o| o.keys().cloned().collect())
        .unwrap_or_default();
    Err(JobError::UnknownMessage(keys))
}

fn unquote_plus(s: &str) -> String {
    let spaced = s.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => spaced,
    }
}

/// Our own annotated uploads land in the same bucket; never re-analyze them.
pub fn is_analyzed_output(key: &str) -> bool {
    key.ends_with(ANALYZED_SUFFIX)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoMeta {
    pub user_id: u64,
    pub user_name: String,
    pub load_kg: f64,
    /// `yyyyMMddHHmmssSSS`
    pub timestamp: String,
}

impl VideoMeta {
    /// Parses `"{user_id}_{user_name}_{load_kg}_{timestamp}.mp4"`; any
    /// directory part of the key is ignored.
    pub fn from_key(key: &str) -> Result<Self, JobError> {
        let filename = key.rsplit('/').next().unwrap_or(key);
        let base = filename.strip_suffix(".mp4").unwrap_or(filename);
        let bad = || JobError::BadFilename(filename.to_string());

        let parts: Vec<&str> = base.split('_').collect();
        if parts.len() < 4 {
            return Err(bad());
        }
        Ok(Self {
            user_id: parts[0].parse().map_err(|_| bad())?,
            user_name: parts[1].to_string(),
            load_kg: parts[2].parse().map_err(|_| bad())?,
            timestamp: parts[3].to_string(),
        })
    }

    pub fn day(&self) -> &str {
        self.timestamp.get(..8).unwrap_or(&self.timestamp)
    }

    /// Folder holding every set of `exercise` recorded that day.
    pub fn day_prefix(&self, exercise: Exercise) -> String {
        format!(
            "{RESULT_ROOT}/{}_{}/{}/{}/",
            self.user_id,
            self.user_name,
            self.day(),
            exercise.dir_name()
        )
    }

    /// Key for the annotated video of the next set, given how many sets
    /// are already stored under `day_prefix`.
    pub fn analyzed_key(&self, exercise: Exercise, existing_sets: usize) -> String {
        format!(
            "{}set{}_{}.mp4",
            self.day_prefix(exercise),
            existing_sets + 1,
            self.timestamp
        )
    }
}

/// Counts stored set videos among listed keys.
pub fn count_sets<'a>(keys: impl IntoIterator<Item = &'a str>) -> usize {
    keys.into_iter()
        .filter(|k| k.to_ascii_lowercase().ends_with(".mp4") && k.contains("/set"))
        .count()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exercise {
    Deadlift,
    Squat,
    BenchPress,
}

impl Exercise {
    pub fn from_id(id: u32) -> Result<Self, JobError> {
        match id {
            1 => Ok(Exercise::Deadlift),
            2 => Ok(Exercise::Squat),
            3 => Ok(Exercise::BenchPress),
            other => Err(JobError::UnknownExercise(other)),
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "deadlift" => Some(Exercise::Deadlift),
            "squat" => Some(Exercise::Squat),
            "bench_press" => Some(Exercise::BenchPress),
            _ => None,
        }
    }

    pub fn id(self) -> u32 {
        match self {
            Exercise::Deadlift => 1,
            Exercise::Squat => 2,
            Exercise::BenchPress => 3,
        }
    }

    pub fn dir_name(self) -> &'static str {
        match self {
            Exercise::Deadlift => "deadlift",
            Exercise::Squat => "squat",
            Exercise::BenchPress => "bench_press",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Feedback {
    pub depth: String,
    pub alignment: String,
    pub score: u32,
    pub counts: LabelCounts,
}

/// Body of the backend's "attach analysis to workout" call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisPayload {
    pub rep_cnt: u32,
    pub feedback: Feedback,
    pub rep_results: Vec<RepResult>,
    pub analyzed_video_key: Option<String>,
}

impl AnalysisPayload {
    pub fn new(summary: &Summary, analyzed_video_key: Option<String>) -> Self {
        Self {
            rep_cnt: summary.total_count,
            feedback: Feedback {
                depth: summary.grade.clone(),
                alignment: "auto".to_string(),
                score: summary.score,
                counts: summary.counts,
            },
            rep_results: summary.rep_results.clone(),
            analyzed_video_key,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{DetectionStats, Summary};
    use crate::counter::RepLabel;

    #[test]
    fn storage_event_key_is_unquoted() {
        let body = r#"{"Records":[{"s3":{"object":{"key":"uploads/7_kim+lee_60.5_20250102101500123.mp4"}}}]}"#;
        assert_eq!(
            object_key_from_message(body).unwrap(),
            "uploads/7_kim lee_60.5_20250102101500123.mp4"
        );

        let body = r#"{"Records":[{"s3":{"object":{"key":"a%2Fb.mp4"}}}]}"#;
        assert_eq!(object_key_from_message(body).unwrap(), "a/b.mp4");
    }

    #[test]
    fn direct_video_key() {
        let body = r#"{"video_key": "7_kim_60_20250102101500123.mp4"}"#;
        assert_eq!(
            object_key_from_message(body).unwrap(),
            "7_kim_60_20250102101500123.mp4"
        );
    }

    #[test]
    fn unknown_message_lists_keys() {
        assert_eq!(
            object_key_from_message(r#"{"hello": 1}"#),
            Err(JobError::UnknownMessage(vec!["hello".to_string()]))
        );
        assert!(matches!(
            object_key_from_message("not json"),
            Err(JobError::BadBody(_))
        ));
    }

    #[test]
    fn skips_our_own_output() {
        assert!(is_analyzed_output("x/7_kim_60_1_analyzed.mp4"));
        assert!(!is_analyzed_output("x/7_kim_60_1.mp4"));
    }

    #[test]
    fn parses_video_filename() {
        let m = VideoMeta::from_key("uploads/42_park_80.5_20250315093000999.mp4").unwrap();
        assert_eq!(m.user_id, 42);
        assert_eq!(m.user_name, "park");
        assert_eq!(m.load_kg, 80.5);
        assert_eq!(m.day(), "20250315");

        assert!(VideoMeta::from_key("42_park_80.mp4").is_err());
        assert!(VideoMeta::from_key("abc_park_80_2025.mp4").is_err());
        assert!(VideoMeta::from_key("1_park_heavy_2025.mp4").is_err());
    }

    #[test]
    fn analyzed_key_layout() {
        let m = VideoMeta::from_key("42_park_80_20250315093000999.mp4").unwrap();
        assert_eq!(
            m.analyzed_key(Exercise::Squat, 2),
            "fitvideoresult/42_park/20250315/squat/set3_20250315093000999.mp4"
        );
    }

    #[test]
    fn counts_existing_sets() {
        let keys = [
            "fitvideoresult/42_park/20250315/squat/set1_a.mp4",
            "fitvideoresult/42_park/20250315/squat/set2_b.MP4",
            "fitvideoresult/42_park/20250315/squat/notes.txt",
            "fitvideoresult/42_park/20250315/squat/raw.mp4",
        ];
        assert_eq!(count_sets(keys), 2);
    }

    #[test]
    fn exercise_ids_round_trip() {
        for id in 1..=3 {
            assert_eq!(Exercise::from_id(id).unwrap().id(), id);
        }
        assert_eq!(Exercise::from_id(9), Err(JobError::UnknownExercise(9)));
        assert_eq!(Exercise::from_name("squat"), Some(Exercise::Squat));
    }

    #[test]
    fn payload_mirrors_summary() {
        let rep = RepResult {
            rep_index: 1,
            label: RepLabel::Full,
            min_knee_angle: 48,
            frame_start: 10,
            frame_end: 40,
        };
        let summary = Summary {
            counts: LabelCounts {
                full: 1,
                ..Default::default()
            },
            total_count: 1,
            score: 100,
            grade: "Perfect".to_string(),
            rep_results: vec![rep],
            frame_trace: vec![],
            detection: DetectionStats::default(),
            ended_early: false,
        };
        let p = AnalysisPayload::new(&summary, Some("k.mp4".to_string()));
        let v = serde_json::to_value(&p).unwrap();
        assert_eq!(v["rep_cnt"], 1);
        assert_eq!(v["feedback"]["depth"], "Perfect");
        assert_eq!(v["feedback"]["alignment"], "auto");
        assert_eq!(v["feedback"]["counts"]["full"], 1);
        assert_eq!(v["rep_results"][0]["rep"], 1);
        assert_eq!(v["rep_results"][0]["label"], "full");
        assert_eq!(v["analyzed_video_key"], "k.mp4");
    }
}
