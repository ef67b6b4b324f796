//! Weighted 0-100 score and grade from the final rep label counts.

use serde::Serialize;

use crate::config::Scoring;
use crate::counter::RepLabel;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LabelCounts {
    pub half: u32,
    pub basic: u32,
    pub full: u32,
    pub fail: u32,
}

impl LabelCounts {
    pub fn get(&self, label: RepLabel) -> u32 {
        match label {
            RepLabel::Half => self.half,
            RepLabel::Basic => self.basic,
            RepLabel::Full => self.full,
            RepLabel::Fail => self.fail,
        }
    }

    pub fn add(&mut self, label: RepLabel) {
        match label {
            RepLabel::Half => self.half += 1,
            RepLabel::Basic => self.basic += 1,
            RepLabel::Full => self.full += 1,
            RepLabel::Fail => self.fail += 1,
        }
    }

    pub fn total(&self) -> u32 {
        RepLabel::ALL.iter().map(|l| self.get(*l)).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Score {
    pub score: u32,
    pub grade: String,
}

pub fn score(counts: &LabelCounts, s: &Scoring) -> Score {
    let raw = counts.full as f64 * s.full_weight
        + counts.basic as f64 * s.basic_weight
        + counts.half as f64 * s.half_weight;
    let max = (counts.full + counts.basic + counts.half) as f64 * s.full_weight;
    let ratio = raw / max.max(1.0);
    let base = ratio * 100.0;
    let penalty = counts.fail as f64 * s.fail_penalty;
    let value = (base - penalty).floor().clamp(0.0, 100.0) as u32;

    Score {
        score: value,
        grade: grade(value, s),
    }
}

fn grade(value: u32, s: &Scoring) -> String {
    s.grades
        .iter()
        .find(|g| value >= g.min_score)
        .or(s.grades.last())
        .map(|g| g.name.clone())
        .unwrap_or_default()
}
