//! Experimental event schedule
//!
//! The task presents ten 30-second emotion blocks at a fixed 60-second
//! cadence, each of five emotions shown twice in the study's fixed
//! presentation order. Modelling collapses the emotions onto a three-level
//! valence axis, which is what the contrasts are written against.

use crate::glm::design::Condition;
use crate::io::configuration::{N_TRIALS, TRIAL_DURATION_SECS, TRIAL_SPACING_SECS};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The five emotions presented during the task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    /// Low-arousal neutral baseline
    Calm,
    /// Negative, high arousal
    Afraid,
    /// Positive, high arousal
    Delighted,
    /// Negative, low arousal
    Depressed,
    /// Positive, moderate arousal
    Excited,
}

/// The study's fixed block presentation order
pub const EMOTION_SEQUENCE: [Emotion; 10] = [
    Emotion::Calm,
    Emotion::Afraid,
    Emotion::Delighted,
    Emotion::Depressed,
    Emotion::Excited,
    Emotion::Delighted,
    Emotion::Depressed,
    Emotion::Calm,
    Emotion::Excited,
    Emotion::Afraid,
];

impl Emotion {
    /// Lower-case label used in trial records
    pub const fn label(self) -> &'static str {
        match self {
            Self::Calm => "calm",
            Self::Afraid => "afraid",
            Self::Delighted => "delighted",
            Self::Depressed => "depressed",
            Self::Excited => "excited",
        }
    }

    /// Valence level the emotion maps onto for modelling
    pub const fn valence(self) -> Valence {
        match self {
            Self::Calm => Valence::Neutral,
            Self::Afraid | Self::Depressed => Valence::Negative,
            Self::Delighted | Self::Excited => Valence::Positive,
        }
    }
}

/// Collapsed valence axis used as regressor conditions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Valence {
    /// Baseline blocks
    Neutral,
    /// Positively valenced blocks
    Positive,
    /// Negatively valenced blocks
    Negative,
}

impl Valence {
    /// Regressor name in the design matrix
    pub const fn label(self) -> &'static str {
        match self {
            Self::Neutral => "neutral",
            Self::Positive => "positive",
            Self::Negative => "negative",
        }
    }
}

/// One presentation block
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trial {
    /// Block onset in seconds from scan start
    pub onset: f64,
    /// Block duration in seconds
    pub duration: f64,
    /// Emotion presented
    pub emotion: Emotion,
    /// Valence level the block is modelled under
    pub trial_type: Valence,
}

/// The full event schedule shared by every subject
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSchedule {
    /// Trials in presentation order
    pub trials: Vec<Trial>,
}

impl EventSchedule {
    /// Build the fixed study schedule: ten blocks at a 60-second cadence in
    /// the study's presentation order, each emotion shown twice
    pub fn build() -> Self {
        debug_assert_eq!(EMOTION_SEQUENCE.len(), N_TRIALS);
        let trials = EMOTION_SEQUENCE
            .iter()
            .enumerate()
            .map(|(index, &emotion)| {
                Trial {
                    onset: index as f64 * TRIAL_SPACING_SECS,
                    duration: TRIAL_DURATION_SECS,
                    emotion,
                    trial_type: emotion.valence(),
                }
            })
            .collect();
        Self { trials }
    }

    /// Group trials by valence into design conditions
    ///
    /// Conditions come out in a stable order (by valence label), each
    /// carrying the onsets and durations of its blocks.
    pub fn to_conditions(&self) -> Vec<Condition> {
        let mut grouped: BTreeMap<Valence, (Vec<f64>, Vec<f64>)> = BTreeMap::new();
        for trial in &self.trials {
            let entry = grouped.entry(trial.trial_type).or_default();
            entry.0.push(trial.onset);
            entry.1.push(trial.duration);
        }
        grouped
            .into_iter()
            .map(|(valence, (onsets, durations))| Condition {
                name: valence.label().to_string(),
                onsets,
                durations,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schedule_has_ten_spaced_blocks() {
        let schedule = EventSchedule::build();
        assert_eq!(schedule.trials.len(), 10);
        for (index, trial) in schedule.trials.iter().enumerate() {
            assert!((trial.onset - index as f64 * 60.0).abs() < 1e-9);
            assert!((trial.duration - 30.0).abs() < 1e-9);
        }
        // Each emotion appears exactly twice, in the study order
        assert_eq!(schedule.trials[0].emotion, Emotion::Calm);
        assert_eq!(schedule.trials[5].emotion, Emotion::Delighted);
        assert_eq!(schedule.trials[7].emotion, Emotion::Calm);
        assert_eq!(schedule.trials[9].emotion, Emotion::Afraid);
        for emotion in EMOTION_SEQUENCE {
            let count = schedule
                .trials
                .iter()
                .filter(|t| t.emotion == emotion)
                .count();
            assert_eq!(count, 2);
        }
    }

    #[test]
    fn test_valence_mapping() {
        assert_eq!(Emotion::Calm.valence(), Valence::Neutral);
        assert_eq!(Emotion::Afraid.valence(), Valence::Negative);
        assert_eq!(Emotion::Depressed.valence(), Valence::Negative);
        assert_eq!(Emotion::Delighted.valence(), Valence::Positive);
        assert_eq!(Emotion::Excited.valence(), Valence::Positive);
    }

    #[test]
    fn test_conditions_cover_all_trials() {
        let schedule = EventSchedule::build();
        let conditions = schedule.to_conditions();
        assert_eq!(conditions.len(), 3);

        let total: usize = conditions.iter().map(|c| c.onsets.len()).sum();
        assert_eq!(total, 10);

        let names: Vec<&str> = conditions.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["neutral", "positive", "negative"]);

        // Neutral collects only the two calm blocks
        let neutral = &conditions[0];
        assert_eq!(neutral.onsets, vec![0.0, 420.0]);

        // Positive collects delighted and excited, in onset order
        let positive = &conditions[1];
        assert_eq!(positive.onsets, vec![120.0, 240.0, 300.0, 480.0]);

        // Negative collects afraid and depressed, in onset order
        let negative = &conditions[2];
        assert_eq!(negative.onsets, vec![60.0, 180.0, 360.0, 540.0]);
    }

    #[test]
    fn test_schedule_serialization_round_trip() {
        let schedule = EventSchedule::build();
        let encoded = serde_json::to_string(&schedule).unwrap();
        let decoded: EventSchedule = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, schedule);
    }
}
