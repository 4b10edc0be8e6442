//! Coaching feedback generation.
//!
//! Turns the scorer's per-dimension metrics into short feedback
//! sentences and concrete practice recommendations, banded at the
//! same thresholds the scores themselves use.

use crate::scorer::VoiceAnalysis;
use crate::types::{FeedbackData, Section};

/// Generates textual feedback from a scored recording.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeedbackEngine;

impl FeedbackEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn generate(&self, analysis: &VoiceAnalysis, section: &Section) -> FeedbackData {
        let mut feedbacks = Vec::new();
        let mut recommendations = Vec::new();

        if let Some(pitch) = &analysis.pitch {
            if pitch.accuracy < 0.6 {
                feedbacks.push(
                    "Your pitch strays far from the target. Listen to the reference again and \
                     follow it slowly."
                        .to_string(),
                );
                recommendations
                    .push("Check each target note on a piano or app before singing it".to_string());
            } else if pitch.accuracy < 0.8 {
                feedbacks
                    .push("Pitch is mostly accurate but drifts in a few places.".to_string());
                recommendations.push("Repeat the passages where you drift off pitch".to_string());
            } else {
                feedbacks.push("Your pitch is very accurate. Well done!".to_string());
            }

            if pitch.stability < 0.6 {
                feedbacks.push(
                    "Your pitch tends to waver. Try to hold each note more steadily.".to_string(),
                );
                recommendations.push("Practice long sustained notes to steady your pitch".to_string());
                recommendations
                    .push("Use lip trills to connect breath support and pitch stability".to_string());
            } else if pitch.stability < 0.8 {
                feedbacks.push("Pitch stability is decent and can get even steadier.".to_string());
            } else {
                feedbacks.push("Your pitch is rock steady!".to_string());
            }
        }

        if let Some(breath) = &analysis.breath {
            if breath.volume_consistency < 0.6 {
                feedbacks.push(
                    "Your volume fluctuates. Keep the airflow more even.".to_string(),
                );
                recommendations.push("Practice diaphragmatic breathing".to_string());
                recommendations
                    .push("Sustain a long 'sss' sound to train breath control".to_string());
            } else if breath.volume_consistency < 0.8 {
                feedbacks.push("Volume is mostly even with slight dips.".to_string());
            } else {
                feedbacks.push("Very even volume. Great breath control!".to_string());
            }

            if breath.sustainability < 0.6 {
                feedbacks.push("You have trouble carrying notes to the end.".to_string());
                recommendations.push("Work on expanding breath capacity".to_string());
                recommendations
                    .push("Start with shorter phrases and extend them gradually".to_string());
            } else if breath.sustainability < 0.8 {
                feedbacks.push("Note sustain is adequate.".to_string());
            } else {
                feedbacks.push("You carry notes all the way through!".to_string());
            }
        }

        if let Some(pronunciation) = &analysis.pronunciation {
            if pronunciation.clarity < 0.6 {
                feedbacks.push(
                    "Articulation is unclear. Shape vowels and consonants more deliberately."
                        .to_string(),
                );
                recommendations.push("Practice mouth shapes in front of a mirror".to_string());
                recommendations
                    .push("Exaggerate consonants and vowels as a drill".to_string());
            } else if pronunciation.clarity < 0.8 {
                feedbacks.push("Articulation is mostly clear and could be crisper.".to_string());
                recommendations.push("Add diction exercises to your warm-up".to_string());
            } else {
                feedbacks.push("Very clear articulation!".to_string());
            }
        }

        if let Some(onset) = &analysis.onset {
            if onset.quality < 0.5 {
                feedbacks.push(
                    "Your note onsets are abrupt. Ease into each note more gently.".to_string(),
                );
                recommendations
                    .push("Start notes with a soft 'h' to soften the attack".to_string());
            } else if onset.quality < 0.7 {
                feedbacks.push("Note onsets are fine and could be smoother.".to_string());
            } else {
                feedbacks.push("You start notes smoothly and confidently!".to_string());
            }
        }

        feedbacks.push(overall_summary(analysis.overall_score, &section.name));

        FeedbackData {
            feedbacks,
            recommendations,
        }
    }
}

fn overall_summary(overall: f64, section_name: &str) -> String {
    if overall >= 0.8 {
        format!("You nailed {section_name}. Every dimension is strong.")
    } else if overall >= 0.7 {
        format!("{section_name} sounded good. A couple of tweaks and it's perfect.")
    } else if overall >= 0.6 {
        format!("{section_name} was solid. A bit more practice will go a long way.")
    } else if overall >= 0.5 {
        format!("{section_name} still has rough spots. Take it slowly and repeat it.")
    } else {
        format!("{section_name} seems tough right now. Build it up from the basics.")
    }
}
