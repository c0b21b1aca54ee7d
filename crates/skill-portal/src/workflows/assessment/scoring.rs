use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::domain::{OptionId, Question, QuestionId, SubmittedAnswer};

/// Rule deciding when an answer earns its question's points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringPolicy {
    /// The first selected option must be marked correct.
    #[default]
    SingleOption,
    /// The selected set must equal the set of correct options.
    ExactSet,
}

impl ScoringPolicy {
    pub const fn label(self) -> &'static str {
        match self {
            ScoringPolicy::SingleOption => "single_option",
            ScoringPolicy::ExactSet => "exact_set",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "single_option" | "single" => Some(ScoringPolicy::SingleOption),
            "exact_set" | "exact" => Some(ScoringPolicy::ExactSet),
            _ => None,
        }
    }

    fn awards(self, question: &Question, answer: &SubmittedAnswer) -> bool {
        let selections = answer.selections();
        match self {
            ScoringPolicy::SingleOption => selections
                .first()
                .and_then(|id| question.option(id))
                .is_some_and(|option| option.is_correct),
            ScoringPolicy::ExactSet => {
                let selected: BTreeSet<&OptionId> = selections.into_iter().collect();
                let correct: BTreeSet<&OptionId> = question.correct_options().collect();
                !correct.is_empty() && selected == correct
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub score: u32,
    pub total_possible: u32,
    pub percentage: f64,
}

/// Scores answers against a question set.
///
/// Only the first answer given for a question counts; answers naming unknown
/// questions earn nothing.
pub fn calculate_score(
    answers: &[SubmittedAnswer],
    questions: &[Question],
    policy: ScoringPolicy,
) -> ScoreBreakdown {
    let total_possible = questions
        .iter()
        .fold(0u32, |total, question| total.saturating_add(question.points));

    let mut seen: BTreeSet<&QuestionId> = BTreeSet::new();
    let mut score: u32 = 0;
    for answer in answers {
        if !seen.insert(&answer.question) {
            continue;
        }
        let Some(question) = questions.iter().find(|q| q.id == answer.question) else {
            continue;
        };
        if policy.awards(question, answer) {
            score = score.saturating_add(question.points);
        }
    }

    let percentage = if total_possible == 0 {
        0.0
    } else {
        f64::from(score) / f64::from(total_possible) * 100.0
    };

    ScoreBreakdown {
        score,
        total_possible,
        percentage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::AnswerOption;

    fn option(id: &str, is_correct: bool) -> AnswerOption {
        AnswerOption {
            id: OptionId::from(id),
            text: id.to_uppercase(),
            is_correct,
        }
    }

    fn questions() -> Vec<Question> {
        vec![
            Question {
                id: QuestionId::from("q1"),
                text: "Pick the prime".to_string(),
                options: vec![option("a", true), option("b", false)],
                points: 2,
            },
            Question {
                id: QuestionId::from("q2"),
                text: "Pick every even number".to_string(),
                options: vec![option("c", true), option("d", true), option("e", false)],
                points: 3,
            },
        ]
    }

    fn single(question: &str, option: &str) -> SubmittedAnswer {
        SubmittedAnswer {
            question: QuestionId::from(question),
            selected_option: Some(OptionId::from(option)),
            selected_options: Vec::new(),
        }
    }

    fn multi(question: &str, options: &[&str]) -> SubmittedAnswer {
        SubmittedAnswer {
            question: QuestionId::from(question),
            selected_option: None,
            selected_options: options.iter().map(|id| OptionId::from(*id)).collect(),
        }
    }

    #[test]
    fn single_option_checks_first_selection_only() {
        let breakdown = calculate_score(
            &[single("q1", "a"), multi("q2", &["c", "e"])],
            &questions(),
            ScoringPolicy::SingleOption,
        );
        assert_eq!(breakdown.score, 5);
        assert_eq!(breakdown.total_possible, 5);
        assert!((breakdown.percentage - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn exact_set_requires_every_correct_option() {
        let questions = questions();
        let partial = calculate_score(
            &[single("q1", "a"), multi("q2", &["c"])],
            &questions,
            ScoringPolicy::ExactSet,
        );
        assert_eq!(partial.score, 2);

        let complete = calculate_score(
            &[single("q1", "a"), multi("q2", &["d", "c"])],
            &questions,
            ScoringPolicy::ExactSet,
        );
        assert_eq!(complete.score, 5);
    }

    #[test]
    fn huge_point_values_saturate_instead_of_overflowing() {
        let mut questions = questions();
        questions[0].points = u32::MAX;
        let breakdown = calculate_score(
            &[single("q1", "a"), multi("q2", &["c"])],
            &questions,
            ScoringPolicy::SingleOption,
        );
        assert_eq!(breakdown.total_possible, u32::MAX);
        assert_eq!(breakdown.score, u32::MAX);
    }

    #[test]
    fn repeated_answers_for_a_question_do_not_stack() {
        let breakdown = calculate_score(
            &[single("q1", "b"), single("q1", "a"), single("q9", "a")],
            &questions(),
            ScoringPolicy::SingleOption,
        );
        assert_eq!(breakdown.score, 0);
        assert!((breakdown.percentage - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn scoring_is_stable_across_calls_and_order() {
        let questions = questions();
        let answers = vec![single("q1", "a"), single("q2", "e")];
        let reversed: Vec<SubmittedAnswer> = answers.iter().rev().cloned().collect();

        let first = calculate_score(&answers, &questions, ScoringPolicy::SingleOption);
        for _ in 0..3 {
            assert_eq!(
                calculate_score(&answers, &questions, ScoringPolicy::SingleOption),
                first
            );
        }
        assert_eq!(
            calculate_score(&reversed, &questions, ScoringPolicy::SingleOption),
            first
        );
        assert_eq!(first.score, 2);
        assert!((first.percentage - 40.0).abs() < 1e-9);
    }

    #[test]
    fn empty_question_set_scores_zero_percent() {
        let breakdown = calculate_score(&[], &[], ScoringPolicy::SingleOption);
        assert_eq!(breakdown.total_possible, 0);
        assert!((breakdown.percentage - 0.0).abs() < f64::EPSILON);
    }
}
