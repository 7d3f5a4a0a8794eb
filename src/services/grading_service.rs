use crate::models::question::Question;
use crate::models::result::QuestionOutcome;
use crate::models::session::Answers;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeSummary {
    pub correct: i32,
    pub total: i32,
    pub percentage: i32,
    pub passed: bool,
    pub outcomes: Vec<QuestionOutcome>,
}

pub struct GradingService;

impl GradingService {
    /// Scores every served question by strict string equality with its correct answer.
    /// Unanswered questions count as wrong.
    pub fn grade(questions: &[Question], answers: &Answers, passing_score: i32) -> GradeSummary {
        let mut correct = 0;
        let mut outcomes = Vec::with_capacity(questions.len());

        for (idx, q) in questions.iter().enumerate() {
            let index = idx as u32;
            let given = answers.get(&index).cloned();
            let is_correct = given.as_deref() == Some(q.correct_answer.as_str());
            if is_correct {
                correct += 1;
            }
            outcomes.push(QuestionOutcome {
                question_index: index,
                question_id: q.id,
                kind: q.kind.name().to_string(),
                given_answer: given,
                correct_answer: q.correct_answer.clone(),
                correct: is_correct,
                weightage: q.weightage,
            });
        }

        let total = questions.len() as i32;
        let percentage = percentage(correct, total);
        GradeSummary {
            correct,
            total,
            percentage,
            passed: percentage >= passing_score,
            outcomes,
        }
    }
}

/// `round(correct / total * 100)`, half rounds up, `0` for an empty test.
pub fn percentage(correct: i32, total: i32) -> i32 {
    if total <= 0 {
        return 0;
    }
    let correct = correct.clamp(0, total) as i64;
    let total = total as i64;
    ((correct * 200 + total) / (2 * total)) as i32
}

/// `ceil((duration*60 - seconds_remaining) / 60)`, clamped to `[0, duration]`.
pub fn time_spent_minutes(duration_minutes: i32, seconds_remaining: i64) -> i32 {
    let duration_minutes = duration_minutes.max(0);
    let budget = duration_minutes as i64 * 60;
    let elapsed = (budget - seconds_remaining).clamp(0, budget);
    let minutes = (elapsed + 59) / 60;
    (minutes as i32).clamp(0, duration_minutes)
}
