use serde::Serialize;
use uuid::Uuid;

use crate::models::question::{Difficulty, Question, QuestionKind, QuestionStatus};

/// Candidate-facing view of a question. Never carries the correct answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionView {
    pub index: u32,
    pub id: Uuid,
    pub question: String,
    pub difficulty: Difficulty,
    pub weightage: i32,
    #[serde(flatten)]
    pub body: QuestionBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum QuestionBody {
    MultipleChoice { options: Vec<ChoiceOption> },
    FreeText { variant: &'static str },
    Code { language: String, starter_code: Option<String> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoiceOption {
    pub label: String,
    pub text: String,
}

/// Questions a live session serves, in position order. With `require_approved` only
/// reviewed-and-approved questions are served. Answer indexes refer to this list.
pub fn served_questions(questions: &[Question], require_approved: bool) -> Vec<Question> {
    let mut served: Vec<Question> = questions
        .iter()
        .filter(|q| !require_approved || q.status == QuestionStatus::Approved)
        .cloned()
        .collect();
    served.sort_by_key(|q| q.position);
    served
}

pub fn render(questions: &[Question]) -> Vec<QuestionView> {
    questions
        .iter()
        .enumerate()
        .map(|(idx, q)| render_one(idx as u32, q))
        .collect()
}

pub fn render_one(index: u32, question: &Question) -> QuestionView {
    let body = match &question.kind {
        QuestionKind::Mcq { options } if !options.is_empty() => QuestionBody::MultipleChoice {
            options: options
                .iter()
                .enumerate()
                .map(|(i, text)| ChoiceOption {
                    label: option_label(i),
                    text: text.clone(),
                })
                .collect(),
        },
        QuestionKind::Mcq { .. } => QuestionBody::FreeText { variant: "mcq" },
        QuestionKind::FillBlank => QuestionBody::FreeText { variant: "fill_blank" },
        QuestionKind::Scenario => QuestionBody::FreeText { variant: "scenario" },
        QuestionKind::DirectQa => QuestionBody::FreeText { variant: "direct_qa" },
        QuestionKind::Coding { language, starter_code, .. } => QuestionBody::Code {
            language: language.clone(),
            starter_code: starter_code.clone(),
        },
    };

    QuestionView {
        index,
        id: question.id,
        question: question.question.clone(),
        difficulty: question.difficulty,
        weightage: question.weightage,
        body,
    }
}

/// Spreadsheet-style labels: A..Z, AA, AB, ...
pub fn option_label(index: usize) -> String {
    let mut n = index + 1;
    let mut label = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        label.push(b'A' + rem as u8);
        n = (n - 1) / 26;
    }
    label.reverse();
    String::from_utf8(label).unwrap_or_default()
}
