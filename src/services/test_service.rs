use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::database::store::AssessmentStore;
use crate::dto::admin_dto::{CreateQuestionRequest, CreateTestRequest, TestSummary};
use crate::error::{Error, Result};
use crate::models::question::{Difficulty, Question, QuestionStatus};
use crate::models::test::Test;

/// Test and question authoring, scoped to the caller's organization.
#[derive(Clone)]
pub struct TestService {
    store: Arc<dyn AssessmentStore>,
}

impl TestService {
    pub fn new(store: Arc<dyn AssessmentStore>) -> Self {
        Self { store }
    }

    pub async fn create_test(
        &self,
        organization_id: Uuid,
        created_by: Uuid,
        payload: CreateTestRequest,
    ) -> Result<Test> {
        let test = Test {
            id: Uuid::new_v4(),
            organization_id,
            title: payload.title.trim().to_string(),
            domain: payload.domain.trim().to_string(),
            level: payload.level.trim().to_string(),
            duration_minutes: payload.duration_minutes,
            passing_score: payload.passing_score,
            project_id: payload.project_id,
            created_by,
            created_at: Utc::now(),
        };
        self.store.insert_test(&test).await?;
        tracing::info!(test_id = %test.id, organization_id = %organization_id, "Test created");
        Ok(test)
    }

    pub async fn list_tests(&self, organization_id: Uuid) -> Result<Vec<TestSummary>> {
        let tests = self.store.list_tests(organization_id).await?;
        let mut out = Vec::with_capacity(tests.len());
        for test in tests {
            out.push(self.summarize(test).await?);
        }
        Ok(out)
    }

    pub async fn get_test(&self, organization_id: Uuid, test_id: Uuid) -> Result<TestSummary> {
        let test = self.owned_test(organization_id, test_id).await?;
        self.summarize(test).await
    }

    /// Tests of other organizations look the same as missing ones.
    pub async fn owned_test(&self, organization_id: Uuid, test_id: Uuid) -> Result<Test> {
        match self.store.get_test(test_id).await? {
            Some(test) if test.organization_id == organization_id => Ok(test),
            _ => Err(Error::NotFound("Test not found".to_string())),
        }
    }

    /// Appends a question at the end of the test. New questions start `pending`.
    pub async fn add_question(
        &self,
        organization_id: Uuid,
        test_id: Uuid,
        payload: CreateQuestionRequest,
    ) -> Result<Question> {
        let test = self.owned_test(organization_id, test_id).await?;
        let existing = self.store.list_questions(test.id).await?;
        let position = existing.iter().map(|q| q.position + 1).max().unwrap_or(0);

        let question = Question {
            id: Uuid::new_v4(),
            test_id: test.id,
            position,
            kind: payload.kind,
            question: payload.question,
            correct_answer: payload.correct_answer,
            difficulty: payload.difficulty.unwrap_or(Difficulty::Medium),
            weightage: payload.weightage.unwrap_or(1),
            status: QuestionStatus::Pending,
            created_at: Utc::now(),
        };
        self.store.insert_question(&question).await?;
        tracing::info!(
            question_id = %question.id,
            test_id = %test.id,
            kind = question.kind.name(),
            position,
            "Question added"
        );
        Ok(question)
    }

    pub async fn list_questions(
        &self,
        organization_id: Uuid,
        test_id: Uuid,
    ) -> Result<Vec<Question>> {
        let test = self.owned_test(organization_id, test_id).await?;
        self.store.list_questions(test.id).await
    }

    pub async fn review_question(
        &self,
        organization_id: Uuid,
        question_id: Uuid,
        status: QuestionStatus,
    ) -> Result<Question> {
        let question = self
            .store
            .get_question(question_id)
            .await?
            .ok_or_else(|| Error::NotFound("Question not found".to_string()))?;
        self.owned_test(organization_id, question.test_id).await?;

        if !question.status.can_transition_to(status) {
            return Err(Error::Conflict(format!(
                "Cannot move question from {:?} to {:?}",
                question.status, status
            )));
        }
        let updated = self.store.update_question_status(question_id, status).await?;
        tracing::info!(question_id = %question_id, status = ?status, "Question reviewed");
        Ok(updated)
    }

    async fn summarize(&self, test: Test) -> Result<TestSummary> {
        let questions = self.store.list_questions(test.id).await?;
        let approved_questions = questions
            .iter()
            .filter(|q| q.status == QuestionStatus::Approved)
            .count();
        Ok(TestSummary {
            total_questions: questions.len(),
            approved_questions,
            test,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::models::question::QuestionKind;

    fn create_request() -> CreateTestRequest {
        CreateTestRequest {
            title: " SQL fundamentals ".into(),
            domain: "data".into(),
            level: "middle".into(),
            duration_minutes: 30,
            passing_score: 60,
            project_id: None,
        }
    }

    fn question_request(text: &str) -> CreateQuestionRequest {
        CreateQuestionRequest {
            kind: QuestionKind::FillBlank,
            question: text.into(),
            correct_answer: "SELECT".into(),
            difficulty: None,
            weightage: None,
        }
    }

    #[tokio::test]
    async fn questions_are_appended_in_order_and_start_pending() {
        let svc = TestService::new(Arc::new(MemoryStore::new()));
        let org = Uuid::new_v4();
        let test = svc.create_test(org, Uuid::new_v4(), create_request()).await.unwrap();
        assert_eq!(test.title, "SQL fundamentals");

        let q0 = svc.add_question(org, test.id, question_request("first")).await.unwrap();
        let q1 = svc.add_question(org, test.id, question_request("second")).await.unwrap();
        assert_eq!((q0.position, q1.position), (0, 1));
        assert_eq!(q1.status, QuestionStatus::Pending);
        assert_eq!(q1.weightage, 1);

        let summary = svc.get_test(org, test.id).await.unwrap();
        assert_eq!(summary.total_questions, 2);
        assert_eq!(summary.approved_questions, 0);
    }

    #[tokio::test]
    async fn other_organizations_cannot_read_a_test() {
        let svc = TestService::new(Arc::new(MemoryStore::new()));
        let test = svc
            .create_test(Uuid::new_v4(), Uuid::new_v4(), create_request())
            .await
            .unwrap();
        let err = svc.get_test(Uuid::new_v4(), test.id).await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn review_follows_allowed_transitions() {
        let svc = TestService::new(Arc::new(MemoryStore::new()));
        let org = Uuid::new_v4();
        let test = svc.create_test(org, Uuid::new_v4(), create_request()).await.unwrap();
        let q = svc.add_question(org, test.id, question_request("q")).await.unwrap();

        let approved = svc.review_question(org, q.id, QuestionStatus::Approved).await.unwrap();
        assert_eq!(approved.status, QuestionStatus::Approved);

        let err = svc
            .review_question(org, q.id, QuestionStatus::Approved)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }
}
