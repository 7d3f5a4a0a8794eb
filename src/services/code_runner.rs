use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::models::question::{CodeCase, ExecutionPolicy, Question, QuestionKind};

/// Simulated runs accept code at least this long (in characters, after trimming).
pub const MIN_SIMULATED_CODE_LEN: usize = 20;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExecutionRequest {
    pub language: String,
    pub code: String,
    pub stdin: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ExecutionOutput {
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
    #[serde(default)]
    pub exit_code: i32,
    #[serde(default)]
    pub timed_out: bool,
}

/// Something that actually runs candidate code in isolation.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionOutput>;
}

/// Posts each case to an external sandbox service as JSON.
#[derive(Clone)]
pub struct HttpExecutionBackend {
    client: Client,
    url: String,
}

impl HttpExecutionBackend {
    pub fn new(url: String, client: Client) -> Self {
        Self { client, url }
    }
}

#[async_trait]
impl ExecutionBackend for HttpExecutionBackend {
    async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionOutput> {
        let resp = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await?
            .error_for_status()?;
        Ok(resp.json::<ExecutionOutput>().await?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    Simulated,
    Sandboxed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CaseReport {
    pub input: String,
    pub expected: String,
    /// Only present when the code was really executed.
    pub actual: Option<String>,
    pub passed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub mode: RunMode,
    pub passed: usize,
    pub total: usize,
    pub cases: Vec<CaseReport>,
}

impl RunReport {
    fn new(mode: RunMode, cases: Vec<CaseReport>) -> Self {
        Self {
            mode,
            passed: cases.iter().filter(|c| c.passed).count(),
            total: cases.len(),
            cases,
        }
    }
}

#[derive(Clone, Default)]
pub struct CodeRunner {
    backend: Option<Arc<dyn ExecutionBackend>>,
}

impl CodeRunner {
    pub fn new(backend: Option<Arc<dyn ExecutionBackend>>) -> Self {
        Self { backend }
    }

    /// Rejects empty code before anything else happens.
    pub fn ensure_runnable(code: &str) -> Result<()> {
        if code.trim().is_empty() {
            return Err(Error::BadRequest("Code must not be empty".to_string()));
        }
        Ok(())
    }

    pub async fn run(&self, question: &Question, code: &str) -> Result<RunReport> {
        Self::ensure_runnable(code)?;

        let QuestionKind::Coding { language, execution, .. } = &question.kind else {
            return Err(Error::BadRequest(format!(
                "Question {} is not a coding question",
                question.id
            )));
        };

        match execution {
            ExecutionPolicy::Simulated { cases } => {
                let cases = cases_or_canned(cases, &question.question);
                Ok(simulate(&cases, code))
            }
            ExecutionPolicy::Sandboxed { cases } => {
                let backend = self.backend.as_ref().ok_or_else(|| {
                    Error::Unavailable("Code execution backend is not configured".to_string())
                })?;
                let cases = cases_or_canned(cases, &question.question);
                let mut reports = Vec::with_capacity(cases.len());
                for case in cases {
                    let output = backend
                        .execute(&ExecutionRequest {
                            language: language.clone(),
                            code: code.to_string(),
                            stdin: case.input.clone(),
                        })
                        .await?;
                    let passed = !output.timed_out
                        && output.exit_code == 0
                        && output.stdout.trim() == case.expected.trim();
                    reports.push(CaseReport {
                        input: case.input,
                        expected: case.expected,
                        actual: Some(output.stdout),
                        passed,
                    });
                }
                Ok(RunReport::new(RunMode::Sandboxed, reports))
            }
        }
    }
}

fn simulate(cases: &[CodeCase], code: &str) -> RunReport {
    let accepted = code.trim().chars().count() >= MIN_SIMULATED_CODE_LEN;
    let reports = cases
        .iter()
        .map(|case| CaseReport {
            input: case.input.clone(),
            expected: case.expected.clone(),
            actual: None,
            passed: accepted,
        })
        .collect();
    RunReport::new(RunMode::Simulated, reports)
}

fn cases_or_canned(cases: &[CodeCase], question_text: &str) -> Vec<CodeCase> {
    if cases.is_empty() {
        canned_cases(question_text)
    } else {
        cases.to_vec()
    }
}

/// Demo case sets chosen by a keyword in the question text.
pub fn canned_cases(question_text: &str) -> Vec<CodeCase> {
    let text = question_text.to_lowercase();
    let pairs: &[(&str, &str)] = if text.contains("factorial") {
        &[("0", "1"), ("5", "120"), ("10", "3628800")]
    } else if text.contains("fibonacci") {
        &[("0", "0"), ("1", "1"), ("10", "55")]
    } else if text.contains("palindrome") {
        &[("racecar", "true"), ("hello", "false"), ("a", "true")]
    } else if text.contains("reverse") {
        &[("hello", "olleh"), ("abc", "cba"), ("", "")]
    } else if text.contains("sum") || text.contains("add") {
        &[("1 2", "3"), ("10 -4", "6"), ("0 0", "0")]
    } else {
        &[("hello", "hello"), ("42", "42")]
    };
    pairs
        .iter()
        .map(|(input, expected)| CodeCase {
            input: input.to_string(),
            expected: expected.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::question::{Difficulty, QuestionStatus};
    use chrono::Utc;
    use uuid::Uuid;

    fn coding(text: &str, execution: ExecutionPolicy) -> Question {
        Question {
            id: Uuid::new_v4(),
            test_id: Uuid::nil(),
            position: 0,
            kind: QuestionKind::Coding {
                language: "python".into(),
                starter_code: None,
                execution,
            },
            question: text.into(),
            correct_answer: String::new(),
            difficulty: Difficulty::Medium,
            weightage: 1,
            status: QuestionStatus::Approved,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn empty_code_is_refused() {
        let runner = CodeRunner::default();
        let q = coding("Write factorial", ExecutionPolicy::default());
        let err = tokio_test::block_on(runner.run(&q, "   \n")).unwrap_err();
        assert!(matches!(err, Error::BadRequest(_)));
    }

    #[test]
    fn canned_cases_follow_keywords() {
        assert_eq!(canned_cases("Compute the FACTORIAL of n")[1].expected, "120");
        assert_eq!(canned_cases("nth Fibonacci number")[2].expected, "55");
        assert_eq!(canned_cases("Reverse a string")[0].expected, "olleh");
        assert_eq!(canned_cases("Anything else").len(), 2);
    }

    #[tokio::test]
    async fn simulated_run_is_deterministic_and_labelled() {
        let runner = CodeRunner::default();
        let q = coding("Write factorial", ExecutionPolicy::default());
        let long = "def factorial(n):\n    return 1 if n == 0 else n * factorial(n - 1)";

        let first = runner.run(&q, long).await.unwrap();
        let second = runner.run(&q, long).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.mode, RunMode::Simulated);
        assert_eq!(first.passed, 3);
        assert!(first.cases.iter().all(|c| c.actual.is_none()));

        let short = runner.run(&q, "pass").await.unwrap();
        assert_eq!(short.passed, 0);
    }

    #[tokio::test]
    async fn sandboxed_without_backend_is_unavailable() {
        let runner = CodeRunner::default();
        let q = coding("sum", ExecutionPolicy::Sandboxed { cases: vec![] });
        let err = runner.run(&q, "print(sum(map(int, input().split())))").await.unwrap_err();
        assert!(matches!(err, Error::Unavailable(_)));
    }

    #[tokio::test]
    async fn sandboxed_compares_trimmed_stdout() {
        let mut backend = MockExecutionBackend::new();
        backend.expect_execute().times(2).returning(|req| {
            let stdout = if req.stdin == "2" { "4\n" } else { "wrong" };
            Ok(ExecutionOutput {
                stdout: stdout.to_string(),
                ..Default::default()
            })
        });
        let runner = CodeRunner::new(Some(Arc::new(backend)));
        let q = coding(
            "square",
            ExecutionPolicy::Sandboxed {
                cases: vec![
                    CodeCase { input: "2".into(), expected: "4".into() },
                    CodeCase { input: "3".into(), expected: "9".into() },
                ],
            },
        );
        let report = runner.run(&q, "print(int(input()) ** 2)").await.unwrap();
        assert_eq!(report.mode, RunMode::Sandboxed);
        assert_eq!(report.total, 2);
        assert_eq!(report.passed, 1);
        assert_eq!(report.cases[0].actual.as_deref(), Some("4\n"));
    }
}
