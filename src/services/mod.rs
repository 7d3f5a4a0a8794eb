pub mod analytics_service;
pub mod assignment_service;
pub mod code_runner;
pub mod export_service;
pub mod grading_service;
pub mod proctoring_service;
pub mod question_renderer;
pub mod session_clock;
pub mod session_service;
pub mod test_service;
