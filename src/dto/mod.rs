pub mod admin_dto;
pub mod session_dto;
