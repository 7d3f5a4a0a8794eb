pub mod assignment;
pub mod proctoring;
pub mod question;
pub mod result;
pub mod session;
pub mod test;
