pub mod common;
pub mod employee_directory;
pub mod request_repository;

pub use employee_directory::{EmployeeDirectory, EmployeeDirectoryTrait};
pub use request_repository::{RequestFilter, RequestRepository, RequestRepositoryTrait};
