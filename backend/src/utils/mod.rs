pub mod email;
pub mod jwt;
pub mod time;

pub use email::EmailService;
pub use jwt::*;
pub use time::*;
