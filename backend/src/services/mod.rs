pub mod notification;
pub mod request_lifecycle;
pub mod request_policy;

pub use notification::{EmailNotificationDispatcher, NotificationDispatcher};
pub use request_lifecycle::RequestLifecycleService;
