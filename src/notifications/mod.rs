pub mod poller;

pub use poller::NotificationPoller;
