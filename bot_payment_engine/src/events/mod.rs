//! Real-time notifications for connected users.
//!
//! The [`NotificationHub`] is an explicitly owned registry of live connections, keyed by user id. It is created once
//! at start-up and handed to whatever needs to push messages (the upgrade workflow, the notification stream
//! endpoint). It is not part of the payment path.
mod notification_hub;

pub use notification_hub::{Notification, NotificationHub, Subscription};
