pub mod identity;
pub mod leave;
pub mod notifications;
pub mod storage;
pub mod toast;
