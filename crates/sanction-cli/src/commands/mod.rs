pub mod approval;
pub mod context;
pub mod maintenance;
pub mod session;
pub mod webhooks;
