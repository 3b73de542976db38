pub mod antibot;
pub mod proxy_grabber;
pub mod proxy_manager;
