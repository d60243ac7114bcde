pub mod rss;
pub mod telegram;
