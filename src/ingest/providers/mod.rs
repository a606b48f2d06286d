pub mod rss;
pub mod weather;
