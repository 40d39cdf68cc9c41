pub mod court;
pub mod fake_feed;
pub mod feed;
pub mod frame;
pub mod state;
