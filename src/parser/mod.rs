pub mod details;
pub mod listing;

pub use details::{clean_title, parse_details};
pub use listing::{parse_listing, ListingItem};
