mod models;
mod tags;

pub use models::*;
pub use tags::{OwnershipTagSet, TagFilter};
