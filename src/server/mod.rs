mod dispatch;
pub mod dto;
pub mod response;
mod router;
mod scripts;
pub mod validation;

pub use router::{AppState, create_router};
