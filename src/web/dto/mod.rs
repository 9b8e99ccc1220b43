//! Data transfer objects for Web API.

mod request;
mod response;

pub use request::*;
pub use response::*;
