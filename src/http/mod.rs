pub mod headers;
pub mod method;
pub mod params;
pub mod request;
pub mod response;
pub mod status;

pub use headers::{Headers, ResponseHeaders};
pub use method::{Method, Version};
pub use params::{Assigns, Params, parse_query};
pub use request::Request;
pub use response::Response;
