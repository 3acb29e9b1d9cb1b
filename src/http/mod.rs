pub mod client;
pub mod method;
pub mod metric;
pub mod request;
pub mod response;

pub use client::{ClientOptions, HttpClient, ReqwestClient};
pub use method::HttpMethod;
pub use metric::Metric;
pub use request::HttpRequest;
pub use response::HttpResponse;
