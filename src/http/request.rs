use std::collections::BTreeMap;

use serde::Serialize;

use super::method::HttpMethod;

/// A fully resolved request, ready to send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
}
