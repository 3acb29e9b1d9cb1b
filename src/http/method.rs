use std::fmt::{self, Display};
use std::str::FromStr;

use serde::Serialize;

use crate::error::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 7] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
        HttpMethod::Head,
        HttpMethod::Options,
    ];

    /// Status codes accepted when a test does not list its own.
    pub fn default_expected_status(self) -> Vec<u16> {
        match self {
            HttpMethod::Post | HttpMethod::Put => vec![200, 201, 204],
            HttpMethod::Delete => vec![200, 202, 204],
            _ => vec![200],
        }
    }

    pub fn sends_body(self) -> bool {
        !matches!(self, HttpMethod::Get | HttpMethod::Head | HttpMethod::Options)
    }
}

impl Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        };
        write!(f, "{label}")
    }
}

impl FromStr for HttpMethod {
    type Err = ParseError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let wanted = value.trim();
        HttpMethod::ALL
            .into_iter()
            .find(|method| method.to_string().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| ParseError::Method(value.to_string()))
    }
}

impl From<HttpMethod> for reqwest::Method {
    fn from(method: HttpMethod) -> Self {
        match method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_is_case_insensitive() {
        assert_eq!("post".parse::<HttpMethod>().ok(), Some(HttpMethod::Post));
        assert_eq!(" Delete ".parse::<HttpMethod>().ok(), Some(HttpMethod::Delete));
        assert!(matches!("TRACE".parse::<HttpMethod>(), Err(ParseError::Method(_))));
    }

    #[test]
    fn default_statuses_follow_method() {
        assert_eq!(HttpMethod::Get.default_expected_status(), vec![200]);
        assert_eq!(HttpMethod::Post.default_expected_status(), vec![200, 201, 204]);
        assert_eq!(HttpMethod::Put.default_expected_status(), vec![200, 201, 204]);
        assert_eq!(HttpMethod::Delete.default_expected_status(), vec![200, 202, 204]);
    }
}
