//! Query-string parsing for JSON:API requests
//!
//! The raw query is walked with `form_urlencoded` and bracketed parameters
//! (`filter[artist]`, `page[size]`, `fields[album]`) are sorted into
//! families.

use crate::error::{ApiError, ApiResult};
use indexmap::IndexMap;
use station_common::config::ApiConfig;
use std::collections::HashMap;
use url::form_urlencoded;

/// `page[...]` parameters as sent
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PageParams {
    pub offset: Option<String>,
    pub size: Option<String>,
    pub profile: Option<String>,
    pub before: Option<String>,
    pub after: Option<String>,
    pub previous: Option<String>,
    pub next: Option<String>,
}

/// Parsed request parameters
#[derive(Debug, Clone, Default)]
pub struct ApiQuery {
    /// `filter[<name>]` in request order
    pub filters: IndexMap<String, String>,
    pub page: PageParams,
    /// `fields[<type>]` split on commas
    pub fields: HashMap<String, Vec<String>>,
    /// Dotted relationship paths from `include`
    pub include: Vec<String>,
    pub sort: Option<String>,
    /// Every non-page parameter, replayed into navigation links
    carried: Vec<(String, String)>,
}

impl ApiQuery {
    pub fn parse(raw: Option<&str>) -> ApiResult<Self> {
        let mut query = ApiQuery::default();
        let Some(raw) = raw else {
            return Ok(query);
        };

        for (key, value) in form_urlencoded::parse(raw.as_bytes()) {
            let key = key.into_owned();
            let value = value.into_owned();

            if let Some(name) = bracketed(&key, "page") {
                let slot = match name {
                    "offset" => &mut query.page.offset,
                    "size" => &mut query.page.size,
                    "profile" => &mut query.page.profile,
                    "before" => &mut query.page.before,
                    "after" => &mut query.page.after,
                    "previous" => &mut query.page.previous,
                    "next" => &mut query.page.next,
                    other => {
                        return Err(ApiError::invalid(
                            "page",
                            format!("unknown member '{}'", other),
                        ))
                    }
                };
                *slot = Some(value);
                continue;
            }

            if let Some(name) = bracketed(&key, "filter") {
                query.filters.insert(name.to_string(), value.clone());
            } else if let Some(kind) = bracketed(&key, "fields") {
                let names = value
                    .split(',')
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(String::from)
                    .collect();
                query.fields.insert(kind.to_string(), names);
            } else if key == "include" {
                query.include.extend(
                    value
                        .split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(String::from),
                );
            } else if key == "sort" {
                query.sort = Some(value.clone()).filter(|s| !s.is_empty());
            }

            query.carried.push((key, value));
        }

        Ok(query)
    }

    pub fn filter(&self, name: &str) -> Option<&str> {
        self.filters.get(name).map(String::as_str)
    }

    /// Requested page size, defaulted and capped by configuration
    pub fn page_size(&self, settings: &ApiConfig) -> ApiResult<usize> {
        match &self.page.size {
            None => Ok(settings.default_page_size),
            Some(raw) => {
                let size: usize = raw
                    .trim()
                    .parse()
                    .map_err(|_| ApiError::invalid("page[size]", "not a number"))?;
                if size == 0 {
                    return Err(ApiError::invalid("page[size]", "must be positive"));
                }
                Ok(size.min(settings.max_page_size))
            }
        }
    }

    pub fn offset(&self) -> ApiResult<usize> {
        match &self.page.offset {
            None => Ok(0),
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| ApiError::invalid("page[offset]", "not a non-negative number")),
        }
    }

    /// Build a link to `path` carrying this request's non-page parameters
    /// followed by `page` members
    pub fn link(&self, path: &str, page: &[(&str, String)]) -> String {
        self.build_link(path, page, true)
    }

    /// Like [`link`](Self::link) but without `filter[...]`, which would
    /// override a cursor position
    pub fn cursor_link(&self, path: &str, page: &[(&str, String)]) -> String {
        self.build_link(path, page, false)
    }

    fn build_link(&self, path: &str, page: &[(&str, String)], keep_filters: bool) -> String {
        let mut parts: Vec<String> = self
            .carried
            .iter()
            .filter(|(k, _)| keep_filters || bracketed(k, "filter").is_none())
            .map(|(k, v)| format!("{}={}", encode_key(k), encode_value(v)))
            .collect();
        parts.extend(
            page.iter()
                .map(|(k, v)| format!("page[{}]={}", k, encode_value(v))),
        );

        if parts.is_empty() {
            path.to_string()
        } else {
            format!("{}?{}", path, parts.join("&"))
        }
    }
}

/// `family[name]` → `name`
fn bracketed<'a>(key: &'a str, family: &str) -> Option<&'a str> {
    key.strip_prefix(family)?
        .strip_prefix('[')?
        .strip_suffix(']')
}

fn encode_value(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Brackets stay literal so links read like the parameters clients send
fn encode_key(key: &str) -> String {
    encode_value(key).replace("%5B", "[").replace("%5D", "]")
}
