//! Query-string encoding of endpoint options.
//!
//! Each options type lists its parameters through [`QueryOptions`], in a
//! fixed order. Parameters holding their type's default value (empty string,
//! zero, `false`, no values) are omitted from the query.

use url::form_urlencoded;
use url::Url;

use crate::error::EncodeError;

/// Value of one query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryValue {
    Str(String),
    Int(i64),
    Bool(bool),
    /// Repeated parameter, one `key=value` pair per entry.
    List(Vec<String>),
}

impl QueryValue {
    pub fn is_default(&self) -> bool {
        match self {
            QueryValue::Str(s) => s.is_empty(),
            QueryValue::Int(n) => *n == 0,
            QueryValue::Bool(b) => !b,
            QueryValue::List(values) => values.is_empty(),
        }
    }

    fn encoded(&self) -> Vec<String> {
        match self {
            QueryValue::Str(s) => vec![s.clone()],
            QueryValue::Int(n) => vec![n.to_string()],
            QueryValue::Bool(b) => vec![b.to_string()],
            QueryValue::List(values) => values.clone(),
        }
    }
}

impl From<&str> for QueryValue {
    fn from(value: &str) -> Self {
        QueryValue::Str(value.to_string())
    }
}

impl From<&String> for QueryValue {
    fn from(value: &String) -> Self {
        QueryValue::Str(value.clone())
    }
}

impl From<i64> for QueryValue {
    fn from(value: i64) -> Self {
        QueryValue::Int(value)
    }
}

impl From<bool> for QueryValue {
    fn from(value: bool) -> Self {
        QueryValue::Bool(value)
    }
}

impl From<&[String]> for QueryValue {
    fn from(values: &[String]) -> Self {
        QueryValue::List(values.to_vec())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParam {
    pub key: &'static str,
    pub value: QueryValue,
}

impl QueryParam {
    pub fn new(key: &'static str, value: impl Into<QueryValue>) -> Self {
        Self {
            key,
            value: value.into(),
        }
    }
}

/// An options record that maps onto query parameters.
pub trait QueryOptions {
    fn query_params(&self) -> Vec<QueryParam>;
}

/// Paging options shared by list endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListOptions {
    pub page_num: i64,
    pub items_per_page: i64,
    pub include_count: bool,
}

impl QueryOptions for ListOptions {
    fn query_params(&self) -> Vec<QueryParam> {
        vec![
            QueryParam::new("pageNum", self.page_num),
            QueryParam::new("itemsPerPage", self.items_per_page),
            QueryParam::new("includeCount", self.include_count),
        ]
    }
}

/// Merge the parameters of `opts` into the query of `url`.
///
/// `url` may be relative. Parameters from `opts` replace same-named ones
/// already present; other existing parameters keep their order. With no
/// options, or only default-valued ones, `url` comes back unchanged.
pub fn set_query_params<O>(url: &str, opts: Option<&O>) -> Result<String, EncodeError>
where
    O: QueryOptions + ?Sized,
{
    let Some(opts) = opts else {
        return Ok(url.to_string());
    };

    let (rest, fragment) = match url.split_once('#') {
        Some((rest, fragment)) => (rest, Some(fragment)),
        None => (url, None),
    };
    validate_url(rest)?;

    let params = opts.query_params();
    if let Some(param) = params.iter().find(|param| param.key.is_empty()) {
        return Err(EncodeError::Query(format!(
            "parameter with value {:?} has an empty key",
            param.value
        )));
    }
    let set: Vec<&QueryParam> = params.iter().filter(|param| !param.value.is_default()).collect();
    if set.is_empty() {
        return Ok(url.to_string());
    }

    let (path, query) = match rest.split_once('?') {
        Some((path, query)) => (path, query),
        None => (rest, ""),
    };

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        if set.iter().any(|param| param.key == key) {
            continue;
        }
        serializer.append_pair(&key, &value);
    }
    for param in &set {
        for value in param.value.encoded() {
            serializer.append_pair(param.key, &value);
        }
    }

    let mut merged = format!("{path}?{}", serializer.finish());
    if let Some(fragment) = fragment {
        merged.push('#');
        merged.push_str(fragment);
    }
    Ok(merged)
}

fn validate_url(url: &str) -> Result<(), EncodeError> {
    let invalid = |source| EncodeError::InvalidUrl {
        url: url.to_string(),
        source,
    };
    let anchor = Url::parse("http://localhost/").map_err(invalid)?;
    anchor.join(url).map_err(invalid)?;
    Ok(())
}
