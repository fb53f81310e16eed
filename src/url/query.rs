use indexmap::IndexMap;
use serde::Serialize;

use super::parse::{form_decode, raw_url_encode};

/// Ordered map of request parameters (query, post or cookies)
///
/// Equality ignores key order.
pub type Params = IndexMap<String, Param>;

/// A parameter value: a plain string or a nested map built from `name[key]=value` syntax
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Param {
    Scalar(String),
    Array(Params),
}

impl Param {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Param::Scalar(value) => Some(value),
            Param::Array(_) => None,
        }
    }

    pub fn as_array(&self) -> Option<&Params> {
        match self {
            Param::Scalar(_) => None,
            Param::Array(params) => Some(params),
        }
    }
}

impl From<&str> for Param {
    fn from(value: &str) -> Self {
        Param::Scalar(value.to_string())
    }
}

impl From<String> for Param {
    fn from(value: String) -> Self {
        Param::Scalar(value)
    }
}

impl From<Params> for Param {
    fn from(value: Params) -> Self {
        Param::Array(value)
    }
}

/// Parse a query string, supporting the `a[b]=1` / `a[]=1` array syntax
///
/// Encoded opening brackets (`%5B`) act as syntax so that the output of [`build_query`] parses
/// back to the same structure. Later pairs override earlier ones.
///
/// # Example
/// ```
/// use trusted_request::url::{parse_query, Param};
///
/// let params = parse_query("a=1&b[x]=2&b[]=3");
///
/// assert_eq!(params["a"], Param::from("1"));
/// assert_eq!(params["b"].as_array().unwrap()["x"], Param::from("2"));
/// assert_eq!(params["b"].as_array().unwrap()["0"], Param::from("3"));
/// ```
pub fn parse_query(query: &str) -> Params {
    let query = query.replace("%5B", "[").replace("%5b", "[");
    let mut params = Params::new();

    for pair in query.split('&').filter(|pair| !pair.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let key = form_decode(key);

        if let Some(path) = key_path(key.trim_start_matches(' ')) {
            insert(&mut params, path, form_decode(value));
        }
    }

    params
}

/// Split `base[seg1][seg2]` into its segments, `None` for an empty base name
fn key_path(key: &str) -> Option<Vec<&str>> {
    let Some(open) = key.find('[') else {
        return (!key.is_empty()).then(|| vec![key]);
    };

    let base = &key[..open];
    if base.is_empty() {
        return None;
    }

    let mut path = vec![base];
    let mut rest = &key[open..];

    // text after an unclosed bracket or after the last segment is ignored
    while let Some(inner) = rest.strip_prefix('[') {
        let Some(close) = inner.find(']') else {
            break;
        };
        path.push(&inner[..close]);
        rest = &inner[close + 1..];
    }

    Some(path)
}

fn insert(params: &mut Params, path: Vec<&str>, value: String) {
    let mut current = params;
    let mut segments = path.into_iter().peekable();

    while let Some(segment) = segments.next() {
        let key = if segment.is_empty() {
            next_index(current).to_string()
        } else {
            segment.to_string()
        };

        if segments.peek().is_none() {
            current.insert(key, Param::Scalar(value));
            return;
        }

        let slot = current
            .entry(key)
            .or_insert_with(|| Param::Array(Params::new()));
        if matches!(*slot, Param::Scalar(_)) {
            *slot = Param::Array(Params::new());
        }
        let Param::Array(nested) = slot else {
            return;
        };
        current = nested;
    }
}

fn next_index(params: &Params) -> u64 {
    params
        .keys()
        .filter_map(|key| key.parse::<u64>().ok())
        .max()
        .map_or(0, |max| max + 1)
}

/// Serialize parameters with RFC 3986 percent-encoding (space is `%20`)
///
/// Nested maps produce `name%5Bkey%5D=value` pairs, empty nested maps produce nothing.
pub fn build_query(params: &Params) -> String {
    let mut pairs = Vec::new();
    append_pairs(&mut pairs, None, params);

    pairs.join("&")
}

fn append_pairs(pairs: &mut Vec<String>, prefix: Option<&str>, params: &Params) {
    for (key, value) in params {
        let name = match prefix {
            None => raw_url_encode(key).into_owned(),
            Some(prefix) => format!("{prefix}%5B{}%5D", raw_url_encode(key)),
        };

        match value {
            Param::Scalar(value) => pairs.push(format!("{name}={}", raw_url_encode(value))),
            Param::Array(nested) => append_pairs(pairs, Some(&name), nested),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar(value: &str) -> Param {
        Param::from(value)
    }

    #[test]
    fn parse_plain_pairs() {
        let params = parse_query("a=1&b=x+y%20z&c&=ignored&&d=");

        assert_eq!(params.len(), 4);
        assert_eq!(params["a"], scalar("1"));
        assert_eq!(params["b"], scalar("x y z"));
        assert_eq!(params["c"], scalar(""));
        assert_eq!(params["d"], scalar(""));
    }

    #[test]
    fn parse_keeps_dots_and_spaces_in_names() {
        let params = parse_query("a.b=1&c+d=2");

        assert_eq!(params["a.b"], scalar("1"));
        assert_eq!(params["c d"], scalar("2"));
    }

    #[test]
    fn parse_brackets() {
        let params = parse_query("a[b]=1&a[c][d]=2&e[]=x&e[]=y&e[5]=z&e[]=w");

        let a = params["a"].as_array().unwrap();
        assert_eq!(a["b"], scalar("1"));
        assert_eq!(a["c"].as_array().unwrap()["d"], scalar("2"));

        let e = params["e"].as_array().unwrap();
        assert_eq!(e.keys().collect::<Vec<_>>(), ["0", "1", "5", "6"]);
    }

    #[test]
    fn parse_encoded_brackets() {
        let params = parse_query("a%5Bb%5D=1&c%5b%5D=2");

        assert_eq!(params["a"].as_array().unwrap()["b"], scalar("1"));
        assert_eq!(params["c"].as_array().unwrap()["0"], scalar("2"));
    }

    #[test]
    fn parse_malformed_brackets() {
        let params = parse_query("a[b=1&[x]=2&c[d]e=3&f[g[h]]=4");

        assert_eq!(params["a"], scalar("1"));
        assert!(!params.contains_key("[x]"));
        assert_eq!(params["c"].as_array().unwrap()["d"], scalar("3"));
        assert_eq!(params["f"].as_array().unwrap()["g[h"], scalar("4"));
    }

    #[test]
    fn later_pairs_win() {
        let params = parse_query("a=1&a[b]=2");
        assert_eq!(params["a"].as_array().unwrap()["b"], scalar("2"));

        let params = parse_query("a[b]=2&a=1");
        assert_eq!(params["a"], scalar("1"));
    }

    #[test]
    fn build_rfc3986() {
        let mut params = Params::new();
        params.insert("a b".into(), scalar("c d+e"));
        params.insert("arr".into(), Param::Array(parse_query("x=1&y[z]=2")));
        params.insert("empty".into(), Param::Array(Params::new()));

        assert_eq!(
            build_query(&params),
            "a%20b=c%20d%2Be&arr%5Bx%5D=1&arr%5By%5D%5Bz%5D=2"
        );
    }

    #[test]
    fn build_then_parse_keeps_structure() {
        let params = parse_query("list[]=a&list[]=b&map[k]=v&name=x");

        assert_eq!(parse_query(&build_query(&params)), params);
    }

    #[test]
    fn equality_ignores_order() {
        assert_eq!(parse_query("a=1&b=2"), parse_query("b=2&a=1"));
        assert_ne!(parse_query("a=1&b=2"), parse_query("b=1&a=2"));
    }
}
