use indexmap::IndexMap;

/// Request headers
///
/// Lookups are case-insensitive, iteration yields the names as they were received. A header
/// received more than once holds all its values joined by `", "`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    entries: IndexMap<String, (String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build headers from raw `(name, value)` lines
    ///
    /// # Example
    /// ```
    /// use trusted_request::Headers;
    ///
    /// let headers = Headers::from_pairs([("Accept", "text/html"), ("accept", "*/*")]);
    ///
    /// assert_eq!(headers.get("ACCEPT"), Some("text/html, */*"));
    /// assert_eq!(headers.iter().next(), Some(("Accept", "text/html, */*")));
    /// ```
    pub fn from_pairs<N, V>(pairs: impl IntoIterator<Item = (N, V)>) -> Self
    where
        N: Into<String>,
        V: AsRef<str>,
    {
        let mut headers = Self::new();
        for (name, value) in pairs {
            headers.append(name, value.as_ref());
        }

        headers
    }

    /// Build headers from server variables
    ///
    /// `HTTP_*` variables lose their prefix, `CONTENT_*` ones are kept whole, underscores become
    /// dashes and names are lower-cased.
    pub fn from_variables<'a>(variables: impl IntoIterator<Item = (&'a String, &'a String)>) -> Self {
        let mut headers = Self::new();

        for (key, value) in variables {
            let name = if let Some(name) = key.strip_prefix("HTTP_") {
                name
            } else if key.starts_with("CONTENT_") {
                key.as_str()
            } else {
                continue;
            };

            headers.append(name.to_ascii_lowercase().replace('_', "-"), value);
        }

        headers
    }

    /// Add a value, joining it to the existing ones
    pub fn append(&mut self, name: impl Into<String>, value: &str) {
        let name = name.into();

        self.entries
            .entry(name.to_ascii_lowercase())
            .and_modify(|(_, current)| {
                current.push_str(", ");
                current.push_str(value);
            })
            .or_insert_with(|| (name, value.to_string()));
    }

    /// Set a value, replacing the existing ones
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();

        self.entries
            .insert(name.to_ascii_lowercase(), (name, value.into()));
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(|(_, value)| value.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&name.to_ascii_lowercase())
    }

    /// Iterate over `(original name, value)`
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .values()
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(feature = "http")]
impl From<&http::HeaderMap> for Headers {
    fn from(map: &http::HeaderMap) -> Self {
        Self::from_pairs(
            map.iter()
                .filter_map(|(name, value)| Some((name.as_str(), value.to_str().ok()?))),
        )
    }
}
