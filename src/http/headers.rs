//! Ordered, case-insensitive header list.
//!
//! HTTP/1.1 allows repeated header fields (several `WWW-Authenticate` lines in a
//! single 401 is the case that matters here), so headers are kept as an ordered
//! list of name/value pairs rather than a map.

/// Ordered list of header fields as they appeared on the wire.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderList {
    fields: Vec<(String, String)>,
}

impl HeaderList {
    /// Create an empty header list.
    pub fn new() -> Self {
        Self::default()
    }

    /// First value for `name` (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `name`, in wire order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.fields
            .iter()
            .filter(move |(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Append a field, keeping any existing values for the same name.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    /// Replace every value of `name` with a single `value`.
    ///
    /// The field keeps the position of its first occurrence; a new field is appended.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        let value = value.into();
        match self.fields.iter().position(|(n, _)| n.eq_ignore_ascii_case(name)) {
            Some(idx) => {
                self.fields[idx].1 = value;
                let mut seen = 0usize;
                self.fields.retain(|(n, _)| {
                    if n.eq_ignore_ascii_case(name) {
                        seen += 1;
                        seen == 1
                    } else {
                        true
                    }
                });
            }
            None => self.fields.push((name.to_string(), value)),
        }
    }

    /// Whether any value of `name` carries `token` in its comma-separated list.
    ///
    /// Used for `Connection: close` and `Transfer-Encoding: chunked`.
    pub fn has_token(&self, name: &str, token: &str) -> bool {
        self.get_all(name)
            .flat_map(|v| v.split(','))
            .any(|t| t.trim().eq_ignore_ascii_case(token))
    }

    /// Iterate over all fields in wire order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl<N: Into<String>, V: Into<String>> FromIterator<(N, V)> for HeaderList {
    fn from_iter<I: IntoIterator<Item = (N, V)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(|(n, v)| (n.into(), v.into())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_is_case_insensitive() {
        let headers: HeaderList = [("Content-Length", "12")].into_iter().collect();
        assert_eq!(headers.get("content-length"), Some("12"));
        assert_eq!(headers.get("CONTENT-LENGTH"), Some("12"));
        assert_eq!(headers.get("host"), None);
    }

    #[test]
    fn value_outlives_the_lookup_name() {
        let headers: HeaderList = [("Host", "a"), ("host", "b")].into_iter().collect();
        let value = {
            let name = String::from("HOST");
            headers.get(&name)
        };
        assert_eq!(value, Some("a"));
    }

    #[test]
    fn set_collapses_repeated_fields() {
        let mut headers: HeaderList = [
            ("Host", "a"),
            ("Authorization", "old-1"),
            ("Accept", "*/*"),
            ("authorization", "old-2"),
        ]
        .into_iter()
        .collect();

        headers.set("Authorization", "new");

        let fields: Vec<_> = headers.iter().collect();
        assert_eq!(
            fields,
            vec![("Host", "a"), ("Authorization", "new"), ("Accept", "*/*")]
        );
    }

    #[test]
    fn set_appends_missing_field() {
        let mut headers = HeaderList::new();
        headers.push("Host", "a");
        headers.set("Authorization", "Digest x");
        assert_eq!(headers.len(), 2);
        assert_eq!(headers.get("authorization"), Some("Digest x"));
    }

    #[test]
    fn token_lists() {
        let headers: HeaderList = [("Connection", "keep-alive, Close")].into_iter().collect();
        assert!(headers.has_token("connection", "close"));
        assert!(!headers.has_token("connection", "upgrade"));
    }
}
