//! Protocol-neutral directory entry.

use std::collections::HashMap;

/// One entry returned by a directory search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub dn: String,
    pub attrs: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attrs: HashMap::new(),
        }
    }

    /// Add a single-valued attribute.
    #[must_use]
    pub fn with(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attrs.entry(name.into()).or_default().push(value.into());
        self
    }

    /// First value of an attribute. Attribute names compare case-insensitively.
    #[must_use]
    pub fn first(&self, name: &str) -> Option<&str> {
        self.values(name)
            .and_then(|values| values.first())
            .map(String::as_str)
    }

    #[must_use]
    pub fn values(&self, name: &str) -> Option<&Vec<String>> {
        self.attrs.get(name).or_else(|| {
            self.attrs
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, values)| values)
        })
    }

    /// Raw attribute payload stored alongside the user row.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        object.insert("dn".to_string(), serde_json::Value::String(self.dn.clone()));
        for (name, values) in &self.attrs {
            let value = match values.as_slice() {
                [single] => serde_json::Value::String(single.clone()),
                many => serde_json::Value::Array(
                    many.iter().cloned().map(serde_json::Value::String).collect(),
                ),
            };
            object.insert(name.clone(), value);
        }
        serde_json::Value::Object(object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_is_case_insensitive() {
        let entry = DirectoryEntry::new("cn=jdoe").with("sAMAccountName", "jdoe");
        assert_eq!(entry.first("samaccountname"), Some("jdoe"));
        assert_eq!(entry.first("mail"), None);
    }

    #[test]
    fn test_to_json_flattens_single_values() {
        let entry = DirectoryEntry::new("cn=jdoe")
            .with("cn", "John Doe")
            .with("memberOf", "cn=a")
            .with("memberOf", "cn=b");
        let json = entry.to_json();
        assert_eq!(json["dn"], "cn=jdoe");
        assert_eq!(json["cn"], "John Doe");
        assert_eq!(json["memberOf"], serde_json::json!(["cn=a", "cn=b"]));
    }
}
