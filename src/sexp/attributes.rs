//! Insertion-ordered attribute map.

use super::Sexp;

/// Attribute holding element names.
pub const NAMES: &str = "names";
/// Attribute holding per-axis extents.
pub const DIM: &str = "dim";
/// Attribute holding the S3 class.
pub const CLASS: &str = "class";
/// Attribute holding data-frame row labels.
pub const ROW_NAMES: &str = "row.names";

/// Named side-channel values attached to a [`Sexp`].
///
/// Keeps insertion order so attributes are written back to the server in
/// the order they were read. Setting an existing name replaces its value
/// in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Attributes {
    entries: Vec<(String, Sexp)>,
}

impl Attributes {
    /// Create an empty attribute map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up an attribute.
    pub fn get(&self, name: &str) -> Option<&Sexp> {
        self.entries.iter().find(|(k, _)| k == name).map(|(_, v)| v)
    }

    /// Look up an attribute mutably.
    pub fn get_mut(&mut self, name: &str) -> Option<&mut Sexp> {
        self.entries
            .iter_mut()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
    }

    /// Insert or replace an attribute, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: Sexp) -> Option<Sexp> {
        let name = name.into();
        match self.get_mut(&name) {
            Some(slot) => Some(std::mem::replace(slot, value)),
            None => {
                self.entries.push((name, value));
                None
            }
        }
    }

    /// Remove an attribute.
    pub fn remove(&mut self, name: &str) -> Option<Sexp> {
        let pos = self.entries.iter().position(|(k, _)| k == name)?;
        Some(self.entries.remove(pos).1)
    }

    /// Whether the attribute is present.
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether there are no attributes.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Sexp)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, Sexp)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (String, Sexp)>>(iter: I) -> Self {
        let mut attrs = Attributes::new();
        for (k, v) in iter {
            attrs.insert(k, v);
        }
        attrs
    }
}

impl IntoIterator for Attributes {
    type Item = (String, Sexp);
    type IntoIter = std::vec::IntoIter<(String, Sexp)>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_keeps_order_and_replaces_in_place() {
        let mut attrs = Attributes::new();
        attrs.insert("class", Sexp::from("data.frame"));
        attrs.insert("names", Sexp::from(vec!["a", "b"]));
        let old = attrs.insert("class", Sexp::from("list"));

        assert_eq!(old, Some(Sexp::from("data.frame")));
        let keys: Vec<_> = attrs.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["class", "names"]);
        assert_eq!(attrs.get("class"), Some(&Sexp::from("list")));
    }

    #[test]
    fn test_remove() {
        let mut attrs = Attributes::new();
        attrs.insert("dim", Sexp::from(vec![2, 3]));
        assert!(attrs.contains("dim"));
        assert!(attrs.remove("dim").is_some());
        assert!(attrs.is_empty());
        assert!(attrs.remove("dim").is_none());
    }
}
