//! Name mappings for remapping rules.
//!
//! A rule with `remap` set names methods and fields the way the mixin author sees them
//! (typically deobfuscated names); [`Mappings`] translates those names into the ones the
//! loaded unit actually uses before resolution.
//!
//! # Format
//!
//! One entry per line, `#` starts a comment:
//!
//! ```text
//! # kind   owner               name    descriptor  mapped
//! METHOD   com/example/Player  tick    ()V         a
//! FIELD    com/example/Player  health  I           b
//! ```
//!
//! The descriptor column may be `*` to map every overload.

use std::{collections::HashMap, path::Path};

use crate::{utils::internal_name, Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct MemberKey {
    owner: String,
    name: String,
}

/// Method and field name translation table, keyed by owner.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Mappings {
    /// `(owner, name)` -> `[(descriptor or None, mapped)]`
    methods: HashMap<MemberKey, Vec<(Option<String>, String)>>,
    fields: HashMap<MemberKey, Vec<(Option<String>, String)>>,
}

impl Mappings {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse the line format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Configuration`] naming the line of the first malformed entry.
    pub fn parse(text: &str) -> Result<Mappings> {
        let mut mappings = Mappings::new();
        for (number, line) in text.lines().enumerate() {
            let line = line.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue;
            }

            let columns: Vec<&str> = line.split_whitespace().collect();
            let [kind, owner, name, descriptor, mapped] = columns[..] else {
                return Err(Error::Configuration(format!(
                    "Mapping line {} has {} columns, expected 5",
                    number + 1,
                    columns.len()
                )));
            };
            let descriptor = (descriptor != "*").then_some(descriptor);
            match kind.to_ascii_uppercase().as_str() {
                "METHOD" => mappings.add_method(owner, name, descriptor, mapped),
                "FIELD" => mappings.add_field(owner, name, descriptor, mapped),
                _ => {
                    return Err(Error::Configuration(format!(
                        "Mapping line {} has unknown kind '{}'",
                        number + 1,
                        kind
                    )))
                }
            }
        }
        Ok(mappings)
    }

    /// Read and parse a mapping file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::FileError`] if the file cannot be read, or any error of
    /// [`Mappings::parse`].
    pub fn from_file(path: &Path) -> Result<Mappings> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Map method `owner.name` (optionally only the overload `descriptor`) to `mapped`.
    pub fn add_method(&mut self, owner: &str, name: &str, descriptor: Option<&str>, mapped: &str) {
        Self::insert(&mut self.methods, owner, name, descriptor, mapped);
    }

    /// Map field `owner.name` to `mapped`.
    pub fn add_field(&mut self, owner: &str, name: &str, descriptor: Option<&str>, mapped: &str) {
        Self::insert(&mut self.fields, owner, name, descriptor, mapped);
    }

    /// Runtime name of method `owner.name`; unmapped names come back unchanged.
    ///
    /// With `descriptor` set, an entry for that exact overload wins over a `*` entry.
    #[must_use]
    pub fn method<'n>(&'n self, owner: &str, name: &'n str, descriptor: Option<&str>) -> &'n str {
        Self::lookup(&self.methods, owner, name, descriptor)
    }

    /// Runtime name of field `owner.name`; unmapped names come back unchanged.
    #[must_use]
    pub fn field<'n>(&'n self, owner: &str, name: &'n str, descriptor: Option<&str>) -> &'n str {
        Self::lookup(&self.fields, owner, name, descriptor)
    }

    /// Returns the number of entries
    #[must_use]
    pub fn len(&self) -> usize {
        self.methods.values().chain(self.fields.values()).map(Vec::len).sum()
    }

    /// Returns `true` if the table has no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(
        table: &mut HashMap<MemberKey, Vec<(Option<String>, String)>>,
        owner: &str,
        name: &str,
        descriptor: Option<&str>,
        mapped: &str,
    ) {
        let key = MemberKey {
            owner: internal_name(owner),
            name: name.to_string(),
        };
        let entries = table.entry(key).or_default();
        let descriptor = descriptor.map(str::to_string);
        entries.retain(|(existing, _)| *existing != descriptor);
        entries.push((descriptor, mapped.to_string()));
    }

    fn lookup<'n>(
        table: &'n HashMap<MemberKey, Vec<(Option<String>, String)>>,
        owner: &str,
        name: &'n str,
        descriptor: Option<&str>,
    ) -> &'n str {
        let key = MemberKey {
            owner: owner.to_string(),
            name: name.to_string(),
        };
        let Some(entries) = table.get(&key) else {
            return name;
        };

        let exact = descriptor.and_then(|wanted| {
            entries
                .iter()
                .find(|(d, _)| d.as_deref() == Some(wanted))
        });
        let any = || entries.iter().find(|(d, _)| d.is_none());
        let fallback = || entries.first().filter(|_| descriptor.is_none());
        exact
            .or_else(any)
            .or_else(fallback)
            .map_or(name, |(_, mapped)| mapped.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TABLE: &str = "
        # player
        METHOD com/example/Player tick ()V a
        METHOD com.example.Player damage (I)V b
        METHOD com/example/Player damage * c
        FIELD  com/example/Player health I d
    ";

    #[test]
    fn test_parse_and_lookup() {
        let mappings = Mappings::parse(TABLE).unwrap();
        assert_eq!(mappings.len(), 4);
        assert_eq!(mappings.method("com/example/Player", "tick", Some("()V")), "a");
        assert_eq!(mappings.method("com/example/Player", "tick", None), "a");
        assert_eq!(mappings.method("com/example/Player", "damage", Some("(I)V")), "b");
        assert_eq!(mappings.method("com/example/Player", "damage", Some("(F)V")), "c");
        assert_eq!(mappings.field("com/example/Player", "health", None), "d");
        assert_eq!(mappings.method("com/example/Other", "tick", None), "tick");
        assert_eq!(mappings.method("com/example/Player", "run", None), "run");
    }

    #[test]
    fn test_malformed_lines() {
        assert!(Mappings::parse("METHOD a b c").is_err());
        assert!(Mappings::parse("CLASS a b c d").is_err());
        assert!(Mappings::parse("\n# only a comment\n").unwrap().is_empty());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mappings.txt");
        std::fs::write(&path, TABLE).unwrap();
        let mappings = Mappings::from_file(&path).unwrap();
        assert_eq!(mappings.field("com/example/Player", "health", Some("I")), "d");
        assert!(Mappings::from_file(&dir.path().join("missing.txt")).is_err());
    }
}
