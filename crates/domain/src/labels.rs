use std::fmt;

use serde::{Deserialize, Serialize};

use crate::DomainError;

/// Index into a [`LabelTable`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(transparent)]
pub struct GenreId(pub usize);

impl GenreId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for GenreId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Ordered genre names. Position `i` is the display name of `GenreId(i)`.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct LabelTable {
    names: Vec<String>,
}

impl LabelTable {
    pub fn new<I, S>(names: I) -> Result<Self, DomainError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names: Vec<String> = names.into_iter().map(Into::into).collect();
        if names.is_empty() {
            return Err(DomainError::validation(
                "label table requires at least one genre",
            ));
        }
        for (index, name) in names.iter().enumerate() {
            if name.trim().is_empty() {
                return Err(DomainError::validation(format!(
                    "genre label at position {index} is blank"
                )));
            }
            if names[..index].contains(name) {
                return Err(DomainError::validation(format!(
                    "genre label {name:?} appears more than once"
                )));
            }
        }
        Ok(Self { names })
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn name(&self, id: GenreId) -> Option<&str> {
        self.names.get(id.0).map(String::as_str)
    }

    pub fn resolve(&self, name: &str) -> Result<GenreId, DomainError> {
        self.names
            .iter()
            .position(|candidate| candidate == name)
            .map(GenreId)
            .ok_or_else(|| DomainError::UnknownLabel(name.to_string()))
    }
}

impl Default for LabelTable {
    fn default() -> Self {
        Self {
            names: vec!["Rock".to_string(), "Techno".to_string()],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_names_to_positions() {
        let table = LabelTable::new(["Rock", "Techno", "Orchestral"]).unwrap();
        assert_eq!(table.resolve("Techno").unwrap(), GenreId(1));
        assert_eq!(table.name(GenreId(2)), Some("Orchestral"));
        assert_eq!(table.name(GenreId(3)), None);
        assert!(matches!(
            table.resolve("Jazz"),
            Err(DomainError::UnknownLabel(name)) if name == "Jazz"
        ));
    }

    #[test]
    fn rejects_duplicates_and_blanks() {
        assert!(LabelTable::new(Vec::<String>::new()).is_err());
        assert!(LabelTable::new(["Rock", "Rock"]).is_err());
        assert!(LabelTable::new(["Rock", " "]).is_err());
    }

    #[test]
    fn default_table_matches_two_genre_dataset() {
        let table = LabelTable::default();
        assert_eq!(table.names(), ["Rock", "Techno"]);
    }
}
