//! Projection of directory attributes onto host profile fields.

use crate::entry::UserEntry;
use crate::options::FieldMapping;
use std::collections::HashMap;

/// Host profile fields filled from directory attributes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    fields: HashMap<String, Vec<String>>,
}

impl Profile {
    /// The first value of a field, if the field was set.
    pub fn first(&self, field: &str) -> Option<&str> {
        self.fields
            .get(field)
            .and_then(|v| v.first())
            .map(String::as_str)
    }

    /// All values of a field. Empty when the field was left unset.
    pub fn all(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether the field was set at all.
    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    /// Number of fields that were set.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether no field was set.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// Projects the configured attribute-to-field pairs onto a profile.
///
/// Pure: copies the first value (or all values for multi-valued mappings)
/// of each mapped attribute present on the entry. Absent attributes leave
/// the profile field unset; they are never an error.
pub fn map_profile(user: &UserEntry, mappings: &[FieldMapping]) -> Profile {
    let mut fields = HashMap::new();
    for mapping in mappings {
        let values = user.all(&mapping.attribute);
        if values.is_empty() {
            continue;
        }
        let projected = if mapping.multi_valued {
            values.to_vec()
        } else {
            vec![values[0].clone()]
        };
        fields.insert(mapping.field.clone(), projected);
    }
    Profile { fields }
}
