//! The type dictionary: the persisted catalogue of type descriptors.
//!
//! ```text
//! 1000000 app.Person {
//! 	text name,
//! 	i32 age,
//! 	ref friend,
//! }
//! ```

use std::collections::BTreeMap;

use ogre_types::TypeId;

use crate::descriptor::{FieldDescriptor, FieldKind, TypeDescriptor};
use crate::error::{HandlerError, HandlerResult};

/// Ordered set of descriptors, keyed by type id.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TypeDictionary {
    entries: BTreeMap<TypeId, TypeDescriptor>,
}

impl TypeDictionary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, type_id: TypeId) -> Option<&TypeDescriptor> {
        self.entries.get(&type_id)
    }

    pub fn by_name(&self, type_name: &str) -> Option<&TypeDescriptor> {
        self.entries.values().find(|d| d.type_name == type_name)
    }

    /// Add a descriptor. Existing entries are never altered.
    pub fn insert(&mut self, descriptor: TypeDescriptor) -> HandlerResult<()> {
        if let Some(existing) = self.entries.get(&descriptor.type_id) {
            if existing == &descriptor {
                return Ok(());
            }
            return Err(HandlerError::DuplicateType {
                type_name: descriptor.type_name,
            });
        }
        if self.by_name(&descriptor.type_name).is_some() {
            return Err(HandlerError::DuplicateType {
                type_name: descriptor.type_name,
            });
        }
        self.entries.insert(descriptor.type_id, descriptor);
        Ok(())
    }

    /// Highest type id in use, if any.
    pub fn highest_type_id(&self) -> Option<TypeId> {
        self.entries.keys().next_back().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeDescriptor> {
        self.entries.values()
    }

    /// Render the dictionary text, ordered by type id.
    pub fn assemble(&self) -> String {
        let mut out = String::new();
        for descriptor in self.entries.values() {
            out.push_str(&format!("{} {} {{\n", descriptor.type_id, descriptor.type_name));
            for field in &descriptor.fields {
                out.push_str(&format!("\t{} {},\n", field.kind, field.name));
            }
            out.push_str("}\n");
        }
        out
    }

    /// Parse dictionary text. Blank lines are ignored.
    pub fn parse(text: &str) -> HandlerResult<Self> {
        let mut dictionary = Self::new();
        let mut open: Option<TypeDescriptor> = None;

        for (index, raw) in text.lines().enumerate() {
            let line_no = index + 1;
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            let invalid = |reason: String| HandlerError::InvalidDictionary {
                line: line_no,
                reason,
            };

            if line == "}" {
                let done = open
                    .take()
                    .ok_or_else(|| invalid("'}' without an open type".to_string()))?;
                dictionary.insert(done).map_err(|e| invalid(e.to_string()))?;
                continue;
            }

            match open.as_mut() {
                None => {
                    let head = line
                        .strip_suffix('{')
                        .ok_or_else(|| invalid(format!("expected '<id> <name> {{', got '{line}'")))?;
                    let mut parts = head.split_whitespace();
                    let (Some(id), Some(name), None) = (parts.next(), parts.next(), parts.next()) else {
                        return Err(invalid(format!("malformed type header '{line}'")));
                    };
                    let type_id: TypeId = id
                        .parse()
                        .map_err(|_| invalid(format!("invalid type id '{id}'")))?;
                    open = Some(TypeDescriptor::new(type_id, name, Vec::new()));
                }
                Some(descriptor) => {
                    let body = line
                        .strip_suffix(',')
                        .ok_or_else(|| invalid(format!("field '{line}' must end with ','")))?;
                    let (kind, name) = body
                        .split_once(char::is_whitespace)
                        .ok_or_else(|| invalid(format!("malformed field '{line}'")))?;
                    let kind = kind.parse::<FieldKind>().map_err(invalid)?;
                    descriptor
                        .fields
                        .push(FieldDescriptor::new(name.trim(), kind));
                }
            }
        }

        if let Some(unterminated) = open {
            return Err(HandlerError::InvalidDictionary {
                line: text.lines().count(),
                reason: format!("type {} is not closed", unterminated.type_name),
            });
        }
        Ok(dictionary)
    }
}
