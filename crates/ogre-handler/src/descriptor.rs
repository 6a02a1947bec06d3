use std::fmt;
use std::str::FromStr;

use ogre_frame::{FrameResult, PayloadReader};
use ogre_types::TypeId;

use crate::error::HandlerError;

/// Persisted kind of a field. The textual token is what the type dictionary
/// stores.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum FieldKind {
    Bool,
    I32,
    I64,
    F64,
    Text,
    Ref,
    Lazy,
    RefList,
    I64List,
}

impl FieldKind {
    pub fn token(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I32 => "i32",
            Self::I64 => "i64",
            Self::F64 => "f64",
            Self::Text => "text",
            Self::Ref => "ref",
            Self::Lazy => "lazy",
            Self::RefList => "[ref]",
            Self::I64List => "[i64]",
        }
    }

    /// Width in bytes, or `None` for variable-length kinds.
    pub fn fixed_width(self) -> Option<usize> {
        match self {
            Self::Bool => Some(1),
            Self::I32 => Some(4),
            Self::I64 | Self::F64 | Self::Ref | Self::Lazy => Some(8),
            Self::Text | Self::RefList | Self::I64List => None,
        }
    }

    pub fn is_reference(self) -> bool {
        matches!(self, Self::Ref | Self::Lazy | Self::RefList)
    }

    /// Move past one value of this kind.
    pub fn skip(self, reader: &mut PayloadReader<'_>) -> FrameResult<()> {
        match self.fixed_width() {
            Some(width) => reader.skip(width),
            None => reader.get_list().map(|_| ()),
        }
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

impl FromStr for FieldKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "bool" => Self::Bool,
            "i32" => Self::I32,
            "i64" => Self::I64,
            "f64" => Self::F64,
            "text" => Self::Text,
            "ref" => Self::Ref,
            "lazy" => Self::Lazy,
            "[ref]" => Self::RefList,
            "[i64]" => Self::I64List,
            other => return Err(format!("unknown field kind '{other}'")),
        })
    }
}

/// One persisted field: logical name plus kind.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct FieldDescriptor {
    pub name: String,
    pub kind: FieldKind,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
        }
    }
}

/// Persisted layout of a type. Immutable once written to the dictionary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TypeDescriptor {
    pub type_id: TypeId,
    pub type_name: String,
    pub fields: Vec<FieldDescriptor>,
}

impl TypeDescriptor {
    pub fn new(type_id: TypeId, type_name: impl Into<String>, fields: Vec<FieldDescriptor>) -> Self {
        Self {
            type_id,
            type_name: type_name.into(),
            fields,
        }
    }

    /// Compact one-line layout, e.g. `{i64 age, ref friend}`.
    pub fn layout(&self) -> String {
        let fields: Vec<String> = self
            .fields
            .iter()
            .map(|f| format!("{} {}", f.kind, f.name))
            .collect();
        format!("{{{}}}", fields.join(", "))
    }

    /// Fail unless `fields` matches the persisted layout exactly.
    pub fn check_fields(&self, fields: &[FieldDescriptor]) -> Result<(), HandlerError> {
        if self.fields == fields {
            return Ok(());
        }
        let current = TypeDescriptor::new(self.type_id, self.type_name.clone(), fields.to_vec());
        Err(HandlerError::DescriptorMismatch {
            type_name: self.type_name.clone(),
            persisted: self.layout(),
            current: current.layout(),
        })
    }
}
