//! Qualified names (`Foo::Bar`, `::Kernel`, `Enumerable::_Each`)

use serde::{Deserialize, Serialize};
use std::fmt;

/// A possibly-qualified name
///
/// `absolute` is set for a leading `::`, which anchors resolution at the root
/// namespace instead of the lexical nesting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct QualifiedName {
    pub absolute: bool,
    pub namespace: Vec<String>,
    pub name: String,
}

impl QualifiedName {
    pub fn new(absolute: bool, namespace: Vec<String>, name: impl Into<String>) -> Self {
        Self {
            absolute,
            namespace,
            name: name.into(),
        }
    }

    /// Relative single-component name
    pub fn simple(name: impl Into<String>) -> Self {
        Self::new(false, Vec::new(), name)
    }

    /// Parse `A::B::C` or `::A::B`. Empty components are dropped.
    pub fn parse(text: &str) -> Self {
        let absolute = text.starts_with("::");
        let mut parts: Vec<String> = text
            .split("::")
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect();
        let name = parts.pop().unwrap_or_default();
        Self::new(absolute, parts, name)
    }

    /// Absolute name built from path components
    pub fn from_path<S: AsRef<str>>(path: &[S]) -> Self {
        let mut parts: Vec<String> = path.iter().map(|s| s.as_ref().to_string()).collect();
        let name = parts.pop().unwrap_or_default();
        Self::new(true, parts, name)
    }

    /// All components, namespace first
    pub fn components(&self) -> impl Iterator<Item = &str> {
        self.namespace
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(self.name.as_str()))
    }

    pub fn head(&self) -> &str {
        self.namespace.first().map_or(self.name.as_str(), String::as_str)
    }

    pub fn is_qualified(&self) -> bool {
        !self.namespace.is_empty()
    }

    pub fn to_absolute(&self) -> Self {
        Self {
            absolute: true,
            ..self.clone()
        }
    }

    /// `self::name`, keeping `self`'s anchoring
    pub fn child(&self, name: impl Into<String>) -> Self {
        let mut namespace = self.namespace.clone();
        namespace.push(self.name.clone());
        Self::new(self.absolute, namespace, name)
    }

    /// Append every component of `other` (which is taken as relative)
    pub fn join(&self, other: &QualifiedName) -> Self {
        let mut path: Vec<String> = self.components().map(str::to_string).collect();
        path.extend(other.components().map(str::to_string));
        let mut result = Self::from_path(&path);
        result.absolute = self.absolute;
        result
    }

    pub fn parent(&self) -> Option<Self> {
        let mut namespace = self.namespace.clone();
        let name = namespace.pop()?;
        Some(Self::new(self.absolute, namespace, name))
    }

    /// `_Each`, `Foo::_ToS`
    pub fn is_interface(&self) -> bool {
        is_interface_name(&self.name)
    }

    /// `int`, `Foo::string`
    pub fn is_alias(&self) -> bool {
        is_alias_name(&self.name)
    }
}

pub fn is_interface_name(name: &str) -> bool {
    let mut chars = name.chars();
    chars.next() == Some('_') && chars.next().is_some_and(|c| c.is_ascii_uppercase())
}

pub fn is_alias_name(name: &str) -> bool {
    let trimmed = name.trim_start_matches('_');
    trimmed.chars().next().is_some_and(|c| c.is_ascii_lowercase())
}

pub fn is_constant_name(name: &str) -> bool {
    name.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.absolute {
            write!(f, "::")?;
        }
        for part in &self.namespace {
            write!(f, "{part}::")?;
        }
        write!(f, "{}", self.name)
    }
}
