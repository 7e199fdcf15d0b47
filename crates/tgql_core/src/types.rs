//! Declared GraphQL type references.

use crate::error::{Error, ErrorCode, Result};
use std::fmt;

/// A parsed type reference such as `[ReviewInput!]!`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeRef {
    /// A named type, nullable.
    Named(String),
    /// A list of the inner type, nullable.
    List(Box<TypeRef>),
    /// The inner type with null forbidden.
    NonNull(Box<TypeRef>),
}

impl TypeRef {
    /// Parses a declared type string.
    pub fn parse(source: &str) -> Result<Self> {
        let mut parser = TypeRefParser {
            source,
            bytes: source.as_bytes(),
            pos: 0,
        };
        let ty = parser.parse_type()?;
        parser.skip_whitespace();
        if parser.pos != parser.bytes.len() {
            return Err(parser.error("unexpected trailing input"));
        }
        Ok(ty)
    }

    /// Shorthand for a nullable named type.
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named(name.into())
    }

    /// Wraps `self` as non-null.
    #[must_use]
    pub fn non_null(self) -> Self {
        match self {
            Self::NonNull(_) => self,
            other => Self::NonNull(Box::new(other)),
        }
    }

    /// Wraps `self` in a list.
    #[must_use]
    pub fn list(self) -> Self {
        Self::List(Box::new(self))
    }

    /// The innermost named type.
    pub fn named_type(&self) -> &str {
        match self {
            Self::Named(name) => name,
            Self::List(inner) | Self::NonNull(inner) => inner.named_type(),
        }
    }

    /// Whether the outermost position accepts null.
    pub fn is_nullable(&self) -> bool {
        !matches!(self, Self::NonNull(_))
    }

    /// The type with an outer non-null wrapper removed.
    pub fn nullable(&self) -> &TypeRef {
        match self {
            Self::NonNull(inner) => inner,
            other => other,
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(name) => f.write_str(name),
            Self::List(inner) => write!(f, "[{inner}]"),
            Self::NonNull(inner) => write!(f, "{inner}!"),
        }
    }
}

impl std::str::FromStr for TypeRef {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

struct TypeRefParser<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl TypeRefParser<'_> {
    fn parse_type(&mut self) -> Result<TypeRef> {
        self.skip_whitespace();
        let base = match self.peek() {
            Some(b'[') => {
                self.pos += 1;
                let inner = self.parse_type()?;
                self.skip_whitespace();
                if self.peek() != Some(b']') {
                    return Err(self.error("expected `]`"));
                }
                self.pos += 1;
                TypeRef::List(Box::new(inner))
            }
            Some(c) if c == b'_' || c.is_ascii_alphabetic() => {
                let start = self.pos;
                while self
                    .peek()
                    .is_some_and(|c| c == b'_' || c.is_ascii_alphanumeric())
                {
                    self.pos += 1;
                }
                TypeRef::Named(self.source[start..self.pos].to_string())
            }
            _ => return Err(self.error("expected a type name or `[`")),
        };

        self.skip_whitespace();
        if self.peek() == Some(b'!') {
            self.pos += 1;
            return Ok(TypeRef::NonNull(Box::new(base)));
        }
        Ok(base)
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_whitespace()) {
            self.pos += 1;
        }
    }

    fn error(&self, reason: &str) -> Error {
        Error::new(
            ErrorCode::InvalidTypeRef,
            format!(
                "Invalid type reference `{}` at offset {}: {}",
                self.source, self.pos, reason
            ),
        )
    }
}
