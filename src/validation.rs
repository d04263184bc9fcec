use std::fmt;

/// A single failed check reported by a self-validating entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationFailure {
    pub member_names: Vec<String>,
    pub message: String,
}

impl ValidationFailure {
    pub fn new<I, S>(member_names: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            member_names: member_names.into_iter().map(Into::into).collect(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Properties {} Error: {}",
            self.member_names.join(", "),
            self.message
        )
    }
}

/// Capability implemented by entities that can check their own state
/// before being written.
///
/// An empty result means the entity is valid.
pub trait Validate {
    fn validate(&self) -> Vec<ValidationFailure>;
}

/// Every failure collected by one pre-commit scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors {
    failures: Vec<ValidationFailure>,
}

impl ValidationErrors {
    /// Runs every validator and keeps the failures, or `None` if all passed.
    pub fn collect<'a, I>(entries: I) -> Option<Self>
    where
        I: IntoIterator<Item = &'a dyn Validate>,
    {
        let failures: Vec<_> = entries.into_iter().flat_map(|e| e.validate()).collect();
        if failures.is_empty() {
            None
        } else {
            Some(Self { failures })
        }
    }

    pub fn failures(&self) -> &[ValidationFailure] {
        &self.failures
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                f.write_str("\n")?;
            }
            write!(f, "{failure}")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationErrors {}
