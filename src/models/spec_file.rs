//! Test specification model
//!
//! A spec is an opaque executable unit, identified by its file name.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// One discovered test specification
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecFile {
    /// File name, used as the spec's identifier
    pub name: String,
    /// Absolute path to the spec file
    pub path: PathBuf,
    /// Whether this is the baseline spec that launches first
    pub is_generic: bool,
}

impl SpecFile {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            is_generic: false,
        }
    }

    pub fn generic(mut self, is_generic: bool) -> Self {
        self.is_generic = is_generic;
        self
    }
}

impl fmt::Display for SpecFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if self.is_generic {
            write!(f, " (generic)")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_file_display() {
        let spec = SpecFile::new("spec.branch.js", "/tmp/spec.branch.js");
        assert_eq!(spec.to_string(), "spec.branch.js");

        let generic = SpecFile::new("spec.generic.js", "/tmp/spec.generic.js").generic(true);
        assert_eq!(generic.to_string(), "spec.generic.js (generic)");
    }
}
