//! Merging external fields into a record.

use crate::error::RecordError;
use crate::field::Field;
use crate::record::Record;
use std::fmt;
use std::str::FromStr;

/// What happens when a merged field already exists on the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// The incoming field replaces the existing one
    OverwriteExisting,
    /// The existing field is kept and the incoming one dropped
    #[default]
    KeepOldField,
}

impl ConflictPolicy {
    /// Configuration values accepted by [`ConflictPolicy::from_str`].
    pub const ALLOWABLE_VALUES: [&'static str; 2] = ["overwrite_existing", "keep_old_field"];

    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictPolicy::OverwriteExisting => "overwrite_existing",
            ConflictPolicy::KeepOldField => "keep_old_field",
        }
    }
}

impl fmt::Display for ConflictPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictPolicy {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "overwrite_existing" => Ok(ConflictPolicy::OverwriteExisting),
            "keep_old_field" => Ok(ConflictPolicy::KeepOldField),
            _ => Err(RecordError::UnknownConflictPolicy(s.to_string())),
        }
    }
}

impl Record {
    /// Merge one field according to `policy`.
    ///
    /// Returns `true` when the record now holds the incoming field.
    pub fn merge_field(&mut self, field: Field, policy: ConflictPolicy) -> bool {
        if self.has_field(field.name()) && policy == ConflictPolicy::KeepOldField {
            return false;
        }
        self.put(field);
        true
    }

    /// Merge every field, returning how many were applied.
    pub fn merge_fields<I>(&mut self, fields: I, policy: ConflictPolicy) -> usize
    where
        I: IntoIterator<Item = Field>,
    {
        let mut applied = 0;
        for field in fields {
            if self.merge_field(field, policy) {
                applied += 1;
            }
        }
        applied
    }
}
