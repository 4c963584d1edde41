use std::fmt;
use std::sync::Arc;

use crate::tags::TagSet;

/// Identity of a meter within a registry: name plus tag set.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MeterKey {
    name: Arc<str>,
    tags: TagSet,
}

impl MeterKey {
    pub fn new(name: &str, tags: TagSet) -> Self {
        Self {
            name: Arc::from(name),
            tags,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &TagSet {
        &self.tags
    }
}

impl fmt::Display for MeterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)?;
        if self.tags.is_empty() {
            return Ok(());
        }
        f.write_str("{")?;
        for (i, (k, v)) in self.tags.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            write!(f, "{k}={v}")?;
        }
        f.write_str("}")
    }
}
