//! Gemini project, exposed to the host as a category.

use std::fmt;

use serde::Serialize;

use crate::api::ProjectRecord;

/// A Gemini project.
///
/// Projects are the only category level; there is never a parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeminiProject {
    id: String,
    name: String,
}

impl GeminiProject {
    /// The project ID as a string.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The project display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The parent category ID, always `None`.
    pub fn parent_id(&self) -> Option<&str> {
        None
    }
}

impl From<ProjectRecord> for GeminiProject {
    fn from(record: ProjectRecord) -> Self {
        Self {
            id: record.project_id.to_string(),
            name: record.project_name,
        }
    }
}

impl fmt::Display for GeminiProject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_record() {
        let project = GeminiProject::from(ProjectRecord {
            project_id: 12,
            project_name: "Website".to_string(),
            project_code: Some("WEB".to_string()),
        });

        assert_eq!(project.id(), "12");
        assert_eq!(project.name(), "Website");
        assert_eq!(project.parent_id(), None);
        assert_eq!(project.to_string(), "Website (12)");
    }
}
