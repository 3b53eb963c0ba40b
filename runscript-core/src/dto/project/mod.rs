//! Project DTOs

use serde::{Deserialize, Serialize};

/// A project as returned by `GET /projects/:id`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub path_with_namespace: Option<String>,
    #[serde(default)]
    pub web_url: Option<String>,
}
