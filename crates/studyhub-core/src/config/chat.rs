//! Private chat and unread badge configuration.

use serde::{Deserialize, Serialize};

/// Settings for chat history paging and the local unread watermarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Page size for chat history reads.
    #[serde(default = "default_page_size")]
    pub history_page_size: u32,
    /// Path of the local JSON file holding per-partner read watermarks.
    #[serde(default = "default_watermark_file")]
    pub watermark_file: String,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            history_page_size: default_page_size(),
            watermark_file: default_watermark_file(),
        }
    }
}

fn default_page_size() -> u32 {
    20
}

fn default_watermark_file() -> String {
    "data/watermarks.json".to_string()
}
