//! Wire types for the upstream content source.
//!
//! Everything here is deliberately lenient: the upstream schema is
//! caller-configurable, so missing fields default and unknown property kinds
//! collapse into [`Property::Unsupported`] instead of failing the page.

use serde::Deserialize;
use serde_json::Value;

use super::properties::PropertyBag;

/// The list-response envelope returned by database queries and block fetches.
#[derive(Debug, Clone, Deserialize)]
pub struct ListResponse {
    #[serde(default)]
    pub object: String,
    #[serde(default)]
    pub results: Vec<Value>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}

impl ListResponse {
    /// Envelope shape check: anything that is not a list response is a schema
    /// violation, regardless of HTTP status.
    pub fn ensure_list(&self) -> Result<(), String> {
        if self.object != "list" {
            return Err(format!(
                "expected list envelope, got object=`{}`",
                self.object
            ));
        }
        Ok(())
    }
}

/// A raw page record with its typed property bag.
#[derive(Debug, Clone, Deserialize)]
pub struct Page {
    pub id: String,
    #[serde(default)]
    pub created_time: String,
    #[serde(default)]
    pub last_edited_time: String,
    #[serde(default)]
    pub cover: Option<Cover>,
    #[serde(default)]
    pub properties: PropertyBag,
}

/// Page-level cover image, hosted or external.
#[derive(Debug, Clone, Deserialize)]
pub struct Cover {
    #[serde(default)]
    pub external: Option<FileRef>,
    #[serde(default)]
    pub file: Option<FileRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileRef {
    #[serde(default)]
    pub url: String,
}

impl Cover {
    pub fn url(&self) -> Option<&str> {
        self.external
            .as_ref()
            .or(self.file.as_ref())
            .map(|file| file.url.as_str())
            .filter(|url| !url.is_empty())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RichText {
    #[serde(default)]
    pub plain_text: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SelectOption {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DateValue {
    #[serde(default)]
    pub start: Option<String>,
    #[serde(default)]
    pub end: Option<String>,
}

/// One typed property value, discriminated by the upstream `type` field.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Property {
    Title {
        #[serde(default)]
        title: Vec<RichText>,
    },
    RichText {
        #[serde(default)]
        rich_text: Vec<RichText>,
    },
    Select {
        #[serde(default)]
        select: Option<SelectOption>,
    },
    MultiSelect {
        #[serde(default)]
        multi_select: Vec<SelectOption>,
    },
    Checkbox {
        #[serde(default)]
        checkbox: bool,
    },
    Number {
        #[serde(default)]
        number: Option<f64>,
    },
    Date {
        #[serde(default)]
        date: Option<DateValue>,
    },
    Url {
        #[serde(default)]
        url: Option<String>,
    },
    CreatedTime {
        #[serde(default)]
        created_time: String,
    },
    LastEditedTime {
        #[serde(default)]
        last_edited_time: String,
    },
    /// Any property kind this system does not consume.
    #[serde(other)]
    Unsupported,
}

pub(crate) fn plain_text(spans: &[RichText]) -> String {
    spans
        .iter()
        .map(|span| span.plain_text.as_str())
        .collect::<Vec<_>>()
        .join("")
}

/// Flatten raw block objects into markdown text.
///
/// Handles the block kinds that carry prose; anything else contributes
/// nothing. The output only needs to be stable text for reading-time and
/// storage, not a faithful markdown rendering of every block feature.
pub fn blocks_to_markdown(blocks: &[Value]) -> String {
    let mut lines: Vec<String> = Vec::new();

    for block in blocks {
        let Some(kind) = block.get("type").and_then(Value::as_str) else {
            continue;
        };
        let text = block
            .get(kind)
            .and_then(|body| body.get("rich_text"))
            .and_then(Value::as_array)
            .map(|spans| {
                spans
                    .iter()
                    .filter_map(|span| span.get("plain_text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        let line = match kind {
            "heading_1" => format!("# {text}"),
            "heading_2" => format!("## {text}"),
            "heading_3" => format!("### {text}"),
            "bulleted_list_item" => format!("- {text}"),
            "numbered_list_item" => format!("1. {text}"),
            "quote" => format!("> {text}"),
            "code" => {
                let language = block
                    .get(kind)
                    .and_then(|body| body.get("language"))
                    .and_then(Value::as_str)
                    .unwrap_or_default();
                format!("```{language}\n{text}\n```")
            }
            "paragraph" => text,
            "divider" => "---".to_string(),
            _ => continue,
        };

        if !line.is_empty() {
            lines.push(line);
        }
    }

    lines.join("\n\n")
}
