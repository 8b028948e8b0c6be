//! Tag resolution for path and filename templates
//!
//! Templates contain `{tag}` placeholders that are replaced by values from a
//! dataset's metadata. A tag may carry a `.lower` or `.upper` suffix to change
//! the case of the substituted value, and list-valued metadata fans a template
//! out into one path per list element.
//!
//! ```rust
//! use climdiag::metadata::DatasetMetadata;
//! use climdiag::tags::replace_tags;
//! use serde_json::json;
//!
//! let meta = DatasetMetadata::from_json(json!({
//!     "dataset": "CanESM5",
//!     "exp": ["historical", "ssp585"],
//! })).unwrap();
//!
//! let paths = replace_tags(&["/{dataset.upper}/{exp}/"], &meta).unwrap();
//! assert_eq!(paths.len(), 2);
//! assert!(paths.contains("CANESM5/historical"));
//! ```

use crate::errors::{DiagError, Result};
use crate::metadata::DatasetMetadata;
use serde_json::Value as JsonValue;
use std::collections::BTreeSet;

/// Tag left untouched; it is resolved against the file system later on.
pub const LATEST_VERSION_TAG: &str = "latestversion";

const SUB_EXPERIMENT_TAG: &str = "sub_experiment";
const ENSEMBLE_PLACEHOLDER: &str = "{ensemble}";
const SUB_EXPERIMENT_PREFIX: &str = "{sub_experiment}-";

/// Case transform requested by a tag suffix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseModifier {
    None,
    Lower,
    Upper,
}

impl CaseModifier {
    /// Apply the transform to a resolved value
    #[must_use]
    pub fn apply(self, value: &str) -> String {
        match self {
            Self::None => value.to_string(),
            Self::Lower => value.to_lowercase(),
            Self::Upper => value.to_uppercase(),
        }
    }
}

/// A placeholder found in a template, e.g. `{dataset.lower}`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tag {
    raw: String,
}

impl Tag {
    /// Wrap the text found between the braces
    pub fn new(raw: impl Into<String>) -> Self {
        Self { raw: raw.into() }
    }

    /// Text between the braces, suffix included
    #[must_use]
    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Metadata key this tag looks up
    #[must_use]
    pub fn key(&self) -> &str {
        self.split().0
    }

    #[must_use]
    pub fn modifier(&self) -> CaseModifier {
        self.split().1
    }

    /// The placeholder as written in a template
    #[must_use]
    pub fn placeholder(&self) -> String {
        format!("{{{}}}", self.raw)
    }

    fn split(&self) -> (&str, CaseModifier) {
        if let Some(key) = self.raw.strip_suffix(".lower") {
            (key, CaseModifier::Lower)
        } else if let Some(key) = self.raw.strip_suffix(".upper") {
            (key, CaseModifier::Upper)
        } else {
            (&self.raw, CaseModifier::None)
        }
    }
}

/// Finds every `{...}` placeholder in a template.
///
/// A placeholder runs from an opening brace to the next closing brace; an
/// opening brace with no closing brace after it is plain text.
#[must_use]
pub fn find_tags(template: &str) -> Vec<Tag> {
    let mut tags = Vec::new();
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        let after = &rest[open + 1..];
        match after.find('}') {
            Some(close) => {
                tags.push(Tag::new(&after[..close]));
                rest = &after[close + 1..];
            }
            None => break,
        }
    }

    tags
}

/// Resolves all tags in `templates` against `metadata`.
///
/// Leading and trailing slashes are stripped from every template. The result
/// is deduplicated; its size is at most the product of the lengths of all
/// list-valued tags involved.
///
/// # Errors
///
/// Returns [`DiagError::MissingTag`] if a template uses a tag (other than
/// `latestversion`) that the metadata does not define.
pub fn replace_tags<S: AsRef<str>>(
    templates: &[S],
    metadata: &DatasetMetadata,
) -> Result<BTreeSet<String>> {
    let mut paths: Vec<String> = templates
        .iter()
        .map(|t| t.as_ref().trim_matches('/').to_string())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    let mut tags: BTreeSet<Tag> = paths.iter().flat_map(|p| find_tags(p)).collect();

    if metadata.contains_key(SUB_EXPERIMENT_TAG) && !paths.is_empty() {
        paths = paths
            .iter()
            .flat_map(|p| [prefix_bounded_ensemble(p), prefix_every_ensemble(p)])
            .collect();
        tags.insert(Tag::new(SUB_EXPERIMENT_TAG));
    }

    for tag in &tags {
        if tag.key() == LATEST_VERSION_TAG {
            continue;
        }
        let value = metadata.get(tag.key()).ok_or_else(|| DiagError::MissingTag {
            tag: tag.key().to_string(),
            context: metadata.to_string(),
        })?;
        paths = replace_tag(&paths, tag, value);
    }

    log::debug!("Resolved {} template(s) into {} path(s)", templates.len(), paths.len());
    Ok(paths.into_iter().collect())
}

/// Substitutes one tag in every path, fanning out over list values.
#[must_use]
pub fn replace_tag(paths: &[String], tag: &Tag, value: &JsonValue) -> Vec<String> {
    let mut result = BTreeSet::new();

    match value {
        JsonValue::Array(items) => {
            for item in items {
                result.extend(replace_tag(paths, tag, item));
            }
        }
        scalar => {
            let text = tag.modifier().apply(&render_scalar(scalar));
            let placeholder = tag.placeholder();
            result.extend(paths.iter().map(|p| p.replace(&placeholder, &text)));
        }
    }

    result.into_iter().collect()
}

/// Plain text of a metadata value as it appears in a path
#[must_use]
pub fn render_scalar(value: &JsonValue) -> String {
    match value {
        JsonValue::String(s) => s.clone(),
        JsonValue::Null => "None".to_string(),
        JsonValue::Bool(true) => "True".to_string(),
        JsonValue::Bool(false) => "False".to_string(),
        other => other.to_string(),
    }
}

fn prefix_every_ensemble(path: &str) -> String {
    path.replace(
        ENSEMBLE_PLACEHOLDER,
        &format!("{SUB_EXPERIMENT_PREFIX}{ENSEMBLE_PLACEHOLDER}"),
    )
}

/// Prefixes only the `{ensemble}` occurrences that have a word character on
/// both sides, i.e. where `\b{ensemble}\b` matches.
fn prefix_bounded_ensemble(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut rest = path;

    while let Some(pos) = rest.find(ENSEMBLE_PLACEHOLDER) {
        let (before, from) = rest.split_at(pos);
        let after = &from[ENSEMBLE_PLACEHOLDER.len()..];

        let prev_is_word = before
            .chars()
            .next_back()
            .or_else(|| out.chars().next_back())
            .is_some_and(is_word_char);
        let next_is_word = after.chars().next().is_some_and(is_word_char);

        out.push_str(before);
        if prev_is_word && next_is_word {
            out.push_str(SUB_EXPERIMENT_PREFIX);
        }
        out.push_str(ENSEMBLE_PLACEHOLDER);
        rest = after;
    }

    out.push_str(rest);
    out
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}
