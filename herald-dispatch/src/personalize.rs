//! Per-recipient placeholder resolution.

use std::{borrow::Cow, collections::HashMap, sync::LazyLock};

use herald_common::{Recipient, Template};
use regex::{Captures, Regex};

static PLACEHOLDER: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used, reason = "The pattern is a compile-time constant")]
    Regex::new(r"\{\{\s*([^{}]+?)\s*\}\}").unwrap()
});

/// Resolves `{{key}}` placeholders in a template against one recipient.
///
/// `name` and `email` always come from the recipient itself; custom data adds
/// further keys but never replaces those two. Placeholders with no matching
/// key are left as written.
#[derive(Debug, Clone)]
pub struct Personalizer {
    fallback_name: String,
}

impl Personalizer {
    pub fn new(fallback_name: impl Into<String>) -> Self {
        Self {
            fallback_name: fallback_name.into(),
        }
    }

    #[must_use]
    pub fn personalize(&self, template: &Template, recipient: &Recipient) -> Template {
        let values = self.values(recipient);
        Template {
            subject: substitute(&template.subject, &values),
            body: substitute(&template.body, &values),
        }
    }

    fn values<'r>(&'r self, recipient: &'r Recipient) -> HashMap<&'r str, Cow<'r, str>> {
        let mut values = HashMap::with_capacity(recipient.custom_data.len() + 2);

        let name = recipient
            .name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(&self.fallback_name);
        values.insert("name", Cow::Borrowed(name));
        values.insert("email", Cow::Borrowed(recipient.email.as_str()));

        for (key, value) in &recipient.custom_data {
            let value = match value {
                serde_json::Value::String(s) => Cow::Borrowed(s.as_str()),
                serde_json::Value::Null => Cow::Borrowed(""),
                other => Cow::Owned(other.to_string()),
            };
            values.entry(key.as_str()).or_insert(value);
        }

        values
    }
}

fn substitute(text: &str, values: &HashMap<&str, Cow<'_, str>>) -> String {
    PLACEHOLDER
        .replace_all(text, |caps: &Captures<'_>| {
            values
                .get(&caps[1])
                .map_or_else(|| caps[0].to_string(), ToString::to_string)
        })
        .into_owned()
}
