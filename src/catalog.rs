use std::collections::HashMap;
use std::fmt;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

/// A bare name, or an alias list whose first entry is the canonical name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelName {
    Single(String),
    Aliases(Vec<String>),
}

impl ChannelName {
    pub fn canonical(&self) -> &str {
        match self {
            ChannelName::Single(name) => name,
            ChannelName::Aliases(names) => names.first().map(String::as_str).unwrap_or(""),
        }
    }

    pub fn aliases(&self) -> Vec<&str> {
        match self {
            ChannelName::Single(name) => vec![name.as_str()],
            ChannelName::Aliases(names) => names.iter().map(String::as_str).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SubscriptionEntry {
    Plain(String),
    Tagged { url: String },
}

impl SubscriptionEntry {
    pub fn url(&self) -> &str {
        match self {
            SubscriptionEntry::Plain(url) => url,
            SubscriptionEntry::Tagged { url } => url,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryPath {
    pub section: &'static str,
    pub leaf: &'static str,
}

impl fmt::Display for CategoryPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.section, self.leaf)
    }
}

/// Every category the catalog can carry, in definition order. All traversal
/// goes through this table.
pub const CATEGORY_TABLE: &[CategoryPath] = &[
    CategoryPath { section: "cctv_channels", leaf: "free_terrestrial_channel" },
    CategoryPath { section: "provincial_channels", leaf: "huabei" },
    CategoryPath { section: "provincial_channels", leaf: "dongbei" },
    CategoryPath { section: "provincial_channels", leaf: "huadong" },
    CategoryPath { section: "provincial_channels", leaf: "zhongnan" },
    CategoryPath { section: "provincial_channels", leaf: "xinan" },
    CategoryPath { section: "provincial_channels", leaf: "xibei" },
    CategoryPath { section: "provincial_channels", leaf: "gangaotai" },
    CategoryPath { section: "digital_channels", leaf: "paid_channel" },
];

#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub subscribe_urls: Vec<SubscriptionEntry>,

    #[serde(flatten)]
    sections: HashMap<String, HashMap<String, Vec<ChannelName>>>,
}

impl Catalog {
    pub fn channels_in(&self, path: &CategoryPath) -> &[ChannelName] {
        self.sections
            .get(path.section)
            .and_then(|section| section.get(path.leaf))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// All channels in category-table order; batches are claimed in this
    /// order.
    pub fn channels_in_order(&self) -> impl Iterator<Item = (&'static CategoryPath, &ChannelName)> {
        CATEGORY_TABLE
            .iter()
            .flat_map(move |path| self.channels_in(path).iter().map(move |name| (path, name)))
    }

    pub fn category_of(&self, canonical: &str) -> Option<&'static CategoryPath> {
        self.channels_in_order()
            .find(|(_, name)| name.canonical() == canonical)
            .map(|(path, _)| path)
    }

    pub fn channel_count(&self) -> usize {
        self.channels_in_order().count()
    }
}

/// Malformed catalog JSON is a fatal startup error.
pub fn load(path: &Path) -> anyhow::Result<Catalog> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read catalog {}", path.display()))?;
    let catalog: Catalog = serde_json::from_str(&raw)
        .with_context(|| format!("catalog {} is not valid JSON", path.display()))?;
    Ok(catalog)
}
