//! Link categories and URL classification.
//!
//! Classification anchors on the URL host: the host must be the provider
//! domain or a subdomain of it. A plain substring test would put
//! `https://dropbox.com` under Twitter/X because it contains `x.com`.

use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use fancy_regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::common::error::RelayError;

/// Source site a link belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Category {
    Youtube,
    Twitch,
    Twitter,
    Instagram,
    Tiktok,
    Reddit,
    Github,
    Discord,
    Other,
}

impl Category {
    /// Every category in canonical order.
    pub const ALL: [Category; 9] = [
        Category::Youtube,
        Category::Twitch,
        Category::Twitter,
        Category::Instagram,
        Category::Tiktok,
        Category::Reddit,
        Category::Github,
        Category::Discord,
        Category::Other,
    ];

    /// Stable lowercase name, used in commands and persisted records.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Youtube => "youtube",
            Self::Twitch => "twitch",
            Self::Twitter => "twitter",
            Self::Instagram => "instagram",
            Self::Tiktok => "tiktok",
            Self::Reddit => "reddit",
            Self::Github => "github",
            Self::Discord => "discord",
            Self::Other => "other",
        }
    }

    /// Human readable name for replies.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Youtube => "YouTube",
            Self::Twitch => "Twitch",
            Self::Twitter => "Twitter/X",
            Self::Instagram => "Instagram",
            Self::Tiktok => "TikTok",
            Self::Reddit => "Reddit",
            Self::Github => "GitHub",
            Self::Discord => "Discord invites",
            Self::Other => "Other",
        }
    }

    /// Comma separated list of every valid name.
    pub fn valid_names() -> String {
        Self::ALL
            .iter()
            .map(|c| c.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "youtube" => Ok(Self::Youtube),
            "twitch" => Ok(Self::Twitch),
            "twitter" | "x" => Ok(Self::Twitter),
            "instagram" => Ok(Self::Instagram),
            "tiktok" => Ok(Self::Tiktok),
            "reddit" => Ok(Self::Reddit),
            "github" => Ok(Self::Github),
            "discord" | "discord_links" => Ok(Self::Discord),
            "other" => Ok(Self::Other),
            _ => Err(RelayError::validation(format!(
                "Invalid link type '{}'. Valid types: {}",
                s,
                Self::valid_names()
            ))),
        }
    }
}

/// Enabled/disabled flag per category.
///
/// Missing fields deserialize as `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryFlags {
    pub youtube: bool,
    pub twitch: bool,
    pub twitter: bool,
    pub instagram: bool,
    pub tiktok: bool,
    pub reddit: bool,
    pub github: bool,
    pub discord: bool,
    pub other: bool,
}

impl CategoryFlags {
    /// Flags with every category enabled.
    pub fn all() -> Self {
        let mut flags = Self::default();
        for category in Category::ALL {
            flags.set(category, true);
        }
        flags
    }

    pub fn get(&self, category: Category) -> bool {
        match category {
            Category::Youtube => self.youtube,
            Category::Twitch => self.twitch,
            Category::Twitter => self.twitter,
            Category::Instagram => self.instagram,
            Category::Tiktok => self.tiktok,
            Category::Reddit => self.reddit,
            Category::Github => self.github,
            Category::Discord => self.discord,
            Category::Other => self.other,
        }
    }

    pub fn set(&mut self, category: Category, enabled: bool) {
        let slot = match category {
            Category::Youtube => &mut self.youtube,
            Category::Twitch => &mut self.twitch,
            Category::Twitter => &mut self.twitter,
            Category::Instagram => &mut self.instagram,
            Category::Tiktok => &mut self.tiktok,
            Category::Reddit => &mut self.reddit,
            Category::Github => &mut self.github,
            Category::Discord => &mut self.discord,
            Category::Other => &mut self.other,
        };
        *slot = enabled;
    }

    /// True if at least one category is enabled.
    pub fn any(&self) -> bool {
        Category::ALL.iter().any(|c| self.get(*c))
    }

    /// Enabled categories in canonical order.
    pub fn enabled(&self) -> impl Iterator<Item = Category> + '_ {
        Category::ALL.into_iter().filter(move |c| self.get(*c))
    }
}

/// A partial flag update. Categories not mentioned keep their value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryPatch {
    entries: Vec<(Category, bool)>,
}

impl CategoryPatch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Patch enabling every category.
    pub fn all_enabled() -> Self {
        Self {
            entries: Category::ALL.iter().map(|c| (*c, true)).collect(),
        }
    }

    pub fn with(mut self, category: Category, enabled: bool) -> Self {
        self.insert(category, enabled);
        self
    }

    /// Later writes to the same category replace earlier ones.
    pub fn insert(&mut self, category: Category, enabled: bool) {
        match self.entries.iter_mut().find(|(c, _)| *c == category) {
            Some(entry) => entry.1 = enabled,
            None => self.entries.push((category, enabled)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True if the patch turns at least one category on.
    pub fn enables_any(&self) -> bool {
        self.entries.iter().any(|(_, enabled)| *enabled)
    }

    pub fn apply(&self, flags: &mut CategoryFlags) {
        for (category, enabled) in &self.entries {
            flags.set(*category, *enabled);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &(Category, bool)> {
        self.entries.iter()
    }
}

/// Host prefix shared by all rules: optional scheme, optional userinfo, any subdomains.
const HOST_PREFIX: &str = r"(?i)^(?:[a-z][a-z0-9+.-]*://)?(?:[^/?#@\s]*@)?(?:[a-z0-9-]+\.)*";

/// What may follow the host: port, then a path/query/fragment or trailing punctuation.
const HOST_SUFFIX: &str = r"(?::\d+)?(?:[/?#]|[.,;!)\]>]*$)";

/// Rules in priority order; first match wins.
static CATEGORY_RULES: LazyLock<Vec<(Category, Regex)>> = LazyLock::new(|| {
    let host_rule = |domains: &str| format!("{}(?:{}){}", HOST_PREFIX, domains, HOST_SUFFIX);

    let rules = [
        (Category::Youtube, host_rule(r"youtube\.com|youtu\.be")),
        (Category::Twitch, host_rule(r"twitch\.tv")),
        (Category::Twitter, host_rule(r"twitter\.com|x\.com")),
        (Category::Instagram, host_rule(r"instagram\.com")),
        (Category::Tiktok, host_rule(r"tiktok\.com")),
        (Category::Reddit, host_rule(r"reddit\.com")),
        (Category::Github, host_rule(r"github\.com")),
        (
            Category::Discord,
            format!(
                r"{}(?:discord\.gg{}|discord\.com(?::\d+)?/invite(?:[/?#]|[.,;!)\]>]*$))",
                HOST_PREFIX, HOST_SUFFIX
            ),
        ),
    ];

    rules
        .into_iter()
        .filter_map(|(category, pattern)| match Regex::new(&pattern) {
            Ok(regex) => Some((category, regex)),
            Err(e) => {
                warn!("Invalid {} category pattern: {}", category, e);
                None
            }
        })
        .collect()
});

/// Classify a URL token. Never fails: anything unrecognised is `Other`.
pub fn categorize_link(url: &str) -> Category {
    let category = CATEGORY_RULES
        .iter()
        .find(|(_, regex)| regex.is_match(url).unwrap_or(false))
        .map(|(category, _)| *category)
        .unwrap_or(Category::Other);

    debug!("Categorized URL as {}: {}", category, url);
    category
}
