use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString};

/// One of the fixed outreach framings, generated independently and
/// selectable by the user.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Angle {
    /// Offer something concrete the recipient can use.
    Service,
    /// Propose working together.
    Partner,
    /// Connect over a shared community or interest.
    Community,
    /// Lead with an insight or resource of standalone value.
    Value,
}

impl Angle {
    pub fn framing(self) -> &'static str {
        match self {
            Angle::Service => {
                "Frame the message around a specific way you could help them, grounded in \
                 something they actually published or built. No generic service pitches."
            }
            Angle::Partner => {
                "Frame the message around a concrete collaboration: what you each bring and \
                 why the combination is interesting now."
            }
            Angle::Community => {
                "Frame the message around shared ground: a community, event, interest, or \
                 mutual connection that makes the outreach natural."
            }
            Angle::Value => {
                "Lead with something immediately useful to them (an observation, resource, \
                 or relevant result) with no ask attached."
            }
        }
    }
}

/// Where the target page lives; picks platform-specific writing rules.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Display, EnumIter, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linkedin,
    X,
    Email,
    #[default]
    Generic,
}

impl Platform {
    pub fn prompt_rules(self) -> &'static str {
        match self {
            Platform::Linkedin => {
                "This is a LinkedIn message: professional but not stiff, no salutation \
                 headers, no hashtags, and never mention that you viewed their profile."
            }
            Platform::X => {
                "This is an X/Twitter DM: casual, compressed, lowercase-friendly. \
                 Hard cap of 900 characters."
            }
            Platform::Email => {
                "This is a cold email body: skip the subject line, open with the hook \
                 sentence, one clear call to action at the end."
            }
            Platform::Generic => {
                "This is a direct message on a professional platform: concise and personal."
            }
        }
    }
}

/// Scraped page/profile content, produced by the host's extraction layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageData {
    pub url: String,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default = "default_platform")]
    pub platform: Platform,
    /// Prior conversation with this contact, oldest first.
    #[serde(default)]
    pub thread: Vec<ThreadMessage>,
}

fn default_platform() -> Platform {
    Platform::Generic
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThreadMessage {
    pub author: String,
    pub text: String,
}

/// Upstream analysis of the page, cached per URL for 24 hours.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageAnalysis {
    pub summary: String,
    #[serde(default)]
    pub topics: Vec<String>,
    #[serde(default)]
    pub tone: String,
    #[serde(default)]
    pub opportunities: Vec<String>,
}
