/// Data structures for Tabwise
use serde::{Deserialize, Serialize};
use std::fmt;

pub type TabId = i32;
pub type GroupId = i32;

/// Chrome's `TAB_GROUP_ID_NONE`
pub const NO_GROUP: GroupId = -1;

/// Which window an environment call targets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Window {
    Current,
    Id(i32),
}

impl Window {
    /// `None` maps to `chrome.windows.WINDOW_ID_CURRENT` in the bridge
    pub fn as_id(self) -> Option<i32> {
        match self {
            Window::Current => None,
            Window::Id(id) => Some(id),
        }
    }
}

/// A live tab as reported by `chrome.tabs.query`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrowserTab {
    pub id: TabId,
    pub index: i32,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub pinned: bool,
    #[serde(default)]
    pub active: bool,
    #[serde(default = "no_group")]
    pub group_id: GroupId,
}

fn no_group() -> GroupId {
    NO_GROUP
}

impl BrowserTab {
    pub fn group(&self) -> Option<GroupId> {
        (self.group_id != NO_GROUP).then_some(self.group_id)
    }

    pub fn is_grouped(&self) -> bool {
        self.group().is_some()
    }
}

/// A tab group as reported by `chrome.tabGroups.query`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub id: GroupId,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub color: Option<GroupColor>,
}

/// Tab group colors supported by Chrome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupColor {
    Grey,
    Blue,
    Red,
    Yellow,
    Green,
    Pink,
    Purple,
    Cyan,
    Orange,
}

impl GroupColor {
    pub const ALL: [GroupColor; 9] = [
        GroupColor::Grey,
        GroupColor::Blue,
        GroupColor::Red,
        GroupColor::Yellow,
        GroupColor::Green,
        GroupColor::Pink,
        GroupColor::Purple,
        GroupColor::Cyan,
        GroupColor::Orange,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            GroupColor::Grey => "grey",
            GroupColor::Blue => "blue",
            GroupColor::Red => "red",
            GroupColor::Yellow => "yellow",
            GroupColor::Green => "green",
            GroupColor::Pink => "pink",
            GroupColor::Purple => "purple",
            GroupColor::Cyan => "cyan",
            GroupColor::Orange => "orange",
        }
    }
}

impl fmt::Display for GroupColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tab information sent to the classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabRecord {
    pub id: TabId,
    pub title: String,
    pub url: String,
    pub current_group_name: Option<String>,
}

impl TabRecord {
    pub fn from_browser_tab(tab: &BrowserTab, groups: &[GroupInfo]) -> TabRecord {
        let current_group_name = tab.group().map(|gid| {
            groups
                .iter()
                .find(|g| g.id == gid)
                .and_then(|g| g.title.clone())
                .filter(|t| !t.is_empty())
                .unwrap_or_else(|| "Unnamed Group".to_string())
        });

        TabRecord {
            id: tab.id,
            title: if tab.title.is_empty() { "Untitled".to_string() } else { tab.title.clone() },
            url: tab.url.clone(),
            current_group_name,
        }
    }
}

/// One group proposed by the classifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupProposal {
    pub name: String,
    pub color: GroupColor,
    pub tab_ids: Vec<TabId>,
}
