/// Capture and restore of a window's tab-group arrangement (single-level undo)
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::environment::{TabEnvironment, ungroup_all, unpinned};
use crate::error::BrowserError;
use crate::tab_data::{GroupColor, GroupId, TabId, Window};

/// One tab's arrangement before an organize pass
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotEntry {
    pub tab_id: TabId,
    pub group_id: Option<GroupId>,
    pub group_title: Option<String>,
    pub group_color: Option<GroupColor>,
    pub index: i32,
}

/// Ordered by the tabs' index at capture time
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub entries: Vec<SnapshotEntry>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Entries grouped by recorded group id, in order of first appearance
    fn partition(&self) -> (Vec<&SnapshotEntry>, Vec<(GroupId, Vec<&SnapshotEntry>)>) {
        let mut loose = Vec::new();
        let mut grouped: Vec<(GroupId, Vec<&SnapshotEntry>)> = Vec::new();

        for entry in &self.entries {
            match entry.group_id {
                None => loose.push(entry),
                Some(gid) => match grouped.iter_mut().find(|(id, _)| *id == gid) {
                    Some((_, members)) => members.push(entry),
                    None => grouped.push((gid, vec![entry])),
                },
            }
        }

        (loose, grouped)
    }
}

/// Record every non-pinned tab of the current window with its group metadata
pub async fn capture<E: TabEnvironment>(env: &E) -> Result<Snapshot, BrowserError> {
    let mut tabs = unpinned(env.list_tabs(Window::Current).await?);
    let groups = env.list_groups(Window::Current).await?;
    tabs.sort_by_key(|t| t.index);

    let entries = tabs
        .iter()
        .map(|tab| {
            let group = tab.group().and_then(|gid| groups.iter().find(|g| g.id == gid));
            SnapshotEntry {
                tab_id: tab.id,
                group_id: tab.group(),
                group_title: group.and_then(|g| g.title.clone()),
                group_color: group.and_then(|g| g.color),
                index: tab.index,
            }
        })
        .collect();

    Ok(Snapshot { entries })
}

/// Put the window back the way `snapshot` recorded it, returning how many tabs were restored.
///
/// Starts from a fully ungrouped window. Tabs closed since the capture are skipped.
/// A recorded group whose title or color is missing is not recreated and its tabs
/// are not counted.
pub async fn restore<E: TabEnvironment>(env: &E, snapshot: &Snapshot) -> Result<usize, BrowserError> {
    ungroup_all(env, Window::Current).await?;

    let open: Vec<TabId> = env.list_tabs(Window::Current).await?.iter().map(|t| t.id).collect();
    let (loose, grouped) = snapshot.partition();

    let mut restored = loose.iter().filter(|e| open.contains(&e.tab_id)).count();

    for (gid, members) in grouped {
        let first = members[0];
        let (Some(title), Some(color)) = (first.group_title.as_deref().filter(|t| !t.is_empty()), first.group_color)
        else {
            warn!("Skipping group {} with missing title or color ({} tabs)", gid, members.len());
            continue;
        };

        let tab_ids: Vec<TabId> = members
            .iter()
            .map(|e| e.tab_id)
            .filter(|id| open.contains(id))
            .collect();
        if tab_ids.is_empty() {
            continue;
        }

        let new_gid = env.group(&tab_ids).await?;
        env.set_group_meta(new_gid, title, color, false).await?;
        restored += tab_ids.len();
    }

    info!("Restored {} of {} tabs", restored, snapshot.len());
    Ok(restored)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::fake::FakeBrowser;
    use futures::executor::block_on;

    #[test]
    fn test_capture_orders_by_index_and_skips_pinned() {
        let browser = FakeBrowser::with_tabs(4);
        browser.set_pinned(1);
        for tab in browser.tabs.borrow_mut().iter_mut() {
            tab.index = 4 - tab.id;
        }
        let gid = browser.preset_group(&[3], Some("News"), Some(GroupColor::Red));

        let snapshot = block_on(capture(&browser)).unwrap();

        let ids: Vec<TabId> = snapshot.entries.iter().map(|e| e.tab_id).collect();
        assert_eq!(ids, vec![4, 3, 2]);
        let news = &snapshot.entries[1];
        assert_eq!(news.group_id, Some(gid));
        assert_eq!(news.group_title.as_deref(), Some("News"));
        assert_eq!(news.group_color, Some(GroupColor::Red));
        assert_eq!(snapshot.entries[0].group_id, None);
        assert_eq!(snapshot.entries[0].group_title, None);
    }

    #[test]
    fn test_restore_round_trip() {
        let browser = FakeBrowser::with_tabs(5);
        browser.preset_group(&[1, 2], Some("Work"), Some(GroupColor::Blue));
        browser.preset_group(&[4], Some("Music"), Some(GroupColor::Pink));
        let before = browser.arrangement();

        let snapshot = block_on(capture(&browser)).unwrap();

        // Scramble the arrangement
        block_on(ungroup_all(&browser, Window::Current)).unwrap();
        let gid = block_on(browser.group(&[1, 3, 5])).unwrap();
        block_on(browser.set_group_meta(gid, "Misc", GroupColor::Grey, true)).unwrap();
        assert_ne!(browser.arrangement(), before);

        let restored = block_on(restore(&browser, &snapshot)).unwrap();

        assert_eq!(restored, 5);
        assert_eq!(browser.arrangement(), before);
        assert_eq!(browser.group_of(1), browser.group_of(2));
        assert!(!browser.group_of(1).unwrap().collapsed);
    }

    #[test]
    fn test_restore_skips_group_with_missing_metadata() {
        let browser = FakeBrowser::with_tabs(4);
        browser.preset_group(&[1, 2], None, Some(GroupColor::Green));
        browser.preset_group(&[3], Some("Kept"), Some(GroupColor::Yellow));
        let snapshot = block_on(capture(&browser)).unwrap();

        let restored = block_on(restore(&browser, &snapshot)).unwrap();

        // tab 4 (ungrouped) + tab 3 (recreated); tabs 1 and 2 dropped
        assert_eq!(restored, 2);
        assert_eq!(browser.group_of(1), None);
        assert_eq!(browser.group_of(3).unwrap().title.as_deref(), Some("Kept"));
    }

    #[test]
    fn test_restore_ignores_closed_tabs() {
        let browser = FakeBrowser::with_tabs(3);
        browser.preset_group(&[1, 2], Some("Docs"), Some(GroupColor::Cyan));
        let snapshot = block_on(capture(&browser)).unwrap();

        browser.tabs.borrow_mut().retain(|t| t.id != 2);
        let restored = block_on(restore(&browser, &snapshot)).unwrap();

        assert_eq!(restored, 2);
        assert_eq!(browser.group_of(1).unwrap().title.as_deref(), Some("Docs"));
    }
}
