//! Collaborator seams consumed by the workflows.
//!
//! Production implementations live in `chrome.rs`; tests use in-memory fakes.
//! Everything runs on one event loop, so the futures are not `Send`.
#![allow(async_fn_in_trait)]

use std::rc::Rc;

use crate::error::{BrowserError, ClassifierError};
use crate::tab_data::{BrowserTab, GroupColor, GroupId, GroupInfo, GroupProposal, TabId, TabRecord, Window};

/// Tab and tab-group primitives of the browser
pub trait TabEnvironment {
    async fn list_tabs(&self, window: Window) -> Result<Vec<BrowserTab>, BrowserError>;

    async fn list_groups(&self, window: Window) -> Result<Vec<GroupInfo>, BrowserError>;

    async fn ungroup(&self, tab_ids: &[TabId]) -> Result<(), BrowserError>;

    async fn group(&self, tab_ids: &[TabId]) -> Result<GroupId, BrowserError>;

    async fn set_group_meta(
        &self,
        group_id: GroupId,
        title: &str,
        color: GroupColor,
        collapsed: bool,
    ) -> Result<(), BrowserError>;
}

pub trait CredentialStore {
    async fn get_key(&self) -> Result<Option<String>, BrowserError>;

    async fn set_key(&self, key: &str) -> Result<(), BrowserError>;

    async fn clear_key(&self) -> Result<(), BrowserError>;

    async fn has_key(&self) -> Result<bool, BrowserError> {
        Ok(self.get_key().await?.is_some_and(|k| !k.is_empty()))
    }
}

pub trait SettingsStore {
    async fn selected_model(&self) -> Result<String, BrowserError>;

    async fn auto_organize_enabled(&self) -> Result<bool, BrowserError>;

    async fn auto_organize_threshold(&self) -> Result<u32, BrowserError>;
}

/// The language-model service that proposes a grouping
pub trait Classifier {
    async fn classify(
        &self,
        api_key: &str,
        tabs: &[TabRecord],
        model: &str,
    ) -> Result<Vec<GroupProposal>, ClassifierError>;
}

impl<T: TabEnvironment + ?Sized> TabEnvironment for Rc<T> {
    async fn list_tabs(&self, window: Window) -> Result<Vec<BrowserTab>, BrowserError> {
        (**self).list_tabs(window).await
    }

    async fn list_groups(&self, window: Window) -> Result<Vec<GroupInfo>, BrowserError> {
        (**self).list_groups(window).await
    }

    async fn ungroup(&self, tab_ids: &[TabId]) -> Result<(), BrowserError> {
        (**self).ungroup(tab_ids).await
    }

    async fn group(&self, tab_ids: &[TabId]) -> Result<GroupId, BrowserError> {
        (**self).group(tab_ids).await
    }

    async fn set_group_meta(
        &self,
        group_id: GroupId,
        title: &str,
        color: GroupColor,
        collapsed: bool,
    ) -> Result<(), BrowserError> {
        (**self).set_group_meta(group_id, title, color, collapsed).await
    }
}

impl<T: CredentialStore + ?Sized> CredentialStore for Rc<T> {
    async fn get_key(&self) -> Result<Option<String>, BrowserError> {
        (**self).get_key().await
    }

    async fn set_key(&self, key: &str) -> Result<(), BrowserError> {
        (**self).set_key(key).await
    }

    async fn clear_key(&self) -> Result<(), BrowserError> {
        (**self).clear_key().await
    }
}

impl<T: SettingsStore + ?Sized> SettingsStore for Rc<T> {
    async fn selected_model(&self) -> Result<String, BrowserError> {
        (**self).selected_model().await
    }

    async fn auto_organize_enabled(&self) -> Result<bool, BrowserError> {
        (**self).auto_organize_enabled().await
    }

    async fn auto_organize_threshold(&self) -> Result<u32, BrowserError> {
        (**self).auto_organize_threshold().await
    }
}

impl<T: Classifier + ?Sized> Classifier for Rc<T> {
    async fn classify(
        &self,
        api_key: &str,
        tabs: &[TabRecord],
        model: &str,
    ) -> Result<Vec<GroupProposal>, ClassifierError> {
        (**self).classify(api_key, tabs, model).await
    }
}

/// Tabs the workflows act on: everything that is not pinned
pub fn unpinned(tabs: Vec<BrowserTab>) -> Vec<BrowserTab> {
    tabs.into_iter().filter(|t| !t.pinned).collect()
}

/// Ungroup every grouped tab of the window in one call
pub async fn ungroup_all<E: TabEnvironment>(env: &E, window: Window) -> Result<usize, BrowserError> {
    let grouped: Vec<TabId> = env
        .list_tabs(window)
        .await?
        .iter()
        .filter(|t| t.is_grouped())
        .map(|t| t.id)
        .collect();

    if !grouped.is_empty() {
        env.ungroup(&grouped).await?;
    }
    Ok(grouped.len())
}

#[cfg(test)]
pub(crate) mod fake {
    //! In-memory browser used by the workflow tests
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::BTreeMap;

    #[derive(Default)]
    pub struct FakeBrowser {
        pub tabs: RefCell<Vec<BrowserTab>>,
        pub groups: RefCell<BTreeMap<GroupId, FakeGroup>>,
        next_group: Cell<GroupId>,
        pub mutations: Cell<usize>,
        pub fail_group: Cell<bool>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub struct FakeGroup {
        pub title: Option<String>,
        pub color: Option<GroupColor>,
        pub collapsed: bool,
    }

    impl FakeBrowser {
        pub fn with_tabs(count: i32) -> FakeBrowser {
            let browser = FakeBrowser::default();
            for id in 1..=count {
                browser.open_tab(id, &format!("Tab {}", id), &format!("https://site{}.example", id));
            }
            browser
        }

        pub fn open_tab(&self, id: TabId, title: &str, url: &str) {
            let index = self.tabs.borrow().len() as i32;
            self.tabs.borrow_mut().push(BrowserTab {
                id,
                index,
                title: title.to_string(),
                url: url.to_string(),
                pinned: false,
                active: false,
                group_id: crate::tab_data::NO_GROUP,
            });
        }

        pub fn set_pinned(&self, id: TabId) {
            self.with_tab(id, |t| t.pinned = true);
        }

        pub fn set_active(&self, id: TabId) {
            for tab in self.tabs.borrow_mut().iter_mut() {
                tab.active = tab.id == id;
            }
        }

        /// Group tabs directly, bypassing the mutation counter
        pub fn preset_group(&self, tab_ids: &[TabId], title: Option<&str>, color: Option<GroupColor>) -> GroupId {
            let gid = self.new_group_id();
            self.groups.borrow_mut().insert(
                gid,
                FakeGroup { title: title.map(str::to_string), color, collapsed: false },
            );
            for id in tab_ids {
                self.with_tab(*id, |t| t.group_id = gid);
            }
            gid
        }

        /// tab id -> (title, color) of its group, for ungrouped tabs `None`
        pub fn arrangement(&self) -> BTreeMap<TabId, Option<(Option<String>, Option<GroupColor>)>> {
            let groups = self.groups.borrow();
            self.tabs
                .borrow()
                .iter()
                .map(|t| {
                    let meta = t.group().and_then(|gid| groups.get(&gid)).map(|g| (g.title.clone(), g.color));
                    (t.id, meta)
                })
                .collect()
        }

        pub fn group_of(&self, tab_id: TabId) -> Option<FakeGroup> {
            let gid = self.tabs.borrow().iter().find(|t| t.id == tab_id)?.group()?;
            self.groups.borrow().get(&gid).cloned()
        }

        fn with_tab(&self, id: TabId, f: impl FnOnce(&mut BrowserTab)) {
            if let Some(tab) = self.tabs.borrow_mut().iter_mut().find(|t| t.id == id) {
                f(tab);
            }
        }

        fn new_group_id(&self) -> GroupId {
            let gid = self.next_group.get() + 100;
            self.next_group.set(self.next_group.get() + 1);
            gid
        }

        fn drop_empty_groups(&self) {
            let used: Vec<GroupId> = self.tabs.borrow().iter().filter_map(|t| t.group()).collect();
            self.groups.borrow_mut().retain(|gid, _| used.contains(gid));
        }
    }

    impl TabEnvironment for FakeBrowser {
        async fn list_tabs(&self, _window: Window) -> Result<Vec<BrowserTab>, BrowserError> {
            Ok(self.tabs.borrow().clone())
        }

        async fn list_groups(&self, _window: Window) -> Result<Vec<GroupInfo>, BrowserError> {
            Ok(self
                .groups
                .borrow()
                .iter()
                .map(|(id, g)| GroupInfo { id: *id, title: g.title.clone(), color: g.color })
                .collect())
        }

        async fn ungroup(&self, tab_ids: &[TabId]) -> Result<(), BrowserError> {
            self.mutations.set(self.mutations.get() + 1);
            for id in tab_ids {
                self.with_tab(*id, |t| t.group_id = crate::tab_data::NO_GROUP);
            }
            self.drop_empty_groups();
            Ok(())
        }

        async fn group(&self, tab_ids: &[TabId]) -> Result<GroupId, BrowserError> {
            self.mutations.set(self.mutations.get() + 1);
            if self.fail_group.get() {
                return Err(BrowserError::new("Tabs cannot be edited right now"));
            }
            for id in tab_ids {
                if !self.tabs.borrow().iter().any(|t| t.id == *id) {
                    return Err(BrowserError::new(format!("No tab with id: {}.", id)));
                }
            }
            let gid = self.new_group_id();
            self.groups
                .borrow_mut()
                .insert(gid, FakeGroup { title: None, color: Some(GroupColor::Grey), collapsed: false });
            for id in tab_ids {
                self.with_tab(*id, |t| t.group_id = gid);
            }
            self.drop_empty_groups();
            Ok(gid)
        }

        async fn set_group_meta(
            &self,
            group_id: GroupId,
            title: &str,
            color: GroupColor,
            collapsed: bool,
        ) -> Result<(), BrowserError> {
            self.mutations.set(self.mutations.get() + 1);
            let mut groups = self.groups.borrow_mut();
            let group = groups
                .get_mut(&group_id)
                .ok_or_else(|| BrowserError::new(format!("No group with id: {}.", group_id)))?;
            group.title = Some(title.to_string());
            group.color = Some(color);
            group.collapsed = collapsed;
            Ok(())
        }
    }
}
