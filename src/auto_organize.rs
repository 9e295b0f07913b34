/// Debounced auto-organize on tab creation
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use log::{debug, error, info};

use crate::environment::{Classifier, CredentialStore, SettingsStore, TabEnvironment, unpinned};
use crate::tab_data::{BrowserTab, Window};
use crate::workflow::{OrganizeResult, Organizer};

pub const DEBOUNCE_DELAY: Duration = Duration::from_secs(1);

/// Runs a callback once after a delay; dropping the returned handle cancels it
pub trait Scheduler {
    type Handle;

    fn schedule(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> Self::Handle;
}

/// Scheduler on the yew platform runtime (browser event loop)
#[derive(Debug, Clone, Copy, Default)]
pub struct PlatformScheduler;

/// Cancels the pending callback when dropped
pub struct PlatformTimer {
    cancelled: Rc<Cell<bool>>,
}

impl Drop for PlatformTimer {
    fn drop(&mut self) {
        self.cancelled.set(true);
    }
}

impl Scheduler for PlatformScheduler {
    type Handle = PlatformTimer;

    fn schedule(&self, delay: Duration, callback: Box<dyn FnOnce()>) -> PlatformTimer {
        let cancelled = Rc::new(Cell::new(false));
        let flag = cancelled.clone();
        yew::platform::spawn_local(async move {
            yew::platform::time::sleep(delay).await;
            if !flag.get() {
                callback();
            }
        });
        PlatformTimer { cancelled }
    }
}

/// Coalesces bursts of tab creation into a single check.
///
/// At most one timer is pending; every new non-pinned tab re-arms it.
pub struct AutoOrganizeTrigger<S: Scheduler> {
    scheduler: S,
    delay: Duration,
    pending: RefCell<Option<S::Handle>>,
    on_fire: Rc<dyn Fn(Window)>,
}

impl<S: Scheduler> AutoOrganizeTrigger<S> {
    pub fn new(scheduler: S, delay: Duration, on_fire: Rc<dyn Fn(Window)>) -> Self {
        AutoOrganizeTrigger { scheduler, delay, pending: RefCell::new(None), on_fire }
    }

    pub fn on_tab_created(&self, tab: &BrowserTab, window_id: i32) {
        if tab.pinned {
            return;
        }

        // Drop the old handle first so its callback can never run
        self.pending.replace(None);

        let on_fire = self.on_fire.clone();
        let window = Window::Id(window_id);
        let handle = self.scheduler.schedule(self.delay, Box::new(move || on_fire(window)));
        self.pending.replace(Some(handle));
        debug!("Auto-organize check armed for window {}", window_id);
    }

    pub fn is_armed(&self) -> bool {
        self.pending.borrow().is_some()
    }
}

/// Why an auto-organize check did or did not organize
#[derive(Debug, Clone, PartialEq)]
pub enum AutoOutcome {
    Disabled,
    NoKey,
    Busy,
    BelowThreshold { ungrouped: usize, threshold: u32 },
    Organized(OrganizeResult),
    Failed(String),
}

/// Organize when the window has at least `threshold` loose tabs
pub async fn check_and_organize<E, C, S>(organizer: &Organizer<E, C, S>, window: Window) -> AutoOutcome
where
    E: TabEnvironment,
    C: Classifier,
    S: CredentialStore + SettingsStore,
{
    let outcome = evaluate(organizer, window).await;
    match &outcome {
        AutoOutcome::Organized(result) if result.success => info!(
            "Auto-organized {} tabs into {} groups",
            result.tabs_organized, result.groups_created
        ),
        AutoOutcome::Organized(result) => error!(
            "Auto-organize failed: {}",
            result.error.as_deref().unwrap_or("unknown error")
        ),
        AutoOutcome::Failed(message) => error!("Auto-organize check failed: {}", message),
        other => debug!("Auto-organize skipped: {:?}", other),
    }
    outcome
}

async fn evaluate<E, C, S>(organizer: &Organizer<E, C, S>, window: Window) -> AutoOutcome
where
    E: TabEnvironment,
    C: Classifier,
    S: CredentialStore + SettingsStore,
{
    let store = organizer.store();

    match store.auto_organize_enabled().await {
        Ok(true) => {}
        Ok(false) => return AutoOutcome::Disabled,
        Err(e) => return AutoOutcome::Failed(e.to_string()),
    }
    match store.has_key().await {
        Ok(true) => {}
        Ok(false) => return AutoOutcome::NoKey,
        Err(e) => return AutoOutcome::Failed(e.to_string()),
    }
    if organizer.state().is_organizing() {
        return AutoOutcome::Busy;
    }

    let threshold = match store.auto_organize_threshold().await {
        Ok(threshold) => threshold,
        Err(e) => return AutoOutcome::Failed(e.to_string()),
    };
    let ungrouped = match organizer.env().list_tabs(window).await {
        Ok(tabs) => unpinned(tabs).iter().filter(|t| !t.is_grouped()).count(),
        Err(e) => return AutoOutcome::Failed(e.to_string()),
    };

    if ungrouped < threshold as usize {
        return AutoOutcome::BelowThreshold { ungrouped, threshold };
    }

    info!("{} ungrouped tabs reached threshold {}, organizing", ungrouped, threshold);
    AutoOutcome::Organized(organizer.organize().await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::fake::FakeBrowser;
    use crate::tab_data::{GroupColor, GroupProposal, NO_GROUP};
    use crate::workflow::testing::{FakeClassifier, FakeStore, organizer};
    use futures::executor::block_on;

    /// Callbacks wait in a queue until the test fires them
    #[derive(Clone, Default)]
    struct ManualScheduler {
        queue: Rc<RefCell<Vec<(Rc<Cell<bool>>, Box<dyn FnOnce()>)>>>,
    }

    struct ManualTimer(Rc<Cell<bool>>);

    impl Drop for ManualTimer {
        fn drop(&mut self) {
            self.0.set(true);
        }
    }

    impl Scheduler for ManualScheduler {
        type Handle = ManualTimer;

        fn schedule(&self, _delay: Duration, callback: Box<dyn FnOnce()>) -> ManualTimer {
            let cancelled = Rc::new(Cell::new(false));
            self.queue.borrow_mut().push((cancelled.clone(), callback));
            ManualTimer(cancelled)
        }
    }

    impl ManualScheduler {
        fn elapse(&self) {
            let due: Vec<_> = self.queue.borrow_mut().drain(..).collect();
            for (cancelled, callback) in due {
                if !cancelled.get() {
                    callback();
                }
            }
        }
    }

    fn new_tab(id: i32, pinned: bool) -> BrowserTab {
        BrowserTab {
            id,
            index: id,
            title: String::new(),
            url: String::new(),
            pinned,
            active: false,
            group_id: NO_GROUP,
        }
    }

    fn everything_group(count: i32) -> Vec<GroupProposal> {
        vec![GroupProposal { name: "Everything".to_string(), color: GroupColor::Green, tab_ids: (1..=count).collect() }]
    }

    #[test]
    fn test_burst_of_tabs_fires_once() {
        let scheduler = ManualScheduler::default();
        let fired = Rc::new(RefCell::new(Vec::new()));
        let sink = fired.clone();
        let trigger = AutoOrganizeTrigger::new(scheduler.clone(), DEBOUNCE_DELAY, Rc::new(move |w: Window| sink.borrow_mut().push(w)));

        for id in 1..=5 {
            trigger.on_tab_created(&new_tab(id, false), 9);
        }
        scheduler.elapse();

        assert_eq!(*fired.borrow(), vec![Window::Id(9)]);
    }

    #[test]
    fn test_pinned_tabs_do_not_arm() {
        let scheduler = ManualScheduler::default();
        let fired = Rc::new(Cell::new(0));
        let sink = fired.clone();
        let trigger = AutoOrganizeTrigger::new(scheduler.clone(), DEBOUNCE_DELAY, Rc::new(move |_: Window| sink.set(sink.get() + 1)));

        trigger.on_tab_created(&new_tab(1, true), 1);
        scheduler.elapse();

        assert!(!trigger.is_armed());
        assert_eq!(fired.get(), 0);
    }

    #[test]
    fn test_threshold_scenario() {
        let browser = Rc::new(FakeBrowser::with_tabs(14));
        let classifier = Rc::new(FakeClassifier::returning(everything_group(15)));
        let store = Rc::new(FakeStore::with_key());
        store.settings.borrow_mut().auto_organize_enabled = Some(true);
        let organizer = organizer(&browser, &classifier, &store);

        let outcome = block_on(check_and_organize(&organizer, Window::Id(1)));
        assert_eq!(outcome, AutoOutcome::BelowThreshold { ungrouped: 14, threshold: 15 });
        assert_eq!(classifier.call_count(), 0);

        browser.open_tab(15, "Tab 15", "https://site15.example");
        let outcome = block_on(check_and_organize(&organizer, Window::Id(1)));

        assert_eq!(outcome, AutoOutcome::Organized(OrganizeResult::success(1, 15)));
        assert_eq!(classifier.call_count(), 1);
    }

    #[test]
    fn test_debounced_trigger_organizes_once() {
        let browser = Rc::new(FakeBrowser::with_tabs(14));
        let classifier = Rc::new(FakeClassifier::returning(everything_group(20)));
        let store = Rc::new(FakeStore::with_key());
        store.settings.borrow_mut().auto_organize_enabled = Some(true);
        let organizer = Rc::new(organizer(&browser, &classifier, &store));

        let scheduler = ManualScheduler::default();
        let outcomes = Rc::new(RefCell::new(Vec::new()));
        let on_fire = {
            let organizer = organizer.clone();
            let outcomes = outcomes.clone();
            Rc::new(move |window: Window| outcomes.borrow_mut().push(block_on(check_and_organize(&organizer, window))))
        };
        let trigger = AutoOrganizeTrigger::new(scheduler.clone(), DEBOUNCE_DELAY, on_fire);

        for id in 15..=20 {
            browser.open_tab(id, "New", "https://new.example");
            trigger.on_tab_created(&new_tab(id, false), 1);
        }
        scheduler.elapse();

        assert_eq!(outcomes.borrow().len(), 1);
        assert_eq!(classifier.call_count(), 1);
    }

    #[test]
    fn test_grouped_and_pinned_tabs_do_not_count() {
        let browser = Rc::new(FakeBrowser::with_tabs(20));
        browser.preset_group(&[1, 2, 3, 4, 5], Some("Done"), Some(GroupColor::Blue));
        browser.set_pinned(6);
        let classifier = Rc::new(FakeClassifier::default());
        let store = Rc::new(FakeStore::with_key());
        store.settings.borrow_mut().auto_organize_enabled = Some(true);
        let organizer = organizer(&browser, &classifier, &store);

        let outcome = block_on(check_and_organize(&organizer, Window::Id(1)));

        assert_eq!(outcome, AutoOutcome::BelowThreshold { ungrouped: 14, threshold: 15 });
    }

    #[test]
    fn test_skips_when_disabled_keyless_or_busy() {
        let browser = Rc::new(FakeBrowser::with_tabs(30));
        let classifier = Rc::new(FakeClassifier::default());
        let store = Rc::new(FakeStore::default());
        let organizer = organizer(&browser, &classifier, &store);

        assert_eq!(block_on(check_and_organize(&organizer, Window::Current)), AutoOutcome::Disabled);

        store.settings.borrow_mut().auto_organize_enabled = Some(true);
        assert_eq!(block_on(check_and_organize(&organizer, Window::Current)), AutoOutcome::NoKey);

        store.settings.borrow_mut().api_key = Some("sk-test".to_string());
        assert!(organizer.state().try_begin());
        assert_eq!(block_on(check_and_organize(&organizer, Window::Current)), AutoOutcome::Busy);
        assert_eq!(classifier.call_count(), 0);
    }
}
