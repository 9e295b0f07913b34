/// Turning classifier proposals into real tab groups
use std::collections::HashSet;

use log::{debug, warn};

use crate::environment::{TabEnvironment, ungroup_all};
use crate::error::BrowserError;
use crate::tab_data::{GroupProposal, TabId, TabRecord, Window};

/// Drop ids the request never mentioned, then drop proposals left empty.
///
/// Runs before any tab is touched.
pub fn validate_proposals(proposals: Vec<GroupProposal>, tabs: &[TabRecord]) -> Vec<GroupProposal> {
    let known: HashSet<TabId> = tabs.iter().map(|t| t.id).collect();

    proposals
        .into_iter()
        .filter_map(|mut proposal| {
            let before = proposal.tab_ids.len();
            proposal.tab_ids.retain(|id| known.contains(id));
            if proposal.tab_ids.len() < before {
                warn!(
                    "Dropped {} unknown tab ids from group \"{}\"",
                    before - proposal.tab_ids.len(),
                    proposal.name
                );
            }
            if proposal.tab_ids.is_empty() {
                warn!("Dropped empty group \"{}\"", proposal.name);
                None
            } else {
                Some(proposal)
            }
        })
        .collect()
}

/// Total tabs placed across all proposals
pub fn count_tabs(proposals: &[GroupProposal]) -> usize {
    proposals.iter().map(|p| p.tab_ids.len()).sum()
}

/// Replace the window's grouping with `proposals`, returning the number of groups created.
///
/// Every group is collapsed except the one holding the active tab.
pub async fn apply<E: TabEnvironment>(env: &E, proposals: &[GroupProposal]) -> Result<usize, BrowserError> {
    let active = env
        .list_tabs(Window::Current)
        .await?
        .iter()
        .find(|t| t.active)
        .map(|t| t.id);

    ungroup_all(env, Window::Current).await?;

    let mut groups_created = 0;
    for proposal in proposals.iter().filter(|p| !p.tab_ids.is_empty()) {
        let collapsed = !active.is_some_and(|id| proposal.tab_ids.contains(&id));
        let group_id = env.group(&proposal.tab_ids).await?;
        env.set_group_meta(group_id, &proposal.name, proposal.color, collapsed).await?;
        debug!("Created group \"{}\" with {} tabs", proposal.name, proposal.tab_ids.len());
        groups_created += 1;
    }

    Ok(groups_created)
}
