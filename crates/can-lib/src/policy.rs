//! Policy seam for driving episodes
//!
//! A learning agent implements [`Policy`]; [`GreedyPolicy`] is the
//! non-learning baseline used by the agent binary and the CLI.

use crate::actions::ActionSpace;
use crate::models::{LinkKey, LinkState};
use crate::state::{congested, StateMap};

/// Chooses the link to relieve and the action to take
pub trait Policy: Send + Sync {
    /// Pick a congested link, or `None` to end the episode without acting
    fn select_target(&self, states: &StateMap) -> Option<LinkState>;

    /// Pick an index into `space.actions`, or `None` to decline
    fn select_action(&self, space: &ActionSpace, states: &StateMap) -> Option<usize>;
}

/// Relieve the hottest link by moving a flow to the coolest alternate port
#[derive(Debug, Clone)]
pub struct GreedyPolicy {
    threshold: f64,
}

impl GreedyPolicy {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl Policy for GreedyPolicy {
    fn select_target(&self, states: &StateMap) -> Option<LinkState> {
        congested(states.values(), self.threshold).into_iter().next()
    }

    fn select_action(&self, space: &ActionSpace, states: &StateMap) -> Option<usize> {
        // Unobserved ports count as idle; ties keep the first action
        space
            .actions
            .iter()
            .enumerate()
            .map(|(idx, action)| {
                let key = LinkKey::new(&space.device_id, &action.candidate_out_port);
                let load = states.get(&key).map(|s| s.utilization).unwrap_or(0.0);
                (idx, load)
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .map(|(idx, _)| idx)
    }
}
