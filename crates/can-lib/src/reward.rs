//! Reward for an observed network state

use crate::models::LinkState;

/// Negated sum of link utilizations; an empty observation scores zero
pub fn reward<'a>(states: impl IntoIterator<Item = &'a LinkState>) -> f64 {
    -states.into_iter().map(|s| s.utilization).sum::<f64>()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state(port: &str, utilization: f64) -> LinkState {
        LinkState {
            device_id: "of:0000000000000001".to_string(),
            port: port.to_string(),
            utilization,
        }
    }

    #[test]
    fn test_empty_state_is_neutral() {
        let states: Vec<LinkState> = vec![];
        assert_eq!(reward(&states), 0.0);
    }

    #[test]
    fn test_reward_is_negated_sum() {
        let states = vec![state("1", 0.25), state("2", 0.5), state("3", 0.125)];
        assert_eq!(reward(&states), -0.875);
    }

    #[test]
    fn test_more_utilization_is_more_negative() {
        let calm = vec![state("1", 0.1), state("2", 0.1)];
        let busy = vec![state("1", 0.9), state("2", 0.1)];
        assert!(reward(&busy) < reward(&calm));
    }
}
