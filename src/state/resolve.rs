//! Who won an over/under. Pure functions, no state.

use crate::types::{Outcome, Resolution, UserId};
use std::cmp::Ordering;
use std::collections::BTreeSet;

pub fn outcome_for(prompt_seconds: u32, actual_seconds: u32) -> Outcome {
    match actual_seconds.cmp(&prompt_seconds) {
        Ordering::Equal => Outcome::Push,
        Ordering::Less => Outcome::Under,
        Ordering::Greater => Outcome::Over,
    }
}

pub fn resolve(
    prompt_seconds: u32,
    actual_seconds: u32,
    over_voters: &BTreeSet<UserId>,
    under_voters: &BTreeSet<UserId>,
) -> Resolution {
    let outcome = outcome_for(prompt_seconds, actual_seconds);
    let winners = match outcome {
        Outcome::Push => BTreeSet::new(),
        Outcome::Under => under_voters.clone(),
        Outcome::Over => over_voters.clone(),
    };

    Resolution {
        prompt_seconds,
        actual_seconds,
        outcome,
        winners,
    }
}
