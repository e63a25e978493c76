use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tuner_structs::core::{HyperparameterQuantity, HyperparameterState};

/// Where the collaborator receives hyperparameters for its next forward/backward pass.
pub trait HyperparameterInjector {
    fn inject(&mut self, group_id: usize, state: &HyperparameterState) -> Result<()>;
}

impl<F> HyperparameterInjector for F
where
    F: FnMut(usize, &HyperparameterState) -> Result<()>,
{
    fn inject(&mut self, group_id: usize, state: &HyperparameterState) -> Result<()> {
        self(group_id, state)
    }
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FeedKey {
    pub group_id: usize,
    pub quantity: HyperparameterQuantity,
}

/// Hyperparameters waiting to be fed into the collaborator, keyed by group.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct HyperparameterFeed {
    states: BTreeMap<usize, HyperparameterState>,
}

impl HyperparameterFeed {
    pub fn new(states: BTreeMap<usize, HyperparameterState>) -> Self {
        Self { states }
    }

    pub fn states(&self) -> &BTreeMap<usize, HyperparameterState> {
        &self.states
    }

    pub fn get(&self, key: FeedKey) -> Option<f64> {
        self.states
            .get(&key.group_id)
            .map(|state| state.get(key.quantity))
    }

    /// One `(group, quantity) -> value` entry per scalar, groups in ascending order.
    pub fn entries(&self) -> impl Iterator<Item = (FeedKey, f64)> + '_ {
        self.states.iter().flat_map(|(&group_id, state)| {
            HyperparameterQuantity::ALL.into_iter().map(move |quantity| {
                (FeedKey { group_id, quantity }, state.get(quantity))
            })
        })
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Pushes every state to `injector`, stopping at the first failure.
    pub fn deliver<I: HyperparameterInjector + ?Sized>(&self, injector: &mut I) -> Result<()> {
        for (&group_id, state) in self.states.iter() {
            injector.inject(group_id, state)?;
        }
        Ok(())
    }
}
