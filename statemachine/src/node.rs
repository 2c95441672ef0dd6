// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! State hierarchy, stored as an arena of nodes linked to their parent by
//! index.

use crate::{Error, State};

use std::collections::HashMap;

/// A state and its place in the hierarchy.
pub(crate) struct Node {
    /// Name the state was added under.
    pub(crate) name: String,
    /// The state this node describes.
    pub(crate) state: Box<dyn State>,
    /// Parent node, `None` for a hierarchy root.
    pub(crate) parent: Option<usize>,
    /// True while the state is part of the active chain.
    pub(crate) active: bool,
}

/// Arena of nodes, addressed by index and by name.
#[derive(Default)]
pub(crate) struct Nodes {
    pub(crate) slots: Vec<Node>,
    pub(crate) index: HashMap<String, usize>,
}

impl Nodes {
    /// Adds a state under `parent`, which must already be known.
    pub(crate) fn add(
        &mut self,
        name: String,
        state: Box<dyn State>,
        parent: Option<&str>,
    ) -> Result<usize, Error> {
        if self.index.contains_key(&name) {
            return Err(Error::StateExists(name));
        }
        let parent = parent.map(|parent| self.lookup(parent)).transpose()?;

        let id = self.slots.len();
        self.index.insert(name.clone(), id);
        self.slots.push(Node {
            name,
            state,
            parent,
            active: false,
        });
        Ok(id)
    }

    pub(crate) fn lookup(&self, name: &str) -> Result<usize, Error> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownState(name.to_owned()))
    }

    pub(crate) fn name(&self, id: usize) -> &str {
        &self.slots[id].name
    }

    /// Nodes to enter to reach `target`, from `target` up to the first active
    /// ancestor (excluded) or the root. Leaf first.
    pub(crate) fn entry_chain(&self, target: usize) -> Vec<usize> {
        let mut chain = Vec::new();
        let mut cursor = Some(target);
        while let Some(id) = cursor {
            let node = &self.slots[id];
            if node.active {
                break;
            }
            chain.push(id);
            cursor = node.parent;
        }
        chain
    }
}
