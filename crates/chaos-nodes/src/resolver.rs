use rand::seq::SliceRandom;

use chaos_kube::NodeInventory;

use crate::error::ResolveError;

/// Turns a node scenario's selection fields into concrete node names.
pub trait NodeResolver {
    fn resolve(
        &self,
        node_name: &str,
        label_selector: &str,
        instance_count: usize,
    ) -> Result<Vec<String>, ResolveError>;
}

/// Resolver over a live node inventory. A named node that is Ready resolves
/// to itself whatever its labels; anything else falls back to the label
/// selector.
#[derive(Debug, Clone)]
pub struct InventoryResolver<I> {
    pub inventory: I,
}

impl<I: NodeInventory> InventoryResolver<I> {
    pub fn new(inventory: I) -> Self {
        Self { inventory }
    }
}

impl<I: NodeInventory> NodeResolver for InventoryResolver<I> {
    fn resolve(
        &self,
        node_name: &str,
        label_selector: &str,
        instance_count: usize,
    ) -> Result<Vec<String>, ResolveError> {
        if !node_name.is_empty() {
            let killable = self.inventory.killable_nodes("")?;
            if killable.iter().any(|node| node == node_name) {
                return Ok(vec![node_name.to_string()]);
            }
            log::info!(
                "Node with provided node_name does not exist or the node might be in NotReady state: {node_name}"
            );
        }

        let candidates = self.inventory.killable_nodes(label_selector)?;
        if candidates.is_empty() {
            return Err(ResolveError::NoMatchingNodes {
                label_selector: label_selector.to_string(),
            });
        }
        log::info!("Ready nodes with the label selector '{label_selector}': {candidates:?}");
        if instance_count == candidates.len() {
            return Ok(candidates);
        }
        if instance_count > candidates.len() {
            return Err(ResolveError::NotEnoughNodes {
                label_selector: label_selector.to_string(),
                requested: instance_count,
                available: candidates.len(),
            });
        }
        Ok(candidates
            .choose_multiple(&mut rand::thread_rng(), instance_count)
            .cloned()
            .collect())
    }
}
