pub mod command;
pub mod error;
pub mod nodes;
pub mod pods;

pub use command::*;
pub use error::*;
pub use nodes::*;
pub use pods::*;

#[cfg(test)]
mod tests {
    use super::{KubeCli, KubeError, KubeNodes, KubePods, NodeInventory, PodRef};
    use std::any::TypeId;

    #[test]
    fn crate_root_reexports_kube_types() {
        let _ = TypeId::of::<KubeCli>();
        let _ = TypeId::of::<KubeError>();
        let _ = TypeId::of::<KubeNodes>();
        let _ = TypeId::of::<KubePods>();
        let _ = TypeId::of::<PodRef>();
    }

    #[test]
    fn kube_nodes_is_a_node_inventory() {
        fn assert_inventory<T: NodeInventory>() {}
        assert_inventory::<KubeNodes>();
    }
}
