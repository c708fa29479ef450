pub mod action;
pub mod baremetal;
pub mod capability;
pub mod cloud;
pub mod command;
pub mod dispatch;
pub mod error;
pub mod generic;
pub mod registry;
pub mod resolver;

pub use action::*;
pub use baremetal::*;
pub use capability::*;
pub use cloud::*;
pub use command::*;
pub use dispatch::*;
pub use error::*;
pub use generic::*;
pub use registry::*;
pub use resolver::*;

#[cfg(test)]
mod tests {
    use super::{
        dispatch_action, DispatchError, NodeAction, NodeActions, ProviderFactory, ProviderRegistry,
    };
    use std::any::TypeId;

    #[test]
    fn crate_root_reexports_dispatch_types() {
        let _ = TypeId::of::<NodeAction>();
        let _ = TypeId::of::<DispatchError>();
        let _ = TypeId::of::<ProviderRegistry>();
        let _ = TypeId::of::<Box<dyn NodeActions>>();
        let _ = dispatch_action;
    }

    #[test]
    fn provider_registry_is_a_provider_factory() {
        fn assert_factory<T: ProviderFactory>() {}
        assert_factory::<ProviderRegistry>();
    }
}
