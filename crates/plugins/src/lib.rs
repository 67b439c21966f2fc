//! Built-in model plugins.
//!
//! - `Bumper`: counts contacts touching the model's bodies.
//! - `Drive`: holds a body at a fixed body-frame velocity.

mod bumper;
mod config;
mod drive;

pub use bumper::Bumper;
pub use drive::Drive;

use planeworld_kernel::PluginRegistry;

/// Registry holding every built-in plugin type.
pub fn builtin_registry() -> PluginRegistry {
    let mut registry = PluginRegistry::new();
    registry
        .register(Bumper::TYPE, || Box::new(Bumper::default()))
        .register(Drive::TYPE, || Box::new(Drive::default()));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_knows_builtins() {
        let registry = builtin_registry();
        assert_eq!(registry.types().collect::<Vec<_>>(), ["Bumper", "Drive"]);
    }
}
