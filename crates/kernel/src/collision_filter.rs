//! Collision category bits and collision groups, owned by one world.

/// Largest number of layer names a world can register; one category bit each.
pub const MAX_LAYERS: usize = 16;

/// Pseudo layer name selecting every registered layer.
pub const ALL_LAYERS: &str = "all";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegisterLayerError {
    #[error("max number of layers reached, max is {MAX_LAYERS}")]
    LayersFull,
    #[error("layer \"{0}\" already exists")]
    AlreadyExists(String),
}

/// Assigns collision category bits to layer names, in registration order,
/// and hands out collision group indices for models.
#[derive(Debug, Clone, Default)]
pub struct CollisionFilterRegistry {
    layers: Vec<String>,
    collide_groups: i16,
    no_collide_groups: i16,
}

impl CollisionFilterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a layer name, returning its bit index.
    pub fn register_layer(&mut self, name: &str) -> Result<usize, RegisterLayerError> {
        if self.lookup_layer(name).is_some() {
            return Err(RegisterLayerError::AlreadyExists(name.to_string()));
        }
        if self.is_layers_full() {
            return Err(RegisterLayerError::LayersFull);
        }
        self.layers.push(name.to_string());
        Ok(self.layers.len() - 1)
    }

    pub fn lookup_layer(&self, name: &str) -> Option<usize> {
        self.layers.iter().position(|l| l == name)
    }

    /// Registered names, indexed by bit.
    pub fn layer_names(&self) -> &[String] {
        &self.layers
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn is_layers_full(&self) -> bool {
        self.layers.len() >= MAX_LAYERS
    }

    /// Category bits covering `names`. Returns the first unknown name on failure.
    pub fn category_bits<S: AsRef<str>>(&self, names: &[S]) -> Result<u16, String> {
        let mut bits = 0u16;
        for name in names {
            let name = name.as_ref();
            if name == ALL_LAYERS {
                bits |= self.all_bits();
                continue;
            }
            match self.lookup_layer(name) {
                Some(bit) => bits |= 1 << bit,
                None => return Err(name.to_string()),
            }
        }
        Ok(bits)
    }

    fn all_bits(&self) -> u16 {
        (0..self.layers.len()).fold(0, |acc, bit| acc | 1 << bit)
    }

    /// Fresh positive group: fixtures sharing it always collide.
    pub fn register_collide(&mut self) -> i16 {
        self.collide_groups += 1;
        self.collide_groups
    }

    /// Fresh negative group: fixtures sharing it never collide.
    pub fn register_no_collide(&mut self) -> i16 {
        self.no_collide_groups -= 1;
        self.no_collide_groups
    }
}
