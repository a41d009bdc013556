use crate::layer::{Layer, LayerId};
use log::info;

/// The application that owns layers: it provides the layer to work on and
/// receives the finished one.
pub trait Host {
    fn active_layer(&self) -> Option<&Layer>;

    fn add_map_layer(&mut self, layer: Layer) -> LayerId;
}

/// In-memory host holding registered layers in insertion order.
#[derive(Debug, Default)]
pub struct Project {
    layers: Vec<Layer>,
    active: Option<LayerId>,
}

impl Project {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_active(&mut self, id: LayerId) -> bool {
        if self.layer(id).is_some() {
            self.active = Some(id);
            true
        } else {
            false
        }
    }

    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| l.id() == id)
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }
}

impl Host for Project {
    fn active_layer(&self) -> Option<&Layer> {
        self.active.and_then(|id| self.layer(id))
    }

    fn add_map_layer(&mut self, layer: Layer) -> LayerId {
        let id = layer.id();
        info!(
            "Registered layer '{}' {} with {} features",
            layer.name(),
            id,
            layer.feature_count()
        );
        self.layers.push(layer);
        id
    }
}
