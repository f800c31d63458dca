use serde::{Deserialize, Serialize};

use crate::surface::ChannelOrder;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub channel_order: ChannelOrder,
    // Cap on header + payload bytes; larger surfaces fail as OutOfMemory.
    pub max_surface_bytes: Option<usize>,
    // Working-memory budget handed to the PNG codec; None keeps its default.
    pub decoder_memory_limit: Option<usize>,
}

impl DecoderConfig {
    pub fn with_channel_order(channel_order: ChannelOrder) -> Self {
        Self {
            channel_order,
            ..Self::default()
        }
    }

    pub fn max_surface_bytes(mut self, limit: usize) -> Self {
        self.max_surface_bytes = Some(limit);
        self
    }

    pub fn decoder_memory_limit(mut self, bytes: usize) -> Self {
        self.decoder_memory_limit = Some(bytes);
        self
    }

    pub(crate) fn png_limits(&self) -> png::Limits {
        match self.decoder_memory_limit {
            Some(bytes) => png::Limits { bytes },
            None => png::Limits::default(),
        }
    }
}
