use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::{
    assets::ImageHandle,
    config::{EditMode, ScalingMode},
};

/// Share of the canvas width a randomly placed image occupies.
pub const RANDOM_WIDTH_FRACTION: f32 = 0.4;

/// Axis-aligned draw rectangle in canvas units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

/// Natural or target dimensions of a piece of media.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MediaSize {
    pub width: f32,
    pub height: f32,
}

impl MediaSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn of_image(image: &ImageHandle) -> Self {
        Self::new(image.width as f32, image.height as f32)
    }
}

/// Scales `media` to cover (`fill`) or fit inside (`fit`) the canvas,
/// centred on both axes.
pub fn scaled_rect(media: MediaSize, canvas: MediaSize, mode: ScalingMode) -> Rect {
    let scale_w = canvas.width / media.width;
    let scale_h = canvas.height / media.height;
    let scale = match mode {
        ScalingMode::Fill => scale_w.max(scale_h),
        ScalingMode::Fit => scale_w.min(scale_h),
    };
    let w = media.width * scale;
    let h = media.height * scale;
    Rect {
        x: (canvas.width - w) / 2.0,
        y: (canvas.height - h) / 2.0,
        w,
        h,
    }
}

/// Scales `media` to [`RANDOM_WIDTH_FRACTION`] of the canvas width and drops
/// it at a uniformly random spot that keeps it on screen.
pub fn random_rect<R: Rng + ?Sized>(media: MediaSize, canvas: MediaSize, rng: &mut R) -> Rect {
    let scale = canvas.width * RANDOM_WIDTH_FRACTION / media.width;
    let w = media.width * scale;
    let h = media.height * scale;
    let max_x = (canvas.width - w).max(0.0);
    let max_y = (canvas.height - h).max(0.0);
    Rect {
        x: rng.gen::<f32>() * max_x,
        y: rng.gen::<f32>() * max_y,
        w,
        h,
    }
}

/// When a layer leaves the stack.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Expiry {
    /// Absolute wall-clock time in milliseconds.
    At(f64),
    /// Only removed by a clear.
    Never,
}

impl Expiry {
    pub fn after(now_ms: f64, lifetime_ms: f64) -> Self {
        Self::At(now_ms + lifetime_ms)
    }

    pub fn is_expired(&self, now_ms: f64) -> bool {
        match self {
            Self::At(at) => *at <= now_ms,
            Self::Never => false,
        }
    }
}

/// One visible element of the frame.
#[derive(Debug, Clone, PartialEq)]
pub enum LayerItem {
    Image {
        image: ImageHandle,
        rect: Rect,
        expiry: Expiry,
    },
    Text {
        content: String,
        expiry: Expiry,
    },
}

impl LayerItem {
    pub fn expiry(&self) -> Expiry {
        match self {
            Self::Image { expiry, .. } | Self::Text { expiry, .. } => *expiry,
        }
    }

    pub fn is_text(&self) -> bool {
        matches!(self, Self::Text { .. })
    }
}

/// Media selected by a single trigger.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriggerOutcome {
    pub image: Option<(ImageHandle, Rect)>,
    pub text: Option<String>,
}

impl TriggerOutcome {
    pub fn is_empty(&self) -> bool {
        self.image.is_none() && self.text.is_none()
    }
}

/// Ordered layers; later entries draw on top.
#[derive(Debug, Default, Clone)]
pub struct LayerStack {
    layers: Vec<LayerItem>,
}

impl LayerStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LayerItem> {
        self.layers.iter()
    }

    pub fn clear(&mut self) {
        self.layers.clear();
    }

    pub fn push(&mut self, layer: LayerItem) {
        self.layers.push(layer);
    }

    pub fn remove_text(&mut self) {
        self.layers.retain(|layer| !layer.is_text());
    }

    /// Drops every layer whose expiry is at or before `now_ms`.
    pub fn evict_expired(&mut self, now_ms: f64) -> usize {
        let before = self.layers.len();
        self.layers.retain(|layer| !layer.expiry().is_expired(now_ms));
        before - self.layers.len()
    }

    /// Inserts the media a trigger produced according to `mode`.
    ///
    /// New text replaces old text. `normal` mode replaces the whole stack.
    /// The image goes in before the text so the text draws above it.
    pub fn apply_trigger(
        &mut self,
        outcome: TriggerOutcome,
        mode: EditMode,
        erase_time_ms: f64,
        now_ms: f64,
    ) {
        if outcome.is_empty() {
            return;
        }
        if outcome.text.is_some() {
            self.remove_text();
        }
        if mode == EditMode::Normal {
            self.layers.clear();
        }

        if let Some((image, rect)) = outcome.image {
            let expiry = if mode.expires_layers() {
                Expiry::after(now_ms, erase_time_ms)
            } else {
                Expiry::Never
            };
            self.layers.push(LayerItem::Image {
                image,
                rect,
                expiry,
            });
        }
        if let Some(content) = outcome.text {
            self.layers.push(LayerItem::Text {
                content,
                expiry: Expiry::Never,
            });
        }
    }
}
