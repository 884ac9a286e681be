pub mod blur;
pub mod canvas;
pub mod config;
pub mod document;
pub mod error;
pub mod geometry;
pub mod history;
pub mod hit_test;
pub mod input;
pub mod logging;
pub mod overlay;
pub mod raster;
pub mod render;
pub mod transform;

pub use canvas::{Canvas, InteractionState, Tool};
pub use config::{load_canvas_config, CanvasConfig};
pub use error::{CanvasError, CanvasResult};
pub use geometry::{Color, Point, Rect, Size};
pub use overlay::{Overlay, OverlayId, OverlayKind, OverlayStyle};
pub use raster::BaseImage;
pub use render::ExportOptions;
