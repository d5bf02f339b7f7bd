//! Color extraction and processing.
//!
//! | Module      | Purpose                                           |
//! |-------------|---------------------------------------------------|
//! | `sample`    | `ColorSample` and RGB/HSV conversion              |
//! | `extractor` | Bilinear downscale and average color              |
//! | `pipeline`  | Holdover, max brightness, white mix, saturation   |
//! | `smoother`  | Exponential approach toward the processed color   |

pub mod extractor;
pub mod pipeline;
pub mod sample;
pub mod smoother;

pub use extractor::{ColorExtractor, DEFAULT_MAX_DIMENSION, average_color, downscale};
pub use pipeline::{ColorPipeline, PipelineSettings};
pub use sample::{ColorSample, Hsv, hsv_to_rgb, rgb_to_hsv};
pub use smoother::Smoother;
