pub mod blur;
pub mod codec;
pub mod obscurer;

pub use blur::{blur, gaussian_kernel, PixelBuffer};
pub use obscurer::{obscure_or_source, BlurObscurer, ImageObscurer};
