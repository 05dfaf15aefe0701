pub mod frame;
pub mod result;
pub mod window;

pub use frame::{Frame, PixelFormat};
pub use result::{EstimationResult, ResultStatus, VitalSeries, WindowResult};
pub use window::{Window, WindowId};
