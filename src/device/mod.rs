pub mod adb;
pub mod apps;
pub mod screenshot;
pub mod traits;

pub use screenshot::Screenshot;
pub use traits::{DeviceDriver, HOME_LABEL};
