pub mod assets;
pub mod events;
pub mod surface;
pub mod traits;

pub use assets::*;
pub use events::*;
pub use surface::*;
pub use traits::*;
