pub mod decoders;
pub mod error;
pub mod registry;

pub use decoders::{FontdbDecoder, ImageCrateDecoder};
pub use error::ResourceError;
pub use registry::{
    FontOutcome, FontRegistration, FontReport, FontResource, FontSource, ImageResource,
    ResourceRegistry,
};
