pub mod bound;
pub mod clean;
pub mod declarations;
pub mod error;
pub mod factory;
pub mod render;
pub mod submission;

pub use bound::{BoundBlock, BoundChild, Position, bind};
pub use clean::clean;
pub use declarations::{
    InitializerCache, TEMPLATE_PREFIX, all_declarations, all_media, dependency_closure,
    js_initializer,
};
pub use error::{MalformedSubmission, RenderError, ValidationError};
pub use factory::BlockFactory;
pub use render::{RenderOptions, UnknownTypePolicy, render, render_with};
pub use submission::value_from_submission;
