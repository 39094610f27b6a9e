pub mod baseline;
pub mod errors;
pub mod host;
pub mod ids;
pub mod journal;
pub mod plan;
pub mod probe;
pub mod report;
pub mod safepath;
pub mod value;

pub use baseline::*;
pub use errors::*;
pub use host::*;
pub use ids::*;
pub use journal::*;
pub use plan::*;
pub use probe::*;
pub use report::*;
pub use safepath::*;
pub use value::*;
