mod quota;
mod snapshot;
mod upstream;

pub use quota::*;
pub use snapshot::*;
pub use upstream::*;
