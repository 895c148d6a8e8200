// Domain-layer modules and shared errors/models
pub mod aggregator {
    pub use crate::aggregator::*;
}

pub mod models {
    pub use crate::models::*;
}

pub mod stream_parser {
    pub use crate::stream_parser::*;
}

pub mod errors {
    pub use crate::errors::*;
}
