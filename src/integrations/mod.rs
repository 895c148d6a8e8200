//! Backend and third-party service clients.

pub mod api_client {
    pub use crate::api_client::*;
}

pub mod lookups {
    pub use crate::lookups::*;
}
