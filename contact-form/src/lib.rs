mod controller;
mod transport;

#[allow(non_snake_case)]
pub mod Form {
    pub use crate::controller::*;
}

#[allow(non_snake_case)]
pub mod Transport {
    pub use crate::transport::*;
}
