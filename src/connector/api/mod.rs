pub mod container;
pub mod controller;
pub mod graphql;
pub mod router;

pub use container::{Container, ContainerConfig};
pub use graphql::{QueryEngine, Request, Response, ResponseError};
pub use router::Router;
