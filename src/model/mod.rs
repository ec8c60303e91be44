pub mod route;

pub use route::{RouteEntry, RouteRecord, RouteTable};
