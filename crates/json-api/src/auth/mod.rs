//! Authentication

mod jwt;
pub(crate) mod middleware;

pub(crate) use jwt::*;
