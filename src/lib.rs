pub mod admin;
pub mod collections;
pub mod config;
pub mod consts;
pub mod context;
pub mod database;
pub mod document;
pub mod error;
pub mod filter;
pub mod middleware;
pub mod query;
pub mod routes;
pub mod schema;
pub mod server;
pub mod state;
pub mod validator;
