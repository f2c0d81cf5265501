pub mod callback;
pub mod connect;
pub mod status;
