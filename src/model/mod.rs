pub mod attendance;
pub mod employee;
pub mod regularization;
pub mod role;
pub mod settings;
pub mod shift;
