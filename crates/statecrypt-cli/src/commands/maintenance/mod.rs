mod check;
mod cleanup;
mod doctor;
mod init_config;
mod status;

pub use check::handle_check;
pub use cleanup::handle_cleanup;
pub use doctor::handle_doctor;
pub use init_config::handle_init_config;
pub use status::handle_status;
