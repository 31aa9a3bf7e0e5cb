pub mod anchor;
pub mod apply;
pub mod credentials;
pub mod did;
pub mod present;
pub mod status;
pub mod verify;
