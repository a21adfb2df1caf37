pub mod capture;
pub mod decode;
pub mod position;
pub mod source;
pub mod window;
