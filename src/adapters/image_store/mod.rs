pub mod cloudinary;
pub mod local;
