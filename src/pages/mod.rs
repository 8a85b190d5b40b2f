pub mod home;
pub mod live;
pub mod not_found;
