mod component;
mod config;
mod error;
mod pcm;
mod playback;
mod session;
mod transport;
mod web;

pub use component::LiveCoach;
