pub mod distributed;
pub mod network;
pub mod saturation;
