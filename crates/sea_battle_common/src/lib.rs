pub mod codec;
pub mod game;
pub mod packet;
