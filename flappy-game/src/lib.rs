pub mod flappy_environment;
pub mod mechanics;

pub use mechanics::GameConfig;
