pub mod click_corrector;
pub mod encoder;
pub mod grid;
pub mod screenshot;
pub mod types;
