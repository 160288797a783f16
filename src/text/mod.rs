pub mod chunks;
pub mod extract;
pub mod normalize;
pub mod vocab;
