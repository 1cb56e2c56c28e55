pub mod material;
pub mod mesh;
pub mod node;
pub mod util;
