pub mod backend;
pub mod cube_map;
pub mod flow;
pub mod gpu;
pub mod helper;
pub mod image;
pub mod resource;
pub mod scene;
pub mod skybox;
pub mod software;
