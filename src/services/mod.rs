pub mod floorability;
pub mod geometry;
pub mod loop_generator;
pub mod loop_geometry;
pub mod matcher;
pub mod overpass;
pub mod route_scoring;
pub mod routing;
