/// "Core" refers to the objects that live for the whole run and own the presentation target.

pub mod context;
pub mod device;
pub mod instance;
pub mod surface;
pub mod target;
