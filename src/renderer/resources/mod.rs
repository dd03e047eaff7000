/// "Resources" refers to the objects describing what is drawn and how.

pub mod pipeline;
pub mod render_pass;
pub mod shader;
