mod comparison;
mod group;
mod node;
mod reference;
mod tokens;

pub use comparison::*;
pub use group::*;
pub use node::*;
pub use reference::*;
pub use tokens::*;
