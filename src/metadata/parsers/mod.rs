// Format-specific header decoders

mod r3d;

pub use r3d::R3dParser;

use crate::metadata::parser::HeaderParser;

/// All built-in parsers, in registration order
pub(crate) fn all() -> Vec<Box<dyn HeaderParser>> {
    vec![Box::new(R3dParser)]
}
