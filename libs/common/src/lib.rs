pub mod id;
pub mod sequence;

pub use id::PrefixedId;
pub use sequence::SequenceGenerator;
