//! domain — descriptors of the spaces fields live on.
//!
//! Every field and operator carries a [`DomainRef`]; compatibility checks
//! happen at call time through [`check_domain`].
pub mod space;

pub use self::space::{check_domain, Domain, DomainRef, RegularGrid};
